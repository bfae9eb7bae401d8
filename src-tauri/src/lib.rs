mod capture;
mod commands;
mod context;
mod corpus;
mod dispatcher;
mod error;
mod input;
mod lifecycle;
mod ocr;
mod permissions;
mod popup;
mod settings;
mod surface;
mod trigger;
mod utils;

use std::error::Error;
use std::panic;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tauri::menu::{Menu, MenuItem};
use tauri::tray::TrayIconBuilder;
use tauri::{AppHandle, Manager, RunEvent, WindowEvent};
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use capture::MonitorCapture;
use context::{AppContext, spawn_ui_context};
use dispatcher::{DispatcherHandle, UiMessage};
use error::AppError;
use input::copier::SystemClipboard;
use lifecycle::{RunState, ShutdownReason};
use ocr::TesseractOcr;
use permissions::ACCESSIBILITY_GUIDANCE;
use settings::AppSettings;
use surface::tauri_surface::{MAIN_WINDOW_LABEL, TauriSurface};
use surface::{AttentionWatch, FocusTracker};
use trigger::clipboard::{ClipboardSelectionTrigger, spawn_clipboard_worker};
use trigger::mouse::{MouseRouter, spawn_mouse_listener};
use trigger::region::{RegionCaptureTrigger, spawn_region_worker};

const MENU_ID_SHOW_PANEL: &str = "show_panel";
const MENU_ID_TOGGLE_MONITORING: &str = "toggle_monitoring";
const MENU_ID_QUIT: &str = "quit";

type SetupResult<T> = Result<T, Box<dyn Error>>;

fn init_logging() -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(filter)
        .try_init()
        .map_err(|err| AppError::LoggingInit(err.to_string()))
}

fn install_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        let thread = thread::current();
        let thread_name = thread.name().unwrap_or("<unnamed>");
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "<non-string panic payload>".to_string());
        let location = panic_info
            .location()
            .map(|location| format!("{}:{}", location.file(), location.line()))
            .unwrap_or_else(|| "<unknown>".to_string());

        error!(
            thread = thread_name,
            location = location.as_str(),
            "{}",
            AppError::Unhandled(payload)
        );
    }));
}

fn setup_tray(
    app: &mut tauri::App,
    dispatcher: DispatcherHandle,
    run_state: Arc<RunState>,
) -> SetupResult<()> {
    let show_item = MenuItem::with_id(
        app,
        MENU_ID_SHOW_PANEL,
        "Show Control Panel",
        true,
        None::<&str>,
    )?;
    let toggle_item = MenuItem::with_id(
        app,
        MENU_ID_TOGGLE_MONITORING,
        "Pause/Resume Monitoring",
        true,
        None::<&str>,
    )?;
    let quit_item = MenuItem::with_id(app, MENU_ID_QUIT, "Quit", true, None::<&str>)?;
    let menu = Menu::with_items(app, &[&show_item, &toggle_item, &quit_item])?;

    TrayIconBuilder::new()
        .icon(tauri::include_image!("./icons/icon.png"))
        .tooltip("Corpus Lens")
        .menu(&menu)
        .show_menu_on_left_click(true)
        .on_menu_event(move |app_handle, event| match event.id().as_ref() {
            MENU_ID_SHOW_PANEL => show_control_panel(app_handle),
            MENU_ID_TOGGLE_MONITORING => {
                let enabled = !run_state.is_monitoring();
                dispatcher.send(UiMessage::SetMonitoring(enabled));
            }
            MENU_ID_QUIT => {
                info!("quit requested from tray");
                if !dispatcher.send(UiMessage::CloseRequested) {
                    app_handle.exit(0);
                }
            }
            _ => {}
        })
        .build(app)?;

    Ok(())
}

fn show_control_panel(app_handle: &AppHandle) {
    if let Some(window) = app_handle.get_webview_window(MAIN_WINDOW_LABEL) {
        if let Err(show_err) = window.show() {
            warn!("failed to show control panel from tray menu: {show_err}");
        }
        if let Err(focus_err) = window.set_focus() {
            warn!("failed to focus control panel from tray menu: {focus_err}");
        }
    } else {
        warn!("control panel window not found");
    }
}

#[cfg(desktop)]
fn setup_global_shortcut(
    app: &mut tauri::App,
    hotkey: &str,
    dispatcher: DispatcherHandle,
) -> SetupResult<()> {
    use tauri_plugin_global_shortcut::{GlobalShortcutExt, ShortcutState};

    let shortcut = match settings::parse_shortcut(hotkey) {
        Ok(value) => value,
        Err(err) => {
            warn!("{err}; falling back to {}", settings::DEFAULT_REGION_HOTKEY);
            settings::parse_shortcut(settings::DEFAULT_REGION_HOTKEY)?
        }
    };

    app.handle().plugin(
        tauri_plugin_global_shortcut::Builder::new()
            .with_handler(move |_app_handle, _, event| {
                if matches!(event.state, ShortcutState::Pressed) {
                    info!("region hotkey pressed");
                    dispatcher.send(UiMessage::OpenRegionOverlay);
                }
            })
            .build(),
    )?;

    app.global_shortcut().register(shortcut)?;
    Ok(())
}

#[cfg(not(desktop))]
fn setup_global_shortcut(
    _app: &mut tauri::App,
    _hotkey: &str,
    _dispatcher: DispatcherHandle,
) -> SetupResult<()> {
    Ok(())
}

fn refuse_to_start(app: &tauri::App, run_state: &RunState) {
    error!("accessibility permission is missing; refusing to install global listeners");
    run_state.stop(ShutdownReason::PermissionDenied);

    let app_handle = app.handle().clone();
    app.dialog()
        .message(ACCESSIBILITY_GUIDANCE)
        .title("Corpus Lens needs permission")
        .kind(MessageDialogKind::Error)
        .show(move |_| app_handle.exit(1));
}

fn setup_app(app: &mut tauri::App) -> SetupResult<()> {
    let settings = match settings::load_settings(app.handle()) {
        Ok(settings) => settings,
        Err(err) => {
            warn!("failed to load persisted settings during startup: {err}");
            AppSettings::default()
        }
    };
    info!(
        corpus = settings.corpus_path.as_str(),
        hotkey = settings.region_hotkey.as_str(),
        "settings loaded"
    );

    let run_state = RunState::new();
    let (dispatcher, inbox) = dispatcher::channel();
    let attention = AttentionWatch::default();
    let focus = FocusTracker::default();
    app.manage(Arc::clone(&run_state));
    app.manage(dispatcher.clone());
    app.manage(focus.clone());

    if !permissions::check() {
        refuse_to_start(app, &run_state);
        return Ok(());
    }

    let release_tx = if settings.clipboard_trigger_enabled {
        let (release_tx, release_rx) = mpsc::channel();
        let trigger = ClipboardSelectionTrigger::new(
            SystemClipboard::new(app.handle().clone()),
            Duration::from_millis(settings.clipboard_settle_ms),
        );
        spawn_clipboard_worker(trigger, release_rx, dispatcher.clone(), Arc::clone(&run_state))?;
        Some(release_tx)
    } else {
        info!("clipboard trigger disabled in settings");
        None
    };

    let region_tx = if !settings.region_trigger_enabled {
        info!("region trigger disabled in settings");
        None
    } else if !permissions::ocr_available(&settings.tesseract_command) {
        warn!("tesseract is unavailable; region capture disabled");
        None
    } else {
        let (region_tx, region_rx) = mpsc::channel();
        let trigger = RegionCaptureTrigger::new(
            MonitorCapture,
            TesseractOcr::new(&settings.tesseract_command, &settings.ocr_language),
            Duration::from_millis(settings.region_settle_ms),
        );
        spawn_region_worker(trigger, region_rx, dispatcher.clone(), Arc::clone(&run_state))?;
        Some(region_tx)
    };

    spawn_mouse_listener(MouseRouter::new(
        release_tx,
        attention.clone(),
        focus,
        dispatcher.clone(),
        Arc::clone(&run_state),
    ))?;

    let surface = TauriSurface::new(app.handle().clone(), dispatcher.clone(), attention);
    let context = AppContext::new(
        settings.lookup(),
        Arc::clone(&run_state),
        dispatcher.clone(),
        surface,
        region_tx,
    );
    let abort_handle = app.handle().clone();
    spawn_ui_context(context, inbox, move || abort_handle.exit(1))?;

    if let Some(window) = app.get_webview_window(MAIN_WINDOW_LABEL) {
        if let Err(err) = window.set_icon(tauri::include_image!("./icons/icon.png")) {
            warn!("failed to set main window icon: {err}");
        }
    }

    setup_tray(app, dispatcher.clone(), Arc::clone(&run_state))?;
    setup_global_shortcut(app, &settings.region_hotkey, dispatcher)?;
    info!("corpus lens ready");
    Ok(())
}

fn handle_run_event(app_handle: &AppHandle, event: RunEvent) {
    match event {
        RunEvent::WindowEvent { label, event, .. } => match event {
            WindowEvent::Focused(focused) => {
                if let Some(focus) = app_handle.try_state::<FocusTracker>() {
                    focus.window_focus_changed(&label, focused);
                }
            }
            WindowEvent::Destroyed => {
                if let Some(focus) = app_handle.try_state::<FocusTracker>() {
                    focus.window_focus_changed(&label, false);
                }
            }
            WindowEvent::CloseRequested { .. } if label == MAIN_WINDOW_LABEL => {
                info!("control window closed");
                if let Some(dispatcher) = app_handle.try_state::<DispatcherHandle>() {
                    dispatcher.send(UiMessage::CloseRequested);
                }
            }
            _ => {}
        },
        RunEvent::ExitRequested { code, api, .. } => {
            let running = app_handle
                .try_state::<Arc<RunState>>()
                .is_some_and(|run_state| run_state.is_running());
            if code.is_none() && running {
                // The ui context exits explicitly once it has torn everything down.
                api.prevent_exit();
            }
        }
        RunEvent::Exit => info!("application terminated"),
        _ => {}
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    if let Err(init_err) = init_logging() {
        eprintln!("logging bootstrap failed: {init_err}");
    }
    install_panic_hook();

    info!("starting corpus lens");

    let builder = tauri::Builder::default()
        .setup(setup_app)
        .plugin(tauri_plugin_clipboard_manager::init())
        .plugin(tauri_plugin_dialog::init())
        .invoke_handler(tauri::generate_handler![
            commands::app_status,
            commands::check_permissions,
            commands::get_settings,
            commands::save_settings,
            commands::set_monitoring,
            commands::quit_app,
            commands::region_selected,
            commands::region_cancelled
        ]);

    let app = match builder.build(tauri::generate_context!()) {
        Ok(app) => app,
        Err(build_err) => {
            error!("failed to build tauri app: {build_err}");
            return;
        }
    };

    app.run(handle_run_event);
}

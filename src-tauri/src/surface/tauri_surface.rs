use serde::Deserialize;
use tauri::{
    AppHandle, Emitter, EventId, Listener, LogicalPosition, LogicalSize, Manager, WebviewUrl,
    WebviewWindow, WebviewWindowBuilder,
};
use tauri_plugin_clipboard_manager::ClipboardExt;
use tracing::{debug, warn};

use crate::dispatcher::{DispatcherHandle, UiMessage};
use crate::popup::{PopupInput, PopupLayout, PopupView};
use crate::surface::{AttentionWatch, BindingSpec, StatusSnapshot, Surface, SurfaceError};

pub const MAIN_WINDOW_LABEL: &str = "main";
pub const POPUP_WINDOW_LABEL: &str = "popup";
pub const OVERLAY_WINDOW_LABEL: &str = "region-overlay";
const EVENT_POPUP_RENDER: &str = "popup://render";
const EVENT_POPUP_INPUT: &str = "popup://input";
const EVENT_STATUS: &str = "status://changed";
const COMPACT_SIZE: (f64, f64) = (300.0, 200.0);
const PANEL_SIZE: (f64, f64) = (500.0, 400.0);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PopupInputEvent {
    sequence_id: u64,
    input: PopupInput,
}

pub struct TauriBindings {
    sequence_id: u64,
    listener: EventId,
}

pub struct TauriSurface {
    app: AppHandle,
    dispatcher: DispatcherHandle,
    attention: AttentionWatch,
}

impl TauriSurface {
    pub fn new(app: AppHandle, dispatcher: DispatcherHandle, attention: AttentionWatch) -> Self {
        Self {
            app,
            dispatcher,
            attention,
        }
    }

    fn create_popup(&self, view: &PopupView) -> Result<WebviewWindow, SurfaceError> {
        let payload =
            serde_json::to_string(view).map_err(|err| SurfaceError::Event(err.to_string()))?;
        WebviewWindowBuilder::new(
            &self.app,
            POPUP_WINDOW_LABEL,
            WebviewUrl::App("popup.html".into()),
        )
        .title("Corpus Lens")
        .decorations(false)
        .always_on_top(true)
        .skip_taskbar(true)
        .resizable(false)
        .focused(true)
        .initialization_script(&format!("window.__POPUP_VIEW__ = {payload};"))
        .build()
        .map_err(|err| SurfaceError::Window(err.to_string()))
    }
}

impl Surface for TauriSurface {
    type Bindings = TauriBindings;

    fn show_popup(&mut self, view: &PopupView) -> Result<(), SurfaceError> {
        let window = match self.app.get_webview_window(POPUP_WINDOW_LABEL) {
            Some(window) => {
                self.app
                    .emit_to(POPUP_WINDOW_LABEL, EVENT_POPUP_RENDER, view)
                    .map_err(|err| SurfaceError::Event(err.to_string()))?;
                window
            }
            None => self.create_popup(view)?,
        };

        place_popup(&window, view.layout)?;
        window
            .show()
            .map_err(|err| SurfaceError::Window(err.to_string()))?;
        if let Err(err) = window.set_focus() {
            warn!("failed to focus popup window: {err}");
        }
        Ok(())
    }

    fn hide_popup(&mut self) {
        if let Some(window) = self.app.get_webview_window(POPUP_WINDOW_LABEL) {
            if let Err(err) = window.hide() {
                warn!("failed to hide popup window: {err}");
            }
        }
    }

    fn install_bindings(&mut self, spec: BindingSpec) -> Result<Self::Bindings, SurfaceError> {
        let dispatcher = self.dispatcher.clone();
        let listener = self.app.listen_any(EVENT_POPUP_INPUT, move |event| {
            match serde_json::from_str::<PopupInputEvent>(event.payload()) {
                Ok(payload) => {
                    dispatcher.send(UiMessage::PopupInput {
                        sequence_id: payload.sequence_id,
                        input: payload.input,
                    });
                }
                Err(err) => warn!("ignoring malformed popup input: {err}"),
            }
        });

        if spec.dismiss_on_attention_shift {
            self.attention.arm(spec.sequence_id);
        }
        debug!(sequence_id = spec.sequence_id, "popup bindings installed");

        Ok(TauriBindings {
            sequence_id: spec.sequence_id,
            listener,
        })
    }

    fn release_bindings(&mut self, bindings: Self::Bindings) {
        self.app.unlisten(bindings.listener);
        self.attention.disarm(bindings.sequence_id);
    }

    fn write_clipboard(&mut self, text: &str) -> Result<(), SurfaceError> {
        self.app
            .clipboard()
            .write_text(text.to_string())
            .map_err(|err| SurfaceError::Clipboard(err.to_string()))
    }

    fn open_region_overlay(&mut self) -> Result<(), SurfaceError> {
        if let Some(window) = self.app.get_webview_window(OVERLAY_WINDOW_LABEL) {
            window
                .set_focus()
                .map_err(|err| SurfaceError::Window(err.to_string()))?;
            return Ok(());
        }

        WebviewWindowBuilder::new(
            &self.app,
            OVERLAY_WINDOW_LABEL,
            WebviewUrl::App("overlay.html".into()),
        )
        .title("Select region")
        .fullscreen(true)
        .transparent(true)
        .decorations(false)
        .always_on_top(true)
        .skip_taskbar(true)
        .focused(true)
        .build()
        .map(|_| ())
        .map_err(|err| SurfaceError::Window(err.to_string()))
    }

    fn close_region_overlay(&mut self) {
        if let Some(window) = self.app.get_webview_window(OVERLAY_WINDOW_LABEL) {
            if let Err(err) = window.destroy() {
                warn!("failed to close region overlay: {err}");
            }
        }
    }

    fn publish_status(&mut self, status: &StatusSnapshot) {
        if let Err(err) = self.app.emit_to(MAIN_WINDOW_LABEL, EVENT_STATUS, status) {
            warn!("failed to publish status: {err}");
        }
    }

    fn root_alive(&self) -> bool {
        self.app.get_webview_window(MAIN_WINDOW_LABEL).is_some()
    }

    fn exit(&mut self) {
        self.app.exit(0);
    }
}

fn place_popup(window: &WebviewWindow, layout: PopupLayout) -> Result<(), SurfaceError> {
    let (width, height) = match layout {
        PopupLayout::Compact => COMPACT_SIZE,
        PopupLayout::Panel => PANEL_SIZE,
    };
    window
        .set_size(LogicalSize::new(width, height))
        .map_err(|err| SurfaceError::Window(err.to_string()))?;

    let monitor = window
        .current_monitor()
        .map_err(|err| SurfaceError::Window(err.to_string()))?;
    let Some(monitor) = monitor else {
        return Ok(());
    };

    let scale = monitor.scale_factor();
    let origin = monitor.position().to_logical::<f64>(scale);
    let screen = monitor.size().to_logical::<f64>(scale);
    let x = origin.x + (screen.width - width) / 2.0;
    let y = match layout {
        PopupLayout::Compact => origin.y + screen.height - height,
        PopupLayout::Panel => origin.y + (screen.height - height) / 2.0,
    };

    window
        .set_position(LogicalPosition::new(x, y))
        .map_err(|err| SurfaceError::Window(err.to_string()))
}

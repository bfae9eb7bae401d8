use std::sync::Arc;

use serde::Serialize;
use tauri::{AppHandle, State};
use tracing::{debug, info};

use crate::dispatcher::{DispatcherHandle, UiMessage};
use crate::error::AppError;
use crate::lifecycle::RunState;
use crate::permissions::PermissionReport;
use crate::settings::{self, AppSettings};
use crate::trigger::region::{Point, Rect};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    pub service: &'static str,
    pub version: &'static str,
    pub running: bool,
    pub monitoring: bool,
}

fn status_snapshot(run_state: &RunState) -> Result<AppStatus, AppError> {
    Ok(AppStatus {
        service: "corpus-lens",
        version: env!("CARGO_PKG_VERSION"),
        running: run_state.is_running(),
        monitoring: run_state.is_monitoring(),
    })
}

fn deliver(dispatcher: &DispatcherHandle, message: UiMessage) -> Result<(), String> {
    if dispatcher.send(message) {
        Ok(())
    } else {
        Err(AppError::Runtime("application is shutting down".to_string()).to_string())
    }
}

#[tauri::command]
pub fn app_status(run_state: State<'_, Arc<RunState>>) -> Result<AppStatus, String> {
    status_snapshot(&run_state).map_err(|err| err.to_string())
}

#[tauri::command]
pub fn check_permissions(app_handle: AppHandle) -> PermissionReport {
    let tesseract_command = settings::load_settings(&app_handle)
        .map(|settings| settings.tesseract_command)
        .unwrap_or_else(|_| AppSettings::default().tesseract_command);
    crate::permissions::check_permissions(&tesseract_command)
}

#[tauri::command]
pub fn get_settings(app_handle: AppHandle) -> Result<AppSettings, String> {
    settings::load_settings(&app_handle)
}

#[tauri::command]
pub fn save_settings(
    app_handle: AppHandle,
    dispatcher: State<'_, DispatcherHandle>,
    settings: AppSettings,
) -> Result<AppSettings, String> {
    let saved = settings::save_settings(&app_handle, settings)?;
    deliver(&dispatcher, UiMessage::SettingsChanged(saved.lookup()))?;
    Ok(saved)
}

#[tauri::command]
pub fn set_monitoring(
    dispatcher: State<'_, DispatcherHandle>,
    enabled: bool,
) -> Result<bool, String> {
    info!(enabled, "monitoring toggled from control panel");
    deliver(&dispatcher, UiMessage::SetMonitoring(enabled))?;
    Ok(enabled)
}

#[tauri::command]
pub fn quit_app(dispatcher: State<'_, DispatcherHandle>) -> Result<(), String> {
    info!("quit requested from control panel");
    deliver(&dispatcher, UiMessage::CloseRequested)
}

#[tauri::command]
pub fn region_selected(
    dispatcher: State<'_, DispatcherHandle>,
    start: Point,
    end: Point,
) -> Result<(), String> {
    let message = match Rect::from_corners(start, end) {
        Some(rect) => UiMessage::RegionSelected(rect),
        None => {
            debug!("zero-area region selection treated as cancel");
            UiMessage::RegionCancelled
        }
    };
    deliver(&dispatcher, message)
}

#[tauri::command]
pub fn region_cancelled(dispatcher: State<'_, DispatcherHandle>) -> Result<(), String> {
    deliver(&dispatcher, UiMessage::RegionCancelled)
}

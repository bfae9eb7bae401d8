use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use tauri::{AppHandle, Runtime};
use tauri_plugin_clipboard_manager::ClipboardExt;

use crate::input::InputError;
use crate::trigger::clipboard::ClipboardSource;

#[cfg(target_os = "macos")]
const COPY_MODIFIER: Key = Key::Meta;
#[cfg(not(target_os = "macos"))]
const COPY_MODIFIER: Key = Key::Control;

/// Presses the platform copy shortcut in whatever window has focus.
pub struct CopyKeystroke {
    enigo: Enigo,
}

impl CopyKeystroke {
    pub fn new() -> Result<Self, InputError> {
        let enigo = Enigo::new(&Settings::default())
            .map_err(|err| InputError::Initialization(err.to_string()))?;

        Ok(Self { enigo })
    }

    pub fn press(&mut self) -> Result<(), InputError> {
        self.enigo
            .key(COPY_MODIFIER, Direction::Press)
            .map_err(|err| InputError::Keyboard(err.to_string()))?;
        let copied = self
            .enigo
            .key(Key::Unicode('c'), Direction::Click)
            .map_err(|err| InputError::Keyboard(err.to_string()));
        // Release the modifier even if the letter failed, or it stays stuck down.
        self.enigo
            .key(COPY_MODIFIER, Direction::Release)
            .map_err(|err| InputError::Keyboard(err.to_string()))?;
        copied
    }
}

/// Copies the current selection and reads it back from the system clipboard.
pub struct SystemClipboard<R: Runtime> {
    app_handle: AppHandle<R>,
}

impl<R: Runtime> SystemClipboard<R> {
    pub fn new(app_handle: AppHandle<R>) -> Self {
        Self { app_handle }
    }
}

impl<R: Runtime> ClipboardSource for SystemClipboard<R> {
    fn simulate_copy(&mut self) -> Result<(), InputError> {
        // The enigo handle is not shared across threads, so build one per copy.
        CopyKeystroke::new()?.press()
    }

    fn read_text(&mut self) -> Result<String, InputError> {
        self.app_handle
            .clipboard()
            .read_text()
            .map_err(|err| InputError::Clipboard(err.to_string()))
    }
}

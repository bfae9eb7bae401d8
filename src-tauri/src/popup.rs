use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::corpus::SearchResult;
use crate::dispatcher::TriggerKind;
use crate::surface::{BindingSpec, Surface, SurfaceError};

/// Every way the user can act on an open popup, from buttons and keys alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PopupCommand {
    Next,
    Prev,
    Close,
    CopyAll,
}

impl PopupCommand {
    /// Maps a DOM key name to a command. `modifier` is Ctrl or Cmd held down.
    pub fn from_key(key: &str, modifier: bool) -> Option<Self> {
        if modifier {
            return matches!(key, "c" | "C").then_some(Self::CopyAll);
        }

        match key {
            "ArrowRight" | "Right" | "x" | "X" | "n" | "N" => Some(Self::Next),
            "ArrowLeft" | "Left" | "z" | "Z" | "p" | "P" => Some(Self::Prev),
            "Escape" => Some(Self::Close),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PopupInput {
    Key {
        key: String,
        #[serde(default)]
        modifier: bool,
    },
    Button {
        command: PopupCommand,
    },
}

impl PopupInput {
    pub fn command(&self) -> Option<PopupCommand> {
        match self {
            Self::Key { key, modifier } => PopupCommand::from_key(key, *modifier),
            Self::Button { command } => Some(*command),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PopupLayout {
    /// Small strip at the bottom of the screen for clipboard lookups.
    Compact,
    /// Centered panel with navigation buttons for region captures.
    Panel,
}

impl From<TriggerKind> for PopupLayout {
    fn from(kind: TriggerKind) -> Self {
        match kind {
            TriggerKind::ClipboardSelection => Self::Compact,
            TriggerKind::RegionCapture => Self::Panel,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupView {
    pub sequence_id: u64,
    pub layout: PopupLayout,
    pub position: usize,
    pub total: usize,
    pub counter: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupState {
    pub result: SearchResult,
    pub current_index: usize,
    pub sequence_id: u64,
    pub kind: TriggerKind,
}

impl PopupState {
    fn view(&self) -> PopupView {
        let total = self.result.len();
        let position = self.current_index + 1;
        PopupView {
            sequence_id: self.sequence_id,
            layout: self.kind.into(),
            position,
            total,
            counter: format!("[{position}/{total}]"),
            text: self.current_text(),
        }
    }

    pub fn current_text(&self) -> String {
        self.result
            .get(self.current_index)
            .map(|entry| entry.text())
            .unwrap_or_default()
    }
}

enum Phase<B> {
    Closed,
    Open { state: PopupState, bindings: B },
}

/// Owns the single result popup and the input bindings that go with it.
///
/// Bindings are held by value while open and handed back to the surface on
/// every transition out of `Open`, before anything new is installed.
pub struct PopupController<S: Surface> {
    phase: Phase<S::Bindings>,
}

impl<S: Surface> Default for PopupController<S> {
    fn default() -> Self {
        Self {
            phase: Phase::Closed,
        }
    }
}

impl<S: Surface> PopupController<S> {
    pub fn state(&self) -> Option<&PopupState> {
        match &self.phase {
            Phase::Closed => None,
            Phase::Open { state, .. } => Some(state),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state().is_some()
    }

    pub fn is_showing(&self, sequence_id: u64) -> bool {
        self.state()
            .is_some_and(|state| state.sequence_id == sequence_id)
    }

    pub fn show_results(
        &mut self,
        surface: &mut S,
        result: SearchResult,
        sequence_id: u64,
        kind: TriggerKind,
    ) -> Result<(), SurfaceError> {
        if self.release_bindings(surface) {
            debug!(sequence_id, "replacing open popup");
        }

        let state = PopupState {
            result,
            current_index: 0,
            sequence_id,
            kind,
        };

        if let Err(err) = surface.show_popup(&state.view()) {
            surface.hide_popup();
            return Err(err);
        }

        let bindings = match surface.install_bindings(BindingSpec {
            sequence_id,
            dismiss_on_attention_shift: kind == TriggerKind::ClipboardSelection,
        }) {
            Ok(bindings) => bindings,
            Err(err) => {
                surface.hide_popup();
                return Err(err);
            }
        };

        info!(
            sequence_id,
            entries = state.result.len(),
            "popup opened"
        );
        self.phase = Phase::Open { state, bindings };
        Ok(())
    }

    pub fn navigate_next(&mut self, surface: &mut S) -> Result<bool, SurfaceError> {
        self.navigate(surface, |state| {
            if state.current_index + 1 < state.result.len() {
                state.current_index += 1;
                true
            } else {
                false
            }
        })
    }

    pub fn navigate_prev(&mut self, surface: &mut S) -> Result<bool, SurfaceError> {
        self.navigate(surface, |state| {
            if state.current_index > 0 {
                state.current_index -= 1;
                true
            } else {
                false
            }
        })
    }

    /// Closes the popup. Returns false when nothing was open.
    pub fn dismiss(&mut self, surface: &mut S) -> bool {
        if !self.release_bindings(surface) {
            return false;
        }
        surface.hide_popup();
        info!("popup dismissed");
        true
    }

    pub fn copy_current(&self, surface: &mut S) -> Result<(), SurfaceError> {
        let Some(state) = self.state() else {
            return Ok(());
        };
        surface.write_clipboard(state.current_text().trim())
    }

    pub fn apply(&mut self, surface: &mut S, command: PopupCommand) -> Result<(), SurfaceError> {
        match command {
            PopupCommand::Next => self.navigate_next(surface).map(|_| ()),
            PopupCommand::Prev => self.navigate_prev(surface).map(|_| ()),
            PopupCommand::Close => {
                self.dismiss(surface);
                Ok(())
            }
            PopupCommand::CopyAll => self.copy_current(surface),
        }
    }

    fn navigate(
        &mut self,
        surface: &mut S,
        step: impl FnOnce(&mut PopupState) -> bool,
    ) -> Result<bool, SurfaceError> {
        let Phase::Open { state, .. } = &mut self.phase else {
            return Ok(false);
        };
        if !step(state) {
            return Ok(false);
        }
        surface.show_popup(&state.view())?;
        Ok(true)
    }

    fn release_bindings(&mut self, surface: &mut S) -> bool {
        match std::mem::replace(&mut self.phase, Phase::Closed) {
            Phase::Closed => false,
            Phase::Open { state, bindings } => {
                surface.release_bindings(bindings);
                debug!(sequence_id = state.sequence_id, "popup bindings released");
                true
            }
        }
    }
}

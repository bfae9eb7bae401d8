//! The toolkit-facing side of the UI context.

pub mod tauri_surface;
#[cfg(test)]
pub mod testing;

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use serde::Serialize;
use thiserror::Error;

use crate::popup::PopupView;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("window operation failed: {0}")]
    Window(String),
    #[error("clipboard operation failed: {0}")]
    Clipboard(String),
    #[error("failed to emit event: {0}")]
    Event(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingSpec {
    pub sequence_id: u64,
    pub dismiss_on_attention_shift: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub running: bool,
    pub monitoring: bool,
    pub popup_open: bool,
    pub corpus_path: String,
}

/// Everything the UI context needs from the windowing toolkit.
///
/// `Bindings` is move-only: the only way to release a set of popup bindings is
/// to hand the value back, so a popup can never hold two sets at once.
pub trait Surface {
    type Bindings;

    /// Opens the popup or re-renders it in place.
    fn show_popup(&mut self, view: &PopupView) -> Result<(), SurfaceError>;
    fn hide_popup(&mut self);
    fn install_bindings(&mut self, spec: BindingSpec) -> Result<Self::Bindings, SurfaceError>;
    fn release_bindings(&mut self, bindings: Self::Bindings);
    fn write_clipboard(&mut self, text: &str) -> Result<(), SurfaceError>;
    fn open_region_overlay(&mut self) -> Result<(), SurfaceError>;
    fn close_region_overlay(&mut self);
    fn publish_status(&mut self, status: &StatusSnapshot);
    fn root_alive(&self) -> bool;
    fn exit(&mut self);
}

/// Tells the global mouse listener which popup, if any, closes on scroll.
#[derive(Debug, Clone, Default)]
pub struct AttentionWatch {
    armed: Arc<AtomicU64>,
}

impl AttentionWatch {
    pub fn arm(&self, sequence_id: u64) {
        self.armed.store(sequence_id, Ordering::Release);
    }

    pub fn disarm(&self, sequence_id: u64) {
        let _ = self
            .armed
            .compare_exchange(sequence_id, 0, Ordering::AcqRel, Ordering::Acquire);
    }

    #[cfg(test)]
    pub fn armed(&self) -> Option<u64> {
        match self.armed.load(Ordering::Acquire) {
            0 => None,
            sequence_id => Some(sequence_id),
        }
    }

    /// Disarms the watch and returns the popup it was armed for, at most once per arm.
    pub fn take(&self) -> Option<u64> {
        match self.armed.swap(0, Ordering::AcqRel) {
            0 => None,
            sequence_id => Some(sequence_id),
        }
    }
}

/// Tracks whether any of our own windows has keyboard focus.
///
/// Mouse releases inside our windows must not start a clipboard lookup.
#[derive(Debug, Clone, Default)]
pub struct FocusTracker {
    focused: Arc<AtomicU8>,
}

impl FocusTracker {
    pub fn window_focus_changed(&self, label: &str, focused: bool) {
        let bit = match label {
            tauri_surface::MAIN_WINDOW_LABEL => 0b001,
            tauri_surface::POPUP_WINDOW_LABEL => 0b010,
            tauri_surface::OVERLAY_WINDOW_LABEL => 0b100,
            _ => return,
        };
        if focused {
            self.focused.fetch_or(bit, Ordering::AcqRel);
        } else {
            self.focused.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    pub fn own_window_focused(&self) -> bool {
        self.focused.load(Ordering::Acquire) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_disarm_keeps_newer_watch() {
        let watch = AttentionWatch::default();
        watch.arm(3);
        watch.disarm(2);
        assert_eq!(watch.armed(), Some(3));
        watch.disarm(3);
        assert_eq!(watch.armed(), None);
    }

    #[test]
    fn take_fires_once_per_arm() {
        let watch = AttentionWatch::default();
        watch.arm(5);
        assert_eq!(watch.take(), Some(5));
        assert_eq!(watch.take(), None);
    }

    #[test]
    fn focus_tracker_follows_each_window() {
        let focus = FocusTracker::default();
        focus.window_focus_changed("popup", true);
        focus.window_focus_changed("main", true);
        focus.window_focus_changed("popup", false);
        assert!(focus.own_window_focused());
        focus.window_focus_changed("main", false);
        focus.window_focus_changed("elsewhere", true);
        assert!(!focus.own_window_focused());
    }
}

use crate::popup::PopupView;
use crate::surface::{AttentionWatch, BindingSpec, StatusSnapshot, Surface, SurfaceError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    ShowPopup(PopupView),
    HidePopup,
    Install(u64),
    Release(u64),
    WriteClipboard(String),
    OpenOverlay,
    CloseOverlay,
    Exit,
}

#[derive(Debug)]
pub struct RecordedBindings {
    sequence_id: u64,
}

/// In-memory surface that records every call and rejects overlapping bindings.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub calls: Vec<SurfaceCall>,
    pub attention_watch: AttentionWatch,
    pub clipboard: Option<String>,
    pub statuses: Vec<StatusSnapshot>,
    pub fail_show: bool,
    pub root_closed: bool,
    live: usize,
}

impl RecordingSurface {
    pub fn live_bindings(&self) -> usize {
        self.live
    }

    pub fn last_view(&self) -> Option<PopupView> {
        self.calls.iter().rev().find_map(|call| match call {
            SurfaceCall::ShowPopup(view) => Some(view.clone()),
            _ => None,
        })
    }

    pub fn released(&self) -> Vec<u64> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Release(sequence_id) => Some(*sequence_id),
                _ => None,
            })
            .collect()
    }

    pub fn popups_shown(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, SurfaceCall::Install(_)))
            .count()
    }
}

impl Surface for RecordingSurface {
    type Bindings = RecordedBindings;

    fn show_popup(&mut self, view: &PopupView) -> Result<(), SurfaceError> {
        if self.fail_show {
            return Err(SurfaceError::Window("popup window unavailable".into()));
        }
        self.calls.push(SurfaceCall::ShowPopup(view.clone()));
        Ok(())
    }

    fn hide_popup(&mut self) {
        self.calls.push(SurfaceCall::HidePopup);
    }

    fn install_bindings(&mut self, spec: BindingSpec) -> Result<Self::Bindings, SurfaceError> {
        assert_eq!(self.live, 0, "bindings installed while another set is live");
        self.live += 1;
        if spec.dismiss_on_attention_shift {
            self.attention_watch.arm(spec.sequence_id);
        }
        self.calls.push(SurfaceCall::Install(spec.sequence_id));
        Ok(RecordedBindings {
            sequence_id: spec.sequence_id,
        })
    }

    fn release_bindings(&mut self, bindings: Self::Bindings) {
        self.live -= 1;
        self.attention_watch.disarm(bindings.sequence_id);
        self.calls.push(SurfaceCall::Release(bindings.sequence_id));
    }

    fn write_clipboard(&mut self, text: &str) -> Result<(), SurfaceError> {
        self.clipboard = Some(text.to_string());
        self.calls.push(SurfaceCall::WriteClipboard(text.to_string()));
        Ok(())
    }

    fn open_region_overlay(&mut self) -> Result<(), SurfaceError> {
        self.calls.push(SurfaceCall::OpenOverlay);
        Ok(())
    }

    fn close_region_overlay(&mut self) {
        self.calls.push(SurfaceCall::CloseOverlay);
    }

    fn publish_status(&mut self, status: &StatusSnapshot) {
        self.statuses.push(status.clone());
    }

    fn root_alive(&self) -> bool {
        !self.root_closed
    }

    fn exit(&mut self) {
        self.calls.push(SurfaceCall::Exit);
    }
}

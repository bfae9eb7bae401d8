use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::dispatcher::{DispatcherHandle, TriggerKind};
use crate::input::InputError;
use crate::lifecycle::RunState;
use crate::trigger::LastAccepted;
use crate::utils::preview_text;

pub const DEFAULT_CLIPBOARD_SETTLE_MS: u64 = 100;

pub trait ClipboardSource {
    fn simulate_copy(&mut self) -> Result<(), InputError>;
    fn read_text(&mut self) -> Result<String, InputError>;
}

/// Turns a mouse release into selected text: copy, settle, read, dedup.
pub struct ClipboardSelectionTrigger<C> {
    source: C,
    settle: Duration,
    last: LastAccepted,
}

impl<C: ClipboardSource> ClipboardSelectionTrigger<C> {
    pub fn new(source: C, settle: Duration) -> Self {
        Self {
            source,
            settle,
            last: LastAccepted::default(),
        }
    }

    pub fn on_release(&mut self) -> Result<Option<String>, InputError> {
        self.source.simulate_copy()?;
        thread::sleep(self.settle);
        let raw = self.source.read_text()?;

        match self.last.accept(&raw) {
            Some(text) => {
                info!(text = preview_text(&text).as_str(), "text selected");
                Ok(Some(text))
            }
            None => {
                debug!("selection empty or unchanged; skipping");
                Ok(None)
            }
        }
    }
}

pub fn spawn_clipboard_worker<C>(
    trigger: ClipboardSelectionTrigger<C>,
    releases: Receiver<()>,
    dispatcher: DispatcherHandle,
    run_state: Arc<RunState>,
) -> io::Result<JoinHandle<()>>
where
    C: ClipboardSource + Send + 'static,
{
    thread::Builder::new()
        .name("clipboard-trigger".into())
        .spawn(move || run_clipboard_worker(trigger, releases, dispatcher, run_state))
}

fn run_clipboard_worker<C: ClipboardSource>(
    mut trigger: ClipboardSelectionTrigger<C>,
    releases: Receiver<()>,
    dispatcher: DispatcherHandle,
    run_state: Arc<RunState>,
) {
    while releases.recv().is_ok() {
        if !run_state.is_running() {
            break;
        }
        if !run_state.is_monitoring() {
            continue;
        }

        match panic::catch_unwind(AssertUnwindSafe(|| trigger.on_release())) {
            Ok(Ok(Some(text))) => {
                if !run_state.accepts_triggers() {
                    continue;
                }
                if !dispatcher.post(TriggerKind::ClipboardSelection, text) {
                    break;
                }
            }
            Ok(Ok(None)) => {}
            Ok(Err(err)) => warn!("clipboard lookup failed: {err}"),
            Err(_) => error!("clipboard trigger panicked; waiting for the next release"),
        }
    }

    info!("clipboard trigger stopped");
}

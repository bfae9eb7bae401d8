//! The single owner of popup state, run on the `ui-context` thread.
//!
//! Nothing outside this module mutates the popup or decides which lookup is
//! current. Producers reach it only through [`DispatcherHandle`], and long
//! running scans report back the same way, tagged with the sequence id they
//! were started for. A finished scan is applied only if its id is still the
//! latest accepted one.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::corpus::{self, Entry, Notice, Scan, SearchResult};
use crate::dispatcher::{
    DispatcherHandle, FailureEvent, Inbound, Inbox, TriggerEvent, TriggerKind, UiMessage,
};
use crate::error::AppError;
use crate::lifecycle::{RunState, ShutdownReason, Supervisor, Verdict};
use crate::popup::{PopupController, PopupInput};
use crate::settings::LookupSettings;
use crate::surface::{StatusSnapshot, Surface};
use crate::trigger::region::Rect;
use crate::utils::{leading_words, preview_text};

pub struct AppContext<S: Surface> {
    settings: LookupSettings,
    run_state: Arc<RunState>,
    dispatcher: DispatcherHandle,
    surface: S,
    popup: PopupController<S>,
    region_tx: Option<Sender<Rect>>,
    latest_accepted: u64,
    /// Sequence id of the last region lookup that put up an extracted-text preview.
    previewed: Option<u64>,
    overlay_open: bool,
}

impl<S: Surface> AppContext<S> {
    /// `region_tx` is `None` when region capture is unavailable.
    pub fn new(
        settings: LookupSettings,
        run_state: Arc<RunState>,
        dispatcher: DispatcherHandle,
        surface: S,
        region_tx: Option<Sender<Rect>>,
    ) -> Self {
        Self {
            settings,
            run_state,
            dispatcher,
            surface,
            popup: PopupController::default(),
            region_tx,
            latest_accepted: 0,
            previewed: None,
            overlay_open: false,
        }
    }

    pub fn handle(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Trigger(event) => self.handle_trigger(event),
            Inbound::Failure(failure) => self.handle_failure(failure),
            Inbound::Message(message) => self.handle_message(message),
        }
    }

    fn handle_trigger(&mut self, event: TriggerEvent) {
        if !self.run_state.is_running() {
            debug!(sequence_id = event.sequence_id, "ignoring trigger after shutdown");
            return;
        }

        self.latest_accepted = event.sequence_id;
        info!(
            sequence_id = event.sequence_id,
            kind = ?event.kind,
            text = preview_text(&event.text).as_str(),
            "lookup started"
        );

        let query = match event.kind {
            TriggerKind::ClipboardSelection => event.text,
            TriggerKind::RegionCapture => {
                let too_short =
                    event.text.chars().count() < self.settings.min_ocr_query_chars;
                if self.settings.show_ocr_preview || too_short {
                    let preview = SearchResult::notice(Notice::ExtractedText {
                        text: event.text.clone(),
                    });
                    self.show(preview, event.sequence_id, event.kind);
                    self.previewed = Some(event.sequence_id);
                }
                if too_short {
                    debug!(sequence_id = event.sequence_id, "OCR text too short to search");
                    return;
                }
                leading_words(&event.text, self.settings.ocr_query_words)
            }
        };

        self.spawn_scan(query, event.sequence_id, event.kind);
    }

    fn spawn_scan(&self, query: String, sequence_id: u64, kind: TriggerKind) {
        let corpus_path = self.settings.corpus_path.clone();
        let options = self.settings.scan;
        let dispatcher = self.dispatcher.clone();

        tokio::spawn(async move {
            let scan = tokio::task::spawn_blocking(move || {
                corpus::search(&query, &corpus_path, options)
            })
            .await;
            match scan {
                Ok(scan) => {
                    dispatcher.send(UiMessage::ScanFinished {
                        sequence_id,
                        kind,
                        scan,
                    });
                }
                Err(err) => error!(sequence_id, "corpus scan task failed: {err}"),
            }
        });
    }

    fn handle_failure(&mut self, failure: FailureEvent) {
        if !self.run_state.is_running() {
            return;
        }

        self.latest_accepted = failure.sequence_id;
        let result = SearchResult::notice(Notice::ExtractionFailed {
            message: failure.message,
        });
        self.show(result, failure.sequence_id, failure.kind);
    }

    fn handle_message(&mut self, message: UiMessage) {
        match message {
            UiMessage::ScanFinished {
                sequence_id,
                kind,
                scan,
            } => self.apply_scan(sequence_id, kind, scan),
            UiMessage::PopupInput { sequence_id, input } => {
                self.apply_popup_input(sequence_id, input)
            }
            UiMessage::AttentionShifted { sequence_id } => {
                if self.popup.is_showing(sequence_id) {
                    debug!(sequence_id, "attention moved away from popup");
                    self.popup.dismiss(&mut self.surface);
                }
            }
            UiMessage::OpenRegionOverlay => self.open_region_overlay(),
            UiMessage::RegionSelected(rect) => self.region_selected(rect),
            UiMessage::RegionCancelled => {
                debug!("region selection cancelled");
                self.close_region_overlay();
            }
            UiMessage::SetMonitoring(enabled) => {
                self.run_state.set_monitoring(enabled);
                self.publish_status();
            }
            UiMessage::SettingsChanged(settings) => {
                info!(corpus = %settings.corpus_path.display(), "lookup settings updated");
                self.settings = settings;
                self.publish_status();
            }
            UiMessage::Fatal(err) => self.fail(err),
            UiMessage::CloseRequested => {
                self.run_state.stop(ShutdownReason::CloseRequested);
            }
        }
    }

    fn apply_scan(&mut self, sequence_id: u64, kind: TriggerKind, scan: Scan) {
        if sequence_id != self.latest_accepted {
            debug!(
                sequence_id,
                latest = self.latest_accepted,
                "discarding superseded scan result"
            );
            return;
        }
        if !self.run_state.is_running() {
            return;
        }

        let result = match scan {
            Scan::Results(result) => result,
            Scan::CorpusMissing { result, error } => {
                error!(notice = result.texts().join("\n").as_str(), "corpus unavailable");
                self.fail(AppError::from(error));
                return;
            }
        };

        let matched_lines: Vec<usize> = result
            .entries()
            .iter()
            .filter_map(|entry| match entry {
                Entry::Match(snippet) => Some(snippet.source_line_index + 1),
                Entry::Notice(_) => None,
            })
            .collect();
        debug!(sequence_id, ?matched_lines, "scan result accepted");

        // A region preview is only replaced by real matches. If the user already
        // closed it, it stays closed.
        if kind == TriggerKind::RegionCapture
            && !result.has_matches()
            && self.previewed == Some(sequence_id)
        {
            debug!(
                sequence_id,
                preview_open = self.popup.is_showing(sequence_id),
                "no matches for OCR text; leaving preview as is"
            );
            return;
        }

        self.show(result, sequence_id, kind);
    }

    fn apply_popup_input(&mut self, sequence_id: u64, input: PopupInput) {
        if !self.popup.is_showing(sequence_id) {
            debug!(sequence_id, "ignoring input for a popup that is no longer shown");
            return;
        }
        let Some(command) = input.command() else {
            return;
        };
        if let Err(err) = self.popup.apply(&mut self.surface, command) {
            warn!(?command, "popup command failed: {err}");
        }
    }

    fn open_region_overlay(&mut self) {
        if !self.run_state.accepts_triggers() {
            debug!("monitoring paused; not opening region overlay");
            return;
        }
        if self.region_tx.is_none() {
            warn!("region capture is unavailable; ignoring hotkey");
            return;
        }

        match self.surface.open_region_overlay() {
            Ok(()) => self.overlay_open = true,
            Err(err) => warn!("failed to open region overlay: {err}"),
        }
    }

    fn region_selected(&mut self, rect: Rect) {
        self.close_region_overlay();
        if !self.run_state.accepts_triggers() {
            return;
        }

        let Some(region_tx) = &self.region_tx else {
            return;
        };
        debug!(?rect, "region selected");
        if region_tx.send(rect).is_err() {
            warn!("region capture worker is gone; disabling region capture");
            self.region_tx = None;
        }
    }

    fn close_region_overlay(&mut self) {
        if self.overlay_open {
            self.surface.close_region_overlay();
            self.overlay_open = false;
        }
    }

    fn show(&mut self, result: SearchResult, sequence_id: u64, kind: TriggerKind) {
        if let Err(err) = self
            .popup
            .show_results(&mut self.surface, result, sequence_id, kind)
        {
            error!(sequence_id, "failed to show popup: {err}");
        }
    }

    fn fail(&mut self, err: AppError) {
        if !err.is_fatal() {
            warn!("recoverable error reported to ui context: {err}");
            return;
        }

        error!("fatal error: {err}");
        let reason = match err {
            AppError::Configuration(_) => ShutdownReason::CorpusMissing,
            AppError::Permission(_) => ShutdownReason::PermissionDenied,
            _ => ShutdownReason::UnhandledPanic,
        };
        self.run_state.stop(reason);
        self.popup.dismiss(&mut self.surface);
    }

    fn publish_status(&mut self) {
        let status = StatusSnapshot {
            running: self.run_state.is_running(),
            monitoring: self.run_state.is_monitoring(),
            popup_open: self.popup.is_open(),
            corpus_path: self.settings.corpus_path.display().to_string(),
        };
        self.surface.publish_status(&status);
    }

    pub fn supervise(&mut self, supervisor: &Supervisor) -> Verdict {
        supervisor.check(&self.run_state, self.surface.root_alive())
    }

    /// Tears down everything the context owns and stops the toolkit loop.
    pub fn shutdown(&mut self) {
        self.run_state.stop(ShutdownReason::CloseRequested);
        // Dropping the sender lets the region worker fall out of its receive loop.
        self.region_tx = None;
        self.popup.dismiss(&mut self.surface);
        self.close_region_overlay();
        self.publish_status();
        info!("ui context shutting down");
        self.surface.exit();
    }

    pub async fn run(mut self, mut inbox: Inbox) {
        let supervisor = Supervisor::default();
        let mut ticker = time::interval(supervisor.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        self.publish_status();

        while self.run_state.is_running() {
            tokio::select! {
                inbound = inbox.recv() => match inbound {
                    Some(inbound) => self.handle(inbound),
                    None => break,
                },
                _ = ticker.tick() => {
                    if self.supervise(&supervisor) == Verdict::Shutdown {
                        break;
                    }
                }
            }
        }

        inbox.close();
        self.shutdown();
    }
}

/// Runs the context on its own thread. `on_abort` is called if the context panics.
pub fn spawn_ui_context<S, F>(
    context: AppContext<S>,
    inbox: Inbox,
    on_abort: F,
) -> io::Result<JoinHandle<()>>
where
    S: Surface + Send + 'static,
    S::Bindings: Send,
    F: FnOnce() + Send + 'static,
{
    let run_state = Arc::clone(&context.run_state);
    thread::Builder::new()
        .name("ui-context".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!("failed to create ui context runtime: {err}");
                    run_state.stop(ShutdownReason::UnhandledPanic);
                    on_abort();
                    return;
                }
            };

            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| runtime.block_on(context.run(inbox))));
            if outcome.is_err() {
                error!("ui context panicked; exiting");
                run_state.stop(ShutdownReason::UnhandledPanic);
                on_abort();
            }
        })
}

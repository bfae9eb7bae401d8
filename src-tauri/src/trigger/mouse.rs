use std::io;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use rdev::{Event, EventType};
use tracing::{debug, error, info};

use crate::dispatcher::{DispatcherHandle, UiMessage};
use crate::error::AppError;
use crate::lifecycle::RunState;
use crate::surface::{AttentionWatch, FocusTracker};

/// Forwards raw global mouse events. Runs on the listener thread, so it never blocks.
pub struct MouseRouter {
    releases: Option<Sender<()>>,
    attention: AttentionWatch,
    focus: FocusTracker,
    dispatcher: DispatcherHandle,
    run_state: Arc<RunState>,
}

impl MouseRouter {
    /// `releases` is `None` when the clipboard trigger is disabled.
    pub fn new(
        releases: Option<Sender<()>>,
        attention: AttentionWatch,
        focus: FocusTracker,
        dispatcher: DispatcherHandle,
        run_state: Arc<RunState>,
    ) -> Self {
        Self {
            releases,
            attention,
            focus,
            dispatcher,
            run_state,
        }
    }

    pub fn route(&mut self, event: &EventType) {
        match event {
            EventType::ButtonRelease(_) => self.forward_release(),
            EventType::Wheel { .. } => {
                if let Some(sequence_id) = self.attention.take() {
                    debug!(sequence_id, "scroll detected while popup open");
                    self.dispatcher
                        .send(UiMessage::AttentionShifted { sequence_id });
                }
            }
            _ => {}
        }
    }

    fn forward_release(&mut self) {
        if !self.run_state.accepts_triggers() || self.focus.own_window_focused() {
            return;
        }
        let Some(releases) = &self.releases else {
            return;
        };
        if releases.send(()).is_err() {
            debug!("clipboard worker gone; no longer forwarding releases");
            self.releases = None;
        }
    }
}

/// Starts the global mouse hook. The thread is never joined; it lives until process exit.
pub fn spawn_mouse_listener(mut router: MouseRouter) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("mouse-listener".into())
        .spawn(move || {
            let dispatcher = router.dispatcher.clone();
            info!("global mouse listener starting");
            if let Err(err) = rdev::listen(move |event: Event| router.route(&event.event_type)) {
                error!("global mouse listener failed: {err:?}");
                dispatcher.send(UiMessage::Fatal(AppError::Permission(format!(
                    "global mouse listener refused: {err:?}"
                ))));
            }
        })
}

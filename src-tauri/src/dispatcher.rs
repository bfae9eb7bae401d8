//! Hand-off from producer threads into the UI context.
//!
//! [`DispatcherHandle`] is the only thing background threads hold. It can be
//! cloned freely and only ever posts. The receiving [`Inbox`] lives on the UI
//! context and stamps every lookup cycle with a sequence id as it dequeues it,
//! so sequence order and handling order are the same thing.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::corpus::Scan;
use crate::error::AppError;
use crate::popup::PopupInput;
use crate::settings::LookupSettings;
use crate::trigger::region::Rect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerKind {
    ClipboardSelection,
    RegionCapture,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerEvent {
    pub kind: TriggerKind,
    pub text: String,
    pub sequence_id: u64,
}

/// A trigger whose collaborator failed; its message is shown like a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureEvent {
    pub kind: TriggerKind,
    pub message: String,
    pub sequence_id: u64,
}

#[derive(Debug)]
pub enum UiMessage {
    ScanFinished {
        sequence_id: u64,
        kind: TriggerKind,
        scan: Scan,
    },
    PopupInput {
        sequence_id: u64,
        input: PopupInput,
    },
    AttentionShifted {
        sequence_id: u64,
    },
    OpenRegionOverlay,
    RegionSelected(Rect),
    RegionCancelled,
    SetMonitoring(bool),
    SettingsChanged(LookupSettings),
    Fatal(AppError),
    CloseRequested,
}

#[derive(Debug)]
enum Envelope {
    Trigger { kind: TriggerKind, text: String },
    Failure { kind: TriggerKind, message: String },
    Message(UiMessage),
}

#[derive(Debug)]
pub enum Inbound {
    Trigger(TriggerEvent),
    Failure(FailureEvent),
    Message(UiMessage),
}

#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl DispatcherHandle {
    /// Posts trigger text from any thread. Returns false once the UI context is gone.
    pub fn post(&self, kind: TriggerKind, text: String) -> bool {
        self.deliver(Envelope::Trigger { kind, text })
    }

    pub fn post_failure(&self, kind: TriggerKind, message: String) -> bool {
        self.deliver(Envelope::Failure { kind, message })
    }

    pub fn send(&self, message: UiMessage) -> bool {
        self.deliver(Envelope::Message(message))
    }

    fn deliver(&self, envelope: Envelope) -> bool {
        match self.tx.send(envelope) {
            Ok(()) => true,
            Err(err) => {
                debug!("ui context closed; dropping {:?}", err.0);
                false
            }
        }
    }
}

pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Envelope>,
    next_sequence: u64,
}

impl Inbox {
    pub async fn recv(&mut self) -> Option<Inbound> {
        let envelope = self.rx.recv().await?;
        Some(self.stamp(envelope))
    }

    pub fn try_recv(&mut self) -> Option<Inbound> {
        let envelope = self.rx.try_recv().ok()?;
        Some(self.stamp(envelope))
    }

    /// Stops accepting new posts; already queued envelopes can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }

    fn stamp(&mut self, envelope: Envelope) -> Inbound {
        match envelope {
            Envelope::Trigger { kind, text } => Inbound::Trigger(TriggerEvent {
                kind,
                text,
                sequence_id: self.issue_sequence(),
            }),
            Envelope::Failure { kind, message } => Inbound::Failure(FailureEvent {
                kind,
                message,
                sequence_id: self.issue_sequence(),
            }),
            Envelope::Message(message) => Inbound::Message(message),
        }
    }

    fn issue_sequence(&mut self) -> u64 {
        self.next_sequence += 1;
        self.next_sequence
    }
}

pub fn channel() -> (DispatcherHandle, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        DispatcherHandle { tx },
        Inbox {
            rx,
            next_sequence: 0,
        },
    )
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn expect_trigger(inbound: Option<Inbound>) -> TriggerEvent {
        match inbound {
            Some(Inbound::Trigger(event)) => event,
            other => panic!("expected trigger, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn triggers_are_stamped_in_post_order() {
        let (handle, mut inbox) = channel();
        assert!(handle.post(TriggerKind::ClipboardSelection, "first".into()));
        assert!(handle.post(TriggerKind::RegionCapture, "second".into()));

        let first = expect_trigger(inbox.recv().await);
        let second = expect_trigger(inbox.recv().await);
        assert_eq!(first.text, "first");
        assert_eq!(second.text, "second");
        assert!(second.sequence_id > first.sequence_id);
    }

    #[tokio::test]
    async fn failures_share_the_sequence_counter() {
        let (handle, mut inbox) = channel();
        handle.post(TriggerKind::RegionCapture, "text".into());
        handle.post_failure(TriggerKind::RegionCapture, "tesseract missing".into());
        handle.send(UiMessage::RegionCancelled);

        let trigger = expect_trigger(inbox.recv().await);
        let Some(Inbound::Failure(failure)) = inbox.recv().await else {
            panic!("expected failure");
        };
        assert_eq!(failure.sequence_id, trigger.sequence_id + 1);
        assert!(matches!(
            inbox.recv().await,
            Some(Inbound::Message(UiMessage::RegionCancelled))
        ));
    }

    #[tokio::test]
    async fn posts_from_many_threads_are_each_delivered_once() {
        let (handle, mut inbox) = channel();
        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let handle = handle.clone();
                thread::spawn(move || {
                    for n in 0..25 {
                        handle.post(TriggerKind::ClipboardSelection, format!("{worker}-{n}"));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("producer thread");
        }
        drop(handle);

        let mut seen = Vec::new();
        let mut last_sequence = 0;
        while let Some(inbound) = inbox.recv().await {
            let event = expect_trigger(Some(inbound));
            assert!(event.sequence_id > last_sequence);
            last_sequence = event.sequence_id;
            seen.push(event.text);
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 100);
    }

    #[test]
    fn post_reports_closed_inbox() {
        let (handle, inbox) = channel();
        drop(inbox);
        assert!(!handle.post(TriggerKind::ClipboardSelection, "late".into()));
    }
}

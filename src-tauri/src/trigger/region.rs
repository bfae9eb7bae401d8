use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use image::RgbaImage;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::dispatcher::{DispatcherHandle, TriggerKind};
use crate::error::{AppError, ExtractionError};
use crate::lifecycle::RunState;
use crate::trigger::LastAccepted;
use crate::utils::preview_text;

pub const DEFAULT_REGION_SETTLE_MS: u64 = 200;

/// A screen position in physical pixels, as reported by the overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

/// A normalized capture rectangle in physical screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Builds a rectangle from two drag corners in any order. Zero-area drags yield `None`.
    pub fn from_corners(start: Point, end: Point) -> Option<Self> {
        let left = start.x.min(end.x);
        let top = start.y.min(end.y);
        let width = start.x.abs_diff(end.x);
        let height = start.y.abs_diff(end.y);
        if width == 0 || height == 0 {
            return None;
        }

        Some(Self {
            left,
            top,
            width,
            height,
        })
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        let right = i64::from(self.left) + i64::from(self.width);
        let bottom = i64::from(self.top) + i64::from(self.height);
        x >= self.left && i64::from(x) < right && y >= self.top && i64::from(y) < bottom
    }
}

pub trait ScreenCapture {
    fn capture(&self, rect: Rect) -> Result<RgbaImage, ExtractionError>;
}

pub trait TextExtractor {
    fn extract(&self, image: &RgbaImage) -> Result<String, ExtractionError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegionOutcome {
    Text(String),
    Unchanged,
    Failed(ExtractionError),
}

/// Capture, OCR and dedup for one selected rectangle.
pub struct RegionCaptureTrigger<C, O> {
    capture: C,
    ocr: O,
    settle: Duration,
    last: LastAccepted,
}

impl<C: ScreenCapture, O: TextExtractor> RegionCaptureTrigger<C, O> {
    pub fn new(capture: C, ocr: O, settle: Duration) -> Self {
        Self {
            capture,
            ocr,
            settle,
            last: LastAccepted::default(),
        }
    }

    pub fn process(&mut self, rect: Rect) -> RegionOutcome {
        // The overlay needs a moment to leave the screen before the grab.
        thread::sleep(self.settle);

        let image = match self.capture.capture(rect) {
            Ok(image) => image,
            Err(err) => return RegionOutcome::Failed(err),
        };
        let text = match self.ocr.extract(&image) {
            Ok(text) => text,
            Err(err) => return RegionOutcome::Failed(err),
        };

        match self.last.accept(&text) {
            Some(text) => {
                info!(text = preview_text(&text).as_str(), "region text extracted");
                RegionOutcome::Text(text)
            }
            None => {
                debug!("region text empty or unchanged; skipping");
                RegionOutcome::Unchanged
            }
        }
    }
}

pub fn spawn_region_worker<C, O>(
    trigger: RegionCaptureTrigger<C, O>,
    regions: Receiver<Rect>,
    dispatcher: DispatcherHandle,
    run_state: Arc<RunState>,
) -> io::Result<JoinHandle<()>>
where
    C: ScreenCapture + Send + 'static,
    O: TextExtractor + Send + 'static,
{
    thread::Builder::new()
        .name("region-capture".into())
        .spawn(move || run_region_worker(trigger, regions, dispatcher, run_state))
}

fn run_region_worker<C: ScreenCapture, O: TextExtractor>(
    mut trigger: RegionCaptureTrigger<C, O>,
    regions: Receiver<Rect>,
    dispatcher: DispatcherHandle,
    run_state: Arc<RunState>,
) {
    while let Ok(rect) = regions.recv() {
        if !run_state.is_running() {
            break;
        }
        if !run_state.is_monitoring() {
            debug!("monitoring paused; dropping region selection");
            continue;
        }

        let outcome = match panic::catch_unwind(AssertUnwindSafe(|| trigger.process(rect))) {
            Ok(outcome) => outcome,
            Err(_) => {
                error!("region capture panicked; waiting for the next selection");
                continue;
            }
        };
        if !run_state.accepts_triggers() {
            continue;
        }

        let delivered = match outcome {
            RegionOutcome::Text(text) => dispatcher.post(TriggerKind::RegionCapture, text),
            RegionOutcome::Unchanged => true,
            RegionOutcome::Failed(err) => {
                warn!("{}", AppError::from(err.clone()));
                dispatcher.post_failure(TriggerKind::RegionCapture, err.to_string())
            }
        };
        if !delivered {
            break;
        }
    }

    info!("region capture worker stopped");
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::sync::mpsc;

    use super::*;
    use crate::dispatcher::{self, Inbound};

    struct BlankCapture;

    impl ScreenCapture for BlankCapture {
        fn capture(&self, rect: Rect) -> Result<RgbaImage, ExtractionError> {
            Ok(RgbaImage::new(rect.width, rect.height))
        }
    }

    struct FailingCapture;

    impl ScreenCapture for FailingCapture {
        fn capture(&self, _rect: Rect) -> Result<RgbaImage, ExtractionError> {
            Err(ExtractionError::Capture("display unavailable".into()))
        }
    }

    struct ScriptedOcr {
        texts: RefCell<VecDeque<Result<String, ExtractionError>>>,
    }

    impl ScriptedOcr {
        fn new(texts: Vec<Result<String, ExtractionError>>) -> Self {
            Self {
                texts: RefCell::new(texts.into()),
            }
        }
    }

    impl TextExtractor for ScriptedOcr {
        fn extract(&self, _image: &RgbaImage) -> Result<String, ExtractionError> {
            self.texts
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    fn rect() -> Rect {
        Rect::from_corners(Point { x: 0, y: 0 }, Point { x: 40, y: 20 }).expect("rect")
    }

    #[test]
    fn corners_are_normalized_for_any_drag_direction() {
        let expected = Rect {
            left: 10,
            top: 20,
            width: 90,
            height: 60,
        };
        let top_left = Point { x: 10, y: 20 };
        let bottom_right = Point { x: 100, y: 80 };
        assert_eq!(Rect::from_corners(top_left, bottom_right), Some(expected));
        assert_eq!(Rect::from_corners(bottom_right, top_left), Some(expected));
        assert_eq!(
            Rect::from_corners(Point { x: 100, y: 20 }, Point { x: 10, y: 80 }),
            Some(expected)
        );
    }

    #[test]
    fn zero_area_selection_is_rejected() {
        let point = Point { x: 5, y: 5 };
        assert_eq!(Rect::from_corners(point, point), None);
        assert_eq!(Rect::from_corners(point, Point { x: 50, y: 5 }), None);
    }

    #[test]
    fn contains_excludes_the_far_edges() {
        let rect = rect();
        assert!(rect.contains(0, 0));
        assert!(rect.contains(39, 19));
        assert!(!rect.contains(40, 10));
        assert!(!rect.contains(-1, 10));
    }

    #[test]
    fn ocr_text_is_trimmed_and_deduplicated() {
        let ocr = ScriptedOcr::new(vec![
            Ok("  apple pie \n".into()),
            Ok("apple pie".into()),
            Ok("   ".into()),
        ]);
        let mut trigger = RegionCaptureTrigger::new(BlankCapture, ocr, Duration::ZERO);

        assert_eq!(trigger.process(rect()), RegionOutcome::Text("apple pie".into()));
        assert_eq!(trigger.process(rect()), RegionOutcome::Unchanged);
        assert_eq!(trigger.process(rect()), RegionOutcome::Unchanged);
    }

    #[test]
    fn collaborator_failures_are_reported() {
        let ocr = ScriptedOcr::new(vec![]);
        let mut trigger = RegionCaptureTrigger::new(FailingCapture, ocr, Duration::ZERO);
        assert_eq!(
            trigger.process(rect()),
            RegionOutcome::Failed(ExtractionError::Capture("display unavailable".into()))
        );
    }

    #[tokio::test]
    async fn worker_posts_text_and_failures() {
        let ocr = ScriptedOcr::new(vec![
            Ok("banana split".into()),
            Err(ExtractionError::Ocr("tesseract exited with 1".into())),
        ]);
        let trigger = RegionCaptureTrigger::new(BlankCapture, ocr, Duration::ZERO);
        let (handle, mut inbox) = dispatcher::channel();
        let (region_tx, region_rx) = mpsc::channel();
        let worker = spawn_region_worker(trigger, region_rx, handle, RunState::new())
            .expect("spawn worker");

        region_tx.send(rect()).expect("send");
        region_tx.send(rect()).expect("send");
        drop(region_tx);

        let Some(Inbound::Trigger(event)) = inbox.recv().await else {
            panic!("expected trigger");
        };
        assert_eq!(event.kind, TriggerKind::RegionCapture);
        assert_eq!(event.text, "banana split");

        let Some(Inbound::Failure(failure)) = inbox.recv().await else {
            panic!("expected failure");
        };
        assert_eq!(failure.message, "tesseract exited with 1");
        worker.join().expect("worker exits");
    }
}

use image::{RgbaImage, imageops};
use tracing::debug;
use xcap::Monitor;

use crate::error::ExtractionError;
use crate::trigger::region::{Rect, ScreenCapture};

/// Captures a rectangle from whichever monitor contains its top-left corner.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonitorCapture;

struct MonitorBounds {
    monitor: Monitor,
    area: Rect,
    primary: bool,
}

impl MonitorCapture {
    fn monitors() -> Result<Vec<MonitorBounds>, ExtractionError> {
        let monitors = Monitor::all().map_err(capture_error)?;
        monitors
            .into_iter()
            .map(|monitor| {
                let area = pixel_bounds(&monitor)?;
                let primary = monitor.is_primary().unwrap_or(false);
                Ok(MonitorBounds {
                    monitor,
                    area,
                    primary,
                })
            })
            .collect()
    }
}

impl ScreenCapture for MonitorCapture {
    fn capture(&self, rect: Rect) -> Result<RgbaImage, ExtractionError> {
        let monitors = Self::monitors()?;
        let target = monitors
            .iter()
            .find(|bounds| bounds.area.contains(rect.left, rect.top))
            .or_else(|| monitors.iter().find(|bounds| bounds.primary))
            .or_else(|| monitors.first())
            .ok_or_else(|| ExtractionError::Capture("no monitor found".into()))?;

        let screen = target.monitor.capture_image().map_err(capture_error)?;
        let region = crop_region(rect, target.area, screen.width(), screen.height())
            .ok_or(ExtractionError::EmptyRegion)?;
        debug!(?region, "cropping captured monitor image");

        Ok(imageops::crop_imm(
            &screen,
            region.left as u32,
            region.top as u32,
            region.width,
            region.height,
        )
        .to_image())
    }
}

/// Monitor bounds in physical pixels. macOS reports points, so scale them up there.
fn pixel_bounds(monitor: &Monitor) -> Result<Rect, ExtractionError> {
    let x = monitor.x().map_err(capture_error)?;
    let y = monitor.y().map_err(capture_error)?;
    let width = monitor.width().map_err(capture_error)?;
    let height = monitor.height().map_err(capture_error)?;

    let scale = if cfg!(target_os = "macos") {
        f64::from(monitor.scale_factor().map_err(capture_error)?)
    } else {
        1.0
    };

    Ok(Rect {
        left: (f64::from(x) * scale).round() as i32,
        top: (f64::from(y) * scale).round() as i32,
        width: (f64::from(width) * scale).round() as u32,
        height: (f64::from(height) * scale).round() as u32,
    })
}

/// Translates `rect` into image coordinates of a monitor occupying `area`,
/// clamped to the captured image. Returns `None` when nothing overlaps.
fn crop_region(rect: Rect, area: Rect, image_width: u32, image_height: u32) -> Option<Rect> {
    let left = i64::from(rect.left) - i64::from(area.left);
    let top = i64::from(rect.top) - i64::from(area.top);
    let right = left + i64::from(rect.width);
    let bottom = top + i64::from(rect.height);

    let left = left.clamp(0, i64::from(image_width));
    let top = top.clamp(0, i64::from(image_height));
    let right = right.clamp(0, i64::from(image_width));
    let bottom = bottom.clamp(0, i64::from(image_height));
    if right <= left || bottom <= top {
        return None;
    }

    Some(Rect {
        left: left as i32,
        top: top as i32,
        width: (right - left) as u32,
        height: (bottom - top) as u32,
    })
}

fn capture_error(err: impl std::fmt::Display) -> ExtractionError {
    ExtractionError::Capture(err.to_string())
}

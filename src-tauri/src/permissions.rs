use serde::Serialize;
use tracing::{info, warn};

use crate::input::copier::CopyKeystroke;
use crate::ocr::TesseractOcr;

pub const ACCESSIBILITY_GUIDANCE: &str = "Input monitoring/accessibility appears blocked. Grant \
accessibility permission to Corpus Lens in your system settings, then start it again.";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionReport {
    pub accessibility: PermissionState,
    pub ocr: PermissionState,
    pub ocr_version: Option<String>,
    pub guidance: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    Unknown,
}

/// True when global input listeners and synthetic key presses are permitted.
pub fn check() -> bool {
    listeners_allowed(check_accessibility_permission())
}

/// True when the configured tesseract executable answers `--version`.
pub fn ocr_available(tesseract_command: &str) -> bool {
    check_ocr(tesseract_command).0 == PermissionState::Granted
}

/// Global listeners may only be installed when this holds.
fn listeners_allowed(accessibility: PermissionState) -> bool {
    accessibility != PermissionState::Denied
}

pub fn check_permissions(tesseract_command: &str) -> PermissionReport {
    let accessibility = check_accessibility_permission();
    let (ocr, ocr_version) = check_ocr(tesseract_command);
    build_report(accessibility, ocr, ocr_version, tesseract_command)
}

fn build_report(
    accessibility: PermissionState,
    ocr: PermissionState,
    ocr_version: Option<String>,
    tesseract_command: &str,
) -> PermissionReport {
    let mut guidance = Vec::new();
    if accessibility == PermissionState::Denied {
        guidance.push(ACCESSIBILITY_GUIDANCE.to_string());
    }
    if ocr == PermissionState::Denied {
        guidance.push(format!(
            "`{tesseract_command}` could not be run, so region capture is disabled. Install \
Tesseract OCR (macOS: brew install tesseract, Linux: apt-get install tesseract-ocr) or set \
tesseractCommand in the settings."
        ));
    }
    if guidance.is_empty() {
        guidance.push("Permissions look healthy.".to_string());
    }

    PermissionReport {
        accessibility,
        ocr,
        ocr_version,
        guidance,
    }
}

fn check_ocr(tesseract_command: &str) -> (PermissionState, Option<String>) {
    match TesseractOcr::new(tesseract_command, "eng").version() {
        Ok(version) => {
            info!(version = version.as_str(), "tesseract available");
            (PermissionState::Granted, Some(version))
        }
        Err(err) => {
            warn!("tesseract unavailable: {err:#}");
            (PermissionState::Denied, None)
        }
    }
}

fn check_accessibility_permission() -> PermissionState {
    #[cfg(desktop)]
    {
        match CopyKeystroke::new() {
            Ok(_) => PermissionState::Granted,
            Err(err) => {
                let message = err.to_string().to_lowercase();
                if message.contains("unsupported") || message.contains("not implemented") {
                    PermissionState::Unknown
                } else {
                    PermissionState::Denied
                }
            }
        }
    }

    #[cfg(not(desktop))]
    {
        PermissionState::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn healthy_report_allows_everything() {
        let report = build_report(
            PermissionState::Granted,
            PermissionState::Granted,
            Some("tesseract 5.3.0".into()),
            "tesseract",
        );
        assert!(listeners_allowed(report.accessibility));
        assert_eq!(report.ocr, PermissionState::Granted);
        assert_eq!(report.guidance, vec!["Permissions look healthy.".to_string()]);
    }

    #[test]
    fn missing_ocr_only_disables_region_capture() {
        let report = build_report(
            PermissionState::Unknown,
            PermissionState::Denied,
            None,
            "tesseract",
        );
        assert!(listeners_allowed(report.accessibility));
        assert_eq!(report.ocr, PermissionState::Denied);
        assert_eq!(report.guidance.len(), 1);
        assert!(report.guidance[0].contains("region capture is disabled"));
    }

    #[test]
    fn denied_accessibility_blocks_listeners() {
        let report = build_report(
            PermissionState::Denied,
            PermissionState::Granted,
            None,
            "tesseract",
        );
        assert!(!listeners_allowed(report.accessibility));
        assert_eq!(report.guidance, vec![ACCESSIBILITY_GUIDANCE.to_string()]);
    }

    #[test]
    fn missing_tesseract_is_reported_as_denied() {
        let (state, version) = check_ocr("definitely-not-tesseract");
        assert_eq!(state, PermissionState::Denied);
        assert_eq!(version, None);
        assert!(!ocr_available("definitely-not-tesseract"));
    }

    #[test]
    fn startup_gate_agrees_with_the_reported_state() {
        let report = check_permissions("definitely-not-tesseract");
        assert_eq!(check(), listeners_allowed(report.accessibility));
    }
}

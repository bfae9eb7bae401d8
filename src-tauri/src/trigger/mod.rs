//! Producers of raw query text. Each runs on its own thread and talks to the
//! UI context only through the dispatcher.

pub mod clipboard;
pub mod mouse;
pub mod region;

/// Literal-equality dedup against the most recently accepted text.
#[derive(Debug, Default)]
pub struct LastAccepted {
    text: Option<String>,
}

impl LastAccepted {
    /// Trims `raw` and accepts it unless it is empty or equal to the previous acceptance.
    pub fn accept(&mut self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || self.text.as_deref() == Some(trimmed) {
            return None;
        }

        let accepted = trimmed.to_string();
        self.text = Some(accepted.clone());
        Some(accepted)
    }
}

pub mod copier;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to initialize input simulation: {0}")]
    Initialization(String),
    #[error("failed to simulate keyboard input: {0}")]
    Keyboard(String),
    #[error("clipboard operation failed: {0}")]
    Clipboard(String),
}

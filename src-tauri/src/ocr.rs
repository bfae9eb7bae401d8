use std::io::{self, Cursor, Write};
use std::process::{Command, Stdio};

use anyhow::{Context, bail};
use image::{ImageFormat, RgbaImage};
use tracing::{debug, info};

use crate::error::ExtractionError;
use crate::trigger::region::TextExtractor;

pub const DEFAULT_TESSERACT_COMMAND: &str = "tesseract";
pub const DEFAULT_OCR_LANGUAGE: &str = "eng";

/// Runs the `tesseract` executable on a PNG piped through stdin.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    command: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }

    /// First line of `tesseract --version`, or an error when the program is unusable.
    pub fn version(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.command)
            .arg("--version")
            .output()
            .with_context(|| format!("failed to run `{}`", self.command))?;
        if !output.status.success() {
            bail!("`{} --version` exited with {}", self.command, output.status);
        }

        // Older releases print the banner on stderr.
        let banner = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&banner)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }

    fn run(&self, image: &RgbaImage) -> anyhow::Result<String> {
        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageFormat::Png)
            .context("failed to encode capture as PNG")?;

        let mut child = Command::new(&self.command)
            .args(["stdin", "stdout", "-l", &self.language])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to start `{}`", self.command))?;

        // Stdin is closed before waiting so tesseract sees EOF; the child is reaped even
        // when the write fails.
        let sent = match child.stdin.take() {
            Some(mut stdin) => stdin.write_all(png.get_ref()),
            None => Err(io::Error::other("tesseract stdin unavailable")),
        };

        let output = child
            .wait_with_output()
            .context("failed to read tesseract output")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("tesseract exited with {}: {}", output.status, stderr.trim());
        }
        sent.context("failed to send image to tesseract")?;

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl TextExtractor for TesseractOcr {
    fn extract(&self, image: &RgbaImage) -> Result<String, ExtractionError> {
        if image.width() == 0 || image.height() == 0 {
            return Err(ExtractionError::EmptyRegion);
        }

        debug!(
            width = image.width(),
            height = image.height(),
            language = self.language.as_str(),
            "starting OCR"
        );
        let text = self
            .run(image)
            .map_err(|err| ExtractionError::Ocr(format!("{err:#}")))?;
        info!(chars = text.trim().chars().count(), "OCR completed");
        Ok(text)
    }
}

use super::{ExtractionError, OcrEngine};
use crate::config::Config;
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// OCR backed by the `tesseract` command line tool.
///
/// The decoded image is re-encoded as PNG, piped through `tesseract stdin stdout` and the
/// recognized text read back from stdout. The child is killed if the caller goes away.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: String,
    language: Option<String>,
    timeout: Duration,
}

impl TesseractOcr {
    /// Create an OCR engine invoking `binary`.
    pub fn new(binary: impl Into<String>, language: Option<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            language,
            timeout,
        }
    }

    /// Build the engine from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.tesseract_path.clone(),
            config.ocr_language.clone(),
            config.stage_timeout(),
        )
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.binary);
        command.arg("stdin").arg("stdout");
        if let Some(language) = &self.language {
            command.arg("-l").arg(language);
        }
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ExtractionError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|error| ExtractionError::Ocr(format!("failed to encode image: {error}")))?;
    Ok(buffer.into_inner())
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: DynamicImage) -> Result<String, ExtractionError> {
        let png = tokio::task::spawn_blocking(move || encode_png(&image))
            .await
            .map_err(|error| ExtractionError::Task(error.to_string()))??;

        let mut child = self.command().spawn().map_err(|error| {
            ExtractionError::Ocr(format!("failed to start {}: {error}", self.binary))
        })?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ExtractionError::Ocr("tesseract stdin unavailable".into()))?;
        let writer = tokio::spawn(async move {
            stdin.write_all(&png).await?;
            stdin.shutdown().await
        });

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| ExtractionError::Ocr(format!("timed out after {:?}", self.timeout)))?
            .map_err(|error| ExtractionError::Ocr(error.to_string()))?;

        if let Ok(Err(error)) = writer.await {
            tracing::debug!(error = %error, "tesseract closed stdin early");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::Ocr(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        tracing::debug!(chars = text.chars().count(), "OCR finished");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    #[tokio::test]
    async fn missing_binary_is_an_engine_failure() {
        let engine = TesseractOcr::new(
            "/nonexistent/docpipe-tesseract",
            None,
            Duration::from_secs(5),
        );
        let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(2, 2, Rgb([0u8, 0, 0])));

        let error = engine.recognize(image).await.expect_err("spawn failure");

        assert!(matches!(error, ExtractionError::Ocr(message) if message.contains("failed to start")));
    }

    #[test]
    fn language_is_forwarded() {
        let engine = TesseractOcr::new("tesseract", Some("fra".into()), Duration::from_secs(1));
        let command = engine.command();
        let args: Vec<_> = command
            .as_std()
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, ["stdin", "stdout", "-l", "fra"]);
    }
}

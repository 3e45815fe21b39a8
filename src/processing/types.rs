//! Core data types and error definitions for the processing pipeline.

use crate::{
    completion::CompletionError,
    extraction::{ExtractionError, UploadedFile},
    speech::SpeechError,
};
use serde::Serialize;
use std::str::FromStr;
use thiserror::Error;

/// Errors emitted by the processing service.
///
/// Client-caused failures map to `400`, everything that went wrong on an external service maps
/// to a generic `500`; see [`ProcessingError::is_client_error`].
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Text extraction failed or the upload kind is not supported.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// Extraction succeeded but produced no readable text.
    #[error("Unable to extract readable text")]
    ExtractionFailed,
    /// A caller-supplied parameter was missing, malformed, or had no mapping.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
    /// The request body exceeded the configured upload limit.
    #[error("Upload exceeds the configured size limit")]
    UploadTooLarge,
    /// The completion provider failed.
    #[error(transparent)]
    Completion(#[from] CompletionError),
    /// A speech service failed.
    #[error(transparent)]
    Speech(#[from] SpeechError),
}

impl ProcessingError {
    /// Whether the failure was caused by the request rather than an upstream service.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::Extraction(inner) => inner.is_client_error(),
            Self::ExtractionFailed | Self::InvalidParameter(_) | Self::UploadTooLarge => true,
            Self::Completion(_) | Self::Speech(_) => false,
        }
    }
}

/// Sentence budget requested for a prose summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryLength {
    /// 2-4 sentences.
    Short,
    /// 6-9 sentences.
    Medium,
    /// 12-16 sentences.
    Long,
}

impl FromStr for SummaryLength {
    type Err = ProcessingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "short" => Ok(Self::Short),
            "medium" => Ok(Self::Medium),
            "long" => Ok(Self::Long),
            _ => Err(ProcessingError::InvalidParameter(format!(
                "unknown summary length '{value}' (expected short, medium or long)"
            ))),
        }
    }
}

/// Output shape requested for a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryMode {
    /// Prose constrained by a [`SummaryLength`].
    Normal,
    /// Bullet points; length is ignored.
    Bullet,
}

impl FromStr for SummaryMode {
    type Err = ProcessingError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "normal" => Ok(Self::Normal),
            "bullet" => Ok(Self::Bullet),
            _ => Err(ProcessingError::InvalidParameter(format!(
                "unknown summary mode '{value}' (expected normal or bullet)"
            ))),
        }
    }
}

/// Resolved summary instructions: a mode together with the length it actually uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryStyle {
    /// Prose summary of the given length.
    Sentences(SummaryLength),
    /// Bullet-point summary.
    Bullets,
}

impl SummaryStyle {
    /// Resolve raw `length` / `mode` parameters.
    ///
    /// The length is only parsed in normal mode, so a bullet request never fails on it.
    pub fn parse(length: &str, mode: &str) -> Result<Self, ProcessingError> {
        match mode.parse::<SummaryMode>()? {
            SummaryMode::Bullet => Ok(Self::Bullets),
            SummaryMode::Normal => Ok(Self::Sentences(length.parse()?)),
        }
    }
}

/// Text to translate between two opaque language tags.
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    /// Text to translate.
    pub text: String,
    /// Source language tag, passed through untouched.
    pub source_lang: String,
    /// Target language tag, passed through untouched.
    pub target_lang: String,
}

/// Parameters for one run of the file pipeline.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    /// Uploaded document.
    pub file: UploadedFile,
    /// Summary instructions.
    pub style: SummaryStyle,
    /// Translation target; `None` skips the translation stage.
    pub target_lang: Option<String>,
}

impl PipelineRequest {
    /// Build a request, treating a blank `target_lang` as "no translation".
    pub fn new(file: UploadedFile, style: SummaryStyle, target_lang: &str) -> Self {
        let target_lang = Some(target_lang.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Self {
            file,
            style,
            target_lang,
        }
    }
}

/// Aggregated output of the file pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineResult {
    /// Summary of the extracted text.
    pub summary: String,
    /// Translated summary, `null` when translation was not requested.
    pub translation: Option<String>,
    /// Language tag reported by the detector.
    pub detected_language: String,
}

/// Voice selection for speech synthesis.
#[derive(Debug, Clone)]
pub struct VoiceParams {
    /// Provider voice name, e.g. `en-US-Wavenet-D`.
    pub voice_name: String,
    /// BCP-47 language code, e.g. `en-US`.
    pub language_code: String,
}

/// Encoded audio returned by the speech bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpeechResult {
    /// Base64-encoded MP3 bytes.
    #[serde(rename = "audioContent")]
    pub audio_content: String,
    /// Full extracted text for file-driven synthesis.
    #[serde(rename = "extractedText", skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
}

/// Recognized speech returned by the speech-to-text bridge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transcript {
    /// Recognized text; empty when nothing was recognized.
    pub transcript: String,
    /// Confidence of the top alternative, when reported.
    pub confidence: Option<f32>,
    /// Language code the audio was recognized in.
    pub language: String,
}

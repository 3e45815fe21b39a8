//! Document processing: prompt building, the file pipeline, and the speech bridge.

pub mod prompts;
mod service;
pub mod types;

pub use service::{NlpService, ProcessingApi, SPEECH_CHAR_LIMIT};
pub use types::{
    PipelineRequest, PipelineResult, ProcessingError, SpeechResult, SummaryLength, SummaryMode,
    SummaryStyle, Transcript, TranslationRequest, VoiceParams,
};

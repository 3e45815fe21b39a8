//! Processing service coordinating extraction, completion-backed stages, and speech.

use crate::{
    completion::{CompletionClient, OpenRouterClient},
    config::Config,
    extraction::{LopdfTextSource, TesseractOcr, TextExtractor, UploadedFile},
    metrics::{MetricsSnapshot, Operation, PipelineMetrics},
    processing::{
        prompts::{detection_prompt, summary_prompt, translation_prompt},
        types::{
            PipelineRequest, PipelineResult, ProcessingError, SpeechResult, SummaryStyle,
            Transcript, TranslationRequest, VoiceParams,
        },
    },
    speech::{GoogleSpeechClient, SpeechRecognizer, SpeechSynthesizer, SynthesisRequest},
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Maximum number of characters sent to speech synthesis for file-driven requests.
pub const SPEECH_CHAR_LIMIT: usize = 5000;

/// Coordinates the document pipeline and the text/speech operations around it.
///
/// The service owns long-lived handles to every external collaborator so that the HTTP surface
/// and the CLI reuse the same components. Construct it once near process start and share it
/// through an `Arc`. Requests never share mutable state apart from the metrics counters.
pub struct NlpService {
    completion: Arc<dyn CompletionClient>,
    extractor: TextExtractor,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    recognizer: Arc<dyn SpeechRecognizer>,
    metrics: Arc<PipelineMetrics>,
}

/// Abstraction over the processing service used by external surfaces (HTTP, CLI).
#[async_trait]
pub trait ProcessingApi: Send + Sync {
    /// Translate text between two opaque language tags.
    async fn translate(&self, request: TranslationRequest) -> Result<String, ProcessingError>;

    /// Summarize text in the requested style.
    async fn summarize(&self, text: &str, style: SummaryStyle) -> Result<String, ProcessingError>;

    /// Detect the language of text, returning the tag reported by the model.
    async fn detect_language(&self, text: &str) -> Result<String, ProcessingError>;

    /// Run the full extract → detect → summarize → translate pipeline.
    async fn process_file(
        &self,
        request: PipelineRequest,
    ) -> Result<PipelineResult, ProcessingError>;

    /// Synthesize text directly.
    async fn text_to_speech(
        &self,
        text: String,
        voice: VoiceParams,
    ) -> Result<SpeechResult, ProcessingError>;

    /// Extract text from a file and synthesize its beginning.
    async fn file_to_speech(
        &self,
        file: UploadedFile,
        voice: VoiceParams,
    ) -> Result<SpeechResult, ProcessingError>;

    /// Transcribe an audio clip.
    async fn speech_to_text(
        &self,
        audio: Vec<u8>,
        language_code: String,
    ) -> Result<Transcript, ProcessingError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl NlpService {
    /// Assemble a service from explicit collaborators.
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        extractor: TextExtractor,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        recognizer: Arc<dyn SpeechRecognizer>,
    ) -> Self {
        Self {
            completion,
            extractor,
            synthesizer,
            recognizer,
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Build the production service: OpenRouter completions, lopdf, tesseract, Google speech.
    pub fn from_config(config: &Config) -> Result<Self, ProcessingError> {
        tracing::info!(model = %config.completion_model, "Initializing completion client");
        let completion = Arc::new(OpenRouterClient::from_config(config)?);
        let extractor = TextExtractor::new(
            Arc::new(LopdfTextSource::new()),
            Arc::new(TesseractOcr::from_config(config)),
        );
        let speech = Arc::new(GoogleSpeechClient::from_config(config)?);
        tracing::info!("Speech client initialized");
        Ok(Self::new(completion, extractor, speech.clone(), speech))
    }

    /// Translate text; language tags are passed through untouched.
    pub async fn translate(&self, request: TranslationRequest) -> Result<String, ProcessingError> {
        self.translate_stage(&request)
            .await
            .inspect_err(|_| self.metrics.record_failure())
    }

    /// Summarize text in the requested style.
    pub async fn summarize(
        &self,
        text: &str,
        style: SummaryStyle,
    ) -> Result<String, ProcessingError> {
        self.summarize_stage(text, style)
            .await
            .inspect_err(|_| self.metrics.record_failure())
    }

    /// Detect the language of text from its first characters.
    pub async fn detect_language(&self, text: &str) -> Result<String, ProcessingError> {
        self.detect_stage(text)
            .await
            .inspect_err(|_| self.metrics.record_failure())
    }

    /// Run the file pipeline, aborting on the first failing stage.
    pub async fn process_file(
        &self,
        request: PipelineRequest,
    ) -> Result<PipelineResult, ProcessingError> {
        let span = tracing::info_span!(
            "process_file",
            run_id = %Uuid::new_v4(),
            file_name = %request.file.file_name
        );
        self.run_pipeline(request)
            .instrument(span)
            .await
            .inspect_err(|error| {
                self.metrics.record_failure();
                tracing::warn!(error = %error, "File pipeline aborted");
            })
    }

    /// Synthesize `text` with the requested voice.
    pub async fn text_to_speech(
        &self,
        text: String,
        voice: VoiceParams,
    ) -> Result<SpeechResult, ProcessingError> {
        let audio_content = self
            .synthesize(text, voice)
            .await
            .inspect_err(|_| self.metrics.record_failure())?;
        Ok(SpeechResult {
            audio_content,
            extracted_text: None,
        })
    }

    /// Extract text from `file` and synthesize its first [`SPEECH_CHAR_LIMIT`] characters.
    ///
    /// The full extracted text is returned alongside the audio.
    pub async fn file_to_speech(
        &self,
        file: UploadedFile,
        voice: VoiceParams,
    ) -> Result<SpeechResult, ProcessingError> {
        let result: Result<SpeechResult, ProcessingError> = async {
            let extracted = self.extractor.extract(file).await?;
            if extracted.trim().is_empty() {
                return Err(ProcessingError::ExtractionFailed);
            }
            let spoken: String = extracted.chars().take(SPEECH_CHAR_LIMIT).collect();
            let audio_content = self.synthesize(spoken, voice).await?;
            Ok(SpeechResult {
                audio_content,
                extracted_text: Some(extracted),
            })
        }
        .await;
        result.inspect_err(|_| self.metrics.record_failure())
    }

    /// Transcribe `audio` spoken in `language_code`.
    pub async fn speech_to_text(
        &self,
        audio: Vec<u8>,
        language_code: String,
    ) -> Result<Transcript, ProcessingError> {
        let recognition = self
            .recognizer
            .recognize(audio, &language_code)
            .await
            .inspect_err(|_| self.metrics.record_failure())?;
        self.metrics.record(Operation::Transcription);
        tracing::info!(
            language = %language_code,
            chars = recognition.transcript.chars().count(),
            "Speech transcribed"
        );
        Ok(Transcript {
            transcript: recognition.transcript,
            confidence: recognition.confidence,
            language: language_code,
        })
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn run_pipeline(
        &self,
        request: PipelineRequest,
    ) -> Result<PipelineResult, ProcessingError> {
        let PipelineRequest {
            file,
            style,
            target_lang,
        } = request;

        tracing::debug!("Stage: extracting");
        let text = self.extractor.extract(file).await?;
        if text.trim().is_empty() {
            return Err(ProcessingError::ExtractionFailed);
        }

        tracing::debug!(chars = text.chars().count(), "Stage: detecting");
        let detected_language = self.detect_stage(&text).await?;

        tracing::debug!(language = %detected_language, ?style, "Stage: summarizing");
        let summary = self.summarize_stage(&text, style).await?;

        let translation = match target_lang {
            Some(target_lang) => {
                tracing::debug!(target = %target_lang, "Stage: translating");
                let request = TranslationRequest {
                    text: summary.clone(),
                    source_lang: detected_language.clone(),
                    target_lang,
                };
                Some(self.translate_stage(&request).await?)
            }
            None => {
                tracing::debug!("Stage: translation skipped");
                None
            }
        };

        self.metrics.record(Operation::FileProcessed);
        tracing::info!(
            language = %detected_language,
            translated = translation.is_some(),
            "File pipeline completed"
        );
        Ok(PipelineResult {
            summary,
            translation,
            detected_language,
        })
    }

    async fn detect_stage(&self, text: &str) -> Result<String, ProcessingError> {
        let language = self.completion.complete(&detection_prompt(text)).await?;
        self.metrics.record(Operation::Detection);
        Ok(language)
    }

    async fn summarize_stage(
        &self,
        text: &str,
        style: SummaryStyle,
    ) -> Result<String, ProcessingError> {
        let summary = self.completion.complete(&summary_prompt(text, style)).await?;
        self.metrics.record(Operation::Summary);
        Ok(summary)
    }

    async fn translate_stage(&self, request: &TranslationRequest) -> Result<String, ProcessingError> {
        let translation = self.completion.complete(&translation_prompt(request)).await?;
        self.metrics.record(Operation::Translation);
        Ok(translation)
    }

    async fn synthesize(&self, text: String, voice: VoiceParams) -> Result<String, ProcessingError> {
        let VoiceParams {
            voice_name,
            language_code,
        } = voice;
        let audio = self
            .synthesizer
            .synthesize(SynthesisRequest {
                text,
                voice_name,
                language_code,
            })
            .await?;
        self.metrics.record(Operation::Synthesis);
        Ok(STANDARD.encode(audio))
    }
}

#[async_trait]
impl ProcessingApi for NlpService {
    async fn translate(&self, request: TranslationRequest) -> Result<String, ProcessingError> {
        NlpService::translate(self, request).await
    }

    async fn summarize(&self, text: &str, style: SummaryStyle) -> Result<String, ProcessingError> {
        NlpService::summarize(self, text, style).await
    }

    async fn detect_language(&self, text: &str) -> Result<String, ProcessingError> {
        NlpService::detect_language(self, text).await
    }

    async fn process_file(
        &self,
        request: PipelineRequest,
    ) -> Result<PipelineResult, ProcessingError> {
        NlpService::process_file(self, request).await
    }

    async fn text_to_speech(
        &self,
        text: String,
        voice: VoiceParams,
    ) -> Result<SpeechResult, ProcessingError> {
        NlpService::text_to_speech(self, text, voice).await
    }

    async fn file_to_speech(
        &self,
        file: UploadedFile,
        voice: VoiceParams,
    ) -> Result<SpeechResult, ProcessingError> {
        NlpService::file_to_speech(self, file, voice).await
    }

    async fn speech_to_text(
        &self,
        audio: Vec<u8>,
        language_code: String,
    ) -> Result<Transcript, ProcessingError> {
        NlpService::speech_to_text(self, audio, language_code).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        NlpService::metrics_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionError;
    use crate::extraction::{ExtractionError, PdfTextSource, tests::FixedOcr};
    use crate::processing::types::SummaryLength;
    use crate::speech::{Recognition, SpeechError};
    use tokio::sync::Mutex;

    /// Answers by prompt prefix and records every prompt it sees.
    #[derive(Default)]
    struct ScriptedCompletion {
        prompts: Mutex<Vec<String>>,
        fail_prefix: Option<&'static str>,
    }

    impl ScriptedCompletion {
        fn failing_on(prefix: &'static str) -> Self {
            Self {
                prompts: Mutex::default(),
                fail_prefix: Some(prefix),
            }
        }

        async fn prompts(&self) -> Vec<String> {
            self.prompts.lock().await.clone()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedCompletion {
        async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
            self.prompts.lock().await.push(prompt.to_string());
            if self.fail_prefix.is_some_and(|prefix| prompt.starts_with(prefix)) {
                return Err(CompletionError::Upstream {
                    status: 503,
                    body: "provider overloaded".into(),
                });
            }
            let reply = if prompt.starts_with("Detect language") {
                "en"
            } else if prompt.starts_with("Summarize") {
                "A short summary."
            } else if prompt.starts_with("Translate") {
                "Un court résumé."
            } else {
                "?"
            };
            Ok(reply.to_string())
        }
    }

    struct OwnedPages(Vec<String>);

    impl PdfTextSource for OwnedPages {
        fn page_texts(&self, _bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
            Ok(self.0.clone())
        }
    }

    #[derive(Default)]
    struct RecordingSpeech {
        spoken: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for RecordingSpeech {
        async fn synthesize(&self, request: SynthesisRequest) -> Result<Vec<u8>, SpeechError> {
            self.spoken.lock().await.push(request.text);
            Ok(b"mp3-bytes".to_vec())
        }
    }

    #[async_trait]
    impl SpeechRecognizer for RecordingSpeech {
        async fn recognize(
            &self,
            _audio: Vec<u8>,
            _language_code: &str,
        ) -> Result<Recognition, SpeechError> {
            Ok(Recognition {
                transcript: "hello world".into(),
                confidence: Some(0.75),
            })
        }
    }

    struct Harness {
        service: NlpService,
        completion: Arc<ScriptedCompletion>,
        speech: Arc<RecordingSpeech>,
    }

    fn harness(pages: Vec<String>, completion: ScriptedCompletion) -> Harness {
        let completion = Arc::new(completion);
        let speech = Arc::new(RecordingSpeech::default());
        let extractor = TextExtractor::new(Arc::new(OwnedPages(pages)), Arc::new(FixedOcr("")));
        let service = NlpService::new(
            completion.clone(),
            extractor,
            speech.clone(),
            speech.clone(),
        );
        Harness {
            service,
            completion,
            speech,
        }
    }

    fn pdf_upload() -> UploadedFile {
        UploadedFile {
            file_name: "test.pdf".into(),
            content_type: Some("application/pdf".into()),
            bytes: b"%PDF-1.7".to_vec(),
        }
    }

    fn short_style() -> SummaryStyle {
        SummaryStyle::Sentences(SummaryLength::Short)
    }

    fn voice() -> VoiceParams {
        VoiceParams {
            voice_name: "en-US-Wavenet-D".into(),
            language_code: "en-US".into(),
        }
    }

    #[tokio::test]
    async fn pipeline_without_target_never_translates() {
        let h = harness(
            vec!["Hello world.".into(), "This is a test.".into()],
            ScriptedCompletion::default(),
        );

        let result = h
            .service
            .process_file(PipelineRequest::new(pdf_upload(), short_style(), ""))
            .await
            .expect("pipeline result");

        assert_eq!(result.detected_language, "en");
        assert_eq!(result.summary, "A short summary.");
        assert_eq!(result.translation, None);

        let prompts = h.completion.prompts().await;
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].starts_with("Detect language"));
        assert_eq!(
            prompts[1],
            "Summarize in 2-4 sentences.\nText:\nHello world. This is a test."
        );
    }

    #[tokio::test]
    async fn pipeline_translates_the_summary_once_after_summarizing() {
        let h = harness(
            vec!["Hello world. This is a test.".into()],
            ScriptedCompletion::default(),
        );

        let result = h
            .service
            .process_file(PipelineRequest::new(pdf_upload(), short_style(), "fr"))
            .await
            .expect("pipeline result");

        assert_eq!(
            result,
            PipelineResult {
                summary: "A short summary.".into(),
                translation: Some("Un court résumé.".into()),
                detected_language: "en".into(),
            }
        );

        let prompts = h.completion.prompts().await;
        assert_eq!(prompts.len(), 3);
        assert!(prompts[1].starts_with("Summarize"));
        assert_eq!(prompts[2], "Translate from en to fr:\nA short summary.");
        assert_eq!(h.service.metrics_snapshot().files_processed, 1);
    }

    #[tokio::test]
    async fn blank_extraction_aborts_before_any_completion() {
        let h = harness(vec!["  ".into(), "\n\t".into()], ScriptedCompletion::default());

        let error = h
            .service
            .process_file(PipelineRequest::new(pdf_upload(), short_style(), "fr"))
            .await
            .expect_err("empty text");

        assert!(matches!(error, ProcessingError::ExtractionFailed));
        assert!(error.is_client_error());
        assert!(h.completion.prompts().await.is_empty());
        assert_eq!(h.service.metrics_snapshot().failures, 1);
    }

    #[tokio::test]
    async fn unsupported_upload_aborts_before_any_completion() {
        let h = harness(vec!["unused".into()], ScriptedCompletion::default());
        let file = UploadedFile {
            file_name: "notes.docx".into(),
            content_type: Some("application/octet-stream".into()),
            bytes: b"PK".to_vec(),
        };

        let error = h
            .service
            .process_file(PipelineRequest::new(file, short_style(), ""))
            .await
            .expect_err("unsupported");

        assert!(matches!(
            error,
            ProcessingError::Extraction(ExtractionError::UnsupportedFileType)
        ));
        assert!(h.completion.prompts().await.is_empty());
    }

    #[tokio::test]
    async fn detector_failure_aborts_the_pipeline() {
        let h = harness(
            vec!["Some text".into()],
            ScriptedCompletion::failing_on("Detect"),
        );

        let error = h
            .service
            .process_file(PipelineRequest::new(pdf_upload(), short_style(), "fr"))
            .await
            .expect_err("detector down");

        assert!(matches!(error, ProcessingError::Completion(_)));
        assert!(!error.is_client_error());
        assert_eq!(error.to_string(), "provider overloaded");
        assert_eq!(h.completion.prompts().await.len(), 1);
    }

    #[tokio::test]
    async fn summarizer_failure_skips_translation() {
        let h = harness(
            vec!["Some text".into()],
            ScriptedCompletion::failing_on("Summarize"),
        );

        let error = h
            .service
            .process_file(PipelineRequest::new(pdf_upload(), short_style(), "fr"))
            .await
            .expect_err("summarizer down");

        assert!(matches!(error, ProcessingError::Completion(_)));
        let prompts = h.completion.prompts().await;
        assert_eq!(prompts.len(), 2);
        assert!(prompts.iter().all(|prompt| !prompt.starts_with("Translate")));
    }

    #[tokio::test]
    async fn detection_sees_a_prefix_but_summary_sees_everything() {
        let long_text = "word ".repeat(200);
        let h = harness(vec![long_text.clone()], ScriptedCompletion::default());

        h.service
            .process_file(PipelineRequest::new(pdf_upload(), SummaryStyle::Bullets, ""))
            .await
            .expect("pipeline result");

        let prompts = h.completion.prompts().await;
        assert!(prompts[0].len() < long_text.len());
        assert!(prompts[1].ends_with(&long_text));
        assert!(prompts[1].starts_with("Summarize into bullet points:\n"));
    }

    #[tokio::test]
    async fn bullet_summaries_ignore_length() {
        let h = harness(vec![], ScriptedCompletion::default());
        let short = SummaryStyle::parse("short", "bullet").expect("style");
        let long = SummaryStyle::parse("long", "bullet").expect("style");

        h.service.summarize("Body text", short).await.expect("summary");
        h.service.summarize("Body text", long).await.expect("summary");

        let prompts = h.completion.prompts().await;
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], prompts[1]);
    }

    #[tokio::test]
    async fn file_to_speech_caps_synthesized_text_only() {
        let text = "a".repeat(SPEECH_CHAR_LIMIT + 1000);
        let h = harness(vec![text.clone()], ScriptedCompletion::default());

        let result = h
            .service
            .file_to_speech(pdf_upload(), voice())
            .await
            .expect("speech");

        assert_eq!(result.extracted_text.as_deref(), Some(text.as_str()));
        assert_eq!(result.audio_content, STANDARD.encode(b"mp3-bytes"));
        let spoken = h.speech.spoken.lock().await.clone();
        assert_eq!(spoken.len(), 1);
        assert_eq!(spoken[0].chars().count(), SPEECH_CHAR_LIMIT);
        assert!(h.completion.prompts().await.is_empty());
    }

    #[tokio::test]
    async fn text_to_speech_encodes_audio() {
        let h = harness(vec![], ScriptedCompletion::default());

        let result = h
            .service
            .text_to_speech("Hello".into(), voice())
            .await
            .expect("speech");

        assert_eq!(result.audio_content, STANDARD.encode(b"mp3-bytes"));
        assert_eq!(result.extracted_text, None);
        assert_eq!(h.service.metrics_snapshot().syntheses, 1);
    }

    #[tokio::test]
    async fn speech_to_text_reports_language() {
        let h = harness(vec![], ScriptedCompletion::default());

        let transcript = h
            .service
            .speech_to_text(b"wave".to_vec(), "en-GB".into())
            .await
            .expect("transcript");

        assert_eq!(transcript.transcript, "hello world");
        assert_eq!(transcript.confidence, Some(0.75));
        assert_eq!(transcript.language, "en-GB");
    }
}

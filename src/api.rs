//! HTTP surface for the document pipeline.
//!
//! - `GET /` – Liveness message.
//! - `POST /translate` – Translate `{text, source_lang, target_lang}`.
//! - `POST /summarize` – Summarize `{text, length, mode}`; `length` is ignored in bullet mode.
//! - `POST /processFile` – Multipart upload run through extract → detect → summarize →
//!   optional translate.
//! - `POST /textToSpeech` – Synthesize `{text, voice_name, language_code}` to base64 MP3.
//! - `POST /fileToSpeech` – Multipart upload; synthesizes the first 5000 characters of the
//!   extracted text and echoes the full text back.
//! - `POST /speechToText` – Multipart audio upload transcribed to text.
//! - `GET /metrics` – Request counters.
//! - `GET /commands` – Machine-readable endpoint catalog.
//!
//! Every failure is rendered as `{"detail": "..."}`: `400` for request problems (including
//! rejected JSON bodies), `413` for bodies over the upload limit, `500` for upstream failures.

use crate::extraction::UploadedFile;
use crate::metrics::MetricsSnapshot;
use crate::processing::{
    PipelineRequest, PipelineResult, ProcessingApi, ProcessingError, SpeechResult, SummaryStyle,
    Transcript, TranslationRequest, VoiceParams,
};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::MultipartError,
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_SUMMARY_LENGTH: &str = "medium";
const DEFAULT_SUMMARY_MODE: &str = "normal";
const DEFAULT_SPEECH_LANGUAGE: &str = "en-US";

/// Build the HTTP router exposing the processing API surface.
///
/// `upload_limit` caps request bodies, which bounds multipart uploads.
pub fn create_router<S>(service: Arc<S>, upload_limit: usize) -> Router
where
    S: ProcessingApi + 'static,
{
    Router::new()
        .route("/", get(root))
        .route("/translate", post(translate::<S>))
        .route("/summarize", post(summarize::<S>))
        .route("/processFile", post(process_file::<S>))
        .route("/textToSpeech", post(text_to_speech::<S>))
        .route("/fileToSpeech", post(file_to_speech::<S>))
        .route("/speechToText", post(speech_to_text::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(service)
}

async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "NLP backend running" }))
}

/// Request body for `POST /translate`.
#[derive(Deserialize)]
struct TranslateBody {
    text: String,
    source_lang: String,
    target_lang: String,
}

#[derive(Serialize)]
struct TranslateResponse {
    translation: String,
}

async fn translate<S>(
    State(service): State<Arc<S>>,
    payload: Result<Json<TranslateBody>, JsonRejection>,
) -> Result<Json<TranslateResponse>, AppError>
where
    S: ProcessingApi,
{
    let Json(body) = payload.map_err(rejected_json)?;
    let TranslateBody {
        text,
        source_lang,
        target_lang,
    } = body;
    let translation = service
        .translate(TranslationRequest {
            text,
            source_lang,
            target_lang,
        })
        .await?;
    Ok(Json(TranslateResponse { translation }))
}

/// Request body for `POST /summarize`.
#[derive(Deserialize)]
struct SummarizeBody {
    text: String,
    #[serde(default = "default_length")]
    length: String,
    #[serde(default = "default_mode")]
    mode: String,
}

fn default_length() -> String {
    DEFAULT_SUMMARY_LENGTH.to_string()
}

fn default_mode() -> String {
    DEFAULT_SUMMARY_MODE.to_string()
}

#[derive(Serialize)]
struct SummarizeResponse {
    summary: String,
}

/// Summarize raw text. An unmapped length in normal mode is rejected before any upstream call.
async fn summarize<S>(
    State(service): State<Arc<S>>,
    payload: Result<Json<SummarizeBody>, JsonRejection>,
) -> Result<Json<SummarizeResponse>, AppError>
where
    S: ProcessingApi,
{
    let Json(body) = payload.map_err(rejected_json)?;
    let style = SummaryStyle::parse(&body.length, &body.mode)?;
    let summary = service.summarize(&body.text, style).await?;
    tracing::info!(?style, chars = summary.chars().count(), "Summarize request completed");
    Ok(Json(SummarizeResponse { summary }))
}

/// Run the document pipeline over a multipart upload.
///
/// Form fields: `file` (required), `summary_length` (default `medium`), `summary_mode`
/// (default `normal`), `target_lang` (default empty, meaning no translation).
async fn process_file<S>(
    State(service): State<Arc<S>>,
    multipart: Multipart,
) -> Result<Json<PipelineResult>, AppError>
where
    S: ProcessingApi,
{
    let mut form = MultipartForm::read(multipart, "file").await?;
    let style = SummaryStyle::parse(
        form.field_or("summary_length", DEFAULT_SUMMARY_LENGTH),
        form.field_or("summary_mode", DEFAULT_SUMMARY_MODE),
    )?;
    let target_lang = form.field_or("target_lang", "").to_string();
    let file = form.take_file("file")?;

    let result = service
        .process_file(PipelineRequest::new(file, style, &target_lang))
        .await?;
    Ok(Json(result))
}

/// Request body for `POST /textToSpeech`.
#[derive(Deserialize)]
struct TextToSpeechBody {
    text: String,
    voice_name: String,
    language_code: String,
}

async fn text_to_speech<S>(
    State(service): State<Arc<S>>,
    payload: Result<Json<TextToSpeechBody>, JsonRejection>,
) -> Result<Json<SpeechResult>, AppError>
where
    S: ProcessingApi,
{
    let Json(body) = payload.map_err(rejected_json)?;
    let voice = VoiceParams {
        voice_name: body.voice_name,
        language_code: body.language_code,
    };
    let result = service.text_to_speech(body.text, voice).await?;
    Ok(Json(result))
}

/// Extract text from a multipart upload and synthesize it.
///
/// Form fields: `file`, `voice_name`, `language_code` (all required).
async fn file_to_speech<S>(
    State(service): State<Arc<S>>,
    multipart: Multipart,
) -> Result<Json<SpeechResult>, AppError>
where
    S: ProcessingApi,
{
    let mut form = MultipartForm::read(multipart, "file").await?;
    let voice = VoiceParams {
        voice_name: form.required_field("voice_name")?,
        language_code: form.required_field("language_code")?,
    };
    let file = form.take_file("file")?;
    let result = service.file_to_speech(file, voice).await?;
    Ok(Json(result))
}

/// Transcribe a multipart audio upload (`audio`, optional `language_code`).
async fn speech_to_text<S>(
    State(service): State<Arc<S>>,
    multipart: Multipart,
) -> Result<Json<Transcript>, AppError>
where
    S: ProcessingApi,
{
    let mut form = MultipartForm::read(multipart, "audio").await?;
    let language_code = form
        .field_or("language_code", DEFAULT_SPEECH_LANGUAGE)
        .to_string();
    let audio = form.take_file("audio")?;
    let transcript = service.speech_to_text(audio.bytes, language_code).await?;
    Ok(Json(transcript))
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: ProcessingApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery by clients and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "translate",
                method: "POST",
                path: "/translate",
                description: "Translate text between two language tags. Returns { \"translation\": string }.",
                request_example: Some(json!({
                    "text": "Hello world",
                    "source_lang": "en",
                    "target_lang": "fr"
                })),
            },
            CommandDescriptor {
                name: "summarize",
                method: "POST",
                path: "/summarize",
                description: "Summarize text. length is short|medium|long and only applies when mode is normal; mode bullet returns bullet points.",
                request_example: Some(json!({
                    "text": "Long document text",
                    "length": "medium",
                    "mode": "normal"
                })),
            },
            CommandDescriptor {
                name: "process_file",
                method: "POST",
                path: "/processFile",
                description: "Multipart upload (file, summary_length, summary_mode, target_lang). Extracts text from a PDF or image, detects its language, summarizes it and optionally translates the summary.",
                request_example: None,
            },
            CommandDescriptor {
                name: "text_to_speech",
                method: "POST",
                path: "/textToSpeech",
                description: "Synthesize text to MP3. Returns { \"audioContent\": base64 }.",
                request_example: Some(json!({
                    "text": "Hello world",
                    "voice_name": "en-US-Wavenet-D",
                    "language_code": "en-US"
                })),
            },
            CommandDescriptor {
                name: "file_to_speech",
                method: "POST",
                path: "/fileToSpeech",
                description: "Multipart upload (file, voice_name, language_code). Synthesizes the first 5000 characters of the extracted text and returns the full text as extractedText.",
                request_example: None,
            },
            CommandDescriptor {
                name: "speech_to_text",
                method: "POST",
                path: "/speechToText",
                description: "Multipart upload (audio, language_code). Returns the recognized transcript.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return request counters since startup.",
                request_example: None,
            },
        ],
    })
}

/// Buffered multipart form: at most one file part plus text fields.
struct MultipartForm {
    file: Option<UploadedFile>,
    fields: HashMap<String, String>,
}

impl MultipartForm {
    async fn read(mut multipart: Multipart, file_field: &str) -> Result<Self, AppError> {
        let mut file = None;
        let mut fields = HashMap::new();
        while let Some(field) = multipart.next_field().await.map_err(malformed_multipart)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == file_field {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(malformed_multipart)?.to_vec();
                file = Some(UploadedFile {
                    file_name,
                    content_type,
                    bytes,
                });
            } else {
                let value = field.text().await.map_err(malformed_multipart)?;
                fields.insert(name, value);
            }
        }
        Ok(Self { file, fields })
    }

    fn field_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.fields.get(name).map(String::as_str).unwrap_or(default)
    }

    fn required_field(&mut self, name: &str) -> Result<String, AppError> {
        self.fields
            .remove(name)
            .ok_or_else(|| missing_field(name))
    }

    fn take_file(&mut self, name: &str) -> Result<UploadedFile, AppError> {
        self.file.take().ok_or_else(|| missing_field(name))
    }
}

fn missing_field(name: &str) -> AppError {
    AppError(ProcessingError::InvalidParameter(format!(
        "missing form field '{name}'"
    )))
}

fn malformed_multipart(error: MultipartError) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError(ProcessingError::UploadTooLarge);
    }
    AppError(ProcessingError::InvalidParameter(format!(
        "malformed multipart body: {error}"
    )))
}

fn rejected_json(rejection: JsonRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError(ProcessingError::UploadTooLarge);
    }
    AppError(ProcessingError::InvalidParameter(rejection.body_text()))
}

struct AppError(ProcessingError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ProcessingError::UploadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            error if error.is_client_error() => StatusCode::BAD_REQUEST,
            error => {
                tracing::warn!(error = %error, "Upstream failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "detail": self.0.to_string() }))).into_response()
    }
}

impl From<ProcessingError> for AppError {
    fn from(inner: ProcessingError) -> Self {
        Self(inner)
    }
}

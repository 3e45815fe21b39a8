//! Speech synthesis and recognition through the Google Cloud Speech REST APIs.
//!
//! Both directions share one HTTP client but are configured independently from the completion
//! provider. Audio crosses this boundary as raw bytes; base64 is only used on the wire.

use crate::config::Config;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the speech services.
#[derive(Debug, Error)]
pub enum SpeechError {
    /// Service answered with a non-success status.
    #[error("{body}")]
    Upstream {
        /// Status code returned by the service.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// Service could not be reached or timed out.
    #[error("Failed to reach speech service: {0}")]
    Transport(String),
    /// Service answered 2xx with an unusable body.
    #[error("Malformed speech response: {0}")]
    InvalidResponse(String),
}

/// Text plus voice selection sent to the synthesizer.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    /// Text to speak.
    pub text: String,
    /// Provider voice name.
    pub voice_name: String,
    /// BCP-47 language code.
    pub language_code: String,
}

/// Raw recognition output for a single audio clip.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    /// Transcripts of all results joined with a space.
    pub transcript: String,
    /// Confidence of the first alternative of the first result.
    pub confidence: Option<f32>,
}

/// Text-to-speech backend.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `request` as MP3 and return the raw audio bytes.
    async fn synthesize(&self, request: SynthesisRequest) -> Result<Vec<u8>, SpeechError>;
}

/// Speech-to-text backend.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Recognize speech in `audio` spoken in `language_code`.
    async fn recognize(
        &self,
        audio: Vec<u8>,
        language_code: &str,
    ) -> Result<Recognition, SpeechError>;
}

/// Client for Google Cloud Text-to-Speech and Speech-to-Text.
pub struct GoogleSpeechClient {
    http: Client,
    tts_url: String,
    stt_url: String,
    api_key: Option<String>,
}

impl GoogleSpeechClient {
    /// Build a client for the given synthesis and recognition endpoints.
    pub fn new(
        tts_url: impl Into<String>,
        stt_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, SpeechError> {
        let http = Client::builder()
            .user_agent("docpipe/speech")
            .timeout(timeout)
            .build()
            .map_err(|error| SpeechError::Transport(error.to_string()))?;
        Ok(Self {
            http,
            tts_url: tts_url.into(),
            stt_url: stt_url.into(),
            api_key,
        })
    }

    /// Build the client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, SpeechError> {
        Self::new(
            config.tts_url.clone(),
            config.stt_url.clone(),
            config.speech_api_key.clone(),
            config.stage_timeout(),
        )
    }

    async fn post<B, R>(&self, url: &str, body: &B) -> Result<R, SpeechError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let mut request = self.http.post(url).json(body);
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }
        let response = request
            .send()
            .await
            .map_err(|error| SpeechError::Transport(error.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .map_err(|error| SpeechError::Transport(error.to_string()))?;
            tracing::warn!(status = status.as_u16(), url, "Speech service rejected request");
            return Err(SpeechError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|error| SpeechError::InvalidResponse(error.to_string()))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeBody<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

#[derive(Serialize)]
struct RecognizeBody<'a> {
    config: RecognitionConfig<'a>,
    audio: RecognitionAudio,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig<'a> {
    language_code: &'a str,
}

#[derive(Serialize)]
struct RecognitionAudio {
    content: String,
}

#[derive(Deserialize, Default)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<RecognitionAlternative>,
}

#[derive(Deserialize)]
struct RecognitionAlternative {
    #[serde(default)]
    transcript: String,
    confidence: Option<f32>,
}

#[async_trait]
impl SpeechSynthesizer for GoogleSpeechClient {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<Vec<u8>, SpeechError> {
        let body = SynthesizeBody {
            input: SynthesisInput {
                text: &request.text,
            },
            voice: VoiceSelection {
                language_code: &request.language_code,
                name: &request.voice_name,
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
            },
        };
        tracing::debug!(
            voice = %request.voice_name,
            language = %request.language_code,
            chars = request.text.chars().count(),
            "Requesting speech synthesis"
        );
        let response: SynthesizeResponse = self.post(&self.tts_url, &body).await?;
        STANDARD
            .decode(response.audio_content.as_bytes())
            .map_err(|error| SpeechError::InvalidResponse(format!("audioContent: {error}")))
    }
}

#[async_trait]
impl SpeechRecognizer for GoogleSpeechClient {
    async fn recognize(
        &self,
        audio: Vec<u8>,
        language_code: &str,
    ) -> Result<Recognition, SpeechError> {
        let body = RecognizeBody {
            config: RecognitionConfig { language_code },
            audio: RecognitionAudio {
                content: STANDARD.encode(&audio),
            },
        };
        tracing::debug!(bytes = audio.len(), language = language_code, "Requesting speech recognition");
        let response: RecognizeResponse = self.post(&self.stt_url, &body).await?;

        let confidence = response
            .results
            .first()
            .and_then(|result| result.alternatives.first())
            .and_then(|alternative| alternative.confidence);
        let transcript = response
            .results
            .iter()
            .filter_map(|result| result.alternatives.first())
            .map(|alternative| alternative.transcript.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        Ok(Recognition {
            transcript,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::tests::truncated_error_server;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn client_for(server: &MockServer, api_key: Option<&str>) -> GoogleSpeechClient {
        GoogleSpeechClient::new(
            server.url("/v1/text:synthesize"),
            server.url("/v1/speech:recognize"),
            api_key.map(str::to_string),
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[tokio::test]
    async fn synthesis_requests_mp3_and_decodes_audio() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/text:synthesize")
                    .query_param("key", "speech-key")
                    .json_body(json!({
                        "input": { "text": "Bonjour" },
                        "voice": { "languageCode": "fr-FR", "name": "fr-FR-Wavenet-A" },
                        "audioConfig": { "audioEncoding": "MP3" }
                    }));
                then.status(200)
                    .json_body(json!({ "audioContent": STANDARD.encode(b"ID3-audio") }));
            })
            .await;

        let audio = client_for(&server, Some("speech-key"))
            .synthesize(SynthesisRequest {
                text: "Bonjour".into(),
                voice_name: "fr-FR-Wavenet-A".into(),
                language_code: "fr-FR".into(),
            })
            .await
            .expect("audio");

        mock.assert_async().await;
        assert_eq!(audio, b"ID3-audio");
    }

    #[tokio::test]
    async fn synthesis_failure_keeps_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/text:synthesize");
                then.status(403).body("API key not valid");
            })
            .await;

        let error = client_for(&server, None)
            .synthesize(SynthesisRequest {
                text: "Hi".into(),
                voice_name: "en-US-Wavenet-D".into(),
                language_code: "en-US".into(),
            })
            .await
            .expect_err("forbidden");

        assert!(matches!(error, SpeechError::Upstream { status: 403, ref body } if body == "API key not valid"));
    }

    #[tokio::test]
    async fn recognition_joins_result_transcripts() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/speech:recognize")
                    .json_body(json!({
                        "config": { "languageCode": "en-US" },
                        "audio": { "content": STANDARD.encode(b"wave") }
                    }));
                then.status(200).json_body(json!({
                    "results": [
                        { "alternatives": [{ "transcript": "hello there", "confidence": 0.5 }] },
                        { "alternatives": [{ "transcript": " general kenobi" }] }
                    ]
                }));
            })
            .await;

        let recognition = client_for(&server, None)
            .recognize(b"wave".to_vec(), "en-US")
            .await
            .expect("recognition");

        assert_eq!(recognition.transcript, "hello there general kenobi");
        assert_eq!(recognition.confidence, Some(0.5));
    }

    #[tokio::test]
    async fn recognition_without_results_is_empty() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/speech:recognize");
                then.status(200).json_body(json!({}));
            })
            .await;

        let recognition = client_for(&server, None)
            .recognize(b"silence".to_vec(), "en-US")
            .await
            .expect("recognition");

        assert_eq!(recognition.transcript, "");
        assert_eq!(recognition.confidence, None);
    }

    #[tokio::test]
    async fn unreadable_error_body_is_a_transport_failure() {
        let tts_url = truncated_error_server("/v1/text:synthesize").await;
        let client =
            GoogleSpeechClient::new(tts_url, "http://127.0.0.1:9/unused", None, Duration::from_secs(5))
                .expect("client");

        let error = client
            .synthesize(SynthesisRequest {
                text: "Hi".into(),
                voice_name: "en-US-Wavenet-D".into(),
                language_code: "en-US".into(),
            })
            .await
            .expect_err("truncated body");

        assert!(matches!(error, SpeechError::Transport(_)));
    }
}

use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_COMPLETION_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_COMPLETION_MODEL: &str = "deepseek/deepseek-chat";
const DEFAULT_TTS_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";
const DEFAULT_STT_URL: &str = "https://speech.googleapis.com/v1/speech:recognize";
const DEFAULT_TESSERACT_PATH: &str = "tesseract";
const DEFAULT_STAGE_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the document pipeline server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Chat-completions endpoint of the language model provider.
    pub completion_url: String,
    /// Bearer token sent to the completion provider.
    pub completion_api_key: String,
    /// Model identifier used for every completion request.
    pub completion_model: String,
    /// Upper bound for a single outbound stage (HTTP call or OCR run).
    pub stage_timeout_secs: u64,
    /// Optional API key appended to speech service requests.
    pub speech_api_key: Option<String>,
    /// Text-to-speech synthesis endpoint.
    pub tts_url: String,
    /// Speech-to-text recognition endpoint.
    pub stt_url: String,
    /// Path or name of the tesseract executable.
    pub tesseract_path: String,
    /// Optional tesseract language pack selector (`-l`).
    pub ocr_language: Option<String>,
    /// Maximum accepted request body size for uploads.
    pub max_upload_bytes: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Log file path; `None` selects `logs/docpipe.log`.
    pub log_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            completion_url: load_env_or("COMPLETION_API_URL", DEFAULT_COMPLETION_URL),
            completion_api_key: load_env("COMPLETION_API_KEY")?,
            completion_model: load_env_or("COMPLETION_MODEL", DEFAULT_COMPLETION_MODEL),
            stage_timeout_secs: load_env_parsed("STAGE_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_STAGE_TIMEOUT_SECS),
            speech_api_key: load_env_optional("SPEECH_API_KEY"),
            tts_url: load_env_or("TTS_API_URL", DEFAULT_TTS_URL),
            stt_url: load_env_or("STT_API_URL", DEFAULT_STT_URL),
            tesseract_path: load_env_or("TESSERACT_PATH", DEFAULT_TESSERACT_PATH),
            ocr_language: load_env_optional("OCR_LANGUAGE"),
            max_upload_bytes: load_env_parsed("MAX_UPLOAD_BYTES")?
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            server_port: load_env_parsed("SERVER_PORT")?,
            log_file: load_env_optional("DOCPIPE_LOG_FILE").map(PathBuf::from),
        })
    }

    /// Per-stage timeout as a [`Duration`].
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn load_env_parsed<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
///
/// Panics on invalid configuration; use [`try_init_config`] to handle the error instead.
pub fn init_config() {
    try_init_config().expect("Failed to load config from environment");
}

/// Load configuration from `.env` and the environment, returning the cached value.
///
/// Returns the already installed configuration when called more than once.
pub fn try_init_config() -> Result<&'static Config, ConfigError> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        completion_url = %config.completion_url,
        model = %config.completion_model,
        stage_timeout_secs = config.stage_timeout_secs,
        speech_key_present = config.speech_api_key.is_some(),
        server_port = ?config.server_port,
        log_file = ?config.log_file,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_values_reject_garbage() {
        // SAFETY: the variable name is unique to this test.
        unsafe { env::set_var("DOCPIPE_TEST_PARSE_GARBAGE", "soon") };
        let result = load_env_parsed::<u64>("DOCPIPE_TEST_PARSE_GARBAGE");
        assert!(matches!(result, Err(ConfigError::InvalidValue(key)) if key == "DOCPIPE_TEST_PARSE_GARBAGE"));
    }

    #[test]
    fn blank_values_count_as_missing() {
        // SAFETY: the variable name is unique to this test.
        unsafe { env::set_var("DOCPIPE_TEST_BLANK", "   ") };
        assert!(load_env_optional("DOCPIPE_TEST_BLANK").is_none());
        assert_eq!(load_env_or("DOCPIPE_TEST_BLANK", "fallback"), "fallback");
        assert!(matches!(
            load_env("DOCPIPE_TEST_BLANK"),
            Err(ConfigError::MissingVariable(_))
        ));
    }

    #[test]
    fn missing_api_key_is_reported_not_panicked() {
        // SAFETY: no other test reads or writes this variable.
        unsafe { env::remove_var("COMPLETION_API_KEY") };
        let result = try_init_config();
        assert!(matches!(result, Err(ConfigError::MissingVariable(key)) if key == "COMPLETION_API_KEY"));
        assert!(CONFIG.get().is_none());
    }
}

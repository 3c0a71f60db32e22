pub mod deepseek_client;

use std::future::Future;

use thiserror::Error;
use tracing::{debug, warn};

use crate::settings::{Settings, SettingsStore};

pub use deepseek_client::DeepSeekClient;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TranslateError {
    #[error("nothing to translate")]
    EmptyText,
    #[error("api key is not configured")]
    MissingApiKey,
    #[error("translation request failed with HTTP status {0}")]
    Http(u16),
    #[error("model returned no text")]
    NoResponse,
    #[error("failed to load settings: {0}")]
    Settings(String),
    #[error("translation transport error: {0}")]
    Transport(String),
}

impl TranslateError {
    pub fn code(&self) -> String {
        match self {
            Self::EmptyText => "empty-text".to_string(),
            Self::MissingApiKey => "missing-api-key".to_string(),
            Self::Http(status) => format!("http-{status}"),
            Self::NoResponse => "no-response".to_string(),
            Self::Settings(_) => "settings-unavailable".to_string(),
            Self::Transport(_) => "transport".to_string(),
        }
    }

    pub fn status_message(&self) -> String {
        match self {
            Self::EmptyText => "Type to get AI suggestions".to_string(),
            Self::MissingApiKey => "Add your DeepSeek key in settings".to_string(),
            Self::Http(401) => "DeepSeek rejected the API key".to_string(),
            Self::Http(429) => "DeepSeek rate limited the request".to_string(),
            Self::Http(status) => format!("DeepSeek request failed (HTTP {status})"),
            Self::NoResponse => "No text returned".to_string(),
            Self::Settings(_) => "Settings could not be loaded".to_string(),
            Self::Transport(_) => "Translation unavailable".to_string(),
        }
    }
}

pub trait TranslationService: Send + Sync {
    fn translate(
        &self,
        text: &str,
        settings: &Settings,
    ) -> impl Future<Output = Result<String, TranslateError>> + Send;
}

/// Runs one request: settings are read fresh, a blank key short-circuits
/// before any network call, and blank output counts as no response.
pub async fn request_translation<S, T>(
    service: &S,
    store: &T,
    raw_text: &str,
) -> Result<String, TranslateError>
where
    S: TranslationService,
    T: SettingsStore + ?Sized,
{
    let text = raw_text.trim();
    if text.is_empty() {
        return Err(TranslateError::EmptyText);
    }

    let settings = store
        .load()
        .map_err(|err| TranslateError::Settings(err.to_string()))?;
    if !settings.has_api_key() {
        debug!("skipping translation request because no api key is configured");
        return Err(TranslateError::MissingApiKey);
    }

    let translated = service.translate(text, &settings).await.inspect_err(|err| {
        warn!(code = err.code().as_str(), "translation request failed: {err}");
    })?;
    let trimmed = translated.trim();
    if trimmed.is_empty() {
        return Err(TranslateError::NoResponse);
    }

    Ok(trimmed.to_string())
}

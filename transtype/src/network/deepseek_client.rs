use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::settings::{Mode, Settings};

use super::{TranslateError, TranslationService};

const DEFAULT_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "deepseek-chat";
const DEFAULT_MAX_TOKENS: u32 = 256;
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const FINAL_TEXT_ONLY_INSTRUCTION: &str = "Always respond with the final text only.";

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn for_text(model: &str, text: &str, settings: &Settings) -> Self {
        let custom_prompt = settings.system_prompt.trim();
        let system = if custom_prompt.is_empty() {
            default_system_prompt(settings.mode, &settings.target_lang)
        } else {
            custom_prompt.to_string()
        };

        Self {
            model: model.to_string(),
            temperature: settings.clamped_temperature(),
            max_tokens: DEFAULT_MAX_TOKENS,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: format!("{system}\n{FINAL_TEXT_ONLY_INSTRUCTION}"),
                },
                ChatMessage {
                    role: "user",
                    content: user_content(settings.mode, &settings.target_lang, text),
                },
            ],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    pub fn first_content(&self) -> Option<String> {
        let content = self.choices.first()?.message.as_ref()?.content.as_deref()?;
        let trimmed = content.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

pub struct DeepSeekClient {
    http: reqwest::Client,
    api_url: String,
    model: String,
}

impl DeepSeekClient {
    pub fn new() -> Result<Self, TranslateError> {
        Self::with_endpoint(DEFAULT_API_URL)
    }

    pub fn with_endpoint(api_url: &str) -> Result<Self, TranslateError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS))
            .build()
            .map_err(|err| TranslateError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            api_url: api_url.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

}

impl TranslationService for DeepSeekClient {
    async fn translate(&self, text: &str, settings: &Settings) -> Result<String, TranslateError> {
        if settings.api_key.trim().is_empty() {
            return Err(TranslateError::MissingApiKey);
        }

        let payload = ChatRequest::for_text(&self.model, text, settings);
        debug!(
            model = self.model.as_str(),
            mode = ?settings.mode,
            chars = text.chars().count(),
            "sending chat completion request"
        );

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(settings.api_key.trim())
            .json(&payload)
            .send()
            .await
            .map_err(|err| TranslateError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranslateError::Http(status.as_u16()));
        }

        let body = response
            .json::<ChatResponse>()
            .await
            .map_err(|err| TranslateError::Transport(err.to_string()))?;
        let content = body.first_content().ok_or(TranslateError::NoResponse)?;
        info!(chars = content.chars().count(), "chat completion received");
        Ok(content)
    }
}

fn default_system_prompt(mode: Mode, target_lang: &str) -> String {
    match mode {
        Mode::Translate => {
            format!("You are a precise translator who outputs natural {target_lang}.")
        }
        Mode::Touchup => format!(
            "You are a writing coach that polishes {target_lang} text for clarity, correctness, and natural tone."
        ),
        Mode::Custom => "You are a helpful assistant.".to_string(),
    }
}

fn user_content(mode: Mode, target_lang: &str, text: &str) -> String {
    match mode {
        Mode::Translate => format!("Translate the following text into {target_lang}.\n\n{text}"),
        Mode::Touchup => format!(
            "Improve the following {target_lang} text while preserving its meaning and tone.\n\n{text}"
        ),
        Mode::Custom => text.to_string(),
    }
}

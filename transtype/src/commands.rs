use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::error::AppError;
use crate::network::{TranslationService, request_translation};
use crate::runtime::{PreviewReport, run_preview};
use crate::settings::{Mode, Settings, SettingsStore};

const SERVICE_NAME: &str = "transtype-core";
const VISIBLE_KEY_CHARS: usize = 4;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    pub service: &'static str,
    pub version: &'static str,
    pub ready: bool,
    pub mode: Mode,
    pub readiness: String,
}

#[derive(Debug, Clone, Default)]
pub struct SettingsUpdate {
    pub api_key: Option<String>,
    pub mode: Option<Mode>,
    pub target_lang: Option<String>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.api_key.is_none()
            && self.mode.is_none()
            && self.target_lang.is_none()
            && self.system_prompt.is_none()
            && self.temperature.is_none()
    }

    fn apply_to(self, mut settings: Settings) -> Settings {
        if let Some(api_key) = self.api_key {
            settings.api_key = api_key;
        }
        if let Some(mode) = self.mode {
            settings.mode = mode;
        }
        if let Some(target_lang) = self.target_lang {
            settings.target_lang = target_lang;
        }
        if let Some(system_prompt) = self.system_prompt {
            settings.system_prompt = system_prompt;
        }
        if let Some(temperature) = self.temperature {
            settings.temperature = temperature;
        }
        settings
    }
}

pub fn app_status<T: SettingsStore + ?Sized>(store: &T) -> Result<AppStatus, AppError> {
    let settings = store.load()?;
    Ok(AppStatus {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        ready: settings.has_api_key(),
        mode: settings.mode,
        readiness: settings.readiness(),
    })
}

pub fn get_settings<T: SettingsStore + ?Sized>(store: &T) -> Result<Settings, AppError> {
    let mut settings = store.load()?;
    settings.api_key = mask_api_key(&settings.api_key);
    Ok(settings)
}

pub fn save_settings<T: SettingsStore + ?Sized>(
    store: &T,
    update: SettingsUpdate,
) -> Result<Settings, AppError> {
    let current = store.load()?;
    let mut saved = store.save(update.apply_to(current))?;
    info!(mode = saved.mode.as_str(), "settings saved");
    saved.api_key = mask_api_key(&saved.api_key);
    Ok(saved)
}

pub fn reset_settings<T: SettingsStore + ?Sized>(store: &T) -> Result<Settings, AppError> {
    let settings = store.reset()?;
    info!("settings reset to defaults");
    Ok(settings)
}

pub async fn translate_text<S, T>(service: &S, store: &T, text: &str) -> Result<String, AppError>
where
    S: TranslationService,
    T: SettingsStore + ?Sized,
{
    Ok(request_translation(service, store, text).await?)
}

pub async fn preview_text<S, T>(
    service: Arc<S>,
    store: Arc<T>,
    text: &str,
) -> Result<PreviewReport, AppError>
where
    S: TranslationService + 'static,
    T: SettingsStore + ?Sized + 'static,
{
    Ok(run_preview(service, store, text).await?)
}

fn mask_api_key(api_key: &str) -> String {
    let total = api_key.chars().count();
    if total == 0 {
        return String::new();
    }
    if total <= VISIBLE_KEY_CHARS {
        return "*".repeat(total);
    }
    let tail: String = api_key.chars().skip(total - VISIBLE_KEY_CHARS).collect();
    format!("{}{tail}", "*".repeat(total - VISIBLE_KEY_CHARS))
}

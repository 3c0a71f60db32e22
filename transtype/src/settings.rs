use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::secure_storage;

pub const DEFAULT_TARGET_LANG: &str = "English";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const MIN_TEMPERATURE: f32 = 0.0;
pub const MAX_TEMPERATURE: f32 = 1.0;
const CONFIG_DIR_NAME: &str = "transtype";
const CONFIG_FILE_NAME: &str = "config.json";
const API_KEY_ENV_VARS: [&str; 2] = ["DEEPSEEK_API_KEY", "TRANSTYPE_API_KEY"];

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("no configuration directory is available on this platform")]
    NoConfigDir,
    #[error("failed to access settings file: {0}")]
    Io(String),
    #[error("failed to parse settings file: {0}")]
    Parse(String),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Translate,
    Touchup,
    Custom,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Translate => "translate",
            Self::Touchup => "touchup",
            Self::Custom => "custom",
        }
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "translate" => Ok(Self::Translate),
            "touchup" => Ok(Self::Touchup),
            "custom" => Ok(Self::Custom),
            other => Err(format!(
                "unknown mode `{other}`; expected translate, touchup or custom"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default = "default_target_lang")]
    pub target_lang: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            mode: Mode::default(),
            target_lang: default_target_lang(),
            system_prompt: String::new(),
            temperature: default_temperature(),
        }
    }
}

fn default_target_lang() -> String {
    DEFAULT_TARGET_LANG.to_string()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

impl Settings {
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Temperature sent to the model: clamped to the supported range, with
    /// NaN falling back to the default.
    pub fn clamped_temperature(&self) -> f32 {
        if self.temperature.is_nan() {
            return DEFAULT_TEMPERATURE;
        }
        self.temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
    }

    pub fn describe_scenario(&self) -> String {
        match self.mode {
            Mode::Translate => format!("translating into {}", self.target_lang),
            Mode::Touchup => format!("touching up {} prose", self.target_lang),
            Mode::Custom => "using your custom system prompt".to_string(),
        }
    }

    pub fn readiness(&self) -> String {
        if !self.has_api_key() {
            return "API key missing. Open settings to add your DeepSeek key.".to_string();
        }
        format!("Ready – {}.", self.describe_scenario())
    }
}

pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<Settings, SettingsError>;

    fn save(&self, settings: Settings) -> Result<Settings, SettingsError>;

    fn reset(&self) -> Result<Settings, SettingsError> {
        self.save(Settings::default())
    }
}

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: Mutex<Settings>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings: Mutex::new(settings),
        }
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        self.settings
            .lock()
            .map(|settings| normalize_loaded_settings(settings.clone()))
            .map_err(|err| SettingsError::Io(err.to_string()))
    }

    fn save(&self, settings: Settings) -> Result<Settings, SettingsError> {
        let validated = validate_settings(settings)?;
        let mut stored = self
            .settings
            .lock()
            .map_err(|err| SettingsError::Io(err.to_string()))?;
        *stored = validated.clone();
        Ok(validated)
    }
}

#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    path: PathBuf,
    secure_storage: bool,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            secure_storage: true,
        }
    }

    pub fn at_default_location() -> Result<Self, SettingsError> {
        let config_dir = dirs::config_dir().ok_or(SettingsError::NoConfigDir)?;
        Ok(Self::new(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)))
    }

    pub fn without_secure_storage(mut self) -> Self {
        self.secure_storage = false;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_config(&self) -> Result<Settings, SettingsError> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }

        let content =
            fs::read_to_string(&self.path).map_err(|err| SettingsError::Io(err.to_string()))?;
        serde_json::from_str::<Settings>(&content).map_err(|err| SettingsError::Parse(err.to_string()))
    }

    fn write_config(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| SettingsError::Io(err.to_string()))?;
        }

        let serialized = serde_json::to_string_pretty(settings)
            .map_err(|err| SettingsError::Parse(err.to_string()))?;
        fs::write(&self.path, serialized).map_err(|err| SettingsError::Io(err.to_string()))
    }

    fn merge_secure_api_key(&self, settings: &mut Settings) {
        match secure_storage::read_api_key() {
            Ok(Some(api_key)) => {
                settings.api_key = api_key.trim().to_string();
            }
            Ok(None) => {
                if settings.has_api_key() {
                    self.migrate_plaintext_api_key(settings);
                }
            }
            Err(err) => {
                warn!("failed to read API key from secure storage; using config fallback: {err}");
            }
        }
    }

    fn migrate_plaintext_api_key(&self, settings: &Settings) {
        match secure_storage::store_verified(&settings.api_key) {
            Ok(true) => {
                let mut sanitized = settings.clone();
                sanitized.api_key.clear();
                if let Err(err) = self.write_config(&sanitized) {
                    warn!("failed to rewrite sanitized config after secure migration: {err}");
                }
            }
            Ok(false) => {
                debug!("secure storage did not retain the API key; keeping config copy");
            }
            Err(err) => {
                warn!("failed to migrate API key into secure storage: {err}");
            }
        }
    }
}

impl SettingsStore for FileSettingsStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        let mut settings = normalize_loaded_settings(self.read_config()?);

        if self.secure_storage {
            self.merge_secure_api_key(&mut settings);
        }

        if !settings.has_api_key() {
            if let Some(env_api_key) = read_api_key_from_environment() {
                settings.api_key = env_api_key;
            }
        }

        Ok(settings)
    }

    fn save(&self, settings: Settings) -> Result<Settings, SettingsError> {
        let validated = validate_settings(settings)?;

        let stored_securely = self.secure_storage
            && match secure_storage::store_verified(&validated.api_key) {
                Ok(verified) => {
                    if !verified {
                        warn!(
                            "secure storage write could not be verified, fallback to config persistence"
                        );
                    }
                    verified
                }
                Err(err) => {
                    warn!(
                        "failed to write API key into secure storage, fallback to config persistence: {err}"
                    );
                    false
                }
            };

        let mut persisted = validated.clone();
        if stored_securely {
            persisted.api_key.clear();
        }
        self.write_config(&persisted)?;

        Ok(validated)
    }
}

fn read_api_key_from_environment() -> Option<String> {
    API_KEY_ENV_VARS.iter().find_map(|key_name| {
        std::env::var(key_name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn normalize_loaded_settings(mut settings: Settings) -> Settings {
    settings.api_key = settings.api_key.trim().to_string();
    settings.system_prompt = settings.system_prompt.trim().to_string();
    settings.target_lang = normalize_target_lang(&settings.target_lang);

    if !settings.temperature.is_finite()
        || !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&settings.temperature)
    {
        warn!(
            temperature = settings.temperature,
            "loaded temperature is out of range; resetting to default"
        );
        settings.temperature = DEFAULT_TEMPERATURE;
    }

    settings
}

fn validate_settings(mut settings: Settings) -> Result<Settings, SettingsError> {
    settings.api_key = settings.api_key.trim().to_string();
    settings.system_prompt = settings.system_prompt.trim().to_string();
    settings.target_lang = normalize_target_lang(&settings.target_lang);

    if !settings.temperature.is_finite()
        || !(MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&settings.temperature)
    {
        return Err(SettingsError::Invalid(format!(
            "temperature must be between {MIN_TEMPERATURE} and {MAX_TEMPERATURE}"
        )));
    }

    if settings.mode == Mode::Custom && settings.system_prompt.is_empty() {
        debug!("custom mode without a system prompt; the generic assistant prompt will be used");
    }

    Ok(settings)
}

fn normalize_target_lang(target_lang: &str) -> String {
    let trimmed = target_lang.trim();
    if trimmed.is_empty() {
        default_target_lang()
    } else {
        trimmed.to_string()
    }
}

use thiserror::Error;

use crate::dom::DomError;
use crate::network::TranslateError;
use crate::settings::SettingsError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("{}", .0.status_message())]
    Translate(#[from] TranslateError),
    #[error("headless page error: {0}")]
    Page(#[from] DomError),
}

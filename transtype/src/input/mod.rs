pub mod injector;
pub mod segment;
pub mod shortcut;

use thiserror::Error;

use crate::dom::{Document, NodeId};

pub const MAX_TRANSLATION_LENGTH: usize = 10_000;

const TEXT_INPUT_TYPES: [&str; 5] = ["text", "search", "url", "tel", "email"];
const KNOWN_INPUT_TYPES: [&str; 22] = [
    "button",
    "checkbox",
    "color",
    "date",
    "datetime-local",
    "email",
    "file",
    "hidden",
    "image",
    "month",
    "number",
    "password",
    "radio",
    "range",
    "reset",
    "search",
    "submit",
    "tel",
    "text",
    "time",
    "url",
    "week",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Plain,
    Rich,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveField {
    pub node: NodeId,
    pub kind: FieldKind,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("translation exceeds maximum length of {MAX_TRANSLATION_LENGTH} characters")]
    TooLong,
    #[error("translation is empty")]
    Empty,
}

pub fn is_text_control(doc: &Document, node: NodeId) -> bool {
    match doc.tag(node) {
        Some("textarea") => true,
        Some("input") => {
            let kind = doc
                .attribute(node, "type")
                .map(|value| value.trim().to_ascii_lowercase())
                .filter(|value| KNOWN_INPUT_TYPES.contains(&value.as_str()))
                .unwrap_or_else(|| "text".to_string());
            TEXT_INPUT_TYPES.contains(&kind.as_str())
        }
        _ => false,
    }
}

pub fn resolve_editable_target(doc: &Document, target: NodeId) -> Option<ActiveField> {
    let element = if doc.is_text(target) {
        doc.parent(target)?
    } else {
        target
    };

    if let Some(control) = doc.closest(element, is_text_control) {
        return Some(ActiveField {
            node: control,
            kind: FieldKind::Plain,
        });
    }

    doc.editing_host(element).map(|host| ActiveField {
        node: host,
        kind: FieldKind::Rich,
    })
}

/// Strips control characters (except whitespace) from model output before it
/// is written into a page field.
pub fn validate_translation(text: &str) -> Result<String, ValidationError> {
    if text.chars().count() > MAX_TRANSLATION_LENGTH {
        return Err(ValidationError::TooLong);
    }

    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect();

    if cleaned.trim().is_empty() {
        return Err(ValidationError::Empty);
    }

    Ok(cleaned)
}

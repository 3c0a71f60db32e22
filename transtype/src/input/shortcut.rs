use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Mac,
    #[default]
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(any(target_os = "macos", target_os = "ios")) {
            Self::Mac
        } else {
            Self::Other
        }
    }

    pub fn accept_key_label(self) -> &'static str {
        match self {
            Self::Mac => "Cmd+Shift+Space",
            Self::Other => "Ctrl+Shift+Space",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    pub code: String,
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyEvent {
    pub fn new(key: &str, code: &str) -> Self {
        Self {
            key: key.to_string(),
            code: code.to_string(),
            ..Self::default()
        }
    }

    pub fn with_ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }

    pub fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn accept_chord(platform: Platform) -> Self {
        let event = Self::new(" ", "Space").with_shift();
        match platform {
            Platform::Mac => event.with_meta(),
            Platform::Other => event.with_ctrl(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    PreventDefault,
    Continue,
}

pub fn is_accept_shortcut(platform: Platform, event: &KeyEvent) -> bool {
    let primary = match platform {
        Platform::Mac => event.meta,
        Platform::Other => event.ctrl,
    };
    primary
        && event.shift
        && (event.code == "Space" || event.key == " " || event.key == "Spacebar")
}

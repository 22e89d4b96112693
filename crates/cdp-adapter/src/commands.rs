//! Command parameter types exposed by the CDP adapter interface.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// A single named key dispatched through `Input.dispatchKeyEvent`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPress {
    pub key: String,
    pub code: String,
    pub key_code: u32,
    pub text: Option<String>,
    pub modifiers: u32,
}

impl KeyPress {
    pub fn enter() -> Self {
        Self {
            key: "Enter".into(),
            code: "Enter".into(),
            key_code: 13,
            text: Some("\r".into()),
            modifiers: 0,
        }
    }

    pub fn backspace() -> Self {
        Self {
            key: "Backspace".into(),
            code: "Backspace".into(),
            key_code: 8,
            text: None,
            modifiers: 0,
        }
    }

    /// Payloads for the keyDown / keyUp pair.
    pub fn event_payloads(&self) -> [Value; 2] {
        let mut down = json!({
            "type": if self.text.is_some() { "keyDown" } else { "rawKeyDown" },
            "key": self.key,
            "code": self.code,
            "windowsVirtualKeyCode": self.key_code,
            "nativeVirtualKeyCode": self.key_code,
            "modifiers": self.modifiers,
        });
        if let Some(text) = &self.text {
            down["text"] = json!(text);
            down["unmodifiedText"] = json!(text);
        }
        let up = json!({
            "type": "keyUp",
            "key": self.key,
            "code": self.code,
            "windowsVirtualKeyCode": self.key_code,
            "nativeVirtualKeyCode": self.key_code,
            "modifiers": self.modifiers,
        });
        [down, up]
    }
}

/// Options for capturing screenshots.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub enum ScreenshotFormat {
    #[default]
    Png,
    Jpeg {
        quality: Option<u8>,
    },
}

impl ScreenshotFormat {
    pub fn params(&self) -> Value {
        match self {
            ScreenshotFormat::Png => json!({ "format": "png" }),
            ScreenshotFormat::Jpeg { quality } => {
                json!({ "format": "jpeg", "quality": quality.unwrap_or(80) })
            }
        }
    }
}

//! App-specific configuration extensions.
//!
//! This module provides hotkey support on top of the core Config.

use global_hotkey::hotkey::{Code, HotKey, Modifiers};
use tracing::warn;

use crate::Config;

/// Default hotkey: Meta+Shift+R
pub fn default_hotkey() -> HotKey {
    HotKey::new(Some(Modifiers::META | Modifiers::SHIFT), Code::KeyR)
}

/// Extension trait for Config to handle hotkeys.
pub trait ConfigExt {
    /// Get the hotkey, parsing from config or using default.
    fn hotkey(&self) -> HotKey;
}

impl ConfigExt for Config {
    fn hotkey(&self) -> HotKey {
        let Some(raw) = self.hotkey.as_deref() else {
            return default_hotkey();
        };
        match raw.parse::<HotKey>() {
            Ok(hotkey) => hotkey,
            Err(e) => {
                warn!(hotkey = raw, "Invalid hotkey in config, using default: {}", e);
                default_hotkey()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_hotkey_uses_default() {
        assert_eq!(Config::default().hotkey(), default_hotkey());
    }

    #[test]
    fn test_hotkey_is_parsed() {
        let config = Config {
            hotkey: Some("shift+alt+KeyQ".to_string()),
            ..Default::default()
        };
        assert_eq!(
            config.hotkey(),
            HotKey::new(Some(Modifiers::SHIFT | Modifiers::ALT), Code::KeyQ)
        );
    }

    #[test]
    fn test_invalid_hotkey_falls_back() {
        let config = Config {
            hotkey: Some("not a hotkey+".to_string()),
            ..Default::default()
        };
        assert_eq!(config.hotkey(), default_hotkey());
    }
}

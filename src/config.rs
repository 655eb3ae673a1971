use anyhow::{Context, Result};
use log::warn;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::languages::{self, LanguagePair};

pub const DEFAULT_ENDPOINT: &str = "https://translate.googleapis.com/translate_a/single";

/// Read-only settings. Nothing here is written back at runtime.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub source_lang: String,
    pub target_lang: String,
    pub hotkey: String,
    pub copy_delay_ms: u64,
    pub endpoint: String,
    pub request_timeout_secs: u64,
    pub popup_max_height: f32,
    pub icon_path: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_lang: languages::AUTO.to_string(),
            target_lang: "ru".to_string(),
            hotkey: "ctrl+c".to_string(),
            copy_delay_ms: 100,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: 30,
            popup_max_height: 900.0,
            icon_path: "image.png".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn path() -> PathBuf {
        let exe = std::env::current_exe().unwrap_or_else(|_| PathBuf::from("."));
        let dir = exe.parent().unwrap_or(Path::new("."));
        dir.join("config.json")
    }

    /// Loads `config.json` next to the executable, then applies environment
    /// overrides. A missing file is not an error.
    pub fn load() -> Self {
        let path = Self::path();
        let mut cfg = if path.exists() {
            Self::load_from(&path).unwrap_or_else(|e| {
                warn!("Ignoring {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        };
        cfg.apply_env(|key| std::env::var(key).ok());
        cfg.sanitize();
        cfg
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let cfg = serde_json::from_str::<Config>(&s)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(cfg)
    }

    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = non_empty("SOURCE_LANG") {
            self.source_lang = v;
        }
        if let Some(v) = non_empty("TARGET_LANG") {
            self.target_lang = v;
        }
        if let Some(v) = non_empty("TRANSLATOR_ENDPOINT") {
            self.endpoint = v;
        }
        if let Some(v) = non_empty("SMART_TRANSLATOR_LOG") {
            self.log_level = v;
        }
    }

    /// Replaces language codes the pickers cannot show with the defaults.
    pub fn sanitize(&mut self) {
        let defaults = Self::default();
        if !languages::is_valid_source(&self.source_lang) {
            warn!("Unknown source language '{}', using '{}'", self.source_lang, defaults.source_lang);
            self.source_lang = defaults.source_lang;
        }
        if !languages::is_valid_target(&self.target_lang) {
            warn!("Unknown target language '{}', using '{}'", self.target_lang, defaults.target_lang);
            self.target_lang = defaults.target_lang;
        }
        if self.popup_max_height <= 0.0 {
            self.popup_max_height = defaults.popup_max_height;
        }
    }

    pub fn language_pair(&self) -> LanguagePair {
        LanguagePair::new(self.source_lang.clone(), self.target_lang.clone())
    }

    pub fn copy_delay(&self) -> Duration {
        Duration::from_millis(self.copy_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn icon_file(&self) -> PathBuf {
        let p = PathBuf::from(&self.icon_path);
        if p.is_absolute() {
            p
        } else {
            crate::logger::exe_dir().join(p)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults_for_missing_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "target_lang": "de", "copy_delay_ms": 50 }}"#).unwrap();

        let cfg = Config::load_from(file.path()).unwrap();
        assert_eq!(cfg.target_lang, "de");
        assert_eq!(cfg.copy_delay(), Duration::from_millis(50));
        assert_eq!(cfg.source_lang, "auto");
        assert_eq!(cfg.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(Config::load_from(file.path()).is_err());
    }

    #[test]
    fn env_overrides_skip_empty_values() {
        let env: HashMap<&str, &str> =
            [("TARGET_LANG", "fr"), ("SOURCE_LANG", "  "), ("SMART_TRANSLATOR_LOG", "debug")]
                .into_iter()
                .collect();
        let mut cfg = Config::default();
        cfg.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(cfg.target_lang, "fr");
        assert_eq!(cfg.source_lang, "auto");
        assert_eq!(cfg.log_level, "debug");
    }

    #[test]
    fn sanitize_rejects_auto_target_and_unknown_codes() {
        let mut cfg = Config {
            source_lang: "xx".into(),
            target_lang: "auto".into(),
            popup_max_height: -1.0,
            ..Config::default()
        };
        cfg.sanitize();
        assert_eq!(cfg.language_pair(), LanguagePair::new("auto", "ru"));
        assert_eq!(cfg.popup_max_height, 900.0);
    }
}

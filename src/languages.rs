//! Languages offered in the pickers and the source/target pair.

pub const AUTO: &str = "auto";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    pub name: &'static str,
    pub code: &'static str,
}

pub const LANGUAGES: &[Language] = &[
    Language { name: "Auto-detect", code: AUTO },
    Language { name: "Russian", code: "ru" },
    Language { name: "English", code: "en" },
    Language { name: "French", code: "fr" },
    Language { name: "German", code: "de" },
    Language { name: "Spanish", code: "es" },
    Language { name: "Italian", code: "it" },
    Language { name: "Chinese", code: "zh" },
    Language { name: "Japanese", code: "ja" },
    Language { name: "Korean", code: "ko" },
    Language { name: "Portuguese", code: "pt" },
    Language { name: "Arabic", code: "ar" },
];

/// Everything the source picker shows, Auto-detect first.
pub fn source_languages() -> &'static [Language] {
    LANGUAGES
}

/// Target picker entries: the table without Auto-detect.
pub fn target_languages() -> impl Iterator<Item = &'static Language> {
    LANGUAGES.iter().filter(|l| l.code != AUTO)
}

pub fn by_code(code: &str) -> Option<&'static Language> {
    LANGUAGES.iter().find(|l| l.code == code)
}

pub fn display_name(code: &str) -> &str {
    by_code(code).map(|l| l.name).unwrap_or(code)
}

pub fn is_valid_source(code: &str) -> bool {
    by_code(code).is_some()
}

pub fn is_valid_target(code: &str) -> bool {
    code != AUTO && by_code(code).is_some()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePair {
    pub source: String,
    pub target: String,
}

impl LanguagePair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

impl Default for LanguagePair {
    fn default() -> Self {
        Self::new(AUTO, "ru")
    }
}

impl std::fmt::Display for LanguagePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}

//! Remote translation through the public Google Translate endpoint.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde_json::Value;
use thiserror::Error;

use crate::config::Config;
use crate::languages::{self, LanguagePair};

/// The service rejects payloads of this many characters or more.
pub const MAX_CHARS: usize = 5000;

#[derive(Debug, Error)]
pub enum TranslationError {
    #[error("language '{0}' is not supported")]
    UnsupportedLanguage(String),
    #[error("nothing to translate")]
    EmptyInput,
    #[error("text is {len} characters long, the limit is {max}")]
    TooLong { len: usize, max: usize },
    #[error("failed to build HTTP client: {0}")]
    Client(String),
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("translation service returned HTTP {0}")]
    Status(u16),
    #[error("unexpected response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait Translate: Send + Sync {
    fn pair(&self) -> &LanguagePair;

    async fn translate(&self, text: &str) -> Result<String, TranslationError>;
}

#[derive(Debug, Clone)]
pub struct TranslatorSettings {
    pub endpoint: String,
    pub timeout: Duration,
}

impl From<&Config> for TranslatorSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            endpoint: cfg.endpoint.clone(),
            timeout: cfg.request_timeout(),
        }
    }
}

pub struct GoogleTranslator {
    pair: LanguagePair,
    endpoint: String,
    client: reqwest::Client,
}

impl GoogleTranslator {
    pub fn new(pair: LanguagePair, settings: &TranslatorSettings) -> Result<Self, TranslationError> {
        if !languages::is_valid_source(&pair.source) {
            return Err(TranslationError::UnsupportedLanguage(pair.source));
        }
        if !languages::is_valid_target(&pair.target) {
            return Err(TranslationError::UnsupportedLanguage(pair.target));
        }
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| TranslationError::Client(e.to_string()))?;
        Ok(Self {
            pair,
            endpoint: settings.endpoint.clone(),
            client,
        })
    }
}

#[async_trait]
impl Translate for GoogleTranslator {
    fn pair(&self) -> &LanguagePair {
        &self.pair
    }

    async fn translate(&self, text: &str) -> Result<String, TranslationError> {
        let len = text.chars().count();
        if len >= MAX_CHARS {
            return Err(TranslationError::TooLong { len, max: MAX_CHARS });
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(TranslationError::EmptyInput);
        }
        if self.pair.source == self.pair.target {
            return Ok(text.to_string());
        }

        debug!("Translating {} chars ({})", len, self.pair);
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("client", "gtx"),
                ("sl", self.pair.source.as_str()),
                ("tl", self.pair.target.as_str()),
                ("dt", "t"),
                ("q", text),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(TranslationError::Status(resp.status().as_u16()));
        }

        let body: Value = resp
            .json()
            .await
            .map_err(|e| TranslationError::Malformed(e.to_string()))?;
        parse_response(&body)
    }
}

/// Joins the translated segments of a `translate_a/single` response.
///
/// The body looks like `[[["Привет, ","Hello, ",..],["мир","world",..]],null,"en",..]`.
fn parse_response(body: &Value) -> Result<String, TranslationError> {
    let segments = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslationError::Malformed("missing sentence list".into()))?;

    let out: String = segments
        .iter()
        .filter_map(|seg| seg.get(0).and_then(Value::as_str))
        .collect();

    if out.trim().is_empty() {
        return Err(TranslationError::Malformed("empty translation".into()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(endpoint: String) -> TranslatorSettings {
        TranslatorSettings {
            endpoint,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn rejects_unknown_languages_at_construction() {
        let s = settings("http://localhost".into());
        let err = GoogleTranslator::new(LanguagePair::new("auto", "auto"), &s).err().unwrap();
        assert!(matches!(err, TranslationError::UnsupportedLanguage(code) if code == "auto"));
        let err = GoogleTranslator::new(LanguagePair::new("xx", "en"), &s).err().unwrap();
        assert!(matches!(err, TranslationError::UnsupportedLanguage(code) if code == "xx"));
    }

    #[test]
    fn joins_all_segments() {
        let body = json!([[["Привет, ", "Hello, ", null, null, 10], ["мир!", "world!", null, null, 10]], null, "en"]);
        assert_eq!(parse_response(&body).unwrap(), "Привет, мир!");
    }

    #[test]
    fn malformed_bodies_are_errors() {
        assert!(matches!(parse_response(&json!({"error": "x"})), Err(TranslationError::Malformed(_))));
        assert!(matches!(parse_response(&json!([[]])), Err(TranslationError::Malformed(_))));
    }

    #[tokio::test]
    async fn sends_language_codes_and_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/translate_a/single"))
            .and(query_param("client", "gtx"))
            .and(query_param("sl", "auto"))
            .and(query_param("tl", "ru"))
            .and(query_param("q", "Hello, world!"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([[["Привет, мир!", "Hello, world!"]], null, "en"])))
            .expect(1)
            .mount(&server)
            .await;

        let t = GoogleTranslator::new(
            LanguagePair::new("auto", "ru"),
            &settings(format!("{}/translate_a/single", server.uri())),
        )
        .unwrap();
        assert_eq!(t.translate("  Hello, world!\n").await.unwrap(), "Привет, мир!");
    }

    #[tokio::test]
    async fn http_errors_are_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let t = GoogleTranslator::new(LanguagePair::new("en", "de"), &settings(server.uri())).unwrap();
        assert!(matches!(t.translate("Hello").await, Err(TranslationError::Status(429))));
    }

    #[tokio::test]
    async fn validates_input_without_network() {
        // Nothing listens here; any request would fail with Network.
        let t = GoogleTranslator::new(LanguagePair::new("en", "fr"), &settings("http://127.0.0.1:9".into())).unwrap();

        assert!(matches!(t.translate("   ").await, Err(TranslationError::EmptyInput)));
        let long = "a".repeat(MAX_CHARS);
        assert!(matches!(
            t.translate(&long).await,
            Err(TranslationError::TooLong { len: MAX_CHARS, max: MAX_CHARS })
        ));
    }

    #[tokio::test]
    async fn same_source_and_target_returns_input() {
        let t = GoogleTranslator::new(LanguagePair::new("en", "en"), &settings("http://127.0.0.1:9".into())).unwrap();
        assert_eq!(t.translate(" unchanged ").await.unwrap(), "unchanged");
    }
}

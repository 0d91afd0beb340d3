use std::time::Duration;

use huddle_config::TranslationSettings;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

/// Thin client for the optional per-segment translation endpoint.
/// Failure here is never fatal: callers keep the original text when no
/// translation comes back.
pub struct TranslationClient {
    http: reqwest::Client,
    url: String,
    target_language: String,
    max_attempts: u32,
    retry_delay: Duration,
}

impl TranslationClient {
    /// Returns `None` when no translation endpoint is configured.
    pub fn from_settings(settings: &TranslationSettings) -> Option<Self> {
        let url = settings.url.clone()?;
        Some(Self {
            http: reqwest::Client::new(),
            url,
            target_language: settings.target_language.clone(),
            max_attempts: settings.max_attempts.max(1),
            retry_delay: Duration::from_millis(settings.retry_delay_ms),
        })
    }

    pub fn is_target(&self, language: &str) -> bool {
        self.target_language.eq_ignore_ascii_case(language)
    }

    /// Translates one segment, retrying with a fixed inter-attempt delay.
    /// Returns `None` on persistent failure or empty output.
    pub async fn translate(&self, text: &str, source_language: &str) -> Option<String> {
        for attempt in 1..=self.max_attempts {
            match self.try_translate(text, source_language).await {
                Ok(translated) if !translated.trim().is_empty() => {
                    return Some(translated);
                }
                Ok(_) => {
                    debug!(attempt, "translation returned empty text");
                }
                Err(e) => {
                    debug!(attempt, %e, "translation attempt failed");
                }
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        warn!(
            attempts = self.max_attempts,
            "translation failed, keeping original text"
        );
        None
    }

    async fn try_translate(
        &self,
        text: &str,
        source_language: &str,
    ) -> Result<String, reqwest::Error> {
        let response = self
            .http
            .post(&self.url)
            .json(&TranslateRequest {
                q: text,
                source: source_language,
                target: &self.target_language,
            })
            .send()
            .await?
            .error_for_status()?
            .json::<TranslateResponse>()
            .await?;
        Ok(response.translated_text)
    }
}

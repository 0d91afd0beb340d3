use std::sync::Arc;
use std::time::Duration;

use huddle_config::TranscriptionSettings;
use rand::Rng;
use reqwest::StatusCode;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::CaptionSegment;
use crate::error::TranscriptionError;
use crate::gate::ConcurrencyGate;
use crate::normalizer::AudioNormalizer;
use crate::translate::TranslationClient;

/// Backoff cap for the exponential schedule.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Upper bound on the random jitter added to every backoff sleep.
const MAX_JITTER_MS: u64 = 500;

/// Captions shorter than this (after trimming) are noise and dropped.
const MIN_CAPTION_CHARS: usize = 3;

/// Result of one transcription request.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcription {
    pub captions: Vec<CaptionSegment>,
    pub language: String,
}

/// Wire shape of the upstream speech service's JSON reply.
#[derive(Debug, Deserialize)]
struct UpstreamResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    segments: Vec<UpstreamSegment>,
}

#[derive(Debug, Deserialize)]
struct UpstreamSegment {
    text: String,
    /// Segment start, seconds from clip start.
    #[serde(default)]
    start: f64,
    /// Segment end, seconds from clip start.
    #[serde(default)]
    end: f64,
    #[serde(default)]
    confidence: Option<f64>,
}

/// Transient upstream conditions eligible for another attempt.
enum RetryCause {
    RateLimited { retry_after: Option<Duration> },
    ServerError { status: StatusCode },
    Poison,
}

enum Attempt {
    Success(UpstreamResponse),
    Retry(RetryCause),
}

/// Client for the upstream speech-to-text worker: normalizes audio,
/// bounds system-wide concurrency through the gate, retries transient
/// upstream failures with exponential backoff, and filters the returned
/// segments.
pub struct TranscriptionClient {
    http: reqwest::Client,
    settings: TranscriptionSettings,
    gate: Arc<ConcurrencyGate>,
    normalizer: Arc<dyn AudioNormalizer>,
    translator: Option<TranslationClient>,
}

impl TranscriptionClient {
    pub fn new(
        settings: TranscriptionSettings,
        gate: Arc<ConcurrencyGate>,
        normalizer: Arc<dyn AudioNormalizer>,
        translator: Option<TranslationClient>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
            gate,
            normalizer,
            translator,
        }
    }

    /// Transcribes one captured clip. Holds a concurrency permit for the
    /// whole call; the permit is a guard, so it is released on success,
    /// failure and cancellation alike.
    pub async fn transcribe(
        &self,
        audio: Vec<u8>,
        mime_hint: Option<&str>,
        language: Option<&str>,
        translate: bool,
    ) -> Result<Transcription, TranscriptionError> {
        let _permit = self.gate.acquire().await;

        let wav = self.normalizer.normalize(&audio, mime_hint).await?;
        debug!(
            input_bytes = audio.len(),
            wav_bytes = wav.len(),
            "audio normalized for upstream"
        );

        let response = self.send_with_retries(&wav, language).await?;
        let detected = response.language.clone();
        let mut captions = collect_captions(response);

        let language = detected
            .or_else(|| language.map(str::to_string))
            .unwrap_or_else(|| "auto".to_string());

        if translate {
            if let Some(translator) = &self.translator {
                if !translator.is_target(&language) {
                    for segment in &mut captions {
                        segment.translated_text =
                            translator.translate(&segment.text, &language).await;
                    }
                }
            }
        }

        info!(
            captions = captions.len(),
            %language,
            "transcription complete"
        );
        Ok(Transcription { captions, language })
    }

    /// Iterative retry loop: attempts 1..=max_retries, exponential
    /// backoff between them. 429 honors Retry-After; 5xx and poison
    /// bodies use the computed schedule.
    async fn send_with_retries(
        &self,
        wav: &[u8],
        language: Option<&str>,
    ) -> Result<UpstreamResponse, TranscriptionError> {
        let max_attempts = self.settings.max_retries.max(1);
        let mut attempt = 1u32;

        loop {
            match self.send_once(wav, language).await? {
                Attempt::Success(response) => return Ok(response),
                Attempt::Retry(cause) => {
                    if attempt >= max_attempts {
                        return Err(exhausted(cause, attempt));
                    }

                    let base = match &cause {
                        RetryCause::RateLimited {
                            retry_after: Some(after),
                        } => *after,
                        _ => backoff_delay(attempt),
                    };
                    let delay = base + jitter();

                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        cause = cause_label(&cause),
                        "upstream attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn send_once(
        &self,
        wav: &[u8],
        language: Option<&str>,
    ) -> Result<Attempt, TranscriptionError> {
        let part = Part::bytes(wav.to_vec())
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(TranscriptionError::Transport)?;
        let mut form = Form::new().part("file", part);
        if let Some(lang) = language {
            form = form.text("language", lang.to_string());
        }

        let response = self
            .http
            .post(&self.settings.upstream_url)
            .timeout(Duration::from_secs(self.settings.timeout_secs))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TranscriptionError::UpstreamTimeout
                } else {
                    TranscriptionError::Transport(e)
                }
            })?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);
            return Ok(Attempt::Retry(RetryCause::RateLimited { retry_after }));
        }
        if status.is_server_error() {
            return Ok(Attempt::Retry(RetryCause::ServerError { status }));
        }
        if !status.is_success() {
            return Err(TranscriptionError::UpstreamRejected {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TranscriptionError::UpstreamTimeout
            } else {
                TranscriptionError::Transport(e)
            }
        })?;

        // An HTML error or proxy-challenge page arrives with a 2xx status;
        // it must never reach the JSON parser as a "result".
        if is_poison(&body) {
            return Ok(Attempt::Retry(RetryCause::Poison));
        }

        match serde_json::from_str::<UpstreamResponse>(&body) {
            Ok(parsed) => Ok(Attempt::Success(parsed)),
            Err(e) => {
                warn!(%e, "upstream body is not valid transcription JSON");
                Err(TranscriptionError::UpstreamMalformedResponse)
            }
        }
    }
}

fn exhausted(cause: RetryCause, attempts: u32) -> TranscriptionError {
    match cause {
        RetryCause::RateLimited { .. } => TranscriptionError::UpstreamRateLimited { attempts },
        RetryCause::ServerError { status } => TranscriptionError::UpstreamServerError {
            status: status.as_u16(),
            attempts,
        },
        RetryCause::Poison => TranscriptionError::UpstreamMalformedResponse,
    }
}

fn cause_label(cause: &RetryCause) -> &'static str {
    match cause {
        RetryCause::RateLimited { .. } => "rate_limited",
        RetryCause::ServerError { .. } => "server_error",
        RetryCause::Poison => "poison_body",
    }
}

/// Exponential backoff for the given 1-based failed attempt:
/// 1s, 2s, 4s, ... capped at 30s. Jitter is added separately.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(10);
    Duration::from_secs(1u64 << exponent).min(MAX_BACKOFF)
}

fn jitter() -> Duration {
    Duration::from_millis(rand::rng().random_range(0..=MAX_JITTER_MS))
}

/// A body that opens with `<` is an HTML error/challenge page, not JSON.
pub(crate) fn is_poison(body: &str) -> bool {
    body.trim_start().starts_with('<')
}

/// Maps the upstream reply to caption segments, dropping noise captions
/// (trimmed length below `MIN_CAPTION_CHARS`). A segment-less reply with
/// plain text yields one whole-clip segment.
fn collect_captions(response: UpstreamResponse) -> Vec<CaptionSegment> {
    let mut captions: Vec<CaptionSegment> = response
        .segments
        .into_iter()
        .filter_map(|segment| {
            let text = segment.text.trim().to_string();
            if text.chars().count() < MIN_CAPTION_CHARS {
                return None;
            }
            let start_ms = (segment.start.max(0.0) * 1000.0) as u64;
            let end_ms = (segment.end.max(0.0) * 1000.0) as u64;
            Some(CaptionSegment {
                text,
                confidence: segment.confidence.unwrap_or(1.0).clamp(0.0, 1.0),
                timestamp_ms: start_ms,
                duration_ms: end_ms.saturating_sub(start_ms),
                is_final: true,
                translated_text: None,
            })
        })
        .collect();

    if captions.is_empty() {
        let text = response.text.trim().to_string();
        if text.chars().count() >= MIN_CAPTION_CHARS {
            captions.push(CaptionSegment {
                text,
                confidence: 1.0,
                timestamp_ms: 0,
                duration_ms: 0,
                is_final: true,
                translated_text: None,
            });
        }
    }

    captions
}

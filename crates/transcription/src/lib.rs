pub mod client;
pub mod error;
pub mod gate;
pub mod normalizer;
pub mod translate;

pub use client::{Transcription, TranscriptionClient};
pub use error::{NormalizeError, TranscriptionError};
pub use gate::{ConcurrencyGate, Permit};
pub use normalizer::{AudioNormalizer, FfmpegNormalizer};
pub use translate::TranslationClient;

use serde::{Deserialize, Serialize};

/// One transcribed utterance, optionally enriched with a translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptionSegment {
    pub text: String,
    /// Recognition confidence in [0, 1].
    pub confidence: f64,
    pub timestamp_ms: u64,
    pub duration_ms: u64,
    pub is_final: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
}

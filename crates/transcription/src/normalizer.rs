use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::NormalizeError;

/// Canonical target format for the upstream speech service: mono 16 kHz
/// PCM WAV.
const TARGET_SAMPLE_RATE: &str = "16000";

/// Fallback container hypotheses tried when the primary guess fails.
/// Heuristic by design; no sniffing covers every codec browsers emit.
const FALLBACK_EXTENSIONS: [&str; 5] = ["webm", "ogg", "wav", "mp4", "mp3"];

/// Cap on alternative container guesses after the first attempt fails.
const MAX_ALTERNATE_GUESSES: usize = 4;

/// Converts captured audio into the canonical transcription input format.
#[async_trait]
pub trait AudioNormalizer: Send + Sync {
    async fn normalize(
        &self,
        audio: &[u8],
        mime_hint: Option<&str>,
    ) -> Result<Vec<u8>, NormalizeError>;
}

/// Production normalizer: shells out to ffmpeg on tempfile paths.
/// ffmpeg picks its demuxer from the input extension, so each container
/// hypothesis is a fresh invocation with a differently named input file.
pub struct FfmpegNormalizer {
    ffmpeg_path: String,
}

impl FfmpegNormalizer {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    async fn try_convert(&self, audio: &[u8], extension: &str) -> Result<Vec<u8>, NormalizeError> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join(format!("capture.{extension}"));
        let output = dir.path().join("normalized.wav");

        tokio::fs::write(&input, audio).await?;

        let result = Command::new(&self.ffmpeg_path)
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .arg("-y")
            .arg("-i")
            .arg(&input)
            .arg("-vn")
            .args(["-ac", "1"])
            .args(["-ar", TARGET_SAMPLE_RATE])
            .args(["-f", "wav"])
            .arg(&output)
            .output()
            .await;

        let out = match result {
            Ok(out) => out,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(NormalizeError::FfmpegUnavailable(self.ffmpeg_path.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            debug!(%extension, %stderr, "ffmpeg rejected container guess");
            return Err(NormalizeError::Exhausted {
                tried: vec![extension.to_string()],
            });
        }

        let bytes = tokio::fs::read(&output).await?;
        if bytes.is_empty() {
            return Err(NormalizeError::Exhausted {
                tried: vec![extension.to_string()],
            });
        }
        Ok(bytes)
    }
}

#[async_trait]
impl AudioNormalizer for FfmpegNormalizer {
    async fn normalize(
        &self,
        audio: &[u8],
        mime_hint: Option<&str>,
    ) -> Result<Vec<u8>, NormalizeError> {
        let candidates = candidate_extensions(audio, mime_hint);
        let mut tried = Vec::new();

        for extension in &candidates {
            match self.try_convert(audio, extension).await {
                Ok(wav) => {
                    debug!(%extension, bytes = wav.len(), "audio normalized");
                    return Ok(wav);
                }
                Err(NormalizeError::Exhausted { .. }) => {
                    tried.push(extension.to_string());
                }
                Err(fatal) => return Err(fatal),
            }
        }

        warn!(?tried, "audio normalization exhausted all container guesses");
        Err(NormalizeError::Exhausted { tried })
    }
}

/// Ordered container hypotheses: the mime hint first, then the sniffed
/// magic bytes, then the remaining fallbacks, capped at one primary plus
/// four alternates.
pub(crate) fn candidate_extensions(audio: &[u8], mime_hint: Option<&str>) -> Vec<&'static str> {
    let mut candidates = Vec::new();
    let mut push = |ext: &'static str| {
        if !candidates.contains(&ext) {
            candidates.push(ext);
        }
    };

    if let Some(ext) = mime_hint.and_then(extension_for_mime) {
        push(ext);
    }
    if let Some(ext) = sniff_extension(audio) {
        push(ext);
    }
    for ext in FALLBACK_EXTENSIONS {
        push(ext);
    }

    candidates.truncate(1 + MAX_ALTERNATE_GUESSES);
    candidates
}

fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or(mime).trim();
    match essence {
        "audio/webm" | "video/webm" => Some("webm"),
        "audio/ogg" | "application/ogg" | "audio/opus" => Some("ogg"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/mp4" | "video/mp4" | "audio/m4a" | "audio/x-m4a" => Some("mp4"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        _ => None,
    }
}

fn sniff_extension(audio: &[u8]) -> Option<&'static str> {
    if audio.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) {
        return Some("webm");
    }
    if audio.starts_with(b"OggS") {
        return Some("ogg");
    }
    if audio.starts_with(b"RIFF") {
        return Some("wav");
    }
    if audio.len() >= 12 && &audio[4..8] == b"ftyp" {
        return Some("mp4");
    }
    if audio.starts_with(b"ID3") || (audio.len() >= 2 && audio[0] == 0xFF && audio[1] & 0xE0 == 0xE0)
    {
        return Some("mp3");
    }
    None
}

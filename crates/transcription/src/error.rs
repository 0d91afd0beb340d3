use thiserror::Error;

/// Failure of the audio normalization step.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("ffmpeg unavailable: {0}")]
    FfmpegUnavailable(String),
    #[error("no audio container variant decoded (tried: {})", tried.join(", "))]
    Exhausted { tried: Vec<String> },
    #[error("normalizer io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Typed failures surfaced by the transcription pipeline. Transient
/// upstream conditions appear here only after the retry budget is spent.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("upstream rate limited after {attempts} attempts")]
    UpstreamRateLimited { attempts: u32 },
    #[error("upstream server error {status} after {attempts} attempts")]
    UpstreamServerError { status: u16, attempts: u32 },
    #[error("upstream kept returning a non-JSON body")]
    UpstreamMalformedResponse,
    #[error("upstream request timed out")]
    UpstreamTimeout,
    #[error("upstream rejected the request with status {status}")]
    UpstreamRejected { status: u16 },
    #[error(transparent)]
    NormalizationFailed(#[from] NormalizeError),
    #[error("upstream transport error: {0}")]
    Transport(reqwest::Error),
}

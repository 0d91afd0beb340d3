use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub app: AppSettings,
    pub ice: IceSettings,
    pub transcription: TranscriptionSettings,
    pub translation: TranslationSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSettings {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

/// STUN/TURN configuration handed to joining peers so they can build
/// their RTCPeerConnection. The relay itself never opens media sockets.
#[derive(Debug, Deserialize, Clone)]
pub struct IceSettings {
    pub stun_urls: Vec<String>,
    pub turn_url: Option<String>,
    pub turn_username: Option<String>,
    pub turn_password: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranscriptionSettings {
    /// Upstream speech-to-text endpoint (multipart POST).
    pub upstream_url: String,
    /// System-wide cap on in-flight upstream requests.
    pub max_concurrent: usize,
    /// Total upstream attempts per request (first try included).
    pub max_retries: u32,
    /// Per-request timeout for the upstream call, in seconds.
    pub timeout_secs: u64,
    /// ffmpeg binary used for audio normalization.
    pub ffmpeg_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TranslationSettings {
    /// Translation endpoint. None disables translation entirely.
    pub url: Option<String>,
    /// Language that caption segments are translated into.
    pub target_language: String,
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::default()
                    .separator("__")
                    .prefix("HUDDLE"),
            )
            .set_default("app.host", "0.0.0.0")?
            .set_default("app.port", 3000)?
            .set_default("app.cors_origins", Vec::<String>::new())?
            .set_default(
                "ice.stun_urls",
                vec!["stun:stun.l.google.com:19302".to_string()],
            )?
            .set_default("ice.turn_url", None::<String>)?
            .set_default("ice.turn_username", None::<String>)?
            .set_default("ice.turn_password", None::<String>)?
            .set_default("transcription.upstream_url", "http://localhost:9000/asr")?
            .set_default("transcription.max_concurrent", 2)?
            .set_default("transcription.max_retries", 5)?
            .set_default("transcription.timeout_secs", 600)?
            .set_default("transcription.ffmpeg_path", "ffmpeg")?
            .set_default("translation.url", None::<String>)?
            .set_default("translation.target_language", "en")?
            .set_default("translation.max_attempts", 3)?
            .set_default("translation.retry_delay_ms", 500)?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::load().expect("Failed to load default settings")
    }
}

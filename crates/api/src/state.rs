use huddle_config::Settings;
use huddle_signaling::{ConnectionRegistry, SignalingRelay};
use huddle_transcription::{
    ConcurrencyGate, FfmpegNormalizer, TranscriptionClient, TranslationClient,
};
use std::sync::Arc;

use crate::ws::dispatcher::WsSignalSink;
use crate::ws::storage::WsStorage;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub registry: Arc<ConnectionRegistry>,
    pub relay: Arc<SignalingRelay>,
    pub ws_storage: Arc<WsStorage>,
    pub transcription: Arc<TranscriptionClient>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let ws_storage = Arc::new(WsStorage::new());
        let registry = Arc::new(ConnectionRegistry::new());
        let sink = Arc::new(WsSignalSink::new(ws_storage.clone()));
        let relay = Arc::new(SignalingRelay::new(
            registry.clone(),
            sink,
            &settings.ice,
        ));

        let gate = ConcurrencyGate::new(settings.transcription.max_concurrent);
        let normalizer = Arc::new(FfmpegNormalizer::new(
            settings.transcription.ffmpeg_path.clone(),
        ));
        let translator = TranslationClient::from_settings(&settings.translation);
        let transcription = Arc::new(TranscriptionClient::new(
            settings.transcription.clone(),
            gate,
            normalizer,
            translator,
        ));

        Self {
            settings,
            registry,
            relay,
            ws_storage,
            transcription,
        }
    }
}

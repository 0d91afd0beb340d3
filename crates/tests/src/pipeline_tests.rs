use std::sync::Arc;
use std::time::Duration;

use axum::{Json, Router, routing::post};
use huddle_transcription::{
    ConcurrencyGate, TranscriptionClient, TranscriptionError, TranslationClient,
};
use tokio::net::TcpListener;

use crate::fixtures::PassthroughNormalizer;
use crate::fixtures::test_app::test_settings;
use crate::fixtures::upstream_stub::{StubReply, UpstreamStub, success_body};

fn client_for(
    stub: &UpstreamStub,
    max_retries: u32,
    max_concurrent: usize,
    timeout_secs: u64,
) -> Arc<TranscriptionClient> {
    let mut settings = test_settings().transcription;
    settings.upstream_url = stub.url.clone();
    settings.max_retries = max_retries;
    settings.max_concurrent = max_concurrent;
    settings.timeout_secs = timeout_secs;

    Arc::new(TranscriptionClient::new(
        settings,
        ConcurrencyGate::new(max_concurrent),
        Arc::new(PassthroughNormalizer),
        None,
    ))
}

fn webm_header() -> Vec<u8> {
    vec![0x1A, 0x45, 0xDF, 0xA3, 0, 0, 0, 0]
}

#[tokio::test]
async fn backoff_gaps_grow_with_each_server_error() {
    let stub = UpstreamStub::spawn(
        vec![StubReply::server_error(), StubReply::server_error()],
        StubReply::ok_json(success_body()),
    )
    .await;
    let client = client_for(&stub, 3, 2, 10);

    let result = client
        .transcribe(webm_header(), Some("audio/webm"), Some("en"), false)
        .await
        .unwrap();
    assert_eq!(result.captions.len(), 2);

    assert_eq!(stub.hit_count(), 3);
    let gaps = stub.hit_gaps();
    // schedule: 1s then 2s (plus jitter), never shrinking
    assert!(gaps[0] >= Duration::from_secs(1), "first gap {gaps:?}");
    assert!(gaps[1] >= Duration::from_secs(2), "second gap {gaps:?}");
}

#[tokio::test]
async fn retry_after_header_overrides_backoff() {
    let stub = UpstreamStub::spawn(
        vec![StubReply::rate_limited(Some(2))],
        StubReply::ok_json(success_body()),
    )
    .await;
    let client = client_for(&stub, 3, 2, 10);

    client
        .transcribe(webm_header(), Some("audio/webm"), None, false)
        .await
        .unwrap();

    assert_eq!(stub.hit_count(), 2);
    let gaps = stub.hit_gaps();
    // the computed schedule would wait ~1s after a first failure; the
    // 2s Retry-After must win
    assert!(gaps[0] >= Duration::from_secs(2), "Retry-After ignored: {gaps:?}");
}

#[tokio::test]
async fn server_error_exhaustion_surfaces_typed_error() {
    let stub = UpstreamStub::always(StubReply::server_error()).await;
    let client = client_for(&stub, 2, 2, 10);

    let err = client
        .transcribe(webm_header(), None, None, false)
        .await
        .unwrap_err();

    match err {
        TranscriptionError::UpstreamServerError { status, attempts } => {
            assert_eq!(status, 500);
            assert_eq!(attempts, 2);
        }
        other => panic!("expected UpstreamServerError, got {other:?}"),
    }
    assert_eq!(stub.hit_count(), 2);
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let stub =
        UpstreamStub::always(StubReply::ok_json(success_body()).with_delay(3000)).await;
    let client = client_for(&stub, 1, 2, 1);

    let err = client
        .transcribe(webm_header(), None, None, false)
        .await
        .unwrap_err();

    assert!(matches!(err, TranscriptionError::UpstreamTimeout));
}

#[tokio::test]
async fn gate_serializes_upstream_calls_when_saturated() {
    let stub = UpstreamStub::always(StubReply::ok_json(success_body()).with_delay(150)).await;
    let client = client_for(&stub, 1, 1, 10);

    let first = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .transcribe(webm_header(), None, None, false)
                .await
                .unwrap()
        })
    };
    let second = {
        let client = client.clone();
        tokio::spawn(async move {
            client
                .transcribe(webm_header(), None, None, false)
                .await
                .unwrap()
        })
    };

    first.await.unwrap();
    second.await.unwrap();

    assert_eq!(stub.hit_count(), 2);
    let gaps = stub.hit_gaps();
    // the second upstream call starts only after the first holder's
    // response (150ms) completes and its permit is released
    assert!(
        gaps[0] >= Duration::from_millis(150),
        "second call overlapped the first: {gaps:?}"
    );
}

#[tokio::test]
async fn translation_enriches_segments_on_success() {
    let stub = UpstreamStub::always(StubReply::ok_json(success_body())).await;

    // minimal translation endpoint that always answers in German
    let translate_app = Router::new().route(
        "/translate",
        post(|| async { Json(serde_json::json!({ "translatedText": "hallo da" })) }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let translate_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, translate_app).await.unwrap();
    });

    let mut translation = test_settings().translation;
    translation.url = Some(format!("http://{}/translate", translate_addr));
    translation.target_language = "de".to_string();
    let translator = TranslationClient::from_settings(&translation);

    let mut settings = test_settings().transcription;
    settings.upstream_url = stub.url.clone();
    let client = TranscriptionClient::new(
        settings,
        ConcurrencyGate::new(2),
        Arc::new(PassthroughNormalizer),
        translator,
    );

    let result = client
        .transcribe(webm_header(), Some("audio/webm"), Some("en"), true)
        .await
        .unwrap();

    assert_eq!(result.language, "en");
    for caption in &result.captions {
        assert_eq!(caption.translated_text.as_deref(), Some("hallo da"));
    }
}

#[tokio::test]
async fn translation_skipped_when_already_in_target_language() {
    let stub = UpstreamStub::always(StubReply::ok_json(success_body())).await;

    let mut translation = test_settings().translation;
    // any endpoint would do; it must never be called
    translation.url = Some("http://127.0.0.1:9/translate".to_string());
    translation.target_language = "en".to_string();
    let translator = TranslationClient::from_settings(&translation);

    let mut settings = test_settings().transcription;
    settings.upstream_url = stub.url.clone();
    let client = TranscriptionClient::new(
        settings,
        ConcurrencyGate::new(2),
        Arc::new(PassthroughNormalizer),
        translator,
    );

    let result = client
        .transcribe(webm_header(), None, Some("en"), true)
        .await
        .unwrap();

    // detected language equals the target: originals pass through untouched
    for caption in &result.captions {
        assert!(caption.translated_text.is_none());
    }
}

use axum::{Json, extract::{Multipart, State}};
use huddle_transcription::CaptionSegment;
use serde::Serialize;
use tracing::debug;

use crate::{error::ApiError, state::AppState};

#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub captions: Vec<CaptionSegment>,
    pub language: String,
}

/// Transcribe a captured audio clip via multipart form data.
/// Fields: `file` (binary), `language` (text, optional),
/// `translate` (text "true"/"false", optional)
pub async fn transcribe(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<TranscribeResponse>, ApiError> {
    let mut audio: Option<(Option<String>, Vec<u8>)> = None; // (content_type, bytes)
    let mut language: Option<String> = None;
    let mut translate = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let content_type = field.content_type().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file: {}", e)))?;
                audio = Some((content_type, bytes.to_vec()));
            }
            "language" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid language field: {}", e)))?;
                if !value.trim().is_empty() {
                    language = Some(value.trim().to_string());
                }
            }
            "translate" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Invalid translate field: {}", e)))?;
                translate = value.trim().eq_ignore_ascii_case("true");
            }
            _ => {}
        }
    }

    let (mime_hint, bytes) =
        audio.ok_or_else(|| ApiError::BadRequest("Missing file part".to_string()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Empty audio payload".to_string()));
    }

    debug!(
        bytes = bytes.len(),
        mime_hint = mime_hint.as_deref().unwrap_or("-"),
        language = language.as_deref().unwrap_or("auto"),
        translate,
        "transcription requested"
    );

    let result = state
        .transcription
        .transcribe(bytes, mime_hint.as_deref(), language.as_deref(), translate)
        .await?;

    Ok(Json(TranscribeResponse {
        captions: result.captions,
        language: result.language,
    }))
}

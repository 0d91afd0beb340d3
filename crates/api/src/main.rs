use huddle_api::{build_router, state::AppState};
use huddle_config::Settings;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "huddle_api=debug,huddle_signaling=debug,huddle_transcription=debug,tower_http=debug"
                .into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load config
    let settings = Settings::load()?;
    info!("Starting Huddle API on {}:{}", settings.app.host, settings.app.port);
    info!(
        upstream_url = %settings.transcription.upstream_url,
        max_concurrent = settings.transcription.max_concurrent,
        max_retries = settings.transcription.max_retries,
        translation = ?settings.translation.url,
        "Transcription config"
    );

    // Build app state
    let app_state = AppState::new(settings.clone());

    // Build router
    let app = build_router(app_state);

    // Start server
    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

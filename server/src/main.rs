use std::sync::Arc;

use docqa_lib::config::ServerConfig;
use docqa_lib::{build_app, build_pipeline, AppState};
use dqa_core::error::AppError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    tracing::info!(
        documents = %config.pipeline.documents_dir.display(),
        index = %config.pipeline.index_path.display(),
        chat_model = %config.pipeline.chat_model,
        embedding_model = %config.pipeline.embedding_model,
        "configuration loaded"
    );
    if config.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; provider calls will be rejected");
    }

    let pipeline = build_pipeline(&config)?;
    let app = build_app(AppState::new(
        Arc::new(pipeline),
        config.question.as_str(),
        config.run_timeout,
    ));

    let addr = config.bind_addr();
    let listener = docqa_lib::bind_listener(&addr).await?;
    tracing::info!("listening on http://{addr} (GET /chat, GET /health)");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::new("SERVER_ERROR", "HTTP server failed").with_details(e.to_string()))?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown requested"),
        Err(e) => {
            tracing::warn!(error = %e, "failed to install Ctrl-C handler; running until killed");
            std::future::pending::<()>().await;
        }
    }
}

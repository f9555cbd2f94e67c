use anyhow::{Context, Result};
use axum::http::Method;
use dotenv::dotenv;
use std::sync::Arc;
use summarizer_api::{api, config::Config, logging, openai::OpenAiSummarizer, store::ArtifactStore};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    // Logging
    logging::init_logging();

    let config = Config::from_env().context("invalid configuration")?;

    let summarizer = OpenAiSummarizer::new(config.provider.clone())
        .context("failed to build provider HTTP client")?;

    let api_router = api::routes(api::AppState {
        summarizer: Arc::new(summarizer),
        store: ArtifactStore::new(config.summary_dir.clone()),
        max_text_length: config.max_text_length,
        persist_summaries: config.persist_summaries,
        client_api_key: config.client_api_key.clone(),
    });

    // CORS (allow any origin/method/header)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    let mut app = axum::Router::new().merge(api_router);
    if let Some(dir) = &config.static_dir {
        let static_service = ServeDir::new(dir).not_found_service(ServeFile::new(dir.join("index.html")));
        app = app.fallback_service(static_service);
    }
    let app = app.layer(TraceLayer::new_for_http()).layer(cors);

    // Bind
    let addr = config.socket_addr()?;
    tracing::info!(
        model = %config.provider.model,
        persist = config.persist_summaries,
        api_key_check = config.client_api_key.is_some(),
        "listening on http://{}",
        addr
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutting down");
}

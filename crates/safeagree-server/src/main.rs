//! SafeAgree analysis server.
//!
//! Wires the pipeline together from environment configuration and serves the
//! HTTP API. Providers come from `GROQ_API_KEY` / `SAMBANOVA_API_KEY` /
//! `SAFEAGREE_OPENAI_COMPAT_*`; missing keys simply mean a shorter failover
//! chain.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use safeagree_pipeline::{
    default_http_client, Analyzer, AnalyzerConfig, Assistant, Extractor, ExtractorConfig,
    FailoverChain, KnownServices, Shortener,
};
use safeagree_server::api::{router, AppState};

#[derive(Parser, Debug)]
#[command(name = "safeagree-server")]
#[command(about = "Legal document risk analysis API")]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8787", env = "SAFEAGREE_PORT")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let client = default_http_client()?;
    let chain = Arc::new(FailoverChain::from_env(client.clone()));
    if chain.provider_names().is_empty() {
        warn!("no completion providers configured; analysis requests will fail until keys are set");
    } else {
        info!(providers = ?chain.provider_names(), "failover chain ready");
    }

    let mut extractor_cfg = ExtractorConfig::default();
    if let Ok(base) = std::env::var("SAFEAGREE_READER_BASE_URL") {
        let base = base.trim().to_string();
        extractor_cfg.reader_base_url = if base.is_empty() { None } else { Some(base) };
    }

    let state = AppState {
        analyzer: Arc::new(Analyzer::new(
            Extractor::new(client.clone(), extractor_cfg),
            KnownServices::builtin(),
            chain.clone(),
            AnalyzerConfig::default(),
        )),
        assistant: Arc::new(Assistant::new(chain)),
        shortener: Arc::new(Shortener::new(client)),
    };

    let app = router(state).layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port)).await?;
    info!(port = args.port, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

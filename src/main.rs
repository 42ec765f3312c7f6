use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use interview_sessions::{
    create_router, AppState, Config, MemoryStore, NatsClient, SessionManager, SpeechFeed,
};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "interview-sessions", about = "Interview session lifecycle service")]
struct Args {
    /// Config file path (extension optional)
    #[arg(short, long, default_value = "config/interview-sessions")]
    config: String,

    /// Override the HTTP bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)?;
    if let Some(bind) = args.bind {
        cfg.service.http.bind = bind;
    }
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));
    info!(
        "Access window: {} min before to {} min after scheduled time",
        cfg.access.open_before_minutes, cfg.access.close_after_minutes
    );

    let store = Arc::new(MemoryStore::new());
    let manager = Arc::new(
        SessionManager::new(store, cfg.transcript.clone()).with_access_window(cfg.access.window()),
    );
    let mut state = AppState::new(manager);

    if cfg.nats.enabled {
        let client = NatsClient::connect(&cfg.nats.url).await?;
        state = state.with_speech_feed(SpeechFeed {
            client,
            subject: cfg.nats.subject.clone(),
        });
    } else {
        info!("NATS speech feed disabled; transcripts arrive over HTTP only");
    }

    let app = create_router(state);
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app).await.context("HTTP server failed")?;

    Ok(())
}

use std::env;
use std::sync::Arc;

use anyhow::{bail, Context};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use edvest::core::config::{AppPaths, DiscoveryCount};
use edvest::core::logging;
use edvest::server;
use edvest::state::AppState;

const USAGE: &str = "usage: edvest [serve | run \"<query>\" [count]]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    logging::init(&paths);

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("serve") => serve(paths).await,
        Some("run") => run_once(paths, &args[1..]).await,
        Some(other) => bail!("unknown command '{}'\n{}", other, USAGE),
    }
}

async fn serve(paths: Arc<AppPaths>) -> anyhow::Result<()> {
    let state = AppState::initialize(paths).await?;

    let bind_addr = format!("{}:{}", state.settings.server.host, state.settings.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    println!("EDVEST_PORT={}", addr.port());
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state);
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// One evaluation run; prints the `RunReport` as JSON. Ctrl-C cancels between nodes.
async fn run_once(paths: Arc<AppPaths>, args: &[String]) -> anyhow::Result<()> {
    let Some(query) = args.first().filter(|q| !q.trim().is_empty()) else {
        bail!("missing query\n{}", USAGE);
    };
    let count = match args.get(1) {
        Some(raw) => Some(DiscoveryCount::Fixed(
            raw.parse()
                .with_context(|| format!("count must be a number, got '{}'", raw))?,
        )),
        None => None,
    };

    let state = AppState::initialize(paths).await?;
    let count = match state.pipeline.resolve_count(count) {
        Ok(count) => count,
        Err(err) => bail!("{}\n{}", err, USAGE),
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run");
            on_signal.cancel();
        }
    });

    let report = state.pipeline.run(query, Some(count), &cancel).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

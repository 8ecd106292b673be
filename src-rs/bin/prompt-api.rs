use std::net::SocketAddr;

use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use prompt_gen_rs::api::{AppState, PromptServer};
use prompt_gen_rs::helpers::{build_broker, build_composer, init_tracing, node_name, shutdown_signal};
use prompt_gen_rs::task::{spawn_workers, TaskRunner};
use prompt_gen_rs::ServiceConfig;

#[derive(Debug, Parser)]
#[command(name = "prompt-api", version, about = "HTTP front-end for the prompt generator")]
struct Cli {
    /// Listen address, e.g. 127.0.0.1:8080. Defaults to HOST:PORT.
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = ServiceConfig::from_env()?;

    let broker = build_broker(&cfg)?;
    let (stop_tx, stop_rx) = watch::channel(false);

    // A memory broker is invisible to other processes, so its workers run here.
    let mut workers = Vec::new();
    if cfg.uses_memory_broker() {
        let composer = build_composer(&cfg)?;
        info!(composer = composer.name(), concurrency = cfg.worker_concurrency, "starting embedded workers");
        workers = spawn_workers(
            &node_name("embedded"),
            broker.clone(),
            composer,
            cfg.worker_concurrency,
            stop_rx,
        );
    }

    let addr: SocketAddr = cli.listen.unwrap_or_else(|| cfg.listen_addr()).parse()?;
    let state = AppState::new(TaskRunner::new(broker), cfg.worker_ping_timeout);
    PromptServer::new(addr, state).start(shutdown_signal()).await?;

    let _ = stop_tx.send(true);
    for handle in workers {
        let _ = handle.await;
    }
    info!("api stopped");
    Ok(())
}

use clap::Parser;
use tokio::sync::watch;
use tracing::info;

use prompt_gen_rs::helpers::{build_broker, build_composer, init_tracing, node_name, shutdown_signal};
use prompt_gen_rs::task::spawn_workers;
use prompt_gen_rs::ServiceConfig;

#[derive(Debug, Parser)]
#[command(name = "prompt-worker", version, about = "Queue worker that composes prompts")]
struct Cli {
    /// Job loops in this process. Overrides WORKER_CONCURRENCY.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Node name reported in ping replies. Defaults to worker@<hostname>.
    #[arg(long)]
    name: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = ServiceConfig::from_env()?;
    if cfg.uses_memory_broker() {
        anyhow::bail!("prompt-worker needs a shared broker; memory:// only works inside prompt-api");
    }

    let broker = build_broker(&cfg)?;
    let composer = build_composer(&cfg)?;
    let node = cli.name.unwrap_or_else(|| node_name("worker"));
    let concurrency = cli.concurrency.unwrap_or(cfg.worker_concurrency).max(1);
    info!(node = %node, composer = composer.name(), concurrency, "worker starting");

    let (stop_tx, stop_rx) = watch::channel(false);
    let handles = spawn_workers(&node, broker, composer, concurrency, stop_rx);

    shutdown_signal().await;
    let _ = stop_tx.send(true);
    for handle in handles {
        let _ = handle.await;
    }
    info!(node = %node, "worker stopped");
    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use color_eyre::Result;
use color_eyre::eyre::eyre;
use tracing::{Level, info};

use hostglance::config::{Config, load_config, load_config_from_path};
use hostglance::delivery::{DeliveryChannel, FetchTarget, Fetched};
use hostglance::format::{host_line, summary_line};
use hostglance::logging::init_tracing;
use hostglance::scheduler::Scheduler;
use hostglance::system::cache::SnapshotCache;
use hostglance::system::collector::{Collector, CollectorSettings};
use hostglance::system::provider::SysinfoProvider;
use hostglance::system::snapshot::Snapshot;

#[derive(Parser)]
#[command(
    name = "hostglance",
    about = "Sample host CPU, memory, disk and folder metrics on a fixed cadence"
)]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// CPU/memory polling interval in milliseconds
    #[arg(long)]
    polling_interval_ms: Option<u64>,

    /// Per-query timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Print the start-up snapshot and exit.
    #[arg(long, default_value_t = false)]
    once: bool,

    /// Print snapshots as JSON lines instead of summaries.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, default_value = "info")]
    log_level: Level,

    /// Emit logs as JSON.
    #[arg(long, default_value_t = false)]
    log_json: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.log_level, cli.log_json)?;
    let config = load_config_for_cli(&cli);

    run(config, &cli).await
}

async fn run(config: Config, cli: &Cli) -> Result<()> {
    let cache = Arc::new(SnapshotCache::new());
    let provider = Arc::new(SysinfoProvider::new(config.folders.base_dir.clone()));
    let collector = Arc::new(Collector::new(
        provider,
        Arc::clone(&cache),
        CollectorSettings::from_config(&config),
    ));
    let channel = Arc::new(DeliveryChannel::new(cache));
    let mut subscription = channel.subscribe();

    let scheduler = Scheduler::new(
        collector,
        Arc::clone(&channel),
        config.general.polling_interval(),
    )
    .spawn();
    info!(
        folders = ?config.folders.monitored,
        timeout_ms = config.general.per_query_timeout_ms,
        "pipeline running"
    );

    if cli.once {
        // Each start-up cycle is bounded by the query timeout and publishes on
        // its own; wait until every category has had its first attempt.
        let wait = config.general.query_timeout() + Duration::from_secs(1);
        tokio::time::timeout(wait, async {
            while let Some(snapshot) = subscription.recv().await {
                if startup_settled(&snapshot) {
                    return Some(());
                }
            }
            None
        })
        .await
        .map_err(|_| eyre!("start-up cycles did not finish within {wait:?}"))?
        .ok_or_else(|| eyre!("delivery channel closed before start-up finished"))?;
        let Fetched::All(snapshot) = channel.fetch(FetchTarget::All) else {
            return Err(eyre!("fetch(all) returned a single category"));
        };
        if !cli.json {
            println!("{}", host_line(&snapshot));
        }
        print_snapshot(&snapshot, cli.json)?;
        scheduler.shutdown().await;
        return Ok(());
    }

    let mut host_shown = false;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("interrupt received, shutting down");
                break;
            }
            next = subscription.recv() => match next {
                Some(snapshot) => {
                    if !cli.json && !host_shown && snapshot.static_info.fragment.is_available() {
                        println!("{}", host_line(&snapshot));
                        host_shown = true;
                    }
                    print_snapshot(&snapshot, cli.json)?;
                }
                None => break,
            },
        }
    }

    channel.unsubscribe(subscription.id());
    scheduler.shutdown().await;
    Ok(())
}

fn startup_settled(snapshot: &Snapshot) -> bool {
    snapshot.cpu_memory.last_attempt_at().is_some()
        && snapshot.disk.last_attempt_at().is_some()
        && snapshot.folder_counts.last_attempt_at().is_some()
        && snapshot.static_info.last_attempt_at().is_some()
}

fn print_snapshot(snapshot: &Snapshot, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
    } else {
        println!("{}", summary_line(snapshot));
    }
    Ok(())
}

fn load_config_for_cli(cli: &Cli) -> Config {
    let mut config = match &cli.config {
        Some(path) => load_config_from_path(path),
        None => load_config(),
    };

    if let Some(interval) = cli.polling_interval_ms {
        config.general.polling_interval_ms = interval;
    }
    if let Some(timeout) = cli.timeout_ms {
        config.general.per_query_timeout_ms = timeout;
    }

    config
}

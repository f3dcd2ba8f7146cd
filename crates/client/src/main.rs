mod cli;
mod shutdown;

use std::process;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::filter::LevelFilter;

use grist_core::job::JobDescriptor;
use grist_coordinator::clients::{Gc, JobClients, OobStore, WorkerPool};
use grist_coordinator::remote::{BridgeConfig, run_pool_bridge};
use grist_coordinator::sink::spawn_event_sink;
use grist_coordinator::{CoordinatorConfig, spawn_coordinator};

use crate::cli::Cli;
use crate::shutdown::spawn_ctrl_c_handler;

/// The ingress treats a job whose coordinator does not acknowledge startup
/// within this bound as failed.
const STARTUP_ACK_TIMEOUT: Duration = Duration::from_secs(5);

const OUTCOME_INBOX_CAPACITY: usize = 64;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter: LevelFilter = cli.log_level.into();
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder().with_max_level(filter).finish(),
    )?;

    let descriptor = JobDescriptor::load(&cli.job_file)?;
    descriptor.validate()?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()?;

    let (pool, pool_rx) = WorkerPool::channel(WorkerPool::DEFAULT_CAPACITY);
    let (outcome_tx, outcome_rx) = mpsc::channel(OUTCOME_INBOX_CAPACITY);
    let (events, sink_join) = spawn_event_sink(cli.events_dir.clone());
    let (oob, mut oob_rx) = OobStore::channel();
    let (gc, mut gc_rx) = Gc::channel();

    // OOB and GC requests go to services this binary does not host; drain
    // and log them so the channels never back up.
    tokio::spawn(async move {
        while let Some(record) = oob_rx.recv().await {
            info!(job = %record.job, node = %record.node, keys = record.keys.len(), "oob keys recorded");
        }
    });
    tokio::spawn(async move {
        while let Some(request) = gc_rx.recv().await {
            info!(outputs = request.map_outputs.len(), "map intermediates scheduled for gc");
        }
    });

    let bridge = tokio::spawn(run_pool_bridge(
        http,
        BridgeConfig {
            pool_url: cli.pool_url.clone(),
            poll_interval: BridgeConfig::DEFAULT_POLL_INTERVAL,
        },
        descriptor.name.clone(),
        pool_rx,
        outcome_tx.clone(),
    ));

    let clients = JobClients {
        pool,
        events,
        oob,
        gc,
    };
    let config = CoordinatorConfig {
        max_failure_rate: cli.max_failure_rate,
    };
    let mut handle = spawn_coordinator(descriptor.clone(), config, clients, outcome_rx);

    match tokio::time::timeout(STARTUP_ACK_TIMEOUT, handle.started()).await {
        Ok(Some(coordinator)) => {
            info!(job = %descriptor.name, %coordinator, "job accepted")
        }
        Ok(None) | Err(_) => {
            anyhow::bail!("job coordinator failed to start within {STARTUP_ACK_TIMEOUT:?}")
        }
    }

    spawn_ctrl_c_handler(descriptor.name.clone(), outcome_tx);

    let result = handle.wait().await;
    let _ = bridge.await;
    let _ = sink_join.await;

    match result {
        Ok(results) => {
            println!("READY: {} result(s)", results.len());
            for spec in &results {
                for uri in spec.replicas() {
                    println!("{uri}");
                }
            }
            Ok(())
        }
        Err(failure) => {
            error!(job = %descriptor.name, "{failure}");
            process::exit(1);
        }
    }
}

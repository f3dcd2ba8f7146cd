//! Local event sink: structured log output per event plus per-job JSON log
//! persistence on flush.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::api::JobEvent;
use crate::clients::{EventRequest, EventSink};

/// Spawn the local event sink task.
///
/// Every emitted event is logged through `tracing` and retained per job.
/// When `events_dir` is set, a flushed job's log is written to
/// `<events_dir>/<job>.json` before the flush is acknowledged; without it
/// the retained events are discarded on flush.
pub fn spawn_event_sink(events_dir: Option<PathBuf>) -> (EventSink, JoinHandle<()>) {
    let (sink, mut requests) = EventSink::channel();
    let join = tokio::spawn(async move {
        let mut logs: BTreeMap<String, Vec<JobEvent>> = BTreeMap::new();
        while let Some(request) = requests.recv().await {
            match request {
                EventRequest::Emit(event) => {
                    if event.message.starts_with("ERROR:") {
                        warn!(job = %event.job, "{}", event.message);
                    } else {
                        info!(job = %event.job, "{}", event.message);
                    }
                    logs.entry(event.job.clone()).or_default().push(event);
                }
                EventRequest::Flush { job, done } => {
                    let events = logs.remove(&job).unwrap_or_default();
                    if let Some(dir) = &events_dir {
                        let path = dir.join(format!("{job}.json"));
                        if let Err(err) = persist_log(path, events).await {
                            warn!(job = %job, "failed to persist event log: {err:#}");
                        }
                    }
                    let _ = done.send(());
                }
            }
        }
    });
    (sink, join)
}

async fn persist_log(path: PathBuf, events: Vec<JobEvent>) -> anyhow::Result<()> {
    tokio::task::spawn_blocking(move || persist_file(&path, &events))
        .await
        .map_err(|err| anyhow::anyhow!("persist event log: {err:#}"))??;
    Ok(())
}

fn persist_file(path: &Path, events: &[JobEvent]) -> anyhow::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("invalid event log path: {}", path.display()))?;
    std::fs::create_dir_all(dir)?;

    let json = serde_json::to_string_pretty(events)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(tmp, path)?;
    Ok(())
}

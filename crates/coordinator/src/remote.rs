//! Bridge between a coordinator's channel seams and an out-of-process
//! worker-pool service reached over HTTP.

use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::api::{TaskOutcome, TaskRequest};
use crate::clients::PoolRequest;

/// Protocol-level rejection reported by the worker-pool service.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The pool has no record of the job.
    #[error("job not found")]
    JobNotFound,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
}

#[derive(Debug, Deserialize)]
struct OutcomeBatch {
    cursor: u64,
    #[serde(default)]
    outcomes: Vec<TaskOutcome>,
}

/// Configuration for [`run_pool_bridge`].
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Worker-pool service base URL.
    pub pool_url: Url,
    /// Cadence of the outcome-feed poll.
    pub poll_interval: Duration,
}

impl BridgeConfig {
    /// Default outcome-feed poll cadence.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
}

async fn submit_task(
    http: &reqwest::Client,
    pool: &Url,
    request: &TaskRequest,
) -> anyhow::Result<()> {
    let url = pool.join("api/tasks")?;
    let res = http.post(url).json(request).send().await?;

    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND {
            if let Ok(err) = serde_json::from_str::<ApiErrorBody>(&body) {
                if err.code == "job_not_found" {
                    return Err(PoolError::JobNotFound.into());
                }
            }
        }
        anyhow::bail!("http {status}: {body}");
    }
    Ok(())
}

async fn kill_job(http: &reqwest::Client, pool: &Url, job: &str) -> anyhow::Result<()> {
    let url = pool.join(&format!("api/jobs/{job}/kill"))?;
    let res = http.post(url).send().await?;

    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        anyhow::bail!("http {status}: {body}");
    }
    Ok(())
}

async fn poll_outcomes(
    http: &reqwest::Client,
    pool: &Url,
    job: &str,
    cursor: u64,
) -> anyhow::Result<OutcomeBatch> {
    let url = pool.join(&format!("api/jobs/{job}/outcomes"))?;
    let res = http.get(url).query(&[("cursor", cursor)]).send().await?;

    if !res.status().is_success() {
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        anyhow::bail!("http {status}: {body}");
    }
    Ok(res.json().await?)
}

/// Drive one job's pool traffic against a remote worker-pool service.
///
/// Consumes [`PoolRequest`]s from `requests`, forwards them upstream, and
/// polls the job's outcome feed into `outcomes` (the coordinator's inbox).
/// Returns when the job is killed or the coordinator goes away; outcomes
/// that arrive after that are dropped with the closed channel.
pub async fn run_pool_bridge(
    http: reqwest::Client,
    config: BridgeConfig,
    job: String,
    mut requests: mpsc::Receiver<PoolRequest>,
    outcomes: mpsc::Sender<TaskOutcome>,
) {
    let mut cursor = 0u64;
    let mut last_poll_err: Option<String> = None;
    let mut poll = tokio::time::interval(config.poll_interval);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            request = requests.recv() => {
                match request {
                    None => return,
                    Some(PoolRequest::Submit(request)) => {
                        if let Err(err) = submit_task(&http, &config.pool_url, &request).await {
                            // A failed submit leaves the coordinator waiting
                            // for an outcome that will never come; report it
                            // as a pool-side termination instead.
                            let reason = match err.downcast_ref::<PoolError>() {
                                Some(PoolError::JobNotFound) => {
                                    format!("worker pool has no record of job {}", request.job)
                                }
                                None => format!("task submit failed: {err:#}"),
                            };
                            warn!(job = %job, "{reason}");
                            if outcomes.send(TaskOutcome::MasterError { reason }).await.is_err() {
                                return;
                            }
                        }
                    }
                    Some(PoolRequest::KillJob { job: name }) => {
                        if let Err(err) = kill_job(&http, &config.pool_url, &name).await {
                            warn!(job = %name, "kill request failed: {err:#}");
                        }
                        return;
                    }
                }
            }
            _ = poll.tick() => {
                match poll_outcomes(&http, &config.pool_url, &job, cursor).await {
                    Ok(batch) => {
                        last_poll_err = None;
                        cursor = batch.cursor;
                        for outcome in batch.outcomes {
                            if outcomes.send(outcome).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(err) => {
                        let message = format!("{err:#}");
                        if last_poll_err.as_deref() != Some(&message) {
                            warn!(job = %job, "outcome poll failed: {message}");
                            last_poll_err = Some(message);
                        }
                    }
                }
            }
        }
    }
}

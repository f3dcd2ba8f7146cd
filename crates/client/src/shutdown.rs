use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::mpsc;
use tracing::warn;

use grist_coordinator::TaskOutcome;

/// Two-stage ctrl-c handling: the first signal terminates the job through
/// the coordinator's normal teardown, the second exits immediately.
pub fn spawn_ctrl_c_handler(job: String, outcomes: mpsc::Sender<TaskOutcome>) {
    let signals = Arc::new(AtomicU8::new(0));
    tokio::spawn(async move {
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            let n = signals.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 1 {
                warn!(
                    job = %job,
                    "interrupt received; terminating the job (press CTRL+C again to exit immediately)"
                );
                // The pool reports operator kills as master errors; injecting
                // one drives the coordinator through events, kill and flush.
                let _ = outcomes
                    .send(TaskOutcome::MasterError {
                        reason: "interrupted by operator".to_string(),
                    })
                    .await;
            } else {
                std::process::exit(130);
            }
        }
    });
}

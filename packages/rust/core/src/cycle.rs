//! Background optimize-and-reward loop.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::exchange::ExchangeOrchestrator;

/// A running cycle task and the token that stops it. Dropping the handle
/// cancels the task.
pub(crate) struct CycleHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl CycleHandle {
    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel the loop and wait for the task to exit.
    pub(crate) async fn shutdown(mut self) {
        self.token.cancel();
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "exchange cycle task ended abnormally");
        }
    }
}

impl Drop for CycleHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// The task only holds a weak reference, so dropping the last
/// orchestrator handle ends the loop.
pub(crate) fn spawn(exchange: &Arc<ExchangeOrchestrator>) -> CycleHandle {
    let token = CancellationToken::new();
    let interval = exchange.config().cycle_interval;
    let backoff = exchange.config().retry_backoff;
    let task = tokio::spawn(run(
        Arc::downgrade(exchange),
        token.clone(),
        interval,
        backoff,
    ));
    CycleHandle { token, task }
}

/// Run a pass immediately, then every `interval`. A pass with optimization
/// failures is retried after `backoff`. Cancellation drops an in-flight pass.
async fn run(
    exchange: Weak<ExchangeOrchestrator>,
    token: CancellationToken,
    interval: Duration,
    backoff: Duration,
) {
    info!(
        interval_secs = interval.as_secs(),
        backoff_secs = backoff.as_secs(),
        "exchange cycle started"
    );

    loop {
        let Some(strong) = exchange.upgrade() else {
            break;
        };
        let wait = tokio::select! {
            _ = token.cancelled() => break,
            report = strong.run_cycle_once() => {
                if report.optimize_failures.is_empty() {
                    interval
                } else {
                    warn!(
                        failed = report.optimize_failures.len(),
                        "exchange cycle had optimization failures"
                    );
                    backoff
                }
            }
        };
        drop(strong);

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(wait) => {}
        }
    }

    info!("exchange cycle stopped");
}

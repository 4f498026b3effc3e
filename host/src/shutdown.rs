use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::app::SharedState;

const WORKER_GRACE: Duration = Duration::from_secs(2);

pub async fn graceful_shutdown(state: &SharedState, workers: Vec<JoinHandle<()>>) {
    tracing::info!("Shutdown sequence started");

    state.shutdown_token().cancel();
    tracing::info!("Shutdown: tab workers cancelled");

    let total = workers.len();
    let mut stopped = 0usize;
    for worker in workers {
        match timeout(WORKER_GRACE, worker).await {
            Ok(Ok(())) => stopped += 1,
            Ok(Err(e)) => tracing::error!("Shutdown: tab worker failed: {e}"),
            Err(_) => tracing::warn!("Shutdown: tab worker did not stop in time"),
        }
    }

    tracing::info!("Shutdown sequence completed ({stopped}/{total} tabs stopped)");
}

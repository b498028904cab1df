use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::overseer::OverseerState;
use crate::stats::{OverseerStats, StatsCounters};

/// Stop and observe a running [`Overseer`](crate::Overseer) from another task.
#[derive(Debug, Clone)]
pub struct OverseerHandle {
    cancel: CancellationToken,
    state: watch::Receiver<OverseerState>,
    stats: Arc<StatsCounters>,
}

impl OverseerHandle {
    pub(crate) fn new(
        cancel: CancellationToken,
        state: watch::Receiver<OverseerState>,
        stats: Arc<StatsCounters>,
    ) -> Self {
        Self { cancel, state, stats }
    }

    /// Ask the loop to stop. Safe to call more than once, or before the run starts.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            info!("Overseer stop requested");
        }
        self.cancel.cancel();
    }

    pub fn is_stop_requested(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn state(&self) -> OverseerState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> OverseerStats {
        self.stats.snapshot()
    }

    /// Wait until the overseer has reached `target` or any later state.
    pub async fn wait_for(&self, target: OverseerState) {
        let mut state = self.state.clone();
        // Err means the overseer was dropped, nothing left to wait for
        let _ = state.wait_for(|current| *current >= target).await;
    }

    pub async fn wait_stopped(&self) {
        self.wait_for(OverseerState::Stopped).await;
    }
}

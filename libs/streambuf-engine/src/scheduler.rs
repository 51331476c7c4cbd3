use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::client::RecordClient;

/// When the scheduler triggers a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushStrategy {
    /// Flush every period. The first tick fires one full period after start.
    Interval(Duration),
    /// Never flush automatically; callers invoke `RecordClient::flush`.
    Manual,
}

struct Running {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodic flush trigger.
///
/// Flush errors are logged and the loop keeps going. `start()` replaces a
/// previous loop; `disable()` and drop stop it. Stopping only cancels the
/// wait for the next tick: a flush already running completes.
pub struct FlushScheduler {
    client: Arc<RecordClient>,
    strategy: FlushStrategy,
    running: Mutex<Option<Running>>,
}

impl FlushScheduler {
    pub fn new(client: Arc<RecordClient>, strategy: FlushStrategy) -> Self {
        let strategy = match strategy {
            FlushStrategy::Interval(period) if period.is_zero() => {
                tracing::warn!("zero flush interval, falling back to manual flushing");
                FlushStrategy::Manual
            }
            other => other,
        };
        Self {
            client,
            strategy,
            running: Mutex::new(None),
        }
    }

    pub fn strategy(&self) -> FlushStrategy {
        self.strategy
    }

    /// Start the flush loop, cancelling any loop already running.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) {
        let mut slot = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(prev) = slot.take() {
            prev.token.cancel();
        }

        let FlushStrategy::Interval(period) = self.strategy else {
            tracing::info!("manual flush strategy, scheduler not started");
            return;
        };

        let token = CancellationToken::new();
        let handle = tokio::spawn(flush_loop(self.client.clone(), period, token.clone()));
        tracing::info!(interval_secs = period.as_secs_f64(), "flush scheduler started");
        *slot = Some(Running { token, handle });
    }

    /// Stop future ticks without waiting for a running flush.
    pub fn disable(&self) {
        let slot = self.running.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(running) = slot {
            running.token.cancel();
            tracing::info!("flush scheduler disabled");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Stop future ticks and wait for the loop, including a running flush.
    pub async fn shutdown(&self) {
        let slot = self.running.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(running) = slot else { return };
        running.token.cancel();
        if let Err(e) = running.handle.await {
            tracing::error!(error = %e, "flush scheduler task failed");
        }
        tracing::info!("flush scheduler stopped");
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        let slot = self.running.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = slot.take() {
            running.token.cancel();
        }
    }
}

async fn flush_loop(client: Arc<RecordClient>, period: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }
        // Only the wait is cancellable. A started cycle always runs to the end.
        match client.flush().await {
            Ok(outcome) if outcome.in_progress => {
                tracing::debug!("scheduled flush skipped, another flush is running");
            }
            Ok(outcome) => {
                tracing::debug!(records = outcome.records_flushed, "scheduled flush done");
            }
            Err(e) => tracing::warn!(error = %e, "scheduled flush failed"),
        }
    }
}

//! Background refresh loop

use super::IpRangeManager;
use crate::error::{Error, Result};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{info, warn};

/// Handle on a running periodic pull
///
/// Dropping the handle also stops the loop, at its next await point.
#[derive(Debug)]
pub struct PeriodicPullHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PeriodicPullHandle {
    /// Stop the loop and wait for it to exit
    ///
    /// A refresh cycle in progress is abandoned; every slot keeps whichever
    /// snapshot it had installed.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            // The loop may already be gone; that is fine
            let _ = tx.send(());
        }

        self.task
            .await
            .map_err(|e| Error::Other(format!("periodic pull task failed: {e}")))
    }

    /// Whether the loop has exited
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl IpRangeManager {
    /// Start refreshing every registered provider once per pull interval
    ///
    /// The first refresh happens one interval after the call; construction
    /// already pulled once.
    ///
    /// # Returns
    ///
    /// - `Ok(PeriodicPullHandle)`: Used to stop the loop
    /// - `Err(Error::Config)`: If the pull interval is zero or too large to schedule
    pub fn start_periodic_pull(self: &Arc<Self>) -> Result<PeriodicPullHandle> {
        if self.pull_interval.is_zero() {
            return Err(Error::config("pull interval must be > 0"));
        }
        let first_tick = Instant::now()
            .checked_add(self.pull_interval)
            .ok_or_else(|| {
                Error::config(format!(
                    "pull interval {:?} is out of range",
                    self.pull_interval
                ))
            })?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let manager = Arc::clone(self);
        let task =
            tokio::spawn(async move { manager.run_periodic_pull(first_tick, shutdown_rx).await });

        Ok(PeriodicPullHandle {
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }

    async fn run_periodic_pull(&self, first_tick: Instant, mut shutdown_rx: oneshot::Receiver<()>) {
        let period = self.pull_interval;
        let mut interval = time::interval_at(first_tick, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = IntervalStream::new(interval);

        info!(
            "Starting periodic ip ranges pull (interval={:?}, providers={:?})",
            period,
            self.registered_providers()
        );

        loop {
            tokio::select! {
                Some(_) = ticks.next() => {
                    tokio::select! {
                        result = self.pull_ip_ranges() => {
                            if let Err(e) = result {
                                warn!("Periodic ip ranges pull incomplete: {}", e);
                            }
                        }
                        // Sender sent or dropped: either way, stop
                        _ = &mut shutdown_rx => break,
                    }
                }

                _ = &mut shutdown_rx => break,
            }
        }

        info!("Periodic ip ranges pull stopped");
    }
}

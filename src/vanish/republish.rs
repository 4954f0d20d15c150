//! Periodic republishing of a vanished object's shares.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use crate::Dht;

use super::{epoch, sss::Share};

#[derive(Debug)]
/// Owns the task republishing a vanished object's shares every epoch.
///
/// Republishing stops after the requested number of epochs, or as soon as the
/// handle is cancelled or dropped.
pub struct RepublishHandle {
    remaining: Arc<AtomicU32>,
    stop: Option<flume::Sender<()>>,
    task: JoinHandle<()>,
}

impl RepublishHandle {
    pub(crate) fn spawn(
        dht: Dht,
        access_key: u64,
        shares: Vec<Share>,
        epochs: u32,
        interval: Duration,
    ) -> Self {
        let remaining = Arc::new(AtomicU32::new(epochs));
        let (stop, stopped) = flume::bounded::<()>(1);

        let task = tokio::spawn(republish_loop(
            dht,
            access_key,
            shares,
            interval,
            remaining.clone(),
            stopped,
        ));

        Self {
            remaining,
            stop: Some(stop),
            task,
        }
    }

    /// Number of republish cycles left.
    pub fn remaining_epochs(&self) -> u32 {
        self.remaining.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop republishing and wait for the task to wind down.
    pub async fn cancel(mut self) {
        self.stop.take();
        let _ = (&mut self.task).await;
    }
}

impl Drop for RepublishHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn republish_loop(
    dht: Dht,
    access_key: u64,
    shares: Vec<Share>,
    interval: Duration,
    remaining: Arc<AtomicU32>,
    stopped: flume::Receiver<()>,
) {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while remaining.load(Ordering::SeqCst) > 0 {
        tokio::select! {
            // Fires on send, or once the handle drops its sender.
            _ = stopped.recv_async() => break,
            _ = ticker.tick() => {}
        }

        let epoch_start = epoch::epoch_start(&Local::now(), 0);
        let stored = super::store_shares(&dht, access_key, epoch_start, &shares).await;

        let left = remaining.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);

        debug!(access_key, epoch_start, stored, left, "Republished shares");
    }
}

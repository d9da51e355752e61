//! Scan telemetry.
//!
//! Resolution never writes to the database itself. It hands the scanned code to
//! a [`ScanCounter`], which queues it on a bounded channel without waiting. A
//! background flusher aggregates the queue per code and applies the counts in
//! one transaction, either when enough distinct codes are pending or on a
//! timer. On shutdown the flusher drains the queue and does a final flush.
//!
//! Counts are best-effort: when the queue is full, increments are dropped.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use crate::db::{DbPool, queries};
use crate::error::{AppError, Result};
use crate::util::now;

#[derive(Debug, Clone, Copy)]
pub struct ScanSettings {
    pub queue_capacity: usize,
    pub flush_interval: Duration,
    /// Distinct pending codes that trigger a flush before the timer fires
    pub flush_threshold: usize,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            flush_interval: Duration::from_secs(1),
            flush_threshold: 500,
        }
    }
}

/// Producer side, cloned into every request handler.
#[derive(Clone, Debug)]
pub struct ScanCounter {
    tx: mpsc::Sender<String>,
}

impl ScanCounter {
    /// A counter plus the receiving end its increments arrive on.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue one scan of `code`. Never blocks and never fails the caller.
    pub fn record(&self, code: &str) {
        match self.tx.try_send(code.to_string()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(code)) => {
                debug!("Scan queue full, dropping increment for {}", code);
            }
            Err(mpsc::error::TrySendError::Closed(code)) => {
                debug!("Scan flusher stopped, dropping increment for {}", code);
            }
        }
    }
}

/// Handle to the background flush task.
pub struct ScanFlusher {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ScanFlusher {
    /// Stop the flusher after draining everything already queued.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            error!("Scan flusher task failed: {:?}", e);
        }
    }
}

/// Start the flush task. Must be called from within a tokio runtime.
pub fn spawn_scan_flusher(pool: DbPool, settings: ScanSettings) -> (ScanCounter, ScanFlusher) {
    let (counter, mut rx) = ScanCounter::channel(settings.queue_capacity);
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(async move {
        let mut pending: HashMap<String, i64> = HashMap::new();
        let mut ticker = interval(settings.flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            "Scan flusher started (queue={}, threshold={}, interval={:?})",
            settings.queue_capacity, settings.flush_threshold, settings.flush_interval
        );

        loop {
            tokio::select! {
                biased;
                Ok(_) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }

                // Ahead of recv so a queue that never empties cannot starve the timer
                _ = ticker.tick() => {
                    if !pending.is_empty() {
                        flush(&pool, &mut pending).await;
                    }
                }

                maybe_code = rx.recv() => {
                    match maybe_code {
                        Some(code) => {
                            *pending.entry(code).or_insert(0) += 1;
                            if pending.len() >= settings.flush_threshold {
                                flush(&pool, &mut pending).await;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        while let Ok(code) = rx.try_recv() {
            *pending.entry(code).or_insert(0) += 1;
        }
        if !pending.is_empty() {
            info!("Scan flusher final flush: {} codes", pending.len());
            flush(&pool, &mut pending).await;
        }
        info!("Scan flusher stopped");
    });

    (
        counter,
        ScanFlusher {
            shutdown_tx,
            handle,
        },
    )
}

/// Write pending counts and clear them. Failed flushes are logged and
/// discarded rather than retried.
async fn flush(pool: &DbPool, pending: &mut HashMap<String, i64>) {
    let batch = std::mem::take(pending);
    let pool = pool.clone();
    let result = tokio::task::spawn_blocking(move || -> Result<usize> {
        let mut conn = pool.get()?;
        queries::apply_scan_increments(&mut conn, &batch, now())
    })
    .await
    .map_err(|e| AppError::Internal(format!("scan flush task panicked: {}", e)));

    match result {
        Ok(Ok(updated)) => debug!("Flushed scan counts for {} codes", updated),
        Ok(Err(e)) | Err(e) => error!("Scan flush failed: {}", e),
    }
}

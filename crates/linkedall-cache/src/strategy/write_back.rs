//! Write-back strategy.
//!
//! Values go to the cache immediately; the system-of-record write is queued
//! in a pending map keyed by logical key and persisted by a background
//! worker in one batch after a fixed delay.

use super::cache_aside::CacheAside;
use super::codec;
use super::options::CacheOptions;
use crate::metrics::CacheMetrics;
use futures::future::join_all;
use futures::FutureExt;
use linkedall_config::{CacheFailurePolicy, WriteBackConfig};
use linkedall_core::{BoxFuture, CacheError, CacheResult};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

/// Deferred system-of-record write. Receives the logical key.
type PersistFn = Box<dyn FnOnce(String) -> BoxFuture<'static, ()> + Send>;

type PendingWrites = Arc<Mutex<HashMap<String, PersistFn>>>;

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Entries taken from the pending map.
    pub attempted: usize,
    /// Entries whose writer succeeded.
    pub succeeded: usize,
    /// Entries whose writer failed or panicked.
    pub failed: usize,
}

enum WorkerMessage {
    /// An entry was queued; arm the flush deadline if it is not armed.
    Schedule,
    /// Flush what is pending and stop.
    Shutdown(oneshot::Sender<FlushReport>),
}

/// Write-back strategy with a background flush worker.
///
/// A second `set` for the same key before a flush replaces the pending
/// entry, so only the latest value per key is persisted. The flush deadline
/// is fixed from the first queued entry and is not extended by later ones.
/// Failed writes are logged and dropped, never retried.
///
/// Pending entries live in memory only. Call [`shutdown`](Self::shutdown)
/// on orderly exit; dropping the strategy also flushes once the worker sees
/// the channel close.
pub struct WriteBack {
    cache: CacheAside,
    config: WriteBackConfig,
    pending: PendingWrites,
    sender: mpsc::UnboundedSender<WorkerMessage>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WriteBack {
    /// Creates the strategy and spawns its flush worker.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    #[must_use]
    pub fn new(cache: CacheAside, config: WriteBackConfig) -> Self {
        let pending: PendingWrites = Arc::default();
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(
            Arc::clone(&pending),
            receiver,
            config.flush_interval(),
        ));

        Self {
            cache,
            config,
            pending,
            sender,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// The cache-aside strategy used for the immediate write.
    #[must_use]
    pub fn cache(&self) -> &CacheAside {
        &self.cache
    }

    /// Number of entries waiting for the next flush.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Writes the value to the cache and queues `writer(key, value)` for the
    /// next flush.
    ///
    /// When the cache write fails the entry is still queued under
    /// [`CacheFailurePolicy::Enqueue`] and discarded under
    /// [`CacheFailurePolicy::Skip`]; the cache error is returned either way.
    pub async fn try_set<T, W, Fut, E>(&self, key: &str, value: T, writer: W, options: &CacheOptions) -> CacheResult<()>
    where
        T: Serialize + Send + 'static,
        W: FnOnce(String, T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let cached = match codec::encode(&value, options.serialize) {
            Ok(payload) => self.cache.store_encoded(key, &payload, options).await,
            Err(e) => Err(e),
        };

        if cached.is_ok() || self.config.on_cache_failure == CacheFailurePolicy::Enqueue {
            self.enqueue(key, value, writer);
        } else {
            debug!(key = %key, "Cache write failed, deferred write discarded");
        }
        cached
    }

    /// Non-failing form of [`try_set`](Self::try_set). Returns `false` when
    /// the cache write fails.
    pub async fn set<T, W, Fut, E>(&self, key: &str, value: T, writer: W, options: &CacheOptions) -> bool
    where
        T: Serialize + Send + 'static,
        W: FnOnce(String, T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        match self.try_set(key, value, writer, options).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %options.full_key(key), error = %e, "Write-back cache write failed");
                CacheMetrics::error("write_back");
                false
            }
        }
    }

    /// Persists every pending entry now.
    ///
    /// The pending map is swapped out before any writer runs, so entries
    /// queued during the flush wait for the next one.
    pub async fn flush(&self) -> FlushReport {
        flush_pending(&self.pending).await
    }

    /// Stops the worker after a final flush.
    pub async fn shutdown(&self) -> FlushReport {
        let (reply, response) = oneshot::channel();
        let report = if self.sender.send(WorkerMessage::Shutdown(reply)).is_ok() {
            response.await.ok()
        } else {
            None
        };

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(error = %e, "Write-back worker terminated abnormally");
            }
        }

        match report {
            Some(report) => report,
            // Worker already gone; flush whatever is left here.
            None => self.flush().await,
        }
    }

    fn enqueue<T, W, Fut, E>(&self, key: &str, value: T, writer: W)
    where
        T: Send + 'static,
        W: FnOnce(String, T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let persist: PersistFn = Box::new(move |key: String| -> BoxFuture<'static, ()> {
            Box::pin(async move {
                let label = key.clone();
                writer(key, value)
                    .await
                    .map_err(|e| CacheError::writer(label, e))
            })
        });

        let pending = {
            let mut map = self.pending.lock();
            if map.insert(key.to_string(), persist).is_some() {
                debug!(key = %key, "Replaced pending write-back entry");
            }
            map.len()
        };
        CacheMetrics::write_back_pending(pending);

        if self.sender.send(WorkerMessage::Schedule).is_err() {
            warn!(key = %key, "Write-back worker stopped, entry waits for an explicit flush");
        }
    }
}

async fn run_worker(
    pending: PendingWrites,
    mut receiver: mpsc::UnboundedReceiver<WorkerMessage>,
    interval: Duration,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        let timer = async move {
            match deadline {
                Some(at) => sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            message = receiver.recv() => match message {
                Some(WorkerMessage::Schedule) => {
                    if deadline.is_none() {
                        deadline = Some(Instant::now() + interval);
                        debug!(interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX), "Write-back flush scheduled");
                    }
                }
                Some(WorkerMessage::Shutdown(reply)) => {
                    let report = flush_pending(&pending).await;
                    let _ = reply.send(report);
                    break;
                }
                None => {
                    flush_pending(&pending).await;
                    break;
                }
            },
            () = timer => {
                deadline = None;
                flush_pending(&pending).await;
            }
        }
    }

    debug!("Write-back worker stopped");
}

async fn flush_pending(pending: &Mutex<HashMap<String, PersistFn>>) -> FlushReport {
    let batch = std::mem::take(&mut *pending.lock());
    CacheMetrics::write_back_pending(0);

    if batch.is_empty() {
        return FlushReport::default();
    }

    let attempted = batch.len();
    debug!(entries = attempted, "Flushing write-back batch");

    let outcomes = join_all(batch.into_iter().map(|(key, persist)| async move {
        match AssertUnwindSafe(persist(key.clone())).catch_unwind().await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(key = %key, error = %e, "Write-back persist failed");
                false
            }
            Err(_) => {
                error!(key = %key, "Write-back writer panicked");
                false
            }
        }
    }))
    .await;

    let succeeded = outcomes.iter().filter(|ok| **ok).count();
    let failed = attempted - succeeded;
    CacheMetrics::write_back_flushed(succeeded, failed);
    info!(attempted, succeeded, failed, "Write-back flush completed");

    FlushReport {
        attempted,
        succeeded,
        failed,
    }
}

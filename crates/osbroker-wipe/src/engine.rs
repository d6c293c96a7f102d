//! The bulk-deletion engine.
//!
//! One versioning probe per run selects the object loop or the version
//! loop. Each loop lists pages through continuation markers and submits one
//! delete task per entry to a fixed-width worker pool. Outstanding task
//! handles are kept in submission order; whenever they exceed the queue
//! capacity the oldest half of the capacity is drained before listing
//! continues, keeping memory bounded without blocking every submission. A
//! final drain follows the last page.
//!
//! Per-task failures land in a shared error list instead of aborting the
//! run. [`BucketWipe::stop`] cancels queued and running delete tasks
//! immediately; an in-flight listing call is never interrupted, the loop
//! observes cancellation between pages.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tracing::info;
use typed_builder::TypedBuilder;

use crate::client::{ClientResult, ObjectClient};

/// Wipe engine configuration.
///
/// # Examples
///
/// ```
/// use osbroker_wipe::WipeConfig;
///
/// let config = WipeConfig::default();
/// assert_eq!(config.workers, 32);
/// assert_eq!(config.queue_size, 2000);
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct WipeConfig {
    /// Width of the delete worker pool.
    #[builder(default = 32)]
    pub workers: usize,

    /// Outstanding-task capacity before the engine proactively drains.
    #[builder(default = 2000)]
    pub queue_size: usize,
}

impl Default for WipeConfig {
    fn default() -> Self {
        Self {
            workers: 32,
            queue_size: 2000,
        }
    }
}

/// Outcome of a single delete task. Failures carry the message collected
/// into the engine's error list.
type TaskResult = Result<(), String>;

/// The concurrent bucket-emptying engine.
pub struct BucketWipe {
    client: Arc<dyn ObjectClient>,
    workers: Arc<Semaphore>,
    queue_size: usize,
    errors: Mutex<Vec<String>>,
    last_key: Mutex<Option<String>>,
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
}

impl std::fmt::Debug for BucketWipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketWipe")
            .field("queue_size", &self.queue_size)
            .field("error_count", &self.errors.lock().len())
            .finish_non_exhaustive()
    }
}

impl BucketWipe {
    /// Build an engine over the given client.
    #[must_use]
    pub fn new(client: Arc<dyn ObjectClient>, config: WipeConfig) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            client,
            workers: Arc::new(Semaphore::new(config.workers.max(1))),
            queue_size: config.queue_size.max(1),
            errors: Mutex::new(Vec::new()),
            last_key: Mutex::new(None),
            cancel_tx,
            cancel_rx,
        }
    }

    /// Cancel all queued and running delete tasks. An in-flight listing
    /// call is not interrupted; the listing loop stops at the next page
    /// boundary.
    pub fn stop(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Failure messages collected so far.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    /// The last key handed to a delete task, version-qualified for
    /// versioned runs.
    #[must_use]
    pub fn last_key(&self) -> Option<String> {
        self.last_key.lock().clone()
    }

    /// Empty the bucket, deleting every object or, when versioning is
    /// enabled, every version of every object. Returns the number of
    /// successful deletes; per-entry failures are collected into
    /// [`BucketWipe::errors`] rather than raised.
    pub async fn delete_all_objects(&self, bucket: &str) -> ClientResult<u64> {
        if self.client.versioning_enabled(bucket).await? {
            self.delete_all_versions(bucket, "").await
        } else {
            self.delete_objects_loop(bucket, "").await
        }
    }

    async fn delete_objects_loop(&self, bucket: &str, prefix: &str) -> ClientResult<u64> {
        info!(bucket, "deleting all objects");

        let mut futures: VecDeque<JoinHandle<TaskResult>> = VecDeque::new();
        let mut deleted: u64 = 0;
        let mut marker: Option<String> = None;

        loop {
            if *self.cancel_rx.borrow() {
                break;
            }

            let listing = self
                .client
                .list_objects(bucket, prefix, marker.as_deref())
                .await?;

            for key in listing.keys {
                *self.last_key.lock() = Some(key.clone());
                futures.push_back(self.submit_delete(bucket, key, None));
            }

            while futures.len() > self.queue_size {
                deleted += self.drain(&mut futures, (self.queue_size / 2).max(1)).await;
            }

            if !listing.is_truncated {
                break;
            }
            marker = listing.next_marker;
        }

        let remaining = futures.len();
        deleted += self.drain(&mut futures, remaining).await;

        info!(bucket, deleted, "deleted objects");
        Ok(deleted)
    }

    async fn delete_all_versions(&self, bucket: &str, prefix: &str) -> ClientResult<u64> {
        info!(bucket, "deleting all versions");

        let mut futures: VecDeque<JoinHandle<TaskResult>> = VecDeque::new();
        let mut deleted: u64 = 0;
        let mut key_marker: Option<String> = None;
        let mut version_id_marker: Option<String> = None;

        loop {
            if *self.cancel_rx.borrow() {
                break;
            }

            let listing = self
                .client
                .list_versions(
                    bucket,
                    prefix,
                    key_marker.as_deref(),
                    version_id_marker.as_deref(),
                )
                .await?;

            for version in listing.versions {
                *self.last_key.lock() =
                    Some(format!("{} (version {})", version.key, version.version_id));
                futures.push_back(self.submit_delete(bucket, version.key, Some(version.version_id)));
            }

            while futures.len() > self.queue_size {
                deleted += self.drain(&mut futures, (self.queue_size / 2).max(1)).await;
            }

            if !listing.is_truncated {
                break;
            }
            key_marker = listing.next_key_marker;
            version_id_marker = listing.next_version_id_marker;
        }

        let remaining = futures.len();
        deleted += self.drain(&mut futures, remaining).await;

        info!(bucket, deleted, "deleted versions");
        Ok(deleted)
    }

    /// Submit one delete task to the worker pool. The task waits for a
    /// worker permit, decodes the listed key, and issues the delete, bailing
    /// out at either point when the engine is stopped.
    fn submit_delete(
        &self,
        bucket: &str,
        key: String,
        version_id: Option<String>,
    ) -> JoinHandle<TaskResult> {
        let client = Arc::clone(&self.client);
        let workers = Arc::clone(&self.workers);
        let mut cancel = self.cancel_rx.clone();
        let bucket = bucket.to_owned();

        tokio::spawn(async move {
            let permit = tokio::select! {
                _ = cancel.wait_for(|stopped| *stopped) => {
                    return Err(format!("delete of {key} cancelled"));
                }
                permit = workers.acquire_owned() => {
                    permit.map_err(|e| e.to_string())?
                }
            };
            let _permit = permit;

            let decoded = percent_encoding::percent_decode_str(&key)
                .decode_utf8()
                .map_err(|e| format!("invalid key encoding for {key}: {e}"))?
                .into_owned();

            tokio::select! {
                _ = cancel.wait_for(|stopped| *stopped) => {
                    Err(format!("delete of {key} cancelled"))
                }
                result = async {
                    match &version_id {
                        Some(version_id) => {
                            client.delete_version(&bucket, &decoded, version_id).await
                        }
                        None => client.delete_object(&bucket, &decoded).await,
                    }
                } => result.map_err(|e| e.to_string()),
            }
        })
    }

    /// Await up to `count` of the oldest outstanding tasks, counting
    /// successes and collecting failures.
    async fn drain(&self, futures: &mut VecDeque<JoinHandle<TaskResult>>, count: usize) -> u64 {
        let mut completed = 0;
        for _ in 0..count {
            let Some(handle) = futures.pop_front() else {
                break;
            };
            match handle.await {
                Ok(Ok(())) => completed += 1,
                Ok(Err(message)) => self.errors.lock().push(message),
                Err(join_error) => self.errors.lock().push(join_error.to_string()),
            }
        }
        completed
    }
}

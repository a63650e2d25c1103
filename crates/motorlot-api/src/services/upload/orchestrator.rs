//! Batch Upload Orchestrator
//!
//! Fans a batch of staged files out to the transfer client through a bounded
//! worker pool and folds the per-file results into one all-or-nothing answer.

use super::types::UploadTask;
use motorlot_core::{AppError, Bucket, TransferOutcome, UploadedImage};
use motorlot_storage::RemoteTransferClient;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// A batch in which at least one transfer failed
///
/// Nothing of the batch should be persisted. When rollback is enabled the
/// objects that did reach the remote store have already been deleted.
#[derive(Debug)]
pub struct BatchFailure {
    pub total: usize,
    pub failed: usize,
    /// Tasks that never started because the batch had already failed.
    pub skipped: usize,
    pub rolled_back: usize,
    /// Error of the failed task with the lowest submission order.
    pub cause: AppError,
}

impl From<BatchFailure> for AppError {
    fn from(failure: BatchFailure) -> Self {
        if failure.total == 1 {
            return failure.cause;
        }
        AppError::BatchFailed {
            failed: failure.failed,
            total: failure.total,
            cause: failure.cause.to_string(),
        }
    }
}

enum TaskResult {
    Stored(TransferOutcome),
    Failed(AppError),
    Skipped,
}

#[derive(Clone)]
pub struct BatchUploadOrchestrator {
    client: RemoteTransferClient,
    permits: Arc<Semaphore>,
    rollback_on_failure: bool,
}

impl BatchUploadOrchestrator {
    /// `max_concurrent` bounds simultaneous remote sessions across all batches.
    pub fn new(client: RemoteTransferClient, max_concurrent: usize, rollback_on_failure: bool) -> Self {
        Self {
            client,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            rollback_on_failure,
        }
    }

    pub fn client(&self) -> &RemoteTransferClient {
        &self.client
    }

    /// Transfer every task into `bucket`.
    ///
    /// On success the images come back sorted by submission order and the
    /// lowest order is marked as the main image. Every staged file is deleted
    /// before this returns, whatever the outcome.
    ///
    /// The batch runs on its own task: if the caller is dropped mid-batch,
    /// in-flight transfers still finish, release their sessions and are rolled
    /// back on failure.
    #[tracing::instrument(skip(self, tasks), fields(bucket = %bucket, batch.size = tasks.len()))]
    pub async fn run(
        &self,
        bucket: &Bucket,
        tasks: Vec<UploadTask>,
    ) -> Result<Vec<UploadedImage>, BatchFailure> {
        let total = tasks.len();
        let orchestrator = self.clone();
        let bucket = bucket.clone();

        tokio::spawn(async move { orchestrator.run_batch(&bucket, tasks).await }.in_current_span())
            .await
            .unwrap_or_else(|join_error| {
                Err(BatchFailure {
                    total,
                    failed: total,
                    skipped: 0,
                    rolled_back: 0,
                    cause: AppError::Internal(format!("Upload batch task failed: {}", join_error)),
                })
            })
    }

    async fn run_batch(
        &self,
        bucket: &Bucket,
        tasks: Vec<UploadTask>,
    ) -> Result<Vec<UploadedImage>, BatchFailure> {
        let start = Instant::now();
        let total = tasks.len();
        let primary = tasks.iter().map(|t| t.submission_order).min();
        let cancel = CancellationToken::new();
        let mut set = JoinSet::new();

        for task in tasks {
            let client = self.client.clone();
            let permits = self.permits.clone();
            let cancel = cancel.clone();
            let bucket = bucket.clone();

            set.spawn(async move {
                let order = task.submission_order;

                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => TaskResult::Skipped,
                    permit = permits.acquire_owned() => match permit {
                        Ok(_permit) => match client.transfer(task.local_path(), &bucket).await {
                            Ok(outcome) => TaskResult::Stored(outcome),
                            Err(e) => TaskResult::Failed(e.into()),
                        },
                        Err(_) => TaskResult::Failed(AppError::Internal(
                            "Transfer pool is closed".to_string(),
                        )),
                    },
                };

                if matches!(result, TaskResult::Failed(_)) {
                    cancel.cancel();
                }

                task.discard().await;
                (order, result)
            });
        }

        let mut stored: Vec<(usize, TransferOutcome)> = Vec::with_capacity(total);
        let mut failures: Vec<(usize, AppError)> = Vec::new();
        let mut skipped = 0;

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((order, TaskResult::Stored(outcome))) => stored.push((order, outcome)),
                Ok((order, TaskResult::Failed(err))) => failures.push((order, err)),
                Ok((_, TaskResult::Skipped)) => skipped += 1,
                Err(join_error) => {
                    // The task's staged file was removed by its drop guard during unwind.
                    cancel.cancel();
                    failures.push((
                        usize::MAX,
                        AppError::Internal(format!("Transfer task failed: {}", join_error)),
                    ));
                }
            }
        }

        if failures.is_empty() {
            stored.sort_by_key(|(order, _)| *order);

            tracing::info!(
                stored = stored.len(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Upload batch stored"
            );

            return Ok(stored
                .into_iter()
                .map(|(order, outcome)| {
                    UploadedImage::from_outcome(outcome, order, Some(order) == primary)
                })
                .collect());
        }

        failures.sort_by_key(|(order, _)| *order);
        let failed = failures.len();
        let rolled_back = if self.rollback_on_failure {
            self.roll_back(&stored).await
        } else {
            0
        };

        tracing::error!(
            total = total,
            failed = failed,
            skipped = skipped,
            stored = stored.len(),
            rolled_back = rolled_back,
            error = %failures[0].1,
            "Upload batch failed"
        );

        let cause = failures.swap_remove(0).1;
        Err(BatchFailure {
            total,
            failed,
            skipped,
            rolled_back,
            cause,
        })
    }

    async fn roll_back(&self, stored: &[(usize, TransferOutcome)]) -> usize {
        let mut removed = 0;
        for (_, outcome) in stored {
            if self.client.delete(&outcome.remote_key).await {
                removed += 1;
                tracing::warn!(key = %outcome.remote_key, "Rolled back object of failed batch");
            } else {
                tracing::warn!(
                    key = %outcome.remote_key,
                    "Could not roll back object of failed batch, it is now orphaned"
                );
            }
        }
        removed
    }
}

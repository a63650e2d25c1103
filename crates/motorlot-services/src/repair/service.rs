use motorlot_core::{UrlNormalizer, UrlVerdict};
use motorlot_db::{ImageRecordStore, StoredImage};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Totals for one sweep run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    /// Records whose url failed validation.
    pub invalid: usize,
    /// Records rewritten in place, or that would be in a dry run.
    pub repaired: usize,
    /// Repairs that fell back to a placeholder image.
    pub placeholders: usize,
    /// Writes that failed; the sweep moved on.
    pub failed: usize,
}

impl SweepReport {
    fn count_repair(&mut self, placeholder: bool) {
        self.repaired += 1;
        if placeholder {
            self.placeholders += 1;
        }
    }
}

/// Rewrites persisted image urls that fail validation
///
/// Meant to be run on demand as a data-quality backstop, not on a schedule.
#[derive(Clone)]
pub struct RepairSweep {
    store: Arc<dyn ImageRecordStore>,
    normalizer: Arc<UrlNormalizer>,
    batch_size: i64,
    dry_run: bool,
}

impl RepairSweep {
    pub fn new(
        store: Arc<dyn ImageRecordStore>,
        normalizer: Arc<UrlNormalizer>,
        batch_size: i64,
    ) -> Self {
        Self {
            store,
            normalizer,
            batch_size: batch_size.max(1),
            dry_run: false,
        }
    }

    /// Count what would change without writing anything
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Scan every record in id order and repair the invalid ones.
    ///
    /// A failed write is logged and counted; only a failed page read aborts
    /// the sweep.
    #[tracing::instrument(skip(self), fields(repair.batch_size = self.batch_size, repair.dry_run = self.dry_run))]
    pub async fn sweep(&self) -> Result<SweepReport, anyhow::Error> {
        let start = Instant::now();
        let mut report = SweepReport::default();
        let mut cursor = None;

        loop {
            let batch = self.store.fetch_batch(cursor, self.batch_size).await?;
            let Some(last) = batch.last() else {
                break;
            };
            cursor = Some(last.id);
            let page_len = batch.len();

            for record in &batch {
                self.repair_one(record, &mut report).await;
            }

            tracing::info!(
                scanned = report.scanned,
                repaired = report.repaired,
                failed = report.failed,
                "Repair sweep progress"
            );

            if (page_len as i64) < self.batch_size {
                break;
            }
        }

        tracing::info!(
            scanned = report.scanned,
            invalid = report.invalid,
            repaired = report.repaired,
            placeholders = report.placeholders,
            failed = report.failed,
            dry_run = self.dry_run,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Repair sweep completed"
        );

        Ok(report)
    }

    async fn repair_one(&self, record: &StoredImage, report: &mut SweepReport) {
        report.scanned += 1;

        let Some(repaired) = self.normalizer.repair_record(
            record.url.as_deref(),
            record.key.as_deref(),
            record.label.as_deref(),
        ) else {
            return;
        };
        report.invalid += 1;

        let is_placeholder = self.normalizer.classify(&repaired) == UrlVerdict::Placeholder;

        tracing::debug!(
            record_id = %record.id,
            owner_kind = %record.owner_kind,
            old_url = ?record.url,
            new_url = %repaired,
            "Invalid image url"
        );

        if self.dry_run {
            report.count_repair(is_placeholder);
            return;
        }

        match self.store.update_url(record.id, &repaired).await {
            Ok(()) => report.count_repair(is_placeholder),
            Err(e) => {
                report.failed += 1;
                tracing::error!(
                    error = %e,
                    record_id = %record.id,
                    "Failed to write repaired url, continuing"
                );
            }
        }
    }
}

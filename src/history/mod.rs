use std::fmt;

use jiff::Timestamp;
use registry::StoreRegistry;
use tracing::{debug, info, warn};

pub use error::{ErrorKind, HistoryError};
pub use sample::{HistoryPoint, Peak, Sample, ceil_second, floor_second};

pub mod error;
pub mod registry;
pub mod sample;

/// Steam application id
pub type AppId = u32;

/// Concurrent user history for every tracked app
#[derive(Debug, Clone)]
pub struct History {
    registry: StoreRegistry,
}

#[derive(Debug, Default)]
pub struct CleanupReport {
    /// stores that were cleaned
    pub cleaned: usize,
    /// rows removed across all stores
    pub removed: usize,
    /// apps that had no store yet
    pub skipped: usize,
    pub failed: Vec<(AppId, HistoryError)>,
}

impl History {
    pub fn new(registry: StoreRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &StoreRegistry {
        &self.registry
    }

    /// Appends one sample. Never overwrites: a second sample
    /// in the same second fails with [`HistoryError::DuplicateTime`].
    pub async fn record(
        &self,
        app_id: AppId,
        count: i64,
        time: Timestamp,
    ) -> Result<(), HistoryError> {
        let sample = Sample::new(time, count)?;

        let store = self.registry.resolve(app_id).await?;
        let inserted = store.insert(sample.time.as_second(), sample.count).await?;
        store.close().await?;

        if !inserted {
            return Err(HistoryError::DuplicateTime {
                app_id,
                time: sample.time,
            });
        }
        debug!(app_id, count, time = %sample.time, "recorded sample");
        Ok(())
    }

    /// Every sample for `app_id`, oldest first
    pub async fn samples(&self, app_id: AppId) -> Result<Vec<Sample>, HistoryError> {
        let store = self.registry.resolve(app_id).await?;
        let rows = store.rows().await?;
        store.close().await?;

        rows.into_iter().map(Sample::from_row).collect()
    }

    /// Full history as `[millis, count]` points, oldest first.
    /// Unknown apps get an empty store and an empty history.
    pub async fn all_history(&self, app_id: AppId) -> Result<Vec<HistoryPoint>, HistoryError> {
        Ok(self
            .samples(app_id)
            .await?
            .iter()
            .map(Sample::to_point)
            .collect())
    }

    /// Largest count in `[start, end]`. Ties go to the earliest sample.
    pub async fn peak_between(
        &self,
        app_id: AppId,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Peak, HistoryError> {
        if start > end {
            return Err(HistoryError::InvertedInterval { start, end });
        }

        // stored times are whole seconds, keep only those within [start, end]
        let (start_secs, end_secs) = (ceil_second(start)?, floor_second(end)?);

        let store = self.registry.resolve(app_id).await?;
        let row = store.peak(start_secs, end_secs).await?;
        store.close().await?;

        let Some(row) = row else {
            return Err(HistoryError::NoSamples { app_id, start, end });
        };
        let sample = Sample::from_row(row)?;
        Ok(Peak {
            count: sample.count,
            time: sample.time,
        })
    }

    /// Drops every zero count sample for `app_id`.
    ///
    /// Steam occasionally reports 0 players for apps that clearly have
    /// some. A real zero looks identical and is removed as well.
    pub async fn cleanup(&self, app_id: AppId) -> Result<usize, HistoryError> {
        let store = self.registry.open_existing(app_id).await?;
        let removed = store.delete_zero_counts().await?;
        store.close().await?;

        debug!(app_id, removed, "cleaned store");
        Ok(removed)
    }

    /// Runs [`Self::cleanup`] for every app. One failing app never stops the rest.
    pub async fn cleanup_all<I>(&self, app_ids: I) -> CleanupReport
    where
        I: IntoIterator<Item = AppId>,
    {
        let mut report = CleanupReport::default();
        for app_id in app_ids {
            match self.cleanup(app_id).await {
                Ok(removed) => {
                    report.cleaned += 1;
                    report.removed += removed;
                }
                Err(HistoryError::StoreNotFound(_)) => report.skipped += 1,
                Err(e) => {
                    warn!(app_id, "cleanup failed: {e}");
                    report.failed.push((app_id, e));
                }
            }
        }

        info!(
            cleaned = report.cleaned,
            removed = report.removed,
            skipped = report.skipped,
            failed = report.failed.len(),
            "cleanup finished"
        );
        report
    }

    /// Cleans every store currently on disk
    pub async fn cleanup_stored(&self) -> Result<CleanupReport, HistoryError> {
        let app_ids = self.stored_apps().await?;
        Ok(self.cleanup_all(app_ids).await)
    }

    /// App ids that have a history store on disk, ascending
    pub async fn stored_apps(&self) -> Result<Vec<AppId>, HistoryError> {
        self.registry.list().await
    }

    /// Deletes all history for an app that is no longer tracked
    pub async fn remove_history(&self, app_id: AppId) -> Result<(), HistoryError> {
        self.registry.remove(app_id).await?;
        info!(app_id, "removed history");
        Ok(())
    }
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cleaned {} stores ({} samples removed), skipped {}, failed {}",
            self.cleaned,
            self.removed,
            self.skipped,
            self.failed.len()
        )?;
        for (app_id, e) in &self.failed {
            write!(f, "\n  {app_id}: {e}")?;
        }
        Ok(())
    }
}

use std::fmt;

use futures_util::{StreamExt, stream};
use jiff::Timestamp;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    history::{AppId, CleanupReport, History, HistoryError},
    steam::{UserCountSource, error::SteamError},
};

#[derive(Error, Debug)]
pub enum SampleError {
    #[error("fetching player count: {0}")]
    Fetch(#[from] SteamError),
    #[error("storing sample: {0}")]
    Store(#[from] HistoryError),
}

#[derive(Debug, Default)]
pub struct SampleReport {
    pub recorded: usize,
    pub failed: Vec<(AppId, SampleError)>,
}

/// Fetches the current player count of every app and records it at `at`.
/// At most `concurrency` requests run at once, and one failing app
/// never stops the rest.
pub async fn take_samples<S, I>(
    history: &History,
    source: &S,
    app_ids: I,
    at: Timestamp,
    concurrency: usize,
) -> SampleReport
where
    S: UserCountSource,
    I: IntoIterator<Item = AppId>,
{
    let results: Vec<(AppId, Result<(), SampleError>)> = stream::iter(app_ids)
        .map(|app_id| async move {
            let res: Result<(), SampleError> = async {
                let count = source.user_count(app_id).await?;
                history.record(app_id, count, at).await?;
                Ok(())
            }
            .await;
            (app_id, res)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = SampleReport::default();
    for (app_id, res) in results {
        match res {
            Ok(()) => report.recorded += 1,
            Err(e) => {
                warn!(app_id, "sampling failed: {e}");
                report.failed.push((app_id, e));
            }
        }
    }

    info!(
        recorded = report.recorded,
        failed = report.failed.len(),
        at = %at,
        "sampling finished"
    );
    report
}

/// Which apps Steam still reports player counts for
#[derive(Debug, Default)]
pub struct UsabilityReport {
    pub usable: Vec<AppId>,
    pub unusable: Vec<AppId>,
    /// Apps that could not be classified, ex. the request itself failed
    pub failed: Vec<(AppId, SteamError)>,
}

/// Asks Steam for the player count of every app. An app Steam answers
/// with a non-success result for is unusable, any other failure leaves
/// the app unclassified.
pub async fn detect_unusable<S, I>(source: &S, app_ids: I, concurrency: usize) -> UsabilityReport
where
    S: UserCountSource,
    I: IntoIterator<Item = AppId>,
{
    let results: Vec<(AppId, Result<i64, SteamError>)> = stream::iter(app_ids)
        .map(|app_id| async move { (app_id, source.user_count(app_id).await) })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = UsabilityReport::default();
    for (app_id, res) in results {
        match res {
            Ok(_) => report.usable.push(app_id),
            Err(SteamError::Unavailable { .. }) => report.unusable.push(app_id),
            Err(e) => {
                warn!(app_id, "usability check failed: {e}");
                report.failed.push((app_id, e));
            }
        }
    }
    report.usable.sort_unstable();
    report.unusable.sort_unstable();
    report.failed.sort_unstable_by_key(|(app_id, _)| *app_id);

    info!(
        usable = report.usable.len(),
        unusable = report.unusable.len(),
        failed = report.failed.len(),
        "usability detection finished"
    );
    report
}

/// Removes zero count samples from every stored app that is still usable.
/// Unusable and unclassified apps are left untouched.
pub async fn cleanup_usable<S>(
    history: &History,
    source: &S,
    concurrency: usize,
) -> Result<(UsabilityReport, CleanupReport), HistoryError>
where
    S: UserCountSource,
{
    let stored = history.stored_apps().await?;
    let usability = detect_unusable(source, stored, concurrency).await;
    let cleanup = history.cleanup_all(usability.usable.iter().copied()).await;
    Ok((usability, cleanup))
}

/// Deletes the history of every app in `report.unusable`.
/// Returns how many stores went, failures are logged and skipped.
pub async fn remove_unusable(history: &History, report: &UsabilityReport) -> usize {
    let mut removed = 0;
    for &app_id in &report.unusable {
        match history.remove_history(app_id).await {
            Ok(()) => removed += 1,
            Err(HistoryError::StoreNotFound(_)) => {}
            Err(e) => warn!(app_id, "removing unusable app failed: {e}"),
        }
    }
    removed
}

impl fmt::Display for UsabilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "usable {}, unusable {}, failed {}",
            self.usable.len(),
            self.unusable.len(),
            self.failed.len()
        )?;
        for app_id in &self.unusable {
            write!(f, "\n  unusable: {app_id}")?;
        }
        for (app_id, e) in &self.failed {
            write!(f, "\n  {app_id}: {e}")?;
        }
        Ok(())
    }
}

impl fmt::Display for SampleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recorded {}, failed {}", self.recorded, self.failed.len())?;
        for (app_id, e) in &self.failed {
            write!(f, "\n  {app_id}: {e}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use jiff::Timestamp;
    use tempfile::TempDir;

    use super::{SampleError, cleanup_usable, detect_unusable, remove_unusable, take_samples};
    use crate::{
        history::{AppId, History, HistoryPoint, registry::StoreRegistry},
        steam::{UserCountSource, error::SteamError},
    };

    struct FakeSteam(HashMap<AppId, i64>);

    /// Ids at or above this fail with a decode error instead of a Steam result
    const BROKEN_FROM: AppId = 1_000_000;

    impl UserCountSource for FakeSteam {
        async fn user_count(&self, app_id: AppId) -> Result<i64, SteamError> {
            if app_id >= BROKEN_FROM {
                let e = serde_json::from_str::<i64>("{").unwrap_err();
                return Err(SteamError::Decode(e));
            }
            match self.0.get(&app_id) {
                Some(count) => Ok(*count),
                None => Err(SteamError::Unavailable { app_id, result: 42 }),
            }
        }
    }

    fn t(secs: i64) -> Timestamp {
        Timestamp::from_second(1_700_000_000 + secs).unwrap()
    }

    #[tokio::test]
    async fn test_take_samples() {
        let tmp = TempDir::new().unwrap();
        let history = History::new(StoreRegistry::new(tmp.path()));
        let steam = FakeSteam(HashMap::from([(570, 800_000), (440, 60_000), (10, 0)]));
        let at = Timestamp::from_second(1_700_000_000).unwrap();

        let report = take_samples(&history, &steam, [570, 440, 10, 99], at, 2).await;
        assert_eq!(report.recorded, 3);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 99);
        assert!(matches!(report.failed[0].1, SampleError::Fetch(_)));

        let ms = at.as_millisecond();
        assert_eq!(
            history.all_history(570).await.unwrap(),
            vec![HistoryPoint(ms, 800_000)]
        );
        assert_eq!(history.all_history(10).await.unwrap(), vec![HistoryPoint(ms, 0)]);
    }

    #[tokio::test]
    async fn test_resample_same_instant_fails_per_app() {
        let tmp = TempDir::new().unwrap();
        let history = History::new(StoreRegistry::new(tmp.path()));
        let steam = FakeSteam(HashMap::from([(570, 5)]));
        let at = Timestamp::from_second(1_700_000_000).unwrap();

        assert_eq!(take_samples(&history, &steam, [570], at, 1).await.recorded, 1);

        let report = take_samples(&history, &steam, [570], at, 1).await;
        assert_eq!(report.recorded, 0);
        assert!(matches!(report.failed[0].1, SampleError::Store(_)));
    }

    #[tokio::test]
    async fn test_detect_unusable() {
        let steam = FakeSteam(HashMap::from([(570, 800_000), (10, 0)]));

        let report = detect_unusable(&steam, [99, 570, BROKEN_FROM, 10, 7], 3).await;
        assert_eq!(report.usable, vec![10, 570]);
        assert_eq!(report.unusable, vec![7, 99]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, BROKEN_FROM);
        assert!(matches!(report.failed[0].1, SteamError::Decode(_)));
    }

    #[tokio::test]
    async fn test_cleanup_usable_skips_unusable_apps() {
        let tmp = TempDir::new().unwrap();
        let history = History::new(StoreRegistry::new(tmp.path()));
        for app_id in [570, 99, BROKEN_FROM] {
            history.record(app_id, 0, t(0)).await.unwrap();
            history.record(app_id, 3, t(1)).await.unwrap();
        }
        let steam = FakeSteam(HashMap::from([(570, 1)]));

        let (usability, cleanup) = cleanup_usable(&history, &steam, 2).await.unwrap();
        assert_eq!(usability.usable, vec![570]);
        assert_eq!(usability.unusable, vec![99]);
        assert_eq!((cleanup.cleaned, cleanup.removed), (1, 1));

        let ms = t(0).as_millisecond();
        assert_eq!(
            history.all_history(570).await.unwrap(),
            vec![HistoryPoint(ms + 1000, 3)]
        );
        for app_id in [99, BROKEN_FROM] {
            assert_eq!(history.all_history(app_id).await.unwrap().len(), 2);
        }
    }

    #[tokio::test]
    async fn test_remove_unusable() {
        let tmp = TempDir::new().unwrap();
        let history = History::new(StoreRegistry::new(tmp.path()));
        history.record(570, 5, t(0)).await.unwrap();
        history.record(99, 5, t(0)).await.unwrap();
        let steam = FakeSteam(HashMap::from([(570, 1)]));

        // 7 is unusable but was never stored
        let report = detect_unusable(&steam, [570, 99, 7], 1).await;
        assert_eq!(remove_unusable(&history, &report).await, 1);
        assert_eq!(history.stored_apps().await.unwrap(), vec![570]);
    }
}

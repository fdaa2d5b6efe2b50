use std::time::Duration;

use jiff::{SignedDuration, Timestamp};
use tokio::time::{self, MissedTickBehavior};
use tracing::info;

use crate::{
    config::HistoryConfig,
    history::{CleanupReport, History, HistoryError},
    sampler,
    steam::{AppCatalog, SteamClient},
};

use super::{
    error::DispatchError,
    model::{CleanupArgs, CliCommands, DetectArgs, SampleArgs},
};

/// What every command runs against
pub struct Context {
    pub history: History,
    pub cfg: HistoryConfig,
}

impl CliCommands {
    /// Runs the command, returning anything that should be printed
    pub async fn dispatch(self, ctx: &Context) -> Result<Option<String>, DispatchError> {
        Ok(match self {
            CliCommands::Record(args) => {
                let at = args.at.unwrap_or_else(Timestamp::now);
                ctx.history.record(args.app_id, args.count, at).await?;
                None
            }
            CliCommands::History(args) => {
                let points = ctx.history.all_history(args.app_id).await?;
                Some(serde_json::to_string(&points)?)
            }
            CliCommands::Peak(args) => {
                match ctx.history.peak_between(args.app_id, args.start, args.end).await {
                    Ok(peak) => Some(format!("{} at {}", peak.count, peak.time)),
                    Err(HistoryError::NoSamples { .. }) => Some(format!(
                        "no samples for app {} between {} and {}",
                        args.app_id, args.start, args.end
                    )),
                    Err(e) => return Err(e.into()),
                }
            }
            CliCommands::Sample(args) => sample(ctx, args).await?,
            CliCommands::Cleanup(args) => Some(cleanup(ctx, args).await?),
            CliCommands::DetectUnusable(args) => Some(detect_unusable(ctx, args).await?),
            CliCommands::Remove(args) => {
                ctx.history.remove_history(args.app_id).await?;
                None
            }
        })
    }
}

async fn sample(ctx: &Context, args: SampleArgs) -> Result<Option<String>, DispatchError> {
    let steam = SteamClient::new(&ctx.cfg.steam)?;
    let concurrency = ctx.cfg.sample_concurrency;

    let Some(every) = args.every else {
        let report = sampler::take_samples(
            &ctx.history,
            &steam,
            args.app_ids,
            Timestamp::now(),
            concurrency,
        )
        .await;
        return Ok(Some(report.to_string()));
    };

    let mut interval = time::interval(period(every)?);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(period = %every, apps = args.app_ids.len(), "sampling periodically");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                sampler::take_samples(
                    &ctx.history,
                    &steam,
                    args.app_ids.iter().copied(),
                    Timestamp::now(),
                    concurrency,
                )
                .await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("stopping sampler");
                return Ok(None);
            }
        }
    }
}

fn period(every: SignedDuration) -> Result<Duration, DispatchError> {
    match Duration::try_from(every) {
        Ok(d) if !d.is_zero() => Ok(d),
        _ => Err(DispatchError::InvalidPeriod(every.to_string())),
    }
}

async fn cleanup(ctx: &Context, args: CleanupArgs) -> Result<String, DispatchError> {
    if args.usable {
        let steam = SteamClient::new(&ctx.cfg.steam)?;
        let (usability, report) =
            sampler::cleanup_usable(&ctx.history, &steam, ctx.cfg.sample_concurrency).await?;
        return Ok(format!("{usability}\n{report}"));
    }
    if !args.catalog {
        return Ok(ctx.history.cleanup_stored().await?.to_string());
    }

    let steam = SteamClient::new(&ctx.cfg.steam)?;
    let apps = steam.apps().await?;
    let report: CleanupReport = ctx
        .history
        .cleanup_all(apps.into_iter().map(|app| app.id))
        .await;
    Ok(report.to_string())
}

async fn detect_unusable(ctx: &Context, args: DetectArgs) -> Result<String, DispatchError> {
    let app_ids = if args.app_ids.is_empty() {
        ctx.history.stored_apps().await?
    } else {
        args.app_ids
    };

    let steam = SteamClient::new(&ctx.cfg.steam)?;
    let report = sampler::detect_unusable(&steam, app_ids, ctx.cfg.sample_concurrency).await;
    if !args.remove {
        return Ok(report.to_string());
    }

    let removed = sampler::remove_unusable(&ctx.history, &report).await;
    Ok(format!("{report}\nremoved {removed} stores"))
}

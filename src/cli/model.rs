use std::path::PathBuf;

use clap_derive::{Args, Parser, Subcommand};
use jiff::{SignedDuration, Timestamp};

use crate::history::AppId;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// RON config file, missing is fine
    #[arg(long, default_value = "./config.ron")]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: CliCommands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommands {
    /// Record one sample by hand
    Record(RecordArgs),
    /// Print full history as `[[millis, count], ...]`
    #[command(alias = "hist")]
    History(AppArgs),
    /// Print the highest count within an interval
    Peak(PeakArgs),
    /// Fetch current player counts from Steam and record them
    Sample(SampleArgs),
    /// Remove zero count samples
    Cleanup(CleanupArgs),
    /// Find apps Steam no longer reports player counts for
    #[command(alias = "detect")]
    DetectUnusable(DetectArgs),
    /// Delete all history of an app
    #[command(alias = "rm")]
    Remove(AppArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AppArgs {
    pub app_id: AppId,
}

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    pub app_id: AppId,
    pub count: i64,
    /// RFC 3339 timestamp, defaults to now
    #[arg(long)]
    pub at: Option<Timestamp>,
}

#[derive(Args, Debug, Clone)]
pub struct PeakArgs {
    pub app_id: AppId,
    /// RFC 3339 timestamp, inclusive
    pub start: Timestamp,
    /// RFC 3339 timestamp, inclusive
    pub end: Timestamp,
}

#[derive(Args, Debug, Clone)]
pub struct SampleArgs {
    #[arg(required = true)]
    pub app_ids: Vec<AppId>,
    /// Keep sampling on this period (ex. `10m`, `PT1H`) until interrupted
    #[arg(long)]
    pub every: Option<SignedDuration>,
}

#[derive(Args, Debug, Clone)]
pub struct CleanupArgs {
    /// Clean every app in the Steam catalog instead of every store on disk
    #[arg(long, conflicts_with = "usable")]
    pub catalog: bool,
    /// Only clean stored apps Steam still reports player counts for
    #[arg(long)]
    pub usable: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
    /// Apps to check, every store on disk if none are given
    pub app_ids: Vec<AppId>,
    /// Delete the history of every unusable app found
    #[arg(long)]
    pub remove: bool,
}

#[cfg(test)]
mod test {
    use clap::Parser;
    use jiff::{SignedDuration, Timestamp};

    use super::{Cli, CliCommands};

    #[test]
    fn test_parse_peak() {
        let cli = Cli::try_parse_from([
            "steamhistory",
            "peak",
            "570",
            "2024-01-01T00:00:00Z",
            "2024-02-01T00:00:00Z",
        ])
        .unwrap();

        let CliCommands::Peak(args) = cli.command else {
            panic!("expected peak, got {:?}", cli.command);
        };
        assert_eq!(args.app_id, 570);
        assert_eq!(args.start, "2024-01-01T00:00:00Z".parse::<Timestamp>().unwrap());
        assert_eq!(args.end, "2024-02-01T00:00:00Z".parse::<Timestamp>().unwrap());
    }

    #[test]
    fn test_parse_sample() {
        let cli =
            Cli::try_parse_from(["steamhistory", "sample", "570", "440", "--every", "10m"]).unwrap();

        let CliCommands::Sample(args) = cli.command else {
            panic!("expected sample, got {:?}", cli.command);
        };
        assert_eq!(args.app_ids, vec![570, 440]);
        assert_eq!(args.every, Some(SignedDuration::from_mins(10)));

        assert!(Cli::try_parse_from(["steamhistory", "sample"]).is_err());
    }

    #[test]
    fn test_parse_detect_and_cleanup() {
        let cli = Cli::try_parse_from(["steamhistory", "detect", "--remove"]).unwrap();
        let CliCommands::DetectUnusable(args) = cli.command else {
            panic!("expected detect-unusable, got {:?}", cli.command);
        };
        assert!(args.app_ids.is_empty());
        assert!(args.remove);

        let cli = Cli::try_parse_from(["steamhistory", "detect-unusable", "570", "10"]).unwrap();
        let CliCommands::DetectUnusable(args) = cli.command else {
            panic!("expected detect-unusable, got {:?}", cli.command);
        };
        assert_eq!(args.app_ids, vec![570, 10]);
        assert!(!args.remove);

        let cli = Cli::try_parse_from(["steamhistory", "cleanup", "--usable"]).unwrap();
        let CliCommands::Cleanup(args) = cli.command else {
            panic!("expected cleanup, got {:?}", cli.command);
        };
        assert!(args.usable && !args.catalog);

        assert!(
            Cli::try_parse_from(["steamhistory", "cleanup", "--usable", "--catalog"]).is_err()
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Cli::try_parse_from(["steamhistory", "record", "570", "abc"]).is_err());
        assert!(Cli::try_parse_from(["steamhistory", "history", "-5"]).is_err());
        assert!(Cli::try_parse_from(["steamhistory", "peak", "570", "yesterday", "now"]).is_err());
    }

    #[test]
    fn test_negative_count_reaches_history() {
        // rejected later with a proper InvalidInput error, not by clap
        let cli = Cli::try_parse_from(["steamhistory", "record", "570", "--", "-1"]).unwrap();
        let CliCommands::Record(args) = cli.command else {
            panic!("expected record, got {:?}", cli.command);
        };
        assert_eq!(args.count, -1);
    }
}

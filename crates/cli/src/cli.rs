//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// DVS Capture - event camera capture, synchronization and recording
#[derive(Parser, Debug)]
#[command(
    name = "dvs-capture",
    author,
    version,
    about = "Event camera capture, synchronization and recording pipeline",
    long_about = "Captures event, IMU and frame streams from a dynamic vision sensor,\n\
                  drops samples recorded before the start threshold, and records the\n\
                  rest to a container file while driving a lossy live preview."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "DVS_CAPTURE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "DVS_CAPTURE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Prometheus metrics port (disabled when absent)
    #[arg(long, global = true, env = "DVS_CAPTURE_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a capture session against the mock device
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the resolved configuration
    Info(InfoArgs),

    /// Convert a recorded container to sidecar files
    Convert(ConvertArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "configs/capture.toml",
        env = "DVS_CAPTURE_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the recording output directory
    #[arg(short, long, env = "DVS_CAPTURE_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Stop after this many seconds (runs until Ctrl-C when absent)
    #[arg(long)]
    pub duration: Option<f64>,

    /// Override the start threshold (microseconds of device time)
    #[arg(long)]
    pub start_threshold_us: Option<i64>,

    /// Run without recording (preview only)
    #[arg(long)]
    pub no_record: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(default_value = "configs/capture.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(default_value = "configs/capture.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `convert` command
#[derive(Parser, Debug)]
pub struct ConvertArgs {
    /// Container file to convert
    pub container: PathBuf,

    /// Output directory
    #[arg(short, long)]
    pub output: PathBuf,

    /// UTC map written during capture
    #[arg(long)]
    pub utc: Option<PathBuf>,

    /// Skip writing frame PNGs
    #[arg(long)]
    pub no_images: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_overrides() {
        let cli = Cli::parse_from([
            "dvs-capture",
            "-v",
            "run",
            "--config",
            "a.toml",
            "--duration",
            "2.5",
            "--start-threshold-us",
            "5000000",
            "--no-record",
        ]);
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, PathBuf::from("a.toml"));
                assert_eq!(args.duration, Some(2.5));
                assert_eq!(args.start_threshold_us, Some(5_000_000));
                assert!(args.no_record);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_convert_args() {
        let cli = Cli::parse_from([
            "dvs-capture",
            "convert",
            "in.dvsrec",
            "--output",
            "out",
            "--utc",
            "utc.txt",
        ]);
        match cli.command {
            Commands::Convert(args) => {
                assert_eq!(args.container, PathBuf::from("in.dvsrec"));
                assert_eq!(args.utc, Some(PathBuf::from("utc.txt")));
                assert!(!args.no_images);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}

//! `validate` command implementation.

use contracts::CaptureConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::{CliError, Result};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    device: String,
    resolution: String,
    start_threshold_us: i64,
    recording: bool,
    record_kinds: Vec<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let config_path = args.config.display().to_string();
    let loaded = if args.config.exists() {
        config_loader::ConfigLoader::load_from_path(&args.config).map_err(CliError::Config)
    } else {
        Err(CliError::config_not_found(config_path.clone()))
    };
    let result = build_result(config_path, loaded.as_ref());

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .map_err(std::io::Error::from)?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    loaded.map(|_| ())
}

fn build_result(
    config_path: String,
    loaded: std::result::Result<&CaptureConfig, &CliError>,
) -> ValidationResult {
    match loaded {
        Ok(config) => ValidationResult {
            valid: true,
            config_path,
            error: None,
            warnings: collect_warnings(config),
            summary: Some(ConfigSummary {
                version: format!("{:?}", config.version),
                device: config.device.name.clone(),
                resolution: format!("{}x{}", config.device.width, config.device.height),
                start_threshold_us: config.capture.start_threshold_us.as_i64(),
                recording: config.recording.enabled,
                record_kinds: config
                    .recording
                    .record_kinds
                    .iter()
                    .map(|k| format!("{:?}", k))
                    .collect(),
            }),
        },
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &CaptureConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.buffers.capacity.is_none() {
        warnings.push(
            "buffers.capacity is unset - buffers grow without bound if the drain loop falls behind"
                .to_string(),
        );
    }

    if config.capture.lossless_preview {
        warnings.push(
            "capture.lossless_preview is on - preview updates for every item may slow draining"
                .to_string(),
        );
    }

    if config.device.event_batch_hz == 0.0
        && config.device.imu_rate_hz == 0.0
        && config.device.frame_rate_hz == 0.0
    {
        warnings.push("all device streams are disabled".to_string());
    }

    if !config.calibration.enabled {
        warnings.push("calibration is disabled - wall-clock timestamps will be omitted".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Device: {} ({})", summary.device, summary.resolution);
            println!("  Start threshold: {} us", summary.start_threshold_us);
            println!("  Recording: {}", summary.recording);
            if summary.record_kinds.is_empty() {
                println!("  Record kinds: all");
            } else {
                println!("  Record kinds: {}", summary.record_kinds.join(", "));
            }
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

//! `info` command implementation.

use contracts::CaptureConfig;
use tracing::info;

use super::load_config;
use crate::cli::InfoArgs;
use crate::error::{CliError, Result};

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let config = load_config(&args.config)?;

    if args.json {
        let json = config_loader::ConfigLoader::to_json(&config).map_err(CliError::Config)?;
        println!("{}", json);
    } else {
        print_config_info(&config);
    }

    Ok(())
}

fn print_config_info(config: &CaptureConfig) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  DVS Capture Configuration                   ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let device = &config.device;
    println!("📷 Device");
    println!("   ├─ Version: {:?}", config.version);
    println!("   ├─ Name: {} (source id {})", device.name, device.source_id);
    println!("   ├─ Resolution: {}x{}", device.width, device.height);
    println!(
        "   ├─ Event batches: {} Hz x {} events",
        device.event_batch_hz, device.events_per_batch
    );
    println!("   ├─ IMU: {} Hz", device.imu_rate_hz);
    println!("   └─ Frames: {} Hz", device.frame_rate_hz);

    let capture = &config.capture;
    println!("\n⚙️  Drain Loop");
    println!("   ├─ Start threshold: {}", capture.start_threshold_us);
    println!("   ├─ Tick interval: {} ms", capture.tick_interval_ms);
    println!("   ├─ Idle wait: {} ms", capture.idle_wait_ms);
    println!(
        "   ├─ Preview backlog threshold: {}",
        capture.preview_backlog_threshold
    );
    println!("   ├─ Lossless preview: {}", capture.lossless_preview);
    println!("   └─ Stop on record failure: {}", capture.stop_on_record_failure);

    println!("\n📦 Buffers");
    match config.buffers.capacity {
        Some(capacity) => println!("   ├─ Capacity: {}", capacity),
        None => println!("   ├─ Capacity: unbounded"),
    }
    println!("   └─ Overflow policy: {:?}", config.buffers.overflow_policy);

    let calibration = &config.calibration;
    println!("\n🕐 Calibration");
    if calibration.enabled {
        println!(
            "   └─ {} probes, {} ms apart",
            calibration.probes, calibration.spacing_ms
        );
    } else {
        println!("   └─ disabled");
    }

    let recording = &config.recording;
    println!("\n💾 Recording");
    println!("   ├─ Enabled: {}", recording.enabled);
    println!("   ├─ Output dir: {}", recording.output_dir.display());
    match recording.file_name {
        Some(ref name) => println!("   ├─ File name: {}", name),
        None => println!("   ├─ File name: (timestamped)"),
    }
    let kinds: Vec<String> = recording
        .record_kinds
        .iter()
        .map(|k| format!("{:?}", k))
        .collect();
    if kinds.is_empty() {
        println!("   ├─ Record kinds: all");
    } else {
        println!("   ├─ Record kinds: {}", kinds.join(", "));
    }
    println!(
        "   └─ Sidecars: event_log={} frame_images={} frame_log={} utc_log={}",
        recording.event_log, recording.frame_images, recording.frame_log, recording.utc_log
    );

    println!("\n🖼  Preview");
    println!("   ├─ Refresh: {} ms", config.preview.refresh_ms);
    println!("   └─ Burn-in timestamp: {}", config.preview.burn_in_timestamp);

    println!();
}

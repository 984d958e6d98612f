//! `convert` command implementation.

use recorder::{convert_container, ConvertOptions};
use tracing::info;

use crate::cli::ConvertArgs;
use crate::error::{CliError, Result};

/// Execute the `convert` command
pub fn run_convert(args: &ConvertArgs) -> Result<()> {
    if !args.container.exists() {
        return Err(CliError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("container not found: {}", args.container.display()),
        )));
    }
    info!(
        container = %args.container.display(),
        output = %args.output.display(),
        "Converting container"
    );

    let mut options = ConvertOptions::new(&args.output);
    options.frame_images = !args.no_images;
    if let Some(ref utc) = args.utc {
        options = options.with_utc_map(utc);
    }

    let report = convert_container(&args.container, &options)?;

    println!("Converted {}", args.container.display());
    println!("   Event arrays: {} ({} events)", report.event_arrays, report.events);
    println!("   IMU samples: {}", report.imu_samples);
    println!("   Frames: {}", report.frames);
    if options.utc_map.is_some() {
        println!("   Frames missing from UTC map: {}", report.utc_misses);
    }
    println!("   Output: {}", args.output.display());
    Ok(())
}

//! optusb - Multiboot program downloader for the optimize USB-GBA bootcable
//!
//! Loads a program image from disk, negotiates with the cable and pushes
//! the image into the target's memory.
//!
//! Exit status is 0 after a successful transfer and 1 on any failure.

mod cli;
mod commands;
mod error;

use std::process::ExitCode;

use clap::Parser;
use cli::Cli;
use error::AppError;
use optusb_core::ProgramImage;
use optusb_nusb::UsbCable;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version print to stdout and are not failures
            let failed = e.use_stderr();
            let _ = e.print();
            return if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Initialize logger, verbosity raises the default filter
    let default_filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    eprintln!("      === optusb v{} ===", env!("CARGO_PKG_VERSION"));
    eprintln!();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("        Status = {}", e.status());
            eprintln!("        Detail = {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), AppError> {
    if cli.list {
        commands::list_cables()?;
        return Ok(());
    }

    let path = cli.file.as_deref().ok_or(AppError::Usage)?;

    // The whole image is read and validated before any USB traffic
    let image = ProgramImage::from_file(path)?;
    println!("   Source file = {}", path.display());
    println!("  Program size = {}", image.len());

    #[cfg(feature = "dummy")]
    if cli.dummy {
        return run_dummy(&image);
    }

    let cable = UsbCable::open_nth(cli.index)?;
    commands::run_load(cable, &image)?;

    println!("        Status = Successfully transferred.");
    Ok(())
}

#[cfg(feature = "dummy")]
fn run_dummy(image: &ProgramImage) -> Result<(), AppError> {
    log::info!("Using emulated bootcable");
    let mut cable = optusb_dummy::DummyCable::new_default();
    commands::run_load(&mut cable, image)?;

    let received = cable.images().last().map_or(0, |i| i.len());
    log::info!("Emulated bootcable received {} bytes", received);
    println!("        Status = Successfully transferred.");
    Ok(())
}

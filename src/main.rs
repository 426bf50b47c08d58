//! Main entry point for the streamzip CLI application.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use streamzip::interrupt::{ABORT_EXIT_CODE, watch_interrupts};
use streamzip::resolve::reject_unsupported_locators;
use streamzip::{
    Cli, Extractor, HttpSource, HypResolver, SchemeSource, StaticResolver, VolumeResolver,
    VolumeStream,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over the command line when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let options = cli.extract_options()?;

    let resolver: Box<dyn VolumeResolver> = match cli.preset {
        Some(game) => Box::new(HypResolver::new(game, cli.channel)?),
        None => Box::new(StaticResolver::new(cli.volumes.clone())),
    };
    let volumes = resolver.resolve().await?;
    reject_unsupported_locators(&volumes)?;

    let source = Arc::new(SchemeSource::new(HttpSource::new(cli.open_retries)?));
    let stream = VolumeStream::new(source, volumes);

    let cancel = Arc::new(AtomicBool::new(false));
    tokio::spawn(watch_ctrl_c(cancel.clone()));

    let extractor = Extractor::new(options).with_cancel_flag(cancel);
    let report = extractor.run(stream).await?;

    if !cli.is_quiet() {
        eprintln!(
            "\n{} files, {} directories, {} mismatches, {} failures",
            report.files(),
            report.directories(),
            report.mismatches(),
            report.failures()
        );
        eprintln!(
            "Total bytes read: {} from {} volumes",
            format_size(report.bytes_read),
            report.volumes
        );
    }

    if !report.is_success() {
        bail!(
            "{} entries failed verification or extraction",
            report.mismatches() + report.failures()
        );
    }

    Ok(())
}

async fn watch_ctrl_c(cancel: Arc<AtomicBool>) {
    if watch_interrupts(cancel, tokio::signal::ctrl_c).await {
        std::process::exit(ABORT_EXIT_CODE);
    }
}

/// Format a byte size into a human-readable string.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}

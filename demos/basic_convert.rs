//! Basic conversion example
//!
//! This example demonstrates the core functionality of ncmdump-sync:
//! - Checking for and installing the latest libncmdump
//! - Subscribing to events
//! - Queueing a folder of `.ncm` files
//! - Converting them next to their sources or into a chosen directory
//!
//! ```bash
//! RUST_LOG=ncmdump_sync=debug cargo run --example basic_convert -- ./music [./out]
//! ```

use ncmdump_sync::{Config, Event, NcmConverter, RunReport, SaveDestination};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut args = std::env::args().skip(1);
    let input_dir = args.next().unwrap_or_else(|| ".".to_string());
    let destination = match args.next() {
        Some(dir) => SaveDestination::CustomDirectory(Some(dir.into())),
        None => SaveDestination::AlongsideSource,
    };

    let converter = NcmConverter::new(Config::default())?;

    // Subscribe to events
    let mut events = converter.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::Log { line } => println!("  {}", line),
                Event::Progress { completed, total } => {
                    println!("[{}/{}]", completed, total);
                }
                Event::ItemStatusChanged {
                    id,
                    status,
                    error: Some(error),
                } => {
                    eprintln!("item #{} {:?}: {}", id, status, error);
                }
                _ => {}
            }
        }
    });

    let report = converter.check_for_updates().await?;
    println!("libncmdump: {:?} ({:?})", report.verdict, report.decision);

    let added = converter.batch().add_directory(&input_dir).await?;
    println!("Queued {} file(s) from {}", added.len(), input_dir);

    match converter.run(&destination).await? {
        RunReport::NothingToDo => println!("Nothing to convert"),
        RunReport::Completed { summary, .. } => println!(
            "Done: {} succeeded, {} failed",
            summary.succeeded, summary.failed
        ),
    }

    Ok(())
}

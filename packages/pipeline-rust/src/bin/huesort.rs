//! Command-line entry point: sort a directory of images into color-named
//! subdirectories.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use huesort_core::{topics, Palette};
use huesort_pipeline::bus::memory::InProcessBus;
use huesort_pipeline::bus::subscribe;
use huesort_pipeline::config::{PipelineConfig, RetryPolicy, DEFAULT_BUS_CAPACITY};
use huesort_pipeline::loader;
use huesort_pipeline::stages::{drive, Classifier, Sink, Source};
use huesort_pipeline::store::DirectoryStore;
use tokio::time::timeout;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "huesort", about = "Sort images into directories by dominant color")]
struct Args {
    /// Directory containing the input images.
    #[arg(long, env = "HUESORT_INPUT_DIR")]
    input: PathBuf,

    /// Directory to write color-grouped copies into.
    #[arg(long, env = "HUESORT_OUTPUT_DIR")]
    output: PathBuf,

    /// Give up on an item after this many retries. Unbounded when absent.
    #[arg(long, env = "HUESORT_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Delay in milliseconds before each retry. Immediate when absent.
    #[arg(long, env = "HUESORT_RETRY_BACKOFF_MS")]
    backoff_ms: Option<u64>,

    /// Capacity of each stage's inbound channel.
    #[arg(long, env = "HUESORT_BUS_CAPACITY", default_value_t = DEFAULT_BUS_CAPACITY)]
    bus_capacity: usize,

    /// Classify against the full CSS3 keyword palette instead of the 16
    /// basic web colors.
    #[arg(long)]
    extended_palette: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let items = loader::load_work_items(&args.input)?;

    let palette = if args.extended_palette {
        Palette::css3_extended()
    } else {
        Palette::web_basic()
    };
    let config = PipelineConfig {
        bus_capacity: args.bus_capacity,
        retry: RetryPolicy {
            max_retries: args.max_retries,
            backoff: args.backoff_ms.map(Duration::from_millis),
        },
    };

    let bus = Arc::new(InProcessBus::new());
    let store = Arc::new(DirectoryStore::new(&args.output));

    // Attach every inbound channel before the first publish so no stage can
    // miss a frame.
    let classifier_rx = subscribe(
        bus.as_ref(),
        &[topics::DATA, topics::STATUS],
        config.bus_capacity,
    );
    let sink_rx = subscribe(
        bus.as_ref(),
        &[topics::DATA, topics::COLOR, topics::STATUS],
        config.bus_capacity,
    );
    let source_rx = subscribe(bus.as_ref(), &[topics::STATUS], config.bus_capacity);

    let mut classifier_task = tokio::spawn(drive(
        Classifier::new(bus.clone(), palette),
        classifier_rx,
    ));
    let sink_task = tokio::spawn(drive(Sink::new(bus.clone(), store), sink_rx));

    let mut source = Source::new(bus.clone(), items, config.retry);
    source.start().await?;

    tokio::select! {
        () = drive(source, source_rx) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
        }
    }

    // The end marker disconnects the classifier on its own; the sink stays
    // online by design and is shut down with the process.
    if timeout(Duration::from_secs(5), &mut classifier_task)
        .await
        .is_err()
    {
        classifier_task.abort();
    }
    sink_task.abort();

    info!("pipeline finished");
    Ok(())
}

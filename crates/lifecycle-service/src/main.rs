//! Main entry point for the order lifecycle service.
//!
//! Reads lifecycle events as newline-delimited JSON from a file or stdin and
//! applies them to the configured order store until the input ends or the
//! process is interrupted.

use clap::Parser;
use lifecycle_config::Config;
use lifecycle_core::{LifecycleBuilder, LifecycleEngine, LifecycleFactories};
use lifecycle_storage::implementations::file::create_storage as create_file_storage;
use lifecycle_storage::implementations::memory::create_storage as create_memory_storage;
use lifecycle_storage::{StorageError, StorageInterface};
use std::path::PathBuf;
use tokio::io::BufReader;

mod inbound;

/// Command-line arguments for the lifecycle service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,

	/// File of newline-delimited JSON events; stdin when omitted
	#[arg(short, long)]
	events: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started order lifecycle service");

	let config = Config::from_file(&args.config.to_string_lossy()).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let engine = build_engine(config).await?;
	let (sender, receiver) = engine.channel();

	let reader = match args.events {
		Some(path) => {
			tracing::info!(path = %path.display(), "Reading events from file");
			let file = tokio::fs::File::open(&path).await?;
			tokio::spawn(inbound::forward_events(BufReader::new(file), sender))
		},
		None => {
			tracing::info!("Reading events from stdin");
			tokio::spawn(inbound::forward_events(
				BufReader::new(tokio::io::stdin()),
				sender,
			))
		},
	};

	engine.run(receiver).await?;

	// After ctrl-c the reader may still be parked on stdin
	if !reader.is_finished() {
		reader.abort();
	}
	match reader.await {
		Ok(Ok(stats)) => tracing::info!(
			forwarded = stats.forwarded,
			skipped = stats.skipped,
			"Inbound events processed"
		),
		Ok(Err(e)) => tracing::error!(error = %e, "Failed to read inbound events"),
		Err(e) if e.is_cancelled() => tracing::debug!("Inbound reader cancelled"),
		Err(e) => return Err(e.into()),
	}

	tracing::info!("Stopped order lifecycle service");
	Ok(())
}

/// Macro to create a factory HashMap with the appropriate type aliases
macro_rules! create_factory_map {
    ($interface:path, $error:path, $( $name:literal => $factory:expr ),* $(,)?) => {{
        let mut factories = std::collections::HashMap::new();
        $(
            factories.insert(
                $name.to_string(),
                $factory as fn(&toml::Value) -> Result<Box<dyn $interface>, $error>
            );
        )*
        factories
    }};
}

/// Wires the compiled-in storage backends into the engine builder.
async fn build_engine(config: Config) -> Result<LifecycleEngine, Box<dyn std::error::Error>> {
	let builder = LifecycleBuilder::new(config);

	let factories = LifecycleFactories {
		storage_factories: create_factory_map!(
			StorageInterface,
			StorageError,
			"file" => create_file_storage,
			"memory" => create_memory_storage,
		),
	};

	Ok(builder.build(factories).await?)
}

use std::{process::ExitCode, sync::Arc};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tributary_config::Config;
use tributary_core::Ingestion;
use tributary_logger::{parse_level, EventLog, Logger};
use tributary_object_storage::open_bucket;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::init() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Failed to load configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    setup_tracing(&config.log_level);

    let logger = Logger::new(&config.log_dir, parse_level(&config.log_level));
    logger.info("Application started.");

    match run(&config, logger.clone()).await {
        Ok(true) => {
            logger.info("Data ingestion process completed.");
            ExitCode::SUCCESS
        }
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            logger.error(&format!(
                "Data ingestion process failed, check this error and fix it: {:#}",
                err
            ));
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config, logger: Logger) -> anyhow::Result<bool> {
    let ingest_config = config.ingest_config()?;
    match &ingest_config.local_mirror {
        Some(mirror) => tracing::info!("Reading exports from local mirror {}", mirror.display()),
        None => tracing::info!(
            "Reading exports from bucket {} (project {})",
            ingest_config.bucket,
            ingest_config.project_id
        ),
    }
    let store = open_bucket(&ingest_config)
        .map_err(|e| anyhow::anyhow!("Failed to open bucket: {}", e))?;
    tracing::info!(
        "Writing {} datasets, listing at most {} objects per prefix",
        ingest_config.datasets.len(),
        ingest_config.max_list_results
    );

    logger.info("Starting data ingestion from object storage to local storage.");
    let ingestion = Ingestion::new(ingest_config, store, Arc::new(logger));
    Ok(ingestion.ingest().await)
}

fn setup_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "{}={level},tributary_core={level},tributary_object_storage={level}",
                    env!("CARGO_CRATE_NAME"),
                    level = log_level.to_ascii_lowercase()
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

use std::{fmt::Display, path::PathBuf};

use envconfig::Envconfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration from the environment: {0}")]
    Env(#[from] envconfig::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Envconfig)]
pub struct Config {
    #[envconfig(from = "TRIBUTARY_PROJECT_ID", default = "")]
    pub project_id: String,
    #[envconfig(from = "TRIBUTARY_BUCKET")]
    pub bucket: Option<String>,
    //Directory served as the bucket instead of GCS
    #[envconfig(from = "TRIBUTARY_LOCAL_MIRROR")]
    pub local_mirror: Option<String>,

    #[envconfig(from = "TRIBUTARY_USER_PREFIX", default = "user/")]
    pub user_prefix: String,
    #[envconfig(from = "TRIBUTARY_CONTENT_PREFIX", default = "content/")]
    pub content_prefix: String,
    #[envconfig(from = "TRIBUTARY_EVENT_PREFIX", default = "event/")]
    pub event_prefix: String,

    #[envconfig(from = "TRIBUTARY_USER_WORKERS", default = "8")]
    pub user_workers: usize,
    #[envconfig(from = "TRIBUTARY_CONTENT_WORKERS", default = "8")]
    pub content_workers: usize,
    #[envconfig(from = "TRIBUTARY_EVENT_WORKERS", default = "20")]
    pub event_workers: usize,

    #[envconfig(from = "TRIBUTARY_USER_OUTPUT", default = "./data/user.parquet")]
    pub user_output: String,
    #[envconfig(from = "TRIBUTARY_CONTENT_OUTPUT", default = "./data/content.parquet")]
    pub content_output: String,
    #[envconfig(from = "TRIBUTARY_EVENT_OUTPUT", default = "./data/event.parquet")]
    pub event_output: String,

    #[envconfig(from = "TRIBUTARY_MAX_LIST_RESULTS", default = "100")]
    pub max_list_results: usize,
    //Number of completed fetches between two memory reclamation checkpoints
    #[envconfig(from = "TRIBUTARY_RECLAIM_INTERVAL", default = "5")]
    pub reclaim_interval: usize,

    #[envconfig(from = "TRIBUTARY_LOG_LEVEL", default = "info")]
    pub log_level: String,
    #[envconfig(from = "TRIBUTARY_LOG_DIR", default = "./logs")]
    pub log_dir: String,
}

impl Config {
    pub fn init() -> Result<Config, ConfigError> {
        Ok(Config::init_from_env()?)
    }

    /// Validates the raw settings and turns them into the value object consumed
    /// by the ingestion core.
    pub fn ingest_config(&self) -> Result<IngestConfig, ConfigError> {
        let bucket = self.bucket.clone().unwrap_or_default();
        if bucket.is_empty() && self.local_mirror.is_none() {
            return Err(ConfigError::Invalid(
                "either TRIBUTARY_BUCKET or TRIBUTARY_LOCAL_MIRROR must be set".to_string(),
            ));
        }

        let config = IngestConfig {
            project_id: self.project_id.clone(),
            bucket,
            local_mirror: self.local_mirror.as_ref().map(PathBuf::from),
            max_list_results: self.max_list_results,
            reclaim_interval: self.reclaim_interval,
            datasets: vec![
                DatasetConfig {
                    dataset: Dataset::User,
                    prefix: self.user_prefix.clone(),
                    workers: self.user_workers,
                    output: PathBuf::from(&self.user_output),
                },
                DatasetConfig {
                    dataset: Dataset::Content,
                    prefix: self.content_prefix.clone(),
                    workers: self.content_workers,
                    output: PathBuf::from(&self.content_output),
                },
                DatasetConfig {
                    dataset: Dataset::Event,
                    prefix: self.event_prefix.clone(),
                    workers: self.event_workers,
                    output: PathBuf::from(&self.event_output),
                },
            ],
        };
        config.validate()?;
        Ok(config)
    }
}

/// The logical datasets. Ordering follows ingestion order: users, then
/// content, then events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dataset {
    User,
    Content,
    Event,
}

impl Dataset {
    pub fn label(&self) -> &'static str {
        match self {
            Dataset::User => "USER",
            Dataset::Content => "CONTENT",
            Dataset::Event => "EVENT",
        }
    }
}

impl Display for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetConfig {
    pub dataset: Dataset,
    /// Key prefix in the bucket, e.g. `user/`.
    pub prefix: String,
    /// Maximum number of objects fetched concurrently.
    pub workers: usize,
    /// Parquet file the merged dataset is written to.
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub project_id: String,
    pub bucket: String,
    pub local_mirror: Option<PathBuf>,
    pub max_list_results: usize,
    pub reclaim_interval: usize,
    pub datasets: Vec<DatasetConfig>,
}

impl IngestConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_list_results == 0 {
            return Err(ConfigError::Invalid(
                "max_list_results must be greater than 0".to_string(),
            ));
        }
        if self.reclaim_interval == 0 {
            return Err(ConfigError::Invalid(
                "reclaim_interval must be greater than 0".to_string(),
            ));
        }
        for dataset in &self.datasets {
            if dataset.workers == 0 {
                return Err(ConfigError::Invalid(format!(
                    "worker count for {} must be greater than 0",
                    dataset.dataset
                )));
            }
        }
        Ok(())
    }

    pub fn dataset(&self, dataset: Dataset) -> Option<&DatasetConfig> {
        self.datasets.iter().find(|d| d.dataset == dataset)
    }

    /// The configured datasets in ingestion order, whatever order they were
    /// listed in.
    pub fn ingestion_order(&self) -> Vec<&DatasetConfig> {
        let mut ordered: Vec<&DatasetConfig> = self.datasets.iter().collect();
        ordered.sort_by_key(|d| d.dataset);
        ordered
    }
}

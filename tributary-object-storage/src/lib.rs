use std::{path::Path, sync::Arc};

use object_store::{gcp::GoogleCloudStorageBuilder, local::LocalFileSystem, ObjectStore};
use tributary_config::IngestConfig;

pub mod error;

pub use error::StorageError;

/// Opens the bucket the exports are read from.
///
/// A configured local mirror takes precedence over GCS. GCS credentials are
/// picked up from the environment (`GOOGLE_SERVICE_ACCOUNT`,
/// `GOOGLE_APPLICATION_CREDENTIALS`, ...).
pub fn open_bucket(config: &IngestConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    match &config.local_mirror {
        Some(root) => {
            tracing::info!("Using LocalFileSystem object store at {}", root.display());
            Ok(Arc::new(local_fs_object_store(root)?))
        }
        None => {
            tracing::info!(
                "Using GCS object store for bucket {} (project {})",
                config.bucket,
                config.project_id
            );
            Ok(Arc::new(gcs_object_store(&config.bucket)?))
        }
    }
}

fn gcs_object_store(bucket: &str) -> Result<impl ObjectStore, StorageError> {
    if bucket.is_empty() {
        return Err(StorageError::InitializationError(
            "GCS bucket name not configured".to_string(),
        ));
    }

    GoogleCloudStorageBuilder::from_env()
        .with_bucket_name(bucket)
        .build()
        .map_err(|e| {
            StorageError::InitializationError(format!("Failed to build GCS object store: {}", e))
        })
}

fn local_fs_object_store(root: &Path) -> Result<LocalFileSystem, StorageError> {
    if !root.is_dir() {
        return Err(StorageError::InitializationError(format!(
            "Local mirror {} is not a directory",
            root.display()
        )));
    }
    Ok(LocalFileSystem::new_with_prefix(root)?)
}

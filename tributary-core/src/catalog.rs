use std::sync::Arc;

use futures::{future, StreamExt, TryStreamExt};
use object_store::{path::Path, ObjectMeta, ObjectStore};

use crate::error::{IngestError, IngestResult};

const PART_MARKER: &str = "part";
const CSV_SUFFIX: &str = ".csv";

/// A listed object that is a data part file of some dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub location: Path,
    pub size: usize,
    pub prefix: String,
}

impl RemoteObject {
    fn from_meta(meta: ObjectMeta, prefix: &str) -> Self {
        Self {
            location: meta.location,
            size: meta.size,
            prefix: prefix.to_string(),
        }
    }
}

pub fn is_part_file(key: &str) -> bool {
    key.contains(PART_MARKER) && key.ends_with(CSV_SUFFIX)
}

/// Resolves a key prefix into the part files stored under it.
#[derive(Debug, Clone)]
pub struct CatalogResolver {
    store: Arc<dyn ObjectStore>,
    max_results: usize,
}

impl CatalogResolver {
    pub fn new(store: Arc<dyn ObjectStore>, max_results: usize) -> Self {
        Self { store, max_results }
    }

    /// Lists at most `max_results` objects whose key starts with `prefix` and
    /// keeps the part files among them.
    ///
    /// `prefix` is matched as a plain string prefix, so `user` also matches
    /// `user_archive/part-0.csv`.
    pub async fn list(&self, prefix: &str) -> IngestResult<Vec<RemoteObject>> {
        let root = Self::listing_root(prefix);
        let listed: Vec<ObjectMeta> = self
            .store
            .list(root.as_ref())
            .try_filter(|meta| future::ready(meta.location.as_ref().starts_with(prefix)))
            .take(self.max_results)
            .try_collect()
            .await
            .map_err(|source| IngestError::Listing {
                prefix: prefix.to_string(),
                source,
            })?;

        let total = listed.len();
        let objects: Vec<RemoteObject> = listed
            .into_iter()
            .filter(|meta| is_part_file(meta.location.as_ref()))
            .map(|meta| RemoteObject::from_meta(meta, prefix))
            .collect();

        tracing::debug!(
            "Listed {} objects under {}, {} part files",
            total,
            prefix,
            objects.len()
        );
        Ok(objects)
    }

    // Object store listings work on whole path segments, so list the deepest
    // complete directory of the prefix and filter the rest by string.
    fn listing_root(prefix: &str) -> Option<Path> {
        let dir = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        if dir.trim_matches('/').is_empty() {
            None
        } else {
            Some(Path::from(dir))
        }
    }
}

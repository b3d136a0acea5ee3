use std::sync::Arc;

use tokio::{sync::Semaphore, task::JoinSet};

use crate::{
    catalog::RemoteObject,
    error::{IngestError, IngestResult},
    fetch::{FetchOutcome, ObjectFetcher},
    reclaim::ReclaimCheckpoint,
    table::RawTable,
};

/// Counters for one coordinator run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FetchStats {
    pub dispatched: usize,
    pub collected: usize,
    /// Objects that decoded fine but held no rows.
    pub empty: usize,
    pub failed: usize,
    pub reclaim_passes: usize,
}

/// Fans fetches out over a bounded number of concurrent tasks and collects
/// the non-empty tables in completion order. Each table carries its object
/// key, which [`crate::merge::merge`] orders by.
#[derive(Debug, Clone)]
pub struct FetchCoordinator {
    fetcher: ObjectFetcher,
    reclaim_interval: usize,
}

impl FetchCoordinator {
    pub fn new(fetcher: ObjectFetcher, reclaim_interval: usize) -> Self {
        Self {
            fetcher,
            reclaim_interval,
        }
    }

    pub async fn run(
        &self,
        prefix: &str,
        objects: Vec<RemoteObject>,
        worker_count: usize,
    ) -> IngestResult<Vec<RawTable>> {
        self.run_with_stats(prefix, objects, worker_count)
            .await
            .map(|(tables, _)| tables)
    }

    /// Runs one fetch per object with at most `worker_count` in flight.
    ///
    /// Failed and empty objects are dropped. Fails with
    /// [`IngestError::NoData`] when nothing was collected.
    pub async fn run_with_stats(
        &self,
        prefix: &str,
        objects: Vec<RemoteObject>,
        worker_count: usize,
    ) -> IngestResult<(Vec<RawTable>, FetchStats)> {
        if worker_count == 0 {
            return Err(IngestError::InvalidWorkerCount);
        }

        let semaphore = Arc::new(Semaphore::new(worker_count));
        let mut join_set = JoinSet::new();
        let mut stats = FetchStats {
            dispatched: objects.len(),
            ..FetchStats::default()
        };

        for object in objects {
            let semaphore = semaphore.clone();
            let fetcher = self.fetcher.clone();
            join_set.spawn(async move {
                // The semaphore is never closed.
                let _permit = semaphore.acquire_owned().await.ok();
                fetcher.fetch(&object).await
            });
        }

        let mut checkpoint = ReclaimCheckpoint::new(self.reclaim_interval);
        let mut tables = Vec::new();

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(FetchOutcome::Loaded(table)) if !table.is_empty() => tables.push(table),
                Ok(FetchOutcome::Loaded(_)) => stats.empty += 1,
                Ok(FetchOutcome::Failed { location, reason }) => {
                    stats.failed += 1;
                    tracing::warn!("Dropping {}: {}", location, reason);
                }
                Err(err) => {
                    stats.failed += 1;
                    tracing::error!("Fetch task for {} did not complete: {}", prefix, err);
                }
            }
            checkpoint.record_completion(tables.len());
        }

        stats.collected = tables.len();
        stats.reclaim_passes = checkpoint.passes();
        tracing::debug!("Fetch stats for {}: {:?}", prefix, stats);

        if tables.is_empty() {
            return Err(IngestError::NoData(prefix.to_string()));
        }
        Ok((tables, stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::test_util::rows;
    use object_store::{memory::InMemory, path::Path, ObjectStore, PutPayload};

    async fn seeded(files: &[(&str, String)]) -> (FetchCoordinator, Vec<RemoteObject>) {
        let store = InMemory::new();
        let mut objects = Vec::new();
        for (key, body) in files {
            let location = Path::from(*key);
            store
                .put(&location, PutPayload::from(body.clone().into_bytes()))
                .await
                .unwrap();
            objects.push(RemoteObject {
                location,
                size: body.len(),
                prefix: "event/".to_string(),
            });
        }
        let store: Arc<dyn ObjectStore> = Arc::new(store);
        (FetchCoordinator::new(ObjectFetcher::new(store), 5), objects)
    }

    fn part(rows: usize, offset: usize) -> String {
        let mut body = String::from("event_id,kind\n");
        for i in 0..rows {
            body.push_str(&format!("{},view\n", offset + i));
        }
        body
    }

    fn sorted_rows(tables: &[RawTable]) -> Vec<Vec<Option<String>>> {
        let mut all: Vec<_> = tables.iter().flat_map(|t| rows(t.batches())).collect();
        all.sort();
        all
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn collects_every_table() {
        let files: Vec<(String, String)> = (0..12)
            .map(|i| (format!("event/part-{}.csv", i), part(i + 1, i * 100)))
            .collect();
        let files: Vec<(&str, String)> = files.iter().map(|(k, b)| (k.as_str(), b.clone())).collect();
        let (coordinator, objects) = seeded(&files).await;

        let (tables, stats) = coordinator
            .run_with_stats("event/", objects, 4)
            .await
            .unwrap();

        assert_eq!(tables.len(), 12);
        let total: usize = tables.iter().map(RawTable::num_rows).sum();
        assert_eq!(total, (1..=12).sum::<usize>());
        assert_eq!(stats.dispatched, 12);
        assert_eq!(stats.collected, 12);
        assert_eq!(stats.reclaim_passes, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn worker_count_does_not_change_rows() {
        let files: Vec<(String, String)> = (0..25)
            .map(|i| (format!("event/part-{}.csv", i), part(3, i * 10)))
            .collect();
        let files: Vec<(&str, String)> = files.iter().map(|(k, b)| (k.as_str(), b.clone())).collect();
        let (coordinator, objects) = seeded(&files).await;

        let single = coordinator.run("event/", objects.clone(), 1).await.unwrap();
        let wide = coordinator.run("event/", objects, 20).await.unwrap();

        assert_eq!(sorted_rows(&single), sorted_rows(&wide));
        assert_eq!(sorted_rows(&single).len(), 75);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn drops_failed_and_empty_objects() {
        let (coordinator, mut objects) = seeded(&[
            ("event/part-0.csv", part(2, 0)),
            ("event/part-1.csv", "a,b\n1,2,3\n".to_string()),
            ("event/part-2.csv", "event_id,kind\n".to_string()),
            ("event/part-3.csv", part(1, 50)),
        ])
        .await;
        objects.push(RemoteObject {
            location: Path::from("event/part-9.csv"),
            size: 1,
            prefix: "event/".to_string(),
        });

        let (tables, stats) = coordinator
            .run_with_stats("event/", objects, 2)
            .await
            .unwrap();

        assert_eq!(sorted_rows(&tables).len(), 3);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.empty, 1);
        assert_eq!(stats.collected, 2);
        assert!(logs_contain("Dropping event/part-1.csv"));
    }

    #[tokio::test]
    async fn nothing_collected_is_an_error() {
        let (coordinator, objects) =
            seeded(&[("event/part-0.csv", "\u{FEFF}".to_string())]).await;

        let err = coordinator.run("event/", objects, 4).await.unwrap_err();
        assert!(matches!(err, IngestError::NoData(p) if p == "event/"));

        let err = coordinator.run("event/", vec![], 4).await.unwrap_err();
        assert!(matches!(err, IngestError::NoData(_)));
    }

    #[tokio::test]
    async fn zero_workers_is_rejected() {
        let (coordinator, objects) = seeded(&[("event/part-0.csv", part(1, 0))]).await;
        let err = coordinator.run("event/", objects, 0).await.unwrap_err();
        assert!(matches!(err, IngestError::InvalidWorkerCount));
    }
}

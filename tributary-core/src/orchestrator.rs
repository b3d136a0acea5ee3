use std::{
    panic::AssertUnwindSafe,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use futures::FutureExt;
use object_store::ObjectStore;
use tributary_config::{Dataset, DatasetConfig, IngestConfig};
use tributary_logger::EventLog;

use crate::{
    catalog::CatalogResolver,
    coordinator::FetchCoordinator,
    error::{IngestError, IngestResult},
    fetch::ObjectFetcher,
    merge::merge,
    sink::SinkWriter,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetReport {
    pub dataset: Dataset,
    pub objects_listed: usize,
    pub tables_collected: usize,
    pub tables_padded: usize,
    pub rows_written: usize,
    pub output: PathBuf,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub datasets: Vec<DatasetReport>,
}

impl IngestReport {
    pub fn total_rows(&self) -> usize {
        self.datasets.iter().map(|d| d.rows_written).sum()
    }
}

/// Runs the datasets one after the other (users, content, events): list,
/// fetch, merge, write.
///
/// The first failing dataset stops the run; datasets after it are not
/// attempted.
pub struct Ingestion {
    config: IngestConfig,
    catalog: CatalogResolver,
    coordinator: FetchCoordinator,
    sink: SinkWriter,
    log: Arc<dyn EventLog>,
}

impl Ingestion {
    pub fn new(config: IngestConfig, store: Arc<dyn ObjectStore>, log: Arc<dyn EventLog>) -> Self {
        Self {
            catalog: CatalogResolver::new(store.clone(), config.max_list_results),
            coordinator: FetchCoordinator::new(ObjectFetcher::new(store), config.reclaim_interval),
            sink: SinkWriter::new(),
            config,
            log,
        }
    }

    /// Runs every dataset and reports whether all of them were written.
    ///
    /// Errors and panics are logged and turned into `false`.
    pub async fn ingest(&self) -> bool {
        match AssertUnwindSafe(self.run()).catch_unwind().await {
            Ok(Ok(report)) => {
                self.log.info(&format!(
                    "Ingestion finished: {} datasets, {} rows written.",
                    report.datasets.len(),
                    report.total_rows()
                ));
                true
            }
            Ok(Err(err)) => {
                self.log.error(&format!(
                    "Data ingestion process failed, check this error and fix it: {}",
                    err
                ));
                false
            }
            Err(panic) => {
                let err = IngestError::Panicked(panic_message(panic.as_ref()));
                self.log.error(&format!("Data ingestion process failed: {}", err));
                false
            }
        }
    }

    pub async fn run(&self) -> IngestResult<IngestReport> {
        let mut report = IngestReport::default();
        for dataset in self.config.ingestion_order() {
            report.datasets.push(self.ingest_dataset(dataset).await?);
        }
        Ok(report)
    }

    async fn ingest_dataset(&self, dataset: &DatasetConfig) -> IngestResult<DatasetReport> {
        let started = Instant::now();
        self.log
            .info(&format!("Starting {} data ingestion.", dataset.dataset));

        let objects = self.catalog.list(&dataset.prefix).await?;
        if objects.is_empty() {
            return Err(IngestError::EmptyCatalog(dataset.prefix.clone()));
        }
        let objects_listed = objects.len();

        let (tables, stats) = self
            .coordinator
            .run_with_stats(&dataset.prefix, objects, dataset.workers)
            .await?;
        if stats.failed > 0 {
            self.log.warn(&format!(
                "{} of {} {} objects could not be read and were dropped.",
                stats.failed, stats.dispatched, dataset.dataset
            ));
        }

        let table = merge(tables)?;
        let summary = self.sink.write(&table, &dataset.output)?;
        let tables_collected = table.source_tables();
        let tables_padded = table.padded_tables();
        drop(table);

        self.log.info(&format!(
            "Completed {} data ingestion: {} rows from {} objects written to {}.",
            dataset.dataset,
            summary.rows,
            tables_collected,
            summary.path.display()
        ));

        Ok(DatasetReport {
            dataset: dataset.dataset,
            objects_listed,
            tables_collected,
            tables_padded,
            rows_written: summary.rows,
            output: summary.path,
            elapsed: started.elapsed(),
        })
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_messages_are_extracted() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn std::any::Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[test]
    fn report_sums_rows() {
        let report = IngestReport {
            datasets: vec![
                DatasetReport {
                    dataset: Dataset::User,
                    objects_listed: 2,
                    tables_collected: 2,
                    tables_padded: 0,
                    rows_written: 5,
                    output: PathBuf::from("user.parquet"),
                    elapsed: Duration::from_millis(3),
                },
                DatasetReport {
                    dataset: Dataset::Content,
                    objects_listed: 1,
                    tables_collected: 1,
                    tables_padded: 0,
                    rows_written: 4,
                    output: PathBuf::from("content.parquet"),
                    elapsed: Duration::from_millis(1),
                },
            ],
        };
        assert_eq!(report.total_rows(), 9);
    }
}

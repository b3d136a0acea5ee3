//! Concurrent fetch-and-merge engine: turns the partitioned CSV exports under
//! a set of bucket prefixes into one Parquet file per dataset.

pub mod catalog;
pub mod coordinator;
pub mod error;
pub mod fetch;
pub mod merge;
pub mod orchestrator;
pub mod reclaim;
pub mod sink;
pub mod table;

pub use catalog::{CatalogResolver, RemoteObject};
pub use coordinator::{FetchCoordinator, FetchStats};
pub use error::{IngestError, IngestResult};
pub use fetch::{decode_csv, FetchError, FetchOutcome, ObjectFetcher};
pub use merge::merge;
pub use orchestrator::{DatasetReport, IngestReport, Ingestion};
pub use sink::{SinkWriter, WriteSummary};
pub use table::{MergedTable, RawTable};

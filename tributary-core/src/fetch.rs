use std::{collections::HashSet, sync::Arc};

use arrow::{error::ArrowError, record_batch::RecordBatch};
use csv::StringRecord;
use object_store::{path::Path, ObjectStore};

use crate::{
    catalog::RemoteObject,
    table::{text_schema, RawTable},
};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
const BATCH_SIZE: usize = 64 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("Download failed: {0}")]
    Download(#[from] object_store::Error),
    #[error("Unreadable header: {0}")]
    Header(#[from] csv::Error),
    #[error("Malformed CSV body: {0}")]
    Decode(#[from] ArrowError),
    #[error("Object has no header line")]
    EmptyObject,
    #[error("Decode task aborted: {0}")]
    Aborted(String),
}

/// Result of fetching a single object.
#[derive(Debug)]
pub enum FetchOutcome {
    Loaded(RawTable),
    Failed { location: Path, reason: FetchError },
}

impl FetchOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, FetchOutcome::Loaded(_))
    }

    /// The loaded table, or an empty one if the fetch failed.
    pub fn into_table(self) -> RawTable {
        match self {
            FetchOutcome::Loaded(table) => table,
            FetchOutcome::Failed { .. } => RawTable::empty(),
        }
    }
}

/// Downloads part files and decodes them into all-text tables.
#[derive(Debug, Clone)]
pub struct ObjectFetcher {
    store: Arc<dyn ObjectStore>,
}

impl ObjectFetcher {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Fetches and decodes `object`. Errors are reported in the outcome, never
    /// returned.
    pub async fn fetch(&self, object: &RemoteObject) -> FetchOutcome {
        match self.try_fetch(object).await {
            Ok(table) => FetchOutcome::Loaded(table),
            Err(reason) => FetchOutcome::Failed {
                location: object.location.clone(),
                reason,
            },
        }
    }

    /// Like [`ObjectFetcher::fetch`], with failures turned into an empty table.
    pub async fn fetch_table(&self, object: &RemoteObject) -> RawTable {
        self.fetch(object).await.into_table()
    }

    async fn try_fetch(&self, object: &RemoteObject) -> Result<RawTable, FetchError> {
        let bytes = self.store.get(&object.location).await?.bytes().await?;

        let table = tokio::task::spawn_blocking(move || decode_csv(&bytes))
            .await
            .map_err(|e| FetchError::Aborted(e.to_string()))??;
        Ok(table.with_source(object.location.clone()))
    }
}

/// Decodes a comma separated file whose first line is the header.
///
/// Every column is read as text; no types are inferred.
pub fn decode_csv(bytes: &[u8]) -> Result<RawTable, FetchError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let header = header_row(bytes)?;
    if header.is_empty() {
        return Err(FetchError::EmptyObject);
    }
    let schema = text_schema(&column_names(&header));

    // Short rows get nulls for their missing cells; long rows fail.
    let reader = arrow::csv::ReaderBuilder::new(schema.clone())
        .with_header(true)
        .with_truncated_rows(true)
        .with_batch_size(BATCH_SIZE)
        .build(bytes)?;
    let batches = reader.collect::<Result<Vec<RecordBatch>, ArrowError>>()?;

    Ok(RawTable::new(schema, batches))
}

fn header_row(bytes: &[u8]) -> Result<StringRecord, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(bytes);
    Ok(reader.headers()?.clone())
}

// Blank names become `Unnamed: <index>`, repeated names get a `.1`, `.2`, ...
// suffix so every column stays addressable.
fn column_names(header: &StringRecord) -> Vec<String> {
    let mut seen = HashSet::new();
    header
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let base = if name.trim().is_empty() {
                format!("Unnamed: {}", idx)
            } else {
                name.to_string()
            };
            let mut candidate = base.clone();
            let mut suffix = 0;
            while !seen.insert(candidate.clone()) {
                suffix += 1;
                candidate = format!("{}.{}", base, suffix);
            }
            candidate
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::test_util::rows;
    use arrow::datatypes::DataType;
    use object_store::{memory::InMemory, PutPayload};

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn decodes_every_column_as_text() {
        let table = decode_csv(b"id,score,active,joined\n1,9.5,true,2024-01-02\n2,,false,\n")
            .unwrap();

        assert_eq!(table.num_rows(), 2);
        assert!(table
            .schema()
            .fields()
            .iter()
            .all(|f| f.data_type() == &DataType::Utf8));
        assert_eq!(
            rows(table.batches()),
            vec![
                vec![s("1"), s("9.5"), s("true"), s("2024-01-02")],
                vec![s("2"), None, s("false"), None],
            ]
        );
    }

    #[test]
    fn keeps_leading_zeros_and_quoted_delimiters() {
        let table = decode_csv(b"zip,name\n00123,\"Doe, Jane\"\n").unwrap();
        assert_eq!(rows(table.batches()), vec![vec![s("00123"), s("Doe, Jane")]]);
    }

    #[test]
    fn strips_byte_order_mark() {
        let table = decode_csv(b"\xEF\xBB\xBFuser_id,name\n7,ana\n").unwrap();
        assert_eq!(table.schema().field(0).name(), "user_id");
    }

    #[test]
    fn renames_blank_and_duplicate_headers() {
        let table = decode_csv(b"a,,a,a.1,a\n1,2,3,4,5\n").unwrap();
        let names: Vec<_> = table
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect();
        assert_eq!(names, vec!["a", "Unnamed: 1", "a.1", "a.1.1", "a.2"]);
    }

    #[test]
    fn header_only_file_is_empty() {
        let table = decode_csv(b"id,name\n").unwrap();
        assert_eq!(table.num_columns(), 2);
        assert!(table.is_empty());
    }

    #[test]
    fn rejects_empty_object() {
        assert!(matches!(decode_csv(b""), Err(FetchError::EmptyObject)));
        assert!(matches!(decode_csv(b"\xEF\xBB\xBF"), Err(FetchError::EmptyObject)));
    }

    #[test]
    fn pads_short_rows_with_nulls() {
        let table = decode_csv(b"a,b,c\n1,2,3\n4,5\n").unwrap();
        assert_eq!(
            rows(table.batches()),
            vec![vec![s("1"), s("2"), s("3")], vec![s("4"), s("5"), None]]
        );
    }

    #[test]
    fn rejects_rows_with_extra_fields() {
        let err = decode_csv(b"a,b\n1,2\n3,4,5\n").unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[test]
    fn rejects_invalid_utf8() {
        assert!(decode_csv(b"a,b\n1,\xFF\xFE\n").is_err());
    }

    async fn fetcher_with(key: &str, body: &'static [u8]) -> (ObjectFetcher, RemoteObject) {
        let store = InMemory::new();
        let location = Path::from(key);
        store
            .put(&location, PutPayload::from_static(body))
            .await
            .unwrap();
        let object = RemoteObject {
            location,
            size: body.len(),
            prefix: "user/".to_string(),
        };
        (ObjectFetcher::new(Arc::new(store)), object)
    }

    #[tokio::test]
    async fn fetches_and_decodes_object() {
        let (fetcher, object) = fetcher_with("user/part-0.csv", b"id\n1\n2\n").await;

        let outcome = fetcher.fetch(&object).await;
        assert!(outcome.is_loaded());
        let table = outcome.into_table();
        assert_eq!(table.num_rows(), 2);
        assert_eq!(table.source(), Some(&object.location));
    }

    #[tokio::test]
    async fn malformed_object_becomes_failed_outcome() {
        let (fetcher, object) = fetcher_with("user/part-0.csv", b"a,b\n1,2,3\n").await;

        match fetcher.fetch(&object).await {
            FetchOutcome::Failed { location, reason } => {
                assert_eq!(location, object.location);
                assert!(matches!(reason, FetchError::Decode(_)));
            }
            FetchOutcome::Loaded(_) => panic!("expected a failure"),
        }
        let table = fetcher.fetch_table(&object).await;
        assert!(table.is_empty());
        assert_eq!(table.num_columns(), 0);
    }

    #[tokio::test]
    async fn missing_object_becomes_empty_table() {
        let fetcher = ObjectFetcher::new(Arc::new(InMemory::new()));
        let object = RemoteObject {
            location: Path::from("user/part-9.csv"),
            size: 10,
            prefix: "user/".to_string(),
        };

        match fetcher.fetch(&object).await {
            FetchOutcome::Failed { reason, .. } => {
                assert!(matches!(reason, FetchError::Download(_)))
            }
            FetchOutcome::Loaded(_) => panic!("expected a failure"),
        }
        assert!(fetcher.fetch_table(&object).await.is_empty());
    }
}

//! Parquet output for merged tables.
//!
//! The file is written next to its destination under a temporary name and
//! renamed into place once complete. If anything fails on the way the
//! temporary file is removed and an existing destination is left untouched.

use std::{
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use parquet::{
    arrow::ArrowWriter,
    basic::Compression,
    file::properties::WriterProperties,
};
use tempfile::NamedTempFile;

use crate::{
    error::{IngestError, IngestResult},
    table::MergedTable,
};

/// What ended up on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub rows: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct SinkWriter {
    properties: WriterProperties,
}

impl Default for SinkWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkWriter {
    pub fn new() -> Self {
        Self {
            properties: WriterProperties::builder()
                .set_compression(Compression::SNAPPY)
                .build(),
        }
    }

    /// Writes `table` to `destination`, replacing any existing file.
    pub fn write(&self, table: &MergedTable, destination: &Path) -> IngestResult<WriteSummary> {
        let parent = match destination.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let temp = tempfile::Builder::new()
            .prefix(".tributary-")
            .suffix(".parquet.part")
            .tempfile_in(&parent)?;

        self.write_parquet(table, &temp)?;

        let file = temp
            .persist(destination)
            .map_err(|e| IngestError::Persist {
                path: destination.to_path_buf(),
                source: e.error,
            })?;
        let bytes = file.metadata()?.len();

        tracing::debug!(
            "Wrote {} rows ({} bytes) to {}",
            table.num_rows(),
            bytes,
            destination.display()
        );

        Ok(WriteSummary {
            path: destination.to_path_buf(),
            rows: table.num_rows(),
            bytes,
        })
    }

    fn write_parquet(&self, table: &MergedTable, temp: &NamedTempFile) -> IngestResult<()> {
        let out = BufWriter::new(temp.as_file().try_clone()?);
        let mut writer = ArrowWriter::try_new(out, table.schema(), Some(self.properties.clone()))?;
        for batch in table.batches() {
            writer.write(batch)?;
        }
        let mut out = writer.into_inner()?;
        out.flush()?;
        out.get_ref().sync_all()?;
        Ok(())
    }
}

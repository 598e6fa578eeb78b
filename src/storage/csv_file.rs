//! File-backed storage: plain-text address lists in, quoted comma-delimited
//! batch files out.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{AddressSource, BulkSink};
use crate::core::error::Result;
use crate::core::models::{JobId, ResultRow};

/// Marker for a NULL column, as understood by bulk loaders.
const NULL_FIELD: &str = "\\N";

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}

/// Encodes one row as a delimited line (without the trailing newline).
pub fn encode_row(row: &ResultRow) -> String {
    let error = match &row.error_msg {
        Some(msg) => quote(msg),
        None => NULL_FIELD.to_string(),
    };
    [
        quote(&row.job_id.to_string()),
        quote(&row.email),
        quote(flag(row.is_valid_syntax)),
        quote(&row.reachable),
        quote(flag(row.is_deliverable)),
        quote(flag(row.is_host_exists)),
        quote(flag(row.has_mx_records)),
        quote(flag(row.is_disposable)),
        quote(flag(row.is_catch_all)),
        quote(flag(row.is_inbox_full)),
        error,
    ]
    .join(",")
}

/// Writes each batch to `<output_dir>/<job_id>/batch-<n>.csv`. The file is
/// staged under a temporary name and renamed into place, so a batch file
/// either exists complete or not at all.
#[derive(Debug, Clone)]
pub struct CsvFileSink {
    output_dir: PathBuf,
}

impl CsvFileSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn batch_path(&self, job_id: JobId, batch: usize) -> PathBuf {
        self.output_dir
            .join(job_id.to_string())
            .join(format!("batch-{}.csv", batch))
    }
}

#[async_trait]
impl BulkSink for CsvFileSink {
    async fn commit(&self, job_id: JobId, batch: usize, rows: &[ResultRow]) -> Result<()> {
        let target = self.batch_path(job_id, batch);
        let dir = target.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir).await?;

        let staging = dir.join(format!(".batch-{}.csv.tmp", batch));
        let body = rows
            .iter()
            .map(encode_row)
            .collect::<Vec<_>>()
            .join("\n");

        if let Err(e) = fs::write(&staging, body).await {
            let _ = fs::remove_file(&staging).await;
            return Err(e.into());
        }
        fs::rename(&staging, &target).await?;

        tracing::debug!(target: "storage", "[job {}] batch {} committed ({} rows) to {}", job_id, batch, rows.len(), target.display());
        Ok(())
    }
}

/// Reads `<address_dir>/<job_id>.txt`, one address per line.
#[derive(Debug, Clone)]
pub struct FileAddressSource {
    address_dir: PathBuf,
}

impl FileAddressSource {
    pub fn new(address_dir: impl Into<PathBuf>) -> Self {
        Self {
            address_dir: address_dir.into(),
        }
    }
}

#[async_trait]
impl AddressSource for FileAddressSource {
    async fn load(&self, job_id: JobId) -> Result<Vec<String>> {
        let path = self.address_dir.join(format!("{}.txt", job_id));
        let content = fs::read_to_string(&path).await?;
        Ok(content
            .lines()
            .map(|line| line.trim_end_matches('\r').to_string())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_flags_quotes_and_null_error() {
        let mut row = ResultRow::new(7, "a\"b@example.com");
        row.is_valid_syntax = true;
        row.reachable = "yes".to_string();
        assert_eq!(
            encode_row(&row),
            r#""7","a""b@example.com","1","yes","0","0","0","0","0","0",\N"#
        );

        row.error_msg = Some("i/o timeout".to_string());
        assert!(encode_row(&row).ends_with(r#","i/o timeout""#));
    }

    #[tokio::test]
    async fn commit_writes_batch_file_without_leftover_staging() {
        let dir = tempfile::tempdir().unwrap();
        let sink = CsvFileSink::new(dir.path());
        let rows = vec![ResultRow::new(3, "x@example.com"), ResultRow::new(3, "y@example.com")];

        sink.commit(3, 1, &rows).await.unwrap();

        let written = std::fs::read_to_string(sink.batch_path(3, 1)).unwrap();
        assert_eq!(written.lines().count(), 2);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("3"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn address_source_preserves_order_and_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("5.txt"), "b@x.com\r\n\na@x.com\n").unwrap();

        let source = FileAddressSource::new(dir.path());
        let list = source.load(5).await.unwrap();
        assert_eq!(list, vec!["b@x.com", "", "a@x.com"]);

        assert!(source.load(6).await.is_err());
    }
}

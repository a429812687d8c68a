use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{LedgerError, SubmissionLedger};
use crate::registration::SheetRow;

/// Appends rows to a local CSV file, writing the header when the file is new or empty.
#[derive(Debug, Clone)]
pub struct CsvLedger {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl CsvLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn write_row(path: &Path, row: SheetRow) -> Result<(), LedgerError> {
    let needs_header = std::fs::metadata(path)
        .map(|meta| meta.len() == 0)
        .unwrap_or(true);
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new().from_writer(file);
    if needs_header {
        writer.write_record(SheetRow::HEADERS)?;
    }
    writer.write_record(row.into_values())?;
    writer.flush()?;
    Ok(())
}

#[async_trait]
impl SubmissionLedger for CsvLedger {
    async fn append(&self, row: SheetRow) -> Result<(), LedgerError> {
        let path = self.path.clone();
        let lock = self.lock.clone();
        tokio::task::spawn_blocking(move || {
            let _guard = lock
                .lock()
                .map_err(|_| LedgerError::Backend("csv ledger lock poisoned".to_string()))?;
            write_row(&path, row)
        })
        .await
        .map_err(|err| LedgerError::Backend(err.to_string()))?
    }
}

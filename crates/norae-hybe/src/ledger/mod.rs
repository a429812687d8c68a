//! Append-only submission log. Every backend is best-effort from the caller's view.

pub mod csv_file;
pub mod sheets;

use async_trait::async_trait;
use tracing::debug;

use crate::registration::SheetRow;

pub use csv_file::CsvLedger;
pub use sheets::{decode_service_account, GoogleSheetsLedger, HttpsSheetsLedger};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("service account credential is invalid: {0}")]
    Credential(String),
    #[error("spreadsheet append failed: {0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] ::csv::Error),
}

#[async_trait]
pub trait SubmissionLedger: Send + Sync + 'static {
    async fn append(&self, row: SheetRow) -> Result<(), LedgerError>;
}

/// Used when no spreadsheet or local file is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledLedger;

#[async_trait]
impl SubmissionLedger for DisabledLedger {
    async fn append(&self, row: SheetRow) -> Result<(), LedgerError> {
        debug!(status = %row.status, "submission ledger disabled; row dropped");
        Ok(())
    }
}

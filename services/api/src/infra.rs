use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use norae_hybe::config::SheetsConfig;
use norae_hybe::ledger::{
    CsvLedger, DisabledLedger, HttpsSheetsLedger, LedgerError, SubmissionLedger,
};
use norae_hybe::notify::ResendMailer;
use norae_hybe::registration::{RegistrationService, SheetRow};
use norae_hybe::uploads::ImgbbUploader;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) type ApiRegistrationService =
    RegistrationService<ResendMailer, ConfiguredLedger, ImgbbUploader>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Ledger backend chosen at startup from whatever the environment provides.
pub(crate) enum ConfiguredLedger {
    Sheets(HttpsSheetsLedger),
    Csv(CsvLedger),
    Disabled(DisabledLedger),
}

impl ConfiguredLedger {
    /// Prefers Google Sheets, then the local CSV file, then nothing.
    pub(crate) async fn from_config(config: &SheetsConfig) -> Self {
        if let Some((spreadsheet_id, credentials)) = config.credentials() {
            match HttpsSheetsLedger::connect(spreadsheet_id, credentials, &config.range).await {
                Ok(ledger) => {
                    info!(range = %config.range, "submissions logged to google sheets");
                    return Self::Sheets(ledger);
                }
                Err(err) => warn!(error = %err, "google sheets unavailable"),
            }
        }

        match &config.csv_fallback {
            Some(path) => {
                info!(path = %path.display(), "submissions logged to csv file");
                Self::Csv(CsvLedger::new(path.clone()))
            }
            None => {
                warn!("no submission ledger configured; rows will be dropped");
                Self::Disabled(DisabledLedger)
            }
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            ConfiguredLedger::Sheets(_) => "sheets",
            ConfiguredLedger::Csv(_) => "csv",
            ConfiguredLedger::Disabled(_) => "disabled",
        }
    }
}

#[async_trait]
impl SubmissionLedger for ConfiguredLedger {
    async fn append(&self, row: SheetRow) -> Result<(), LedgerError> {
        match self {
            ConfiguredLedger::Sheets(ledger) => ledger.append(row).await,
            ConfiguredLedger::Csv(ledger) => ledger.append(row).await,
            ConfiguredLedger::Disabled(ledger) => ledger.append(row).await,
        }
    }
}

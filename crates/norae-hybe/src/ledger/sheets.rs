use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use google_sheets4::api::{Scope, ValueRange};
use google_sheets4::hyper_rustls::HttpsConnector;
use google_sheets4::hyper_util::client::legacy::connect::HttpConnector;
use google_sheets4::{hyper_rustls, hyper_util, yup_oauth2, Sheets};
use serde_json::Value;
use tracing::debug;

use super::{LedgerError, SubmissionLedger};
use crate::registration::SheetRow;

/// Decodes the base64 service-account JSON and restores newlines escaped in `private_key`.
pub fn decode_service_account(
    encoded: &str,
) -> Result<yup_oauth2::ServiceAccountKey, LedgerError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let raw = STANDARD
        .decode(compact)
        .map_err(|err| LedgerError::Credential(format!("not base64: {err}")))?;
    let mut json: Value = serde_json::from_slice(&raw)
        .map_err(|err| LedgerError::Credential(format!("not JSON: {err}")))?;

    if let Some(Value::String(key)) = json.get_mut("private_key") {
        *key = key.replace("\\n", "\n");
    }

    serde_json::from_value(json).map_err(|err| LedgerError::Credential(err.to_string()))
}

/// Thin wrapper around the generated google-sheets4 client appending one row per call.
pub struct GoogleSheetsLedger<C>
where
    C: google_sheets4::common::Connector + Send + Sync + 'static,
{
    hub: Sheets<C>,
    spreadsheet_id: String,
    range: String,
}

pub type HttpsSheetsLedger = GoogleSheetsLedger<HttpsConnector<HttpConnector>>;

impl<C> GoogleSheetsLedger<C>
where
    C: google_sheets4::common::Connector + Send + Sync + 'static,
{
    pub fn new(hub: Sheets<C>, spreadsheet_id: impl Into<String>, range: impl Into<String>) -> Self {
        Self {
            hub,
            spreadsheet_id: spreadsheet_id.into(),
            range: range.into(),
        }
    }
}

impl HttpsSheetsLedger {
    /// Builds a hub authenticated as the service account over a rustls connector.
    pub async fn connect(
        spreadsheet_id: &str,
        service_account_base64: &str,
        range: &str,
    ) -> Result<Self, LedgerError> {
        let key = decode_service_account(service_account_base64)?;
        let auth = yup_oauth2::ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .map_err(|err| LedgerError::Credential(err.to_string()))?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()?
            .https_or_http()
            .enable_http1()
            .build();
        let client = hyper_util::client::legacy::Client::builder(
            hyper_util::rt::TokioExecutor::new(),
        )
        .build(connector);

        Ok(Self::new(Sheets::new(client, auth), spreadsheet_id, range))
    }
}

impl<C> std::fmt::Debug for GoogleSheetsLedger<C>
where
    C: google_sheets4::common::Connector + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSheetsLedger")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<C> SubmissionLedger for GoogleSheetsLedger<C>
where
    C: google_sheets4::common::Connector + Send + Sync + 'static,
{
    async fn append(&self, row: SheetRow) -> Result<(), LedgerError> {
        let values = row.into_values().into_iter().map(Value::String).collect();
        let request = ValueRange {
            values: Some(vec![values]),
            ..ValueRange::default()
        };

        let (_, response) = self
            .hub
            .spreadsheets()
            .values_append(request, &self.spreadsheet_id, &self.range)
            .value_input_option("RAW")
            .insert_data_option("INSERT_ROWS")
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .map_err(|err| LedgerError::Backend(err.to_string()))?;

        debug!(
            updated_range = %response
                .updates
                .and_then(|updates| updates.updated_range)
                .unwrap_or_default(),
            "submission appended to spreadsheet"
        );
        Ok(())
    }
}

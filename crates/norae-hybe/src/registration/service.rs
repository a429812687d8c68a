use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use super::domain::{
    BodyError, LedgerStatus, MissingIdentity, PaymentPlan, Registration, RegistrationRequest,
    SheetRow,
};
use crate::config::{LedgerMode, PaymentAccounts};
use crate::ledger::SubmissionLedger;
use crate::notify::{
    compose_instructions_email, compose_received_email, compose_ticket_email, sanitize_filename,
    MailError, Mailer,
};
use crate::telemetry::redact_email;
use crate::ticket::{PdfTicketRenderer, TicketError, TicketImage, TicketLayout, TicketRenderer};
use crate::uploads::ProofUploader;

/// Display format shared by the ticket footer and the ledger timestamp column.
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

pub fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Per-process settings the service needs besides its gateways.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub sender: String,
    pub payment_accounts: PaymentAccounts,
    pub ledger_mode: LedgerMode,
}

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationReceipt {
    pub message: &'static str,
    pub issued_at: DateTime<Local>,
    pub tickets: u32,
    pub plan: PaymentPlan,
    pub proof_url: Option<String>,
    pub email_id: Option<String>,
}

impl RegistrationReceipt {
    pub fn view(&self) -> RegistrationView {
        RegistrationView {
            success: true,
            message: self.message,
            issued_at: self.issued_at.to_rfc3339(),
            tickets: self.tickets,
            payment: self.plan,
            proof_url: self.proof_url.clone(),
            email_id: self.email_id.clone(),
        }
    }
}

/// JSON body returned on the happy path.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationView {
    pub success: bool,
    pub message: &'static str,
    pub issued_at: String,
    pub tickets: u32,
    pub payment: PaymentPlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_id: Option<String>,
}

/// Runs one registration end to end: validation, optional ticket, email, and ledger row.
///
/// Only the email step decides the outcome. Proof upload, image decoding, and the ledger
/// append are logged on failure and never change the result.
pub struct RegistrationService<M, L, U> {
    mailer: Option<Arc<M>>,
    ledger: Arc<L>,
    uploader: Option<Arc<U>>,
    renderer: Arc<dyn TicketRenderer>,
    settings: ServiceSettings,
}

impl<M, L, U> RegistrationService<M, L, U>
where
    M: Mailer + 'static,
    L: SubmissionLedger,
    U: ProofUploader + 'static,
{
    /// `mailer` is `None` when no email API key is configured.
    pub fn new(
        mailer: Option<Arc<M>>,
        ledger: Arc<L>,
        uploader: Option<Arc<U>>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            mailer,
            ledger,
            uploader,
            renderer: Arc::new(PdfTicketRenderer),
            settings,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn TicketRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub async fn register(
        &self,
        request: RegistrationRequest,
    ) -> Result<RegistrationReceipt, RegistrationError> {
        let registration = Registration::try_from(request)?;

        let Some(mailer) = self.mailer.as_ref() else {
            error!("RESEND_API_KEY missing; refusing registration");
            return Err(RegistrationError::MissingApiKey);
        };

        let issued_at = Local::now();
        let timestamp = format_timestamp(&issued_at);
        info!(
            email = %redact_email(&registration.email),
            plan = %registration.plan,
            tickets = registration.tickets,
            "registration received"
        );

        let proof_url = self.upload_proof(&registration, &issued_at).await;

        let message = match registration.plan {
            PaymentPlan::Full => {
                let ticket = self.render_ticket(&registration, &timestamp).await?;
                compose_ticket_email(&registration, &self.settings.sender, &ticket)
            }
            PaymentPlan::DownPayment => compose_instructions_email(
                &registration,
                &self.settings.sender,
                &self.settings.payment_accounts,
            ),
            PaymentPlan::Other => compose_received_email(&registration, &self.settings.sender),
        };

        match mailer.send(&message).await {
            Ok(receipt) => {
                info!(
                    email_id = receipt.id.as_deref().unwrap_or("-"),
                    attachments = message.attachments.len(),
                    "confirmation email sent"
                );
                let status = LedgerStatus::for_plan(registration.plan);
                self.record(SheetRow::new(&registration, timestamp, status, proof_url.as_deref()))
                    .await;

                Ok(RegistrationReceipt {
                    message: success_message(registration.plan),
                    issued_at,
                    tickets: registration.tickets,
                    plan: registration.plan,
                    proof_url,
                    email_id: receipt.id,
                })
            }
            Err(err) => {
                error!(error = %err, "confirmation email failed");
                self.record(SheetRow::new(
                    &registration,
                    timestamp,
                    LedgerStatus::EmailFailed,
                    proof_url.as_deref(),
                ))
                .await;

                Err(match err {
                    MailError::Rejected { status, body } => RegistrationError::EmailRejected {
                        status,
                        detail: body,
                    },
                    MailError::Transport(detail) => RegistrationError::EmailTransport(detail),
                })
            }
        }
    }

    async fn upload_proof(
        &self,
        registration: &Registration,
        issued_at: &DateTime<Local>,
    ) -> Option<String> {
        let proof = registration.proof_base64.as_deref()?;
        let uploader = self.uploader.as_ref()?;
        let name = format!(
            "proof_{}_{}",
            sanitize_filename(&registration.name),
            issued_at.timestamp()
        );

        match uploader.upload(proof, &name).await {
            Ok(url) => {
                info!(%url, "payment proof uploaded");
                Some(url)
            }
            Err(err) => {
                warn!(error = %err, "payment proof upload failed; continuing without url");
                None
            }
        }
    }

    async fn render_ticket(
        &self,
        registration: &Registration,
        timestamp: &str,
    ) -> Result<crate::ticket::RenderedTicket, RegistrationError> {
        let logo = decode_optional_image("logo", registration.logo_base64.as_deref());
        let proof = decode_optional_image("proof", registration.proof_base64.as_deref());
        let layout = TicketLayout::build(registration, timestamp, logo, proof);
        let renderer = self.renderer.clone();

        let rendered = tokio::task::spawn_blocking(move || renderer.render(&layout))
            .await
            .map_err(|err| RegistrationError::Internal(err.to_string()))??;
        info!(pages = rendered.page_count, bytes = rendered.bytes.len(), "e-ticket rendered");
        Ok(rendered)
    }

    async fn record(&self, row: SheetRow) {
        match self.settings.ledger_mode {
            LedgerMode::Inline => append_logged(self.ledger.as_ref(), row).await,
            LedgerMode::Background => {
                let ledger = self.ledger.clone();
                tokio::spawn(async move {
                    append_logged(ledger.as_ref(), row).await;
                });
            }
        }
    }
}

async fn append_logged<L: SubmissionLedger>(ledger: &L, row: SheetRow) {
    let status = row.status.clone();
    if let Err(err) = ledger.append(row).await {
        warn!(error = %err, %status, "submission ledger append failed");
    }
}

fn decode_optional_image(kind: &str, raw: Option<&str>) -> Option<TicketImage> {
    let raw = raw?;
    match TicketImage::from_data_uri(raw) {
        Ok(image) => Some(image),
        Err(err) => {
            warn!(error = %err, kind, "image could not be embedded; rendering without it");
            None
        }
    }
}

fn success_message(plan: PaymentPlan) -> &'static str {
    match plan {
        PaymentPlan::Full => "E-ticket generated & sent",
        PaymentPlan::DownPayment => "Registration received, payment instructions sent",
        PaymentPlan::Other => "Registration received, confirmation sent",
    }
}

/// Error raised by the registration service, mapped to an HTTP status by `IntoResponse`.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error(transparent)]
    InvalidBody(#[from] BodyError),
    #[error(transparent)]
    MissingIdentity(#[from] MissingIdentity),
    #[error("Missing Resend API key")]
    MissingApiKey,
    #[error("Failed to send email")]
    EmailRejected { status: u16, detail: String },
    #[error("Failed to send email: {0}")]
    EmailTransport(String),
    #[error(transparent)]
    Ticket(#[from] TicketError),
    #[error("{0}")]
    Internal(String),
}

impl RegistrationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            RegistrationError::InvalidBody(_) | RegistrationError::MissingIdentity(_) => {
                StatusCode::BAD_REQUEST
            }
            RegistrationError::MissingApiKey
            | RegistrationError::EmailRejected { .. }
            | RegistrationError::EmailTransport(_)
            | RegistrationError::Ticket(_)
            | RegistrationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RegistrationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            RegistrationError::EmailRejected { detail, .. } => {
                json!({ "error": self.to_string(), "detail": detail })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

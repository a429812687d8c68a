use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::config::{LedgerMode, PaymentAccounts};
use crate::ledger::{LedgerError, SubmissionLedger};
use crate::notify::{DeliveryReceipt, EmailMessage, MailError, Mailer};
use crate::registration::{RegistrationService, ServiceSettings, SheetRow};
use crate::ticket::{PdfTicketRenderer, RenderedTicket, TicketError, TicketLayout, TicketRenderer};
use crate::uploads::{ProofUploader, UploadError};

pub(super) const SENDER: &str = "NORAEHYBE Ticketing <onboarding@resend.dev>";

#[derive(Debug, Clone)]
pub(super) enum MailBehavior {
    Accept,
    Reject { status: u16, body: String },
    Unreachable,
}

#[derive(Debug)]
pub(super) struct RecordingMailer {
    behavior: MailBehavior,
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingMailer {
    pub(super) fn accepting() -> Self {
        Self::with(MailBehavior::Accept)
    }

    pub(super) fn rejecting(status: u16, body: &str) -> Self {
        Self::with(MailBehavior::Reject {
            status,
            body: body.to_string(),
        })
    }

    pub(super) fn unreachable() -> Self {
        Self::with(MailBehavior::Unreachable)
    }

    fn with(behavior: MailBehavior) -> Self {
        Self {
            behavior,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().expect("mailer mutex poisoned").clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: &EmailMessage) -> Result<DeliveryReceipt, MailError> {
        self.sent
            .lock()
            .expect("mailer mutex poisoned")
            .push(message.clone());
        match &self.behavior {
            MailBehavior::Accept => Ok(DeliveryReceipt {
                id: Some("email-123".to_string()),
            }),
            MailBehavior::Reject { status, body } => Err(MailError::Rejected {
                status: *status,
                body: body.clone(),
            }),
            MailBehavior::Unreachable => {
                Err(MailError::Transport("connection refused".to_string()))
            }
        }
    }
}

#[derive(Debug, Default)]
pub(super) struct MemoryLedger {
    rows: Mutex<Vec<SheetRow>>,
}

impl MemoryLedger {
    pub(super) fn rows(&self) -> Vec<SheetRow> {
        self.rows.lock().expect("ledger mutex poisoned").clone()
    }

    /// Yields to the runtime until a background append lands.
    pub(super) async fn wait_for_rows(&self, expected: usize) -> Vec<SheetRow> {
        for _ in 0..1_000 {
            let rows = self.rows();
            if rows.len() >= expected {
                return rows;
            }
            tokio::task::yield_now().await;
        }
        self.rows()
    }
}

#[async_trait]
impl SubmissionLedger for MemoryLedger {
    async fn append(&self, row: SheetRow) -> Result<(), LedgerError> {
        self.rows.lock().expect("ledger mutex poisoned").push(row);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub(super) struct FailingLedger;

#[async_trait]
impl SubmissionLedger for FailingLedger {
    async fn append(&self, _row: SheetRow) -> Result<(), LedgerError> {
        Err(LedgerError::Backend("quota exceeded".to_string()))
    }
}

#[derive(Debug)]
pub(super) struct StubUploader {
    url: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl StubUploader {
    pub(super) fn hosting(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn failing() -> Self {
        Self {
            url: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("uploader mutex poisoned").clone()
    }
}

#[async_trait]
impl ProofUploader for StubUploader {
    async fn upload(&self, _image: &str, name: &str) -> Result<String, UploadError> {
        self.calls
            .lock()
            .expect("uploader mutex poisoned")
            .push(name.to_string());
        self.url.clone().ok_or_else(|| UploadError::Rejected {
            status: 400,
            body: "Invalid API v1 key.".to_string(),
        })
    }
}

/// Delegates to the PDF renderer and remembers the page count of every ticket.
#[derive(Debug, Default)]
pub(super) struct CountingRenderer {
    pages: Mutex<Vec<usize>>,
}

impl CountingRenderer {
    pub(super) fn pages(&self) -> Vec<usize> {
        self.pages.lock().expect("renderer mutex poisoned").clone()
    }
}

impl TicketRenderer for CountingRenderer {
    fn render(&self, layout: &TicketLayout) -> Result<RenderedTicket, TicketError> {
        let rendered = PdfTicketRenderer.render(layout)?;
        self.pages
            .lock()
            .expect("renderer mutex poisoned")
            .push(rendered.page_count);
        Ok(rendered)
    }
}

pub(super) fn settings(mode: LedgerMode) -> ServiceSettings {
    ServiceSettings {
        sender: SENDER.to_string(),
        payment_accounts: PaymentAccounts {
            dana: Some("0812-3456-7890 a.n. NORAE HYBE".to_string()),
            bank: Some("BCA 1234567890 a.n. NORAE HYBE".to_string()),
            ..PaymentAccounts::default()
        },
        ledger_mode: mode,
    }
}

pub(super) type TestService = RegistrationService<RecordingMailer, MemoryLedger, StubUploader>;

pub(super) struct Harness {
    pub(super) service: Arc<TestService>,
    pub(super) mailer: Arc<RecordingMailer>,
    pub(super) ledger: Arc<MemoryLedger>,
    pub(super) uploader: Arc<StubUploader>,
    pub(super) renderer: Arc<CountingRenderer>,
}

pub(super) fn harness_with(mailer: RecordingMailer, uploader: StubUploader) -> Harness {
    let mailer = Arc::new(mailer);
    let ledger = Arc::new(MemoryLedger::default());
    let uploader = Arc::new(uploader);
    let renderer = Arc::new(CountingRenderer::default());
    let service = RegistrationService::new(
        Some(mailer.clone()),
        ledger.clone(),
        Some(uploader.clone()),
        settings(LedgerMode::Inline),
    )
    .with_renderer(renderer.clone());

    Harness {
        service: Arc::new(service),
        mailer,
        ledger,
        uploader,
        renderer,
    }
}

pub(super) fn harness() -> Harness {
    harness_with(
        RecordingMailer::accepting(),
        StubUploader::hosting("https://i.ibb.co/proof.png"),
    )
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("body is json")
}

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub const MIN_TICKETS: u32 = 1;
pub const MAX_TICKETS: u32 = 100;

/// Registration payload exactly as the form submits it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub wa: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub social: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub fandom: String,
    #[serde(default)]
    pub tickets: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_method: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub song: String,
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub logo_base64: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional_string")]
    pub proof_base64: Option<String>,
}

/// Accepts strings, numbers, and booleans; anything else (including null) becomes empty.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => text,
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => String::new(),
    })
}

fn lenient_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = lenient_string(deserializer)?;
    let trimmed = text.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

/// Body could not be interpreted as a registration object.
#[derive(Debug, thiserror::Error)]
pub enum BodyError {
    #[error("Invalid JSON body: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Invalid JSON body: expected an object")]
    NotAnObject,
}

/// Parses a request body that is either a JSON object or a JSON string holding one.
pub fn parse_body(bytes: &[u8]) -> Result<RegistrationRequest, BodyError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(RegistrationRequest::default());
    }

    let value: Value = serde_json::from_slice(bytes)?;
    let value = match value {
        Value::String(inner) => serde_json::from_str::<Value>(&inner)?,
        other => other,
    };

    match value {
        Value::Object(_) => Ok(serde_json::from_value(value)?),
        _ => Err(BodyError::NotAnObject),
    }
}

/// Normalizes the requested ticket count into `[MIN_TICKETS, MAX_TICKETS]`.
///
/// Numbers and numeric strings are truncated toward zero before clamping; missing,
/// non-numeric, and non-finite input falls back to a single ticket.
pub fn clamp_tickets(raw: Option<&Value>) -> u32 {
    let parsed = match raw {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(count) if count.is_finite() => {
            let truncated = count.trunc();
            if truncated <= f64::from(MIN_TICKETS) {
                MIN_TICKETS
            } else if truncated >= f64::from(MAX_TICKETS) {
                MAX_TICKETS
            } else {
                truncated as u32
            }
        }
        _ => MIN_TICKETS,
    }
}

/// Payment tier selected on the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PaymentPlan {
    /// Paid in full; an e-ticket is issued immediately.
    Full,
    /// Down payment; ticket issuance waits for settlement.
    #[serde(rename = "DP")]
    DownPayment,
    Other,
}

impl PaymentPlan {
    /// Case-insensitive substring match: `full`/`lunas` win over `dp`/`down`.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_lowercase();
        if normalized.contains("full") || normalized.contains("lunas") {
            Self::Full
        } else if normalized.contains("dp") || normalized.contains("down") {
            Self::DownPayment
        } else {
            Self::Other
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PaymentPlan::Full => "Full",
            PaymentPlan::DownPayment => "DP",
            PaymentPlan::Other => "Other",
        }
    }

    pub fn issues_ticket(&self) -> bool {
        matches!(self, PaymentPlan::Full)
    }
}

impl fmt::Display for PaymentPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Channel the registrant intends to pay through.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaymentChannel {
    Dana,
    Ovo,
    GoPay,
    ShopeePay,
    BankTransfer,
    Other(String),
    Unspecified,
}

impl PaymentChannel {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let compact: String = trimmed
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match compact.as_str() {
            "" => Self::Unspecified,
            "dana" => Self::Dana,
            "ovo" => Self::Ovo,
            "gopay" => Self::GoPay,
            "shopeepay" | "spay" => Self::ShopeePay,
            other
                if ["bank", "transfer", "bca", "bri", "bni", "mandiri"]
                    .iter()
                    .any(|needle| other.contains(needle)) =>
            {
                Self::BankTransfer
            }
            _ => Self::Other(trimmed.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            PaymentChannel::Dana => "DANA",
            PaymentChannel::Ovo => "OVO",
            PaymentChannel::GoPay => "GoPay",
            PaymentChannel::ShopeePay => "ShopeePay",
            PaymentChannel::BankTransfer => "Bank Transfer",
            PaymentChannel::Other(raw) => raw.as_str(),
            PaymentChannel::Unspecified => "-",
        }
    }
}

/// Validated registration. Text fields are trimmed; `name` and `email` are non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub wa: String,
    pub social: String,
    pub fandom: String,
    pub tickets: u32,
    pub payment_label: String,
    pub plan: PaymentPlan,
    pub channel: PaymentChannel,
    pub song: String,
    pub logo_base64: Option<String>,
    pub proof_base64: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Missing name or email")]
pub struct MissingIdentity;

impl TryFrom<RegistrationRequest> for Registration {
    type Error = MissingIdentity;

    fn try_from(request: RegistrationRequest) -> Result<Self, Self::Error> {
        let name = request.name.trim().to_string();
        let email = request.email.trim().to_string();
        if name.is_empty() || email.is_empty() {
            return Err(MissingIdentity);
        }

        let tickets = clamp_tickets(request.tickets.as_ref());
        let payment_label = request.payment.trim().to_string();

        Ok(Self {
            name,
            email,
            wa: request.wa.trim().to_string(),
            social: request.social.trim().to_string(),
            fandom: request.fandom.trim().to_string(),
            tickets,
            plan: PaymentPlan::parse(&payment_label),
            payment_label,
            channel: PaymentChannel::parse(&request.payment_method),
            song: request.song.trim().to_string(),
            logo_base64: request.logo_base64,
            proof_base64: request.proof_base64,
        })
    }
}

impl Registration {
    /// Payment text as shown to people: what was submitted, or the plan name.
    pub fn payment_display(&self) -> &str {
        if self.payment_label.is_empty() {
            self.plan.label()
        } else {
            &self.payment_label
        }
    }
}

/// Status written to the ledger's status column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerStatus {
    Paid,
    AwaitingSettlement,
    Registered,
    EmailFailed,
}

impl LedgerStatus {
    pub fn for_plan(plan: PaymentPlan) -> Self {
        match plan {
            PaymentPlan::Full => Self::Paid,
            PaymentPlan::DownPayment => Self::AwaitingSettlement,
            PaymentPlan::Other => Self::Registered,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LedgerStatus::Paid => "LUNAS",
            LedgerStatus::AwaitingSettlement => "BELUM LUNAS",
            LedgerStatus::Registered => "TERDAFTAR",
            LedgerStatus::EmailFailed => "Failed to send email",
        }
    }
}

/// One spreadsheet row in fixed column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRow {
    pub timestamp: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub social: String,
    pub fandom: String,
    pub tickets: String,
    pub payment: String,
    pub method: String,
    pub song: String,
    pub status: String,
    pub proof_url: String,
}

impl SheetRow {
    pub const HEADERS: [&'static str; 12] = [
        "Timestamp",
        "Nama",
        "Email",
        "WhatsApp",
        "Social Media",
        "Fandom",
        "Jumlah Tiket",
        "Payment",
        "Payment Method",
        "Song Request",
        "Status",
        "Bukti Transfer",
    ];

    pub fn new(
        registration: &Registration,
        timestamp: String,
        status: LedgerStatus,
        proof_url: Option<&str>,
    ) -> Self {
        let method = match registration.channel {
            PaymentChannel::Unspecified => String::new(),
            ref channel => channel.label().to_string(),
        };

        Self {
            timestamp,
            name: registration.name.clone(),
            email: registration.email.clone(),
            phone: registration.wa.clone(),
            social: registration.social.clone(),
            fandom: registration.fandom.clone(),
            tickets: registration.tickets.to_string(),
            payment: registration.payment_display().to_string(),
            method,
            song: registration.song.clone(),
            status: status.label().to_string(),
            proof_url: proof_url.unwrap_or_default().to_string(),
        }
    }

    pub fn into_values(self) -> Vec<String> {
        vec![
            self.timestamp,
            self.name,
            self.email,
            self.phone,
            self.social,
            self.fandom,
            self.tickets,
            self.payment,
            self.method,
            self.song,
            self.status,
            self.proof_url,
        ]
    }
}

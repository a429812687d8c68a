use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::registration::PaymentChannel;

pub const DEFAULT_RESEND_API_URL: &str = "https://api.resend.com/emails";
pub const DEFAULT_RESEND_FROM: &str = "NORAEHYBE Ticketing <onboarding@resend.dev>";
pub const DEFAULT_IMGBB_API_URL: &str = "https://api.imgbb.com/1/upload";
pub const DEFAULT_SHEETS_RANGE: &str = "Sheet1!A1";
/// Room for a form carrying both a logo and a payment proof as base64 data URIs.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub email: EmailConfig,
    pub sheets: SheetsConfig,
    pub uploads: UploadConfig,
    pub payment_accounts: PaymentAccounts,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let max_body_bytes = match non_empty_var("APP_MAX_BODY_BYTES") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|bytes| *bytes > 0)
                .ok_or(ConfigError::InvalidBodyLimit(raw))?,
            None => DEFAULT_MAX_BODY_BYTES,
        };

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let email = EmailConfig {
            api_key: non_empty_var("RESEND_API_KEY"),
            from: non_empty_var("RESEND_FROM").unwrap_or_else(|| DEFAULT_RESEND_FROM.to_string()),
            api_url: non_empty_var("RESEND_API_URL")
                .unwrap_or_else(|| DEFAULT_RESEND_API_URL.to_string()),
        };

        let append_mode = match non_empty_var("SHEETS_APPEND_MODE") {
            Some(raw) => LedgerMode::parse(&raw).ok_or(ConfigError::InvalidAppendMode(raw))?,
            None => LedgerMode::Background,
        };

        let sheets = SheetsConfig {
            spreadsheet_id: non_empty_var("SPREADSHEET_ID"),
            service_account_base64: non_empty_var("GOOGLE_SERVICE_ACCOUNT"),
            range: non_empty_var("SHEETS_RANGE").unwrap_or_else(|| DEFAULT_SHEETS_RANGE.to_string()),
            append_mode,
            csv_fallback: non_empty_var("SUBMISSIONS_CSV").map(PathBuf::from),
        };

        let uploads = UploadConfig {
            imgbb_api_key: non_empty_var("IMGBB_API_KEY"),
            imgbb_api_url: non_empty_var("IMGBB_API_URL")
                .unwrap_or_else(|| DEFAULT_IMGBB_API_URL.to_string()),
        };

        let payment_accounts = PaymentAccounts {
            dana: non_empty_var("PAYMENT_ACCOUNT_DANA"),
            ovo: non_empty_var("PAYMENT_ACCOUNT_OVO"),
            gopay: non_empty_var("PAYMENT_ACCOUNT_GOPAY"),
            shopeepay: non_empty_var("PAYMENT_ACCOUNT_SHOPEEPAY"),
            bank: non_empty_var("PAYMENT_ACCOUNT_BANK"),
        };

        Ok(Self {
            environment,
            server: ServerConfig {
                host,
                port,
                max_body_bytes,
            },
            telemetry: TelemetryConfig { log_level },
            email,
            sheets,
            uploads,
            payment_accounts,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest request body the registration endpoint buffers.
    pub max_body_bytes: usize,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Resend delivery settings. A missing key is reported per request, not at start-up.
#[derive(Clone)]
pub struct EmailConfig {
    pub api_key: Option<String>,
    pub from: String,
    pub api_url: String,
}

impl fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmailConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Spreadsheet logging. Both the id and the credential are needed to enable it.
#[derive(Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: Option<String>,
    pub service_account_base64: Option<String>,
    pub range: String,
    pub append_mode: LedgerMode,
    pub csv_fallback: Option<PathBuf>,
}

impl SheetsConfig {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.spreadsheet_id, &self.service_account_base64) {
            (Some(id), Some(account)) => Some((id.as_str(), account.as_str())),
            _ => None,
        }
    }
}

impl fmt::Debug for SheetsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SheetsConfig")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field(
                "service_account_base64",
                &self.service_account_base64.as_ref().map(|_| "<redacted>"),
            )
            .field("range", &self.range)
            .field("append_mode", &self.append_mode)
            .field("csv_fallback", &self.csv_fallback)
            .finish()
    }
}

/// Whether ledger appends run detached from the response or are awaited first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerMode {
    Background,
    Inline,
}

impl LedgerMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "background" | "async" | "detached" => Some(Self::Background),
            "inline" | "sync" | "await" => Some(Self::Inline),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct UploadConfig {
    pub imgbb_api_key: Option<String>,
    pub imgbb_api_url: String,
}

impl fmt::Debug for UploadConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UploadConfig")
            .field("imgbb_api_key", &self.imgbb_api_key.as_ref().map(|_| "<redacted>"))
            .field("imgbb_api_url", &self.imgbb_api_url)
            .finish()
    }
}

/// Account details quoted in down-payment instructions, one per channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaymentAccounts {
    pub dana: Option<String>,
    pub ovo: Option<String>,
    pub gopay: Option<String>,
    pub shopeepay: Option<String>,
    pub bank: Option<String>,
}

impl PaymentAccounts {
    pub fn for_channel(&self, channel: &PaymentChannel) -> Option<&str> {
        let account = match channel {
            PaymentChannel::Dana => &self.dana,
            PaymentChannel::Ovo => &self.ovo,
            PaymentChannel::GoPay => &self.gopay,
            PaymentChannel::ShopeePay => &self.shopeepay,
            PaymentChannel::BankTransfer => &self.bank,
            PaymentChannel::Other(_) | PaymentChannel::Unspecified => return None,
        };
        account.as_deref()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("APP_PORT must be a valid u16")]
    InvalidPort,
    #[error("APP_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost { source: std::net::AddrParseError },
    #[error("SHEETS_APPEND_MODE must be 'background' or 'inline' (got '{0}')")]
    InvalidAppendMode(String),
    #[error("APP_MAX_BODY_BYTES must be a positive byte count (got '{0}')")]
    InvalidBodyLimit(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for key in [
            "APP_ENV",
            "APP_HOST",
            "APP_PORT",
            "APP_LOG_LEVEL",
            "APP_MAX_BODY_BYTES",
            "RESEND_API_KEY",
            "RESEND_FROM",
            "RESEND_API_URL",
            "SPREADSHEET_ID",
            "GOOGLE_SERVICE_ACCOUNT",
            "SHEETS_RANGE",
            "SHEETS_APPEND_MODE",
            "SUBMISSIONS_CSV",
            "IMGBB_API_KEY",
            "IMGBB_API_URL",
            "PAYMENT_ACCOUNT_DANA",
            "PAYMENT_ACCOUNT_OVO",
            "PAYMENT_ACCOUNT_GOPAY",
            "PAYMENT_ACCOUNT_SHOPEEPAY",
            "PAYMENT_ACCOUNT_BANK",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert_eq!(config.telemetry.log_level, "info");
        assert!(config.email.api_key.is_none());
        assert_eq!(config.email.from, DEFAULT_RESEND_FROM);
        assert_eq!(config.email.api_url, DEFAULT_RESEND_API_URL);
        assert!(config.sheets.credentials().is_none());
        assert_eq!(config.sheets.range, DEFAULT_SHEETS_RANGE);
        assert_eq!(config.sheets.append_mode, LedgerMode::Background);
        assert!(config.uploads.imgbb_api_key.is_none());
        assert_eq!(config.payment_accounts, PaymentAccounts::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("RESEND_API_KEY", "   ");
        let config = AppConfig::load().expect("config loads");
        assert!(config.email.api_key.is_none());
    }

    #[test]
    fn sheets_require_both_id_and_credential() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SPREADSHEET_ID", "sheet-123");
        let config = AppConfig::load().expect("config loads");
        assert!(config.sheets.credentials().is_none());

        env::set_var("GOOGLE_SERVICE_ACCOUNT", "eyJ9");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.sheets.credentials(), Some(("sheet-123", "eyJ9")));
    }

    #[test]
    fn rejects_unknown_append_mode() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("SHEETS_APPEND_MODE", "sometimes");
        let err = AppConfig::load().expect_err("mode is rejected");
        assert!(err.to_string().contains("sometimes"));

        env::set_var("SHEETS_APPEND_MODE", "Inline");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.sheets.append_mode, LedgerMode::Inline);
    }

    #[test]
    fn body_limit_is_configurable() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_MAX_BODY_BYTES", "4718592");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.server.max_body_bytes, 4_718_592);

        for invalid in ["0", "lots"] {
            env::set_var("APP_MAX_BODY_BYTES", invalid);
            let err = AppConfig::load().expect_err("limit is rejected");
            assert!(err.to_string().contains("APP_MAX_BODY_BYTES"));
        }
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let email = EmailConfig {
            api_key: Some("re_secret".to_string()),
            from: DEFAULT_RESEND_FROM.to_string(),
            api_url: DEFAULT_RESEND_API_URL.to_string(),
        };
        let rendered = format!("{:?}", email);
        assert!(!rendered.contains("re_secret"));
        assert!(rendered.contains("<redacted>"));
    }
}

use crate::cli::ServeArgs;
use crate::infra::{ApiRegistrationService, AppState, ConfiguredLedger};
use crate::routes::with_registration_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use norae_hybe::config::AppConfig;
use norae_hybe::error::AppError;
use norae_hybe::notify::ResendMailer;
use norae_hybe::registration::ServiceSettings;
use norae_hybe::telemetry;
use norae_hybe::uploads::ImgbbUploader;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let mailer = match &config.email.api_key {
        Some(key) => Some(Arc::new(ResendMailer::new(
            key.clone(),
            config.email.api_url.clone(),
        ))),
        None => {
            warn!("RESEND_API_KEY not set; registrations will fail until it is configured");
            None
        }
    };
    let uploader = config.uploads.imgbb_api_key.as_ref().map(|key| {
        Arc::new(ImgbbUploader::new(
            key.clone(),
            config.uploads.imgbb_api_url.clone(),
        ))
    });
    if uploader.is_none() {
        info!("IMGBB_API_KEY not set; payment proofs will not be hosted");
    }
    let ledger = Arc::new(ConfiguredLedger::from_config(&config.sheets).await);
    let ledger_kind = ledger.kind();

    let settings = ServiceSettings {
        sender: config.email.from.clone(),
        payment_accounts: config.payment_accounts.clone(),
        ledger_mode: config.sheets.append_mode,
    };
    let registration_service: Arc<ApiRegistrationService> = Arc::new(
        ApiRegistrationService::new(mailer, ledger, uploader, settings),
    );

    let app = with_registration_routes(registration_service, config.server.max_body_bytes)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, ledger = ledger_kind, "norae hybe registration service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

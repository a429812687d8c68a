use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::{Form, Query};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use norae_hybe::config::{LedgerMode, PaymentAccounts, DEFAULT_MAX_BODY_BYTES};
use norae_hybe::ledger::CsvLedger;
use norae_hybe::notify::ResendMailer;
use norae_hybe::registration::{
    registration_router, RegistrationService, ServiceSettings, SheetRow, REGISTRATION_PATH,
};
use norae_hybe::uploads::ImgbbUploader;
use serde_json::{json, Value};
use tower::ServiceExt;

type Emails = Arc<Mutex<Vec<(Option<String>, Value)>>>;
type Uploads = Arc<Mutex<Vec<HashMap<String, String>>>>;

struct Providers {
    resend_url: String,
    imgbb_url: String,
    emails: Emails,
    uploads: Uploads,
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake provider");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake provider serves");
    });
    format!("http://{addr}")
}

async fn spawn_providers(resend_status: StatusCode) -> Providers {
    let emails: Emails = Arc::default();
    let email_sink = emails.clone();
    let resend = Router::new().route(
        "/emails",
        post(move |headers: HeaderMap, Json(body): Json<Value>| {
            let sink = email_sink.clone();
            async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string);
                sink.lock().expect("email mutex").push((auth, body));
                if resend_status.is_success() {
                    (resend_status, Json(json!({ "id": "re_42" })))
                } else {
                    (
                        resend_status,
                        Json(json!({ "name": "validation_error", "message": "domain not verified" })),
                    )
                }
            }
        }),
    );

    let uploads: Uploads = Arc::default();
    let upload_sink = uploads.clone();
    let imgbb = Router::new().route(
        "/1/upload",
        post(
            move |Query(query): Query<HashMap<String, String>>,
                  Form(mut form): Form<HashMap<String, String>>| {
                let sink = upload_sink.clone();
                async move {
                    form.insert(
                        "key".to_string(),
                        query.get("key").cloned().unwrap_or_default(),
                    );
                    sink.lock().expect("upload mutex").push(form);
                    Json(json!({ "data": { "url": "https://i.ibb.co/xyz/proof.png" } }))
                }
            },
        ),
    );

    Providers {
        resend_url: format!("{}/emails", serve(resend).await),
        imgbb_url: format!("{}/1/upload", serve(imgbb).await),
        emails,
        uploads,
    }
}

fn png_data_uri() -> String {
    let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 8, Rgb([240, 200, 10])));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageOutputFormat::Png)
        .expect("png encodes");
    format!("data:image/png;base64,{}", STANDARD.encode(out.into_inner()))
}

fn app(providers: &Providers, ledger: CsvLedger) -> Router {
    let service = RegistrationService::new(
        Some(Arc::new(ResendMailer::new("re_test_key", &providers.resend_url))),
        Arc::new(ledger),
        Some(Arc::new(ImgbbUploader::new("imgbb_test_key", &providers.imgbb_url))),
        ServiceSettings {
            sender: "NORAEHYBE Ticketing <onboarding@resend.dev>".to_string(),
            payment_accounts: PaymentAccounts {
                dana: Some("0812-3456-7890 a.n. NORAE HYBE".to_string()),
                ..PaymentAccounts::default()
            },
            ledger_mode: LedgerMode::Inline,
        },
    );
    registration_router(Arc::new(service), DEFAULT_MAX_BODY_BYTES)
}

async fn post_json(app: Router, payload: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::post(REGISTRATION_PATH)
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string()))
                .expect("request builds"),
        )
        .await
        .expect("router responds");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body readable");
    (status, serde_json::from_slice(&bytes).expect("body is json"))
}

fn ledger_rows(ledger: &CsvLedger) -> Vec<Vec<String>> {
    let mut reader = csv::Reader::from_path(ledger.path()).expect("ledger readable");
    let headers = reader.headers().expect("headers").clone();
    assert_eq!(headers.iter().collect::<Vec<_>>(), SheetRow::HEADERS.to_vec());
    reader
        .records()
        .map(|record| {
            record
                .expect("row parses")
                .iter()
                .map(str::to_string)
                .collect()
        })
        .collect()
}

#[tokio::test]
async fn full_payment_ticket_is_emailed_and_logged() {
    let providers = spawn_providers(StatusCode::OK).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let ledger = CsvLedger::new(dir.path().join("submissions.csv"));

    let (status, body) = post_json(
        app(&providers, ledger.clone()),
        json!({
            "name": "Ann",
            "email": "a@x.com",
            "wa": "0812000000",
            "tickets": "3",
            "payment": "Full",
            "paymentMethod": "OVO",
            "song": "Spring Day",
            "logoBase64": png_data_uri(),
            "proofBase64": png_data_uri(),
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["tickets"], 3);
    assert_eq!(body["payment"], "Full");
    assert_eq!(body["proofUrl"], "https://i.ibb.co/xyz/proof.png");
    assert_eq!(body["emailId"], "re_42");

    let emails = providers.emails.lock().expect("email mutex").clone();
    assert_eq!(emails.len(), 1);
    let (auth, email) = &emails[0];
    assert_eq!(auth.as_deref(), Some("Bearer re_test_key"));
    assert_eq!(email["to"], json!(["a@x.com"]));
    let attachments = email["attachments"].as_array().expect("attachments");
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0]["content_type"], "application/pdf");
    let pdf = STANDARD
        .decode(attachments[0]["content"].as_str().expect("content"))
        .expect("pdf base64");
    assert!(pdf.starts_with(b"%PDF-"));

    let uploads = providers.uploads.lock().expect("upload mutex").clone();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0]["key"], "imgbb_test_key");
    assert!(!uploads[0]["image"].starts_with("data:"));

    let rows = ledger_rows(&ledger);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][1], "Ann");
    assert_eq!(rows[0][6], "3");
    assert_eq!(rows[0][8], "OVO");
    assert_eq!(rows[0][10], "LUNAS");
    assert_eq!(rows[0][11], "https://i.ibb.co/xyz/proof.png");
}

#[tokio::test]
async fn down_payment_sends_instructions_only() {
    let providers = spawn_providers(StatusCode::OK).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let ledger = CsvLedger::new(dir.path().join("submissions.csv"));

    let (status, body) = post_json(
        app(&providers, ledger.clone()),
        json!({ "name": "Bo", "email": "b@x.com", "payment": "DP", "paymentMethod": "Dana" }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment"], "DP");
    assert!(body.get("proofUrl").is_none());

    let emails = providers.emails.lock().expect("email mutex").clone();
    let (_, email) = &emails[0];
    assert!(email.get("attachments").is_none());
    assert!(email["html"]
        .as_str()
        .expect("html")
        .contains("0812-3456-7890"));
    assert!(providers.uploads.lock().expect("upload mutex").is_empty());

    let rows = ledger_rows(&ledger);
    assert_eq!(rows[0][10], "BELUM LUNAS");
}

#[tokio::test]
async fn provider_rejection_returns_detail_and_logs_failure() {
    let providers = spawn_providers(StatusCode::FORBIDDEN).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let ledger = CsvLedger::new(dir.path().join("submissions.csv"));

    let (status, body) = post_json(
        app(&providers, ledger.clone()),
        json!({ "name": "Ann", "email": "a@x.com", "payment": "Full" }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to send email");
    assert!(body["detail"]
        .as_str()
        .expect("detail")
        .contains("domain not verified"));
    assert_eq!(providers.emails.lock().expect("email mutex").len(), 1);

    let rows = ledger_rows(&ledger);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][10], "Failed to send email");
}

use chrono::Local;
use clap::Args;
use norae_hybe::error::AppError;
use norae_hybe::registration::{
    format_timestamp, Registration, RegistrationError, RegistrationRequest,
};
use norae_hybe::ticket::{PdfTicketRenderer, TicketImage, TicketLayout, TicketRenderer};
use serde_json::Value;
use std::path::PathBuf;
use tracing::warn;

#[derive(Args, Debug, Clone)]
pub(crate) struct PreviewArgs {
    /// Registrant name printed on every page
    #[arg(long)]
    pub(crate) name: String,
    /// Registrant email printed on every page
    #[arg(long)]
    pub(crate) email: String,
    /// Number of tickets (one page each, clamped to 1..=100)
    #[arg(long, default_value_t = 1)]
    pub(crate) tickets: u32,
    /// Song request text
    #[arg(long, default_value = "")]
    pub(crate) song: String,
    /// PNG or JPEG logo to place on each page
    #[arg(long)]
    pub(crate) logo: Option<PathBuf>,
    /// Where to write the PDF
    #[arg(long)]
    pub(crate) output: PathBuf,
}

pub(crate) fn run_preview(args: PreviewArgs) -> Result<(), AppError> {
    let pages = write_preview(&args)?;
    println!(
        "E-ticket preview written to {} ({} page{})",
        args.output.display(),
        pages,
        if pages == 1 { "" } else { "s" }
    );
    Ok(())
}

fn write_preview(args: &PreviewArgs) -> Result<usize, AppError> {
    let request = RegistrationRequest {
        name: args.name.clone(),
        email: args.email.clone(),
        tickets: Some(Value::from(args.tickets)),
        payment: "Full".to_string(),
        song: args.song.clone(),
        ..RegistrationRequest::default()
    };
    let registration = Registration::try_from(request).map_err(RegistrationError::from)?;

    let logo = match &args.logo {
        Some(path) => {
            let bytes = std::fs::read(path)?;
            match TicketImage::decode(&bytes) {
                Ok(image) => Some(image),
                Err(err) => {
                    warn!(error = %err, path = %path.display(), "logo skipped");
                    None
                }
            }
        }
        None => None,
    };

    let issued_at = format_timestamp(&Local::now());
    let layout = TicketLayout::build(&registration, &issued_at, logo, None);
    let rendered = PdfTicketRenderer.render(&layout)?;
    std::fs::write(&args.output, &rendered.bytes)?;
    Ok(rendered.page_count)
}

use crate::config::PaymentAccounts;
use crate::registration::{PaymentChannel, Registration};
use crate::ticket::RenderedTicket;

use super::email::{EmailAttachment, EmailMessage};

pub const TICKET_SUBJECT: &str = "🎫 NORAE HYBE - E-Ticket Confirmation!";
pub const INSTRUCTIONS_SUBJECT: &str = "NORAE HYBE - Payment Instructions";
pub const RECEIVED_SUBJECT: &str = "NORAE HYBE - Registration Received";

const SIGNATURE: &str = "<p>Salam hangat,<br>NORAEHYBE Ticketing</p>";

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Replaces anything outside `[A-Za-z0-9_.-]` with `_` and caps the result at 64 characters.
pub fn sanitize_filename(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect()
}

pub fn ticket_filename(name: &str) -> String {
    format!("NORAEHYBE_e-ticket_{}.pdf", sanitize_filename(name))
}

fn wrap_body(inner: String) -> String {
    format!(
        "<div style=\"font-family:Arial, Helvetica, sans-serif; color:#111;\">{inner}{SIGNATURE}</div>"
    )
}

fn song_or_dash(song: &str) -> String {
    if song.is_empty() {
        "-".to_string()
    } else {
        escape_html(song)
    }
}

/// Full payment: the rendered ticket travels as the single attachment.
pub fn compose_ticket_email(
    registration: &Registration,
    sender: &str,
    ticket: &RenderedTicket,
) -> EmailMessage {
    let html = wrap_body(format!(
        "<h2>🎫 NORAE HYBE - E-Ticket Confirmation</h2>\
         <p>Hi {name},</p>\
         <p>Thanks for registering! Your e-ticket(s) ({count}) are attached. Show the ticket at the venue.</p>\
         <p><b>Song request:</b> {song}</p>",
        name = escape_html(&registration.name),
        count = ticket.page_count,
        song = song_or_dash(&registration.song),
    ));

    EmailMessage {
        from: sender.to_string(),
        to: vec![registration.email.clone()],
        subject: TICKET_SUBJECT.to_string(),
        html,
        attachments: vec![EmailAttachment {
            filename: ticket_filename(&registration.name),
            content: ticket.to_base64(),
            content_type: mime::APPLICATION_PDF.to_string(),
        }],
    }
}

/// Down payment: account details for the chosen channel, no ticket yet.
pub fn compose_instructions_email(
    registration: &Registration,
    sender: &str,
    accounts: &PaymentAccounts,
) -> EmailMessage {
    let channel_line = match (&registration.channel, accounts.for_channel(&registration.channel)) {
        (channel, Some(account)) => format!(
            "<p>Please complete your payment via <b>{}</b> to: <b>{}</b></p>",
            escape_html(channel.label()),
            escape_html(account)
        ),
        (PaymentChannel::Unspecified, None) => {
            "<p>Please reply to this email to choose a payment method and receive the account details.</p>"
                .to_string()
        }
        (channel, None) => format!(
            "<p>You chose <b>{}</b>. Please contact the organizer for the account details.</p>",
            escape_html(channel.label())
        ),
    };

    let html = wrap_body(format!(
        "<h2>NORAE HYBE - Payment Instructions</h2>\
         <p>Hi {name},</p>\
         <p>We received your registration for {count} ticket(s) with a down payment.</p>\
         {channel_line}\
         <p>Your e-ticket will be sent once the payment is settled. Keep your transfer receipt as proof.</p>\
         <p><b>Song request:</b> {song}</p>",
        name = escape_html(&registration.name),
        count = registration.tickets,
        song = song_or_dash(&registration.song),
    ));

    EmailMessage {
        from: sender.to_string(),
        to: vec![registration.email.clone()],
        subject: INSTRUCTIONS_SUBJECT.to_string(),
        html,
        attachments: Vec::new(),
    }
}

/// Any other payment choice: acknowledgement only.
pub fn compose_received_email(registration: &Registration, sender: &str) -> EmailMessage {
    let html = wrap_body(format!(
        "<h2>NORAE HYBE - Registration Received</h2>\
         <p>Hi {name},</p>\
         <p>Thanks for registering for {count} ticket(s). Our team will contact you about payment and ticket issuance.</p>\
         <p><b>Song request:</b> {song}</p>",
        name = escape_html(&registration.name),
        count = registration.tickets,
        song = song_or_dash(&registration.song),
    ));

    EmailMessage {
        from: sender.to_string(),
        to: vec![registration.email.clone()],
        subject: RECEIVED_SUBJECT.to_string(),
        html,
        attachments: Vec::new(),
    }
}

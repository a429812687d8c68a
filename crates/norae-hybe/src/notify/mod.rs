//! Confirmation emails: composition per payment plan and delivery through Resend.

pub mod compose;
pub mod email;

pub use compose::{
    compose_instructions_email, compose_received_email, compose_ticket_email, escape_html,
    sanitize_filename, ticket_filename,
};
pub use email::{DeliveryReceipt, EmailAttachment, EmailMessage, MailError, Mailer, ResendMailer};

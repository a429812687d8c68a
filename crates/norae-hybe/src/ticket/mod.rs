//! E-ticket production: image decoding, page layout, and PDF rendering.

pub mod image;
pub mod layout;
pub mod render;

pub use image::{decode_data_uri, strip_data_uri, ImageError, TicketImage};
pub use layout::{fit_within, wrap_text, Element, ImageSlot, PageLayout, TicketLayout};
pub use render::{PdfTicketRenderer, RenderedTicket, TicketRenderer};

#[derive(Debug, thiserror::Error)]
pub enum TicketError {
    #[error("ticket has no pages")]
    Empty,
    #[error("failed to render ticket pdf: {0}")]
    Pdf(String),
}

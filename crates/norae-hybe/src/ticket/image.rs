use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::DynamicImage;

/// Removes a `data:<mime>;base64,` prefix. Input without one is returned unchanged.
pub fn strip_data_uri(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.strip_prefix("data:") {
        Some(rest) => match rest.split_once(',') {
            Some((header, payload)) if header.ends_with(";base64") => payload,
            _ => trimmed,
        },
        None => trimmed,
    }
}

/// Decodes a data URI (or bare base64) into raw bytes, ignoring embedded whitespace.
pub fn decode_data_uri(raw: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload: String = strip_data_uri(raw)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    STANDARD.decode(payload)
}

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unsupported or corrupt image: {0}")]
    Decode(#[from] image::ImageError),
}

/// Decoded raster ready for placement on a ticket page.
#[derive(Debug, Clone)]
pub struct TicketImage {
    pixels: DynamicImage,
}

impl TicketImage {
    /// Decodes PNG or JPEG bytes; the format is sniffed from the content and alpha is dropped.
    pub fn decode(bytes: &[u8]) -> Result<Self, ImageError> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Self {
            pixels: DynamicImage::ImageRgb8(decoded.to_rgb8()),
        })
    }

    pub fn from_data_uri(raw: &str) -> Result<Self, ImageError> {
        let bytes = decode_data_uri(raw)?;
        Self::decode(&bytes)
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub(crate) fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }
}

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::imageops::FilterType;
use image::DynamicImage;
use printpdf::lopdf::{Document, Object, ObjectId, Stream};
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfLayerReference, Pt, Rect, Rgb,
};

use super::layout::{Element, ImageSlot, Shade, TicketLayout};
use super::TicketError;

/// Turns a laid-out ticket into document bytes.
pub trait TicketRenderer: Send + Sync {
    fn render(&self, layout: &TicketLayout) -> Result<RenderedTicket, TicketError>;
}

/// Finished document kept in memory until it is attached to the confirmation email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTicket {
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

impl RenderedTicket {
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

const LAYER_NAME: &str = "Ticket";
/// Embedded pixels per point of the box an image is drawn into.
const PIXELS_PER_POINT: f32 = 2.0;

/// PDF backend drawing with the built-in Helvetica face, so no font files are fetched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTicketRenderer;

fn mm(points: f32) -> Mm {
    Mm::from(Pt(points))
}

fn color(shade: Shade) -> Color {
    Color::Rgb(Rgb::new(shade.r, shade.g, shade.b, None))
}

impl TicketRenderer for PdfTicketRenderer {
    fn render(&self, layout: &TicketLayout) -> Result<RenderedTicket, TicketError> {
        if layout.pages.is_empty() {
            return Err(TicketError::Empty);
        }

        let (doc, first_page, first_layer) = PdfDocument::new(
            layout.title.as_str(),
            mm(layout.width),
            mm(layout.height),
            LAYER_NAME,
        );
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|err| TicketError::Pdf(err.to_string()))?;

        let mut targets = vec![(first_page, first_layer)];
        for _ in 1..layout.pages.len() {
            targets.push(doc.add_page(mm(layout.width), mm(layout.height), LAYER_NAME));
        }

        let images = EmbeddedImages::prepare(layout);
        for (page, (page_index, layer_index)) in layout.pages.iter().zip(targets) {
            let layer = doc.get_page(page_index).get_layer(layer_index);
            for element in &page.elements {
                draw(&layer, &font, &images, element);
            }
        }

        let bytes = doc
            .save_to_bytes()
            .map_err(|err| TicketError::Pdf(err.to_string()))?;
        let bytes = if images.is_empty() {
            bytes
        } else {
            share_identical_images(&bytes)?
        };

        Ok(RenderedTicket {
            bytes,
            page_count: layout.pages.len(),
        })
    }
}

/// Pixels for each image slot, reduced once to the resolution its box needs.
struct EmbeddedImages {
    logo: Option<DynamicImage>,
    proof: Option<DynamicImage>,
}

impl EmbeddedImages {
    fn prepare(layout: &TicketLayout) -> Self {
        Self {
            logo: prepare_slot(layout, ImageSlot::Logo),
            proof: prepare_slot(layout, ImageSlot::Proof),
        }
    }

    fn get(&self, slot: ImageSlot) -> Option<&DynamicImage> {
        match slot {
            ImageSlot::Logo => self.logo.as_ref(),
            ImageSlot::Proof => self.proof.as_ref(),
        }
    }

    fn is_empty(&self) -> bool {
        self.logo.is_none() && self.proof.is_none()
    }
}

fn prepare_slot(layout: &TicketLayout, slot: ImageSlot) -> Option<DynamicImage> {
    let source = layout.image(slot)?;
    if source.width() == 0 || source.height() == 0 {
        return None;
    }
    let (box_width, box_height) = layout
        .pages
        .iter()
        .find_map(|page| match page.image(slot) {
            Some(Element::Image { width, height, .. }) => Some((*width, *height)),
            _ => None,
        })?;

    let max_width = (box_width * PIXELS_PER_POINT).ceil().max(1.0) as u32;
    let max_height = (box_height * PIXELS_PER_POINT).ceil().max(1.0) as u32;
    let pixels = source.pixels();
    if pixels.width() <= max_width && pixels.height() <= max_height {
        Some(pixels.clone())
    } else {
        Some(pixels.resize(max_width, max_height, FilterType::Triangle))
    }
}

/// printpdf writes a separate copy of an image into every page that draws it.
/// Points every page at the first byte-identical copy, drops the rest, and compresses.
fn share_identical_images(bytes: &[u8]) -> Result<Vec<u8>, TicketError> {
    let mut doc = Document::load_mem(bytes).map_err(|err| TicketError::Pdf(err.to_string()))?;

    let mut canonical: Vec<ObjectId> = Vec::new();
    let mut replacements: Vec<(ObjectId, ObjectId)> = Vec::new();
    for (id, object) in &doc.objects {
        let Object::Stream(stream) = object else {
            continue;
        };
        if !is_image(stream) {
            continue;
        }
        let existing = canonical.iter().copied().find(|candidate| {
            matches!(doc.objects.get(candidate), Some(Object::Stream(first)) if same_image(first, stream))
        });
        match existing {
            Some(first) => replacements.push((*id, first)),
            None => canonical.push(*id),
        }
    }

    if !replacements.is_empty() {
        doc.traverse_objects(|object| {
            if let Object::Reference(id) = object {
                if let Some((_, first)) = replacements.iter().find(|(dup, _)| *dup == *id) {
                    *id = *first;
                }
            }
        });
        doc.prune_objects();
    }
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|err| TicketError::Pdf(err.to_string()))?;
    Ok(out)
}

fn is_image(stream: &Stream) -> bool {
    stream
        .dict
        .get(b"Subtype")
        .and_then(Object::as_name)
        .map_or(false, |name| name == b"Image")
}

fn same_image(a: &Stream, b: &Stream) -> bool {
    let dimension = |stream: &Stream, key: &[u8]| stream.dict.get(key).and_then(Object::as_i64).ok();
    a.content == b.content
        && dimension(a, b"Width") == dimension(b, b"Width")
        && dimension(a, b"Height") == dimension(b, b"Height")
}

fn draw(layer: &PdfLayerReference, font: &IndirectFontRef, images: &EmbeddedImages, element: &Element) {
    match element {
        Element::Fill {
            x,
            y,
            width,
            height,
            shade,
        } => {
            layer.set_fill_color(color(*shade));
            let rect = Rect::new(mm(*x), mm(*y), mm(x + width), mm(y + height))
                .with_mode(PaintMode::Fill);
            layer.add_rect(rect);
        }
        Element::Text {
            text,
            x,
            y,
            size,
            shade,
        } => {
            layer.set_fill_color(color(*shade));
            layer.use_text(text.as_str(), *size, mm(*x), mm(*y), font);
        }
        Element::Image {
            slot,
            x,
            y,
            width,
            height,
        } => {
            let Some(pixels) = images.get(*slot) else {
                return;
            };
            // At 72 dpi one pixel maps to one point, so the scale is the target size in pixels.
            let transform = ImageTransform {
                translate_x: Some(mm(*x)),
                translate_y: Some(mm(*y)),
                scale_x: Some(width / pixels.width() as f32),
                scale_y: Some(height / pixels.height() as f32),
                dpi: Some(72.0),
                ..ImageTransform::default()
            };
            Image::from_dynamic_image(pixels).add_to_layer(layer.clone(), transform);
        }
    }
}

//! Page geometry for the e-ticket, kept independent of the PDF backend.
//!
//! Coordinates are PDF points with the origin at the bottom-left corner.

use tracing::warn;

use crate::registration::Registration;

use super::image::TicketImage;

pub const PAGE_WIDTH: f32 = 842.0;
pub const PAGE_HEIGHT: f32 = 595.0;
pub const MARGIN: f32 = 48.0;
pub const SONG_WRAP_CHARS: usize = 48;
pub const SONG_LINE_STEP: f32 = 12.0;
pub const MIN_SONG_LINE_STEP: f32 = 6.0;
/// Lowest baseline a song line may use; the footer sits below it.
pub const SONG_FLOOR: f32 = 44.0;
pub const SONG_OVERFLOW_MARKER: &str = "...";
pub const TICKET_TITLE: &str = "NORAE HYBE - E-Ticket";

const LOGO_BOX: (f32, f32) = (300.0, 60.0);
const PROOF_BOX: (f32, f32) = (100.0, 60.0);
const ROW_GAP: f32 = 18.0;
const SONG_FONT_SIZE: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shade {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Shade {
    pub const fn gray(level: f32) -> Self {
        Self {
            r: level,
            g: level,
            b: level,
        }
    }
}

const BACKGROUND: Shade = Shade::gray(0.06);
const HEADING: Shade = Shade::gray(0.96);
const PRIMARY: Shade = Shade::gray(0.95);
const SECONDARY: Shade = Shade::gray(0.85);
const BODY: Shade = Shade::gray(0.9);
const MUTED: Shade = Shade::gray(0.65);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    Logo,
    Proof,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Fill {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        shade: Shade,
    },
    Text {
        text: String,
        x: f32,
        y: f32,
        size: f32,
        shade: Shade,
    },
    Image {
        slot: ImageSlot,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageLayout {
    pub elements: Vec<Element>,
}

impl PageLayout {
    fn text(&mut self, text: impl Into<String>, x: f32, y: f32, size: f32, shade: Shade) {
        self.elements.push(Element::Text {
            text: text.into(),
            x,
            y,
            size,
            shade,
        });
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().filter_map(|element| match element {
            Element::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn image(&self, slot: ImageSlot) -> Option<&Element> {
        self.elements
            .iter()
            .find(|element| matches!(element, Element::Image { slot: s, .. } if *s == slot))
    }
}

/// A complete ticket: one page per admitted person plus the images those pages reference.
#[derive(Debug, Clone)]
pub struct TicketLayout {
    pub title: String,
    pub width: f32,
    pub height: f32,
    pub pages: Vec<PageLayout>,
    pub logo: Option<TicketImage>,
    pub proof: Option<TicketImage>,
}

impl TicketLayout {
    pub fn build(
        registration: &Registration,
        issued_at: &str,
        logo: Option<TicketImage>,
        proof: Option<TicketImage>,
    ) -> Self {
        let total = registration.tickets.max(1);
        let song = SongBlock::fit(
            wrap_text(&registration.song, SONG_WRAP_CHARS),
            song_baseline(logo.is_some()),
        );
        if song.dropped > 0 {
            warn!(
                dropped_lines = song.dropped,
                kept_lines = song.lines.len() - 1,
                "song request does not fit on the ticket; truncating"
            );
        }
        let pages = (1..=total)
            .map(|index| {
                layout_page(
                    registration,
                    issued_at,
                    index,
                    total,
                    &song,
                    logo.as_ref(),
                    proof.as_ref(),
                )
            })
            .collect();

        Self {
            title: format!("{} - {}", TICKET_TITLE, registration.name),
            width: PAGE_WIDTH,
            height: PAGE_HEIGHT,
            pages,
            logo,
            proof,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn image(&self, slot: ImageSlot) -> Option<&TicketImage> {
        match slot {
            ImageSlot::Logo => self.logo.as_ref(),
            ImageSlot::Proof => self.proof.as_ref(),
        }
    }
}

/// Wrapped song lines with the spacing that lets them fit above the footer.
#[derive(Debug, Clone, PartialEq)]
struct SongBlock {
    lines: Vec<String>,
    first_baseline: f32,
    step: f32,
    size: f32,
    dropped: usize,
}

impl SongBlock {
    /// Tightens the line step down to `MIN_SONG_LINE_STEP` before giving up on any line.
    /// Whatever still does not fit is replaced by a trailing overflow marker.
    fn fit(mut lines: Vec<String>, first_baseline: f32) -> Self {
        let room = (first_baseline - SONG_FLOOR).max(0.0);
        let step = match lines.len() {
            0 | 1 => SONG_LINE_STEP,
            n => (room / (n - 1) as f32).clamp(MIN_SONG_LINE_STEP, SONG_LINE_STEP),
        };
        let capacity = ((room + 0.001) / step).floor() as usize + 1;

        let mut dropped = 0;
        if lines.len() > capacity {
            let keep = capacity.saturating_sub(1);
            dropped = lines.len() - keep;
            lines.truncate(keep);
            lines.push(SONG_OVERFLOW_MARKER.to_string());
        }

        Self {
            lines,
            first_baseline,
            step,
            size: SONG_FONT_SIZE * step / SONG_LINE_STEP,
            dropped,
        }
    }
}

fn content_top(has_logo: bool) -> f32 {
    if has_logo {
        PAGE_HEIGHT - 100.0
    } else {
        PAGE_HEIGHT - 70.0
    }
}

fn song_baseline(has_logo: bool) -> f32 {
    content_top(has_logo) - 36.0 - 3.0 * ROW_GAP - 14.0
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

fn layout_page(
    registration: &Registration,
    issued_at: &str,
    index: u32,
    total: u32,
    song: &SongBlock,
    logo: Option<&TicketImage>,
    proof: Option<&TicketImage>,
) -> PageLayout {
    let mut page = PageLayout::default();
    page.elements.push(Element::Fill {
        x: 0.0,
        y: 0.0,
        width: PAGE_WIDTH,
        height: PAGE_HEIGHT,
        shade: BACKGROUND,
    });

    let top = content_top(logo.is_some());
    if let Some(logo) = logo {
        let (width, height) = fit_within(
            logo.width() as f32,
            logo.height() as f32,
            LOGO_BOX.0,
            LOGO_BOX.1,
        );
        page.elements.push(Element::Image {
            slot: ImageSlot::Logo,
            x: (PAGE_WIDTH - width) / 2.0,
            y: PAGE_HEIGHT - 90.0,
            width,
            height,
        });
    }

    page.text(TICKET_TITLE, MARGIN, top, 18.0, HEADING);
    page.text(
        format!("Ticket {index} of {total}"),
        PAGE_WIDTH - 200.0,
        top,
        10.0,
        SECONDARY,
    );

    let mut left = top - 36.0;
    page.text(format!("Name: {}", registration.name), MARGIN, left, 12.0, PRIMARY);
    for (label, value) in [
        ("Email", registration.email.as_str()),
        ("WhatsApp", registration.wa.as_str()),
        ("Social", registration.social.as_str()),
    ] {
        left -= ROW_GAP;
        page.text(format!("{label}: {}", or_dash(value)), MARGIN, left, 11.0, SECONDARY);
    }

    let right_x = PAGE_WIDTH / 2.0 + 20.0;
    let mut right = top - 36.0;
    page.text(
        format!("Fandom: {}", or_dash(&registration.fandom)),
        right_x,
        right,
        12.0,
        PRIMARY,
    );
    for (label, value) in [
        ("Payment", registration.payment_display()),
        ("Method", registration.channel.label()),
    ] {
        right -= ROW_GAP;
        page.text(format!("{label}: {value}"), right_x, right, 11.0, SECONDARY);
    }
    right -= ROW_GAP;
    page.text("Song Request:", right_x, right, 11.0, PRIMARY);
    let mut baseline = song.first_baseline;
    for line in &song.lines {
        page.text(line.clone(), right_x, baseline, song.size, BODY);
        baseline -= song.step;
    }

    page.text(format!("Tickets: {total}"), MARGIN, 28.0, 9.0, MUTED);
    page.text(
        format!("Issued: {issued_at}"),
        PAGE_WIDTH - 260.0,
        28.0,
        9.0,
        MUTED,
    );

    if let Some(proof) = proof {
        let (width, height) = fit_within(
            proof.width() as f32,
            proof.height() as f32,
            PROOF_BOX.0,
            PROOF_BOX.1,
        );
        page.elements.push(Element::Image {
            slot: ImageSlot::Proof,
            x: PAGE_WIDTH - width - MARGIN,
            y: MARGIN,
            width,
            height,
        });
    }

    page
}

/// Scales `width`×`height` to the largest size fitting the box while keeping the aspect ratio.
pub fn fit_within(width: f32, height: f32, box_width: f32, box_height: f32) -> (f32, f32) {
    if width <= 0.0 || height <= 0.0 {
        return (0.0, 0.0);
    }
    let scale = (box_width / width).min(box_height / height);
    (width * scale, height * scale)
}

/// Greedy word wrap on whitespace.
///
/// Words are never split, so a single word longer than `max_chars` sits on a line of its
/// own. Blank input yields a single `-` line.
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current.is_empty() {
            current.push_str(word);
            current_len = word_len;
        } else if current_len + 1 + word_len <= max_chars {
            current.push(' ');
            current.push_str(word);
            current_len += 1 + word_len;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
            current_len = word_len;
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push("-".to_string());
    }
    lines
}

//! Page rendering into backend-agnostic draw commands.

use epub_pager::{MeasureError, PagedDocument, PagerError};

use crate::markup_spans::SpanStyle;
use crate::text_layout::MetricsMeasurer;

/// Quarter-turn page rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Rotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Normalise `degrees` modulo 360; only right angles are accepted.
    pub fn from_degrees(degrees: i32) -> Result<Self, RenderError> {
        match degrees.rem_euclid(360) {
            0 => Ok(Self::Deg0),
            90 => Ok(Self::Deg90),
            180 => Ok(Self::Deg180),
            270 => Ok(Self::Deg270),
            _ => Err(RenderError::InvalidRotation(degrees)),
        }
    }

    /// Clockwise angle in degrees.
    pub fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    fn swaps_axes(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

/// Errors from page rendering.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderError {
    PageOutOfRange { index: usize, count: usize },
    InvalidRotation(i32),
    InvalidScale(f64),
    Measurement(MeasureError),
    Document(String),
}

impl core::fmt::Display for RenderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::PageOutOfRange { index, count } => {
                write!(f, "page {} out of range (document has {} pages)", index, count)
            }
            Self::InvalidRotation(deg) => write!(f, "unsupported rotation: {} degrees", deg),
            Self::InvalidScale(scale) => write!(f, "invalid render scale: {}", scale),
            Self::Measurement(err) => write!(f, "page layout failed: {}", err),
            Self::Document(msg) => write!(f, "document error: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Measurement(err) => Some(err),
            _ => None,
        }
    }
}

impl From<MeasureError> for RenderError {
    fn from(err: MeasureError) -> Self {
        Self::Measurement(err)
    }
}

impl From<PagerError> for RenderError {
    fn from(err: PagerError) -> Self {
        match err {
            PagerError::PageOutOfRange { index, count } => Self::PageOutOfRange { index, count },
            other => Self::Document(other.to_string()),
        }
    }
}

/// Transform applied to the surface before drawing: translate by the
/// scaled margin, scale, then rotate about the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageTransform {
    pub translate_x: f64,
    pub translate_y: f64,
    pub scale: f64,
    pub rotation: Rotation,
}

/// Styled run positioned in layout space.
#[derive(Clone, Debug, PartialEq)]
pub struct RunCommand {
    pub text: String,
    pub style: SpanStyle,
    pub x: f32,
    pub width: f32,
}

/// One drawn line of text in layout space.
#[derive(Clone, Debug, PartialEq)]
pub struct TextLine {
    /// Line top.
    pub y: f32,
    pub baseline_y: f32,
    pub height: f32,
    pub runs: Vec<RunCommand>,
}

/// Rendered page: surface size, transform and draw commands.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedPage {
    pub page_index: usize,
    pub surface_width: u32,
    pub surface_height: u32,
    pub transform: PageTransform,
    pub layout_width: i32,
    pub layout_height: i32,
    pub lines: Vec<TextLine>,
    /// Lines laid out past the bottom of the layout box and not drawn.
    pub clipped_lines: usize,
}

/// Render page `index` of `document`.
///
/// The surface is the page size times `scale` (truncated), with axes
/// swapped for 90/270 degree rotations. Text is laid out in a
/// `(page_width - margin) x (page_height - margin)` box.
pub fn render_page(
    document: &PagedDocument,
    index: usize,
    scale: f64,
    rotation: i32,
    measurer: &MetricsMeasurer,
) -> Result<RenderedPage, RenderError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(RenderError::InvalidScale(scale));
    }
    let rotation = Rotation::from_degrees(rotation)?;
    let page = document.page(index)?;
    let config = document.config();
    let geometry = document.page_geometry();

    let scaled_w = (geometry.width * scale) as u32;
    let scaled_h = (geometry.height * scale) as u32;
    let (surface_width, surface_height) = if rotation.swaps_axes() {
        (scaled_h, scaled_w)
    } else {
        (scaled_w, scaled_h)
    };

    let margin = f64::from(config.margin);
    let transform = PageTransform {
        translate_x: margin * scale,
        translate_y: margin * scale,
        scale,
        rotation,
    };

    let layout_width = config.page_width.saturating_sub(config.margin).max(1);
    let layout_height = config.page_height.saturating_sub(config.margin).max(1);
    let layout = measurer.layout(page.markup(), layout_width)?;
    let visible = layout.lines_within(layout_height as f32);

    let mut lines = Vec::with_capacity(visible);
    let mut y = 0.0f32;
    for line in layout.lines.iter().take(visible) {
        lines.push(TextLine {
            y,
            baseline_y: y + line.ascent,
            height: line.height,
            runs: line
                .runs
                .iter()
                .map(|run| RunCommand {
                    text: run.text.clone(),
                    style: run.style,
                    x: run.x,
                    width: run.width,
                })
                .collect(),
        });
        y += line.height;
    }

    let clipped_lines = layout.line_count().saturating_sub(visible);
    if clipped_lines > 0 {
        log::warn!(
            "page {} overflows its layout box by {} lines",
            index,
            clipped_lines
        );
    }
    log::debug!(
        "rendered page {} at scale {} rotation {}: {}x{} surface, {} lines",
        index,
        scale,
        rotation.degrees(),
        surface_width,
        surface_height,
        lines.len()
    );

    Ok(RenderedPage {
        page_index: index,
        surface_width,
        surface_height,
        transform,
        layout_width,
        layout_height,
        lines,
        clipped_lines,
    })
}

/// Convenience wrapper owning the measurer used for drawing.
#[derive(Clone, Debug, Default)]
pub struct PageRenderer {
    measurer: MetricsMeasurer,
}

impl PageRenderer {
    /// Renderer drawing with `measurer`; use the measurer that paginated the document.
    pub fn new(measurer: MetricsMeasurer) -> Self {
        Self { measurer }
    }

    /// Measurer used for page layout.
    pub fn measurer(&self) -> &MetricsMeasurer {
        &self.measurer
    }

    /// Render page `index`; see [`render_page`].
    pub fn render(
        &self,
        document: &PagedDocument,
        index: usize,
        scale: f64,
        rotation: i32,
    ) -> Result<RenderedPage, RenderError> {
        render_page(document, index, scale, rotation, &self.measurer)
    }
}

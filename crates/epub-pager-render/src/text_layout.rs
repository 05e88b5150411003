//! Deterministic reference layout used for measuring and drawing pages.
//!
//! Widths come from fixed per-grapheme advances rather than font files, so
//! pagination is reproducible across hosts. Lines wrap at whitespace and
//! fall back to grapheme breaks for words wider than the box.

use epub_pager::{LayoutHeight, LayoutMeasurer, MeasureError};
use smallvec::SmallVec;
use unicode_segmentation::UnicodeSegmentation;

use crate::markup_spans::{parse_markup, SpanStyle};

const BOLD_ADVANCE_FACTOR: f32 = 1.1;
const TAB_ADVANCE_FACTOR: f32 = 4.0;
const ASCENT_RATIO: f32 = 0.8;
const FIT_EPSILON: f32 = 0.001;

/// Base font metrics at scale `1.0`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextMetrics {
    /// Horizontal advance of a narrow grapheme.
    pub advance: f32,
    /// Line box height.
    pub line_height: f32,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            advance: 8.0,
            line_height: 20.0,
        }
    }
}

impl TextMetrics {
    /// Metrics with the given base advance and line height.
    pub fn new(advance: f32, line_height: f32) -> Self {
        Self {
            advance,
            line_height,
        }
    }

    fn grapheme_advance(&self, grapheme: &str, style: SpanStyle) -> f32 {
        let base = match grapheme {
            "\t" => self.advance * TAB_ADVANCE_FACTOR,
            g if g.chars().all(char::is_control) => 0.0,
            g if g.chars().next().is_some_and(is_wide) => self.advance * 2.0,
            _ => self.advance,
        };
        let weighted = if style.bold {
            base * BOLD_ADVANCE_FACTOR
        } else {
            base
        };
        weighted * style.scale
    }

    fn styled_line_height(&self, style: SpanStyle) -> f32 {
        self.line_height * style.scale
    }
}

fn is_wide(ch: char) -> bool {
    matches!(
        ch as u32,
        0x1100..=0x115F
            | 0x2E80..=0xA4CF
            | 0xAC00..=0xD7A3
            | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F
            | 0xFF00..=0xFF60
            | 0xFFE0..=0xFFE6
            | 0x1F300..=0x1F64F
            | 0x1F900..=0x1F9FF
            | 0x20000..=0x3FFFD
    )
}

/// Positioned run of same-styled text on one line.
#[derive(Clone, Debug, PartialEq)]
pub struct LineRun {
    pub text: String,
    pub style: SpanStyle,
    /// Offset from the line start.
    pub x: f32,
    pub width: f32,
}

/// One laid-out line.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutLine {
    pub runs: SmallVec<[LineRun; 4]>,
    pub width: f32,
    pub height: f32,
    /// Distance from the line top to the baseline.
    pub ascent: f32,
}

impl LayoutLine {
    /// `true` when the line holds only whitespace.
    pub fn is_blank(&self) -> bool {
        self.runs.iter().all(|run| run.text.trim().is_empty())
    }

    /// Line text without styling.
    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }
}

/// Markup laid out into a fixed-width box.
#[derive(Clone, Debug, PartialEq)]
pub struct TextLayout {
    pub lines: Vec<LayoutLine>,
}

impl TextLayout {
    /// Total number of lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Leading lines whose cumulative height fits within `height`; a
    /// non-empty layout always shows at least one line.
    pub fn lines_within(&self, height: f32) -> usize {
        let mut used = 0.0f32;
        let mut count = 0usize;
        for line in &self.lines {
            used += line.height;
            if used > height + FIT_EPSILON {
                break;
            }
            count += 1;
        }
        if self.lines.is_empty() {
            0
        } else {
            count.max(1)
        }
    }

    /// Sum of all line heights.
    pub fn total_height(&self) -> f32 {
        self.lines.iter().map(|line| line.height).sum()
    }
}

#[derive(Clone, Debug)]
struct Cell {
    grapheme: String,
    style: SpanStyle,
    advance: f32,
}

#[derive(Default)]
struct LineBuilder {
    cells: Vec<Cell>,
    width: f32,
    /// Index just past the last whitespace cell.
    break_after: Option<usize>,
}

impl LineBuilder {
    fn push(&mut self, cell: Cell) {
        let whitespace = cell.grapheme.chars().all(char::is_whitespace);
        self.width += cell.advance;
        self.cells.push(cell);
        if whitespace {
            self.break_after = Some(self.cells.len());
        }
    }

    fn take_all(&mut self) -> Vec<Cell> {
        self.width = 0.0;
        self.break_after = None;
        std::mem::take(&mut self.cells)
    }

    /// Split at the last break opportunity, keeping the tail.
    fn split_at_break(&mut self) -> Option<Vec<Cell>> {
        let at = self.break_after.filter(|at| *at > 0 && *at < self.cells.len())?;
        let tail = self.cells.split_off(at);
        let head = std::mem::replace(&mut self.cells, tail);
        self.width = self.cells.iter().map(|c| c.advance).sum();
        self.break_after = None;
        Some(head)
    }
}

/// Reference [`LayoutMeasurer`] backed by [`TextMetrics`].
#[derive(Clone, Debug, Default)]
pub struct MetricsMeasurer {
    metrics: TextMetrics,
}

impl MetricsMeasurer {
    /// Measurer using `metrics` as the base style.
    pub fn new(metrics: TextMetrics) -> Self {
        Self { metrics }
    }

    /// Base metrics.
    pub fn metrics(&self) -> TextMetrics {
        self.metrics
    }

    /// Lay out `markup` into lines no wider than `width` where possible.
    ///
    /// `\n` always breaks; a trailing newline yields a trailing empty line.
    /// Empty markup is a single empty line.
    pub fn layout(&self, markup: &str, width: i32) -> Result<TextLayout, MeasureError> {
        let spans = parse_markup(markup)?;
        let max_width = width.max(1) as f32;
        let mut lines = Vec::new();
        let mut line = LineBuilder::default();

        for span in &spans {
            for grapheme in span.text.graphemes(true) {
                if grapheme == "\n" || grapheme == "\r\n" {
                    lines.push(self.finish_line(line.take_all(), span.style));
                    continue;
                }
                let cell = Cell {
                    grapheme: grapheme.to_string(),
                    style: span.style,
                    advance: self.metrics.grapheme_advance(grapheme, span.style),
                };
                let whitespace = grapheme.chars().all(char::is_whitespace);
                // Trailing whitespace may hang past the box edge.
                while !whitespace
                    && !line.cells.is_empty()
                    && line.width + cell.advance > max_width + FIT_EPSILON
                {
                    match line.split_at_break() {
                        Some(head) => lines.push(self.finish_line(head, span.style)),
                        None => lines.push(self.finish_line(line.take_all(), span.style)),
                    }
                }
                line.push(cell);
            }
        }
        lines.push(self.finish_line(line.take_all(), SpanStyle::default()));

        Ok(TextLayout { lines })
    }

    fn finish_line(&self, cells: Vec<Cell>, fallback: SpanStyle) -> LayoutLine {
        let height = cells
            .iter()
            .map(|cell| self.metrics.styled_line_height(cell.style))
            .fold(None, |acc: Option<f32>, h| Some(acc.map_or(h, |a| a.max(h))))
            .unwrap_or_else(|| self.metrics.styled_line_height(fallback));

        let mut runs: SmallVec<[LineRun; 4]> = SmallVec::new();
        let mut x = 0.0f32;
        for cell in cells {
            match runs.last_mut() {
                Some(run) if run.style == cell.style => {
                    run.text.push_str(&cell.grapheme);
                    run.width += cell.advance;
                }
                _ => runs.push(LineRun {
                    text: cell.grapheme,
                    style: cell.style,
                    x,
                    width: cell.advance,
                }),
            }
            x += cell.advance;
        }

        LayoutLine {
            runs,
            width: x,
            height,
            ascent: height * ASCENT_RATIO,
        }
    }
}

impl LayoutMeasurer for MetricsMeasurer {
    fn measure(
        &mut self,
        markup: &str,
        width: i32,
        height: LayoutHeight,
    ) -> Result<usize, MeasureError> {
        let layout = self.layout(markup, width)?;
        let lines = match height {
            LayoutHeight::Unbounded => layout.line_count(),
            LayoutHeight::Bounded(h) => layout.lines_within(h as f32),
        };
        log::trace!(
            "reference layout: {} bytes -> {} lines ({:?})",
            markup.len(),
            lines,
            height
        );
        Ok(lines)
    }

    fn fingerprint(&self) -> String {
        format!(
            "metrics-measurer:{}:{}",
            self.metrics.advance, self.metrics.line_height
        )
    }
}

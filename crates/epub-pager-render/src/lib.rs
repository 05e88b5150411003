//! Reference layout measurer and page renderer for `epub-pager`.

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

mod markup_spans;
mod render;
mod text_layout;

pub use markup_spans::{parse_markup, SpanStyle, StyledSpan};
pub use render::{
    render_page, PageRenderer, PageTransform, RenderError, RenderedPage, Rotation, RunCommand,
    TextLine,
};
pub use text_layout::{LayoutLine, LineRun, MetricsMeasurer, TextLayout, TextMetrics};

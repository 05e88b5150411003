//! Layout measurement contract consumed by the paginator.

use core::fmt;

/// Height constraint for one measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayoutHeight {
    /// Lay out every line.
    Unbounded,
    /// Keep only the lines that fit within this height.
    Bounded(i32),
}

/// Text-layout oracle reporting how many visual lines markup occupies.
///
/// Implementations must be deterministic and must satisfy, for any markup
/// and width, `measure(m, w, Unbounded) >= measure(m, w, Bounded(h))`. The
/// paginator relies on that ordering to detect overflow; the render path
/// relies on determinism because it re-measures stored pages.
///
/// Measurers are stateful and non-reentrant, hence `&mut self`: one
/// measurer serves one pagination call at a time.
pub trait LayoutMeasurer {
    /// Count visual lines of `markup` laid out at `width`.
    fn measure(
        &mut self,
        markup: &str,
        width: i32,
        height: LayoutHeight,
    ) -> Result<usize, MeasureError>;

    /// Stable identity of everything that affects measurement.
    ///
    /// Feeds the pagination profile id, so cached pages are only reused
    /// with an equivalent measurer. Default is empty.
    fn fingerprint(&self) -> String {
        String::new()
    }
}

impl<M: LayoutMeasurer + ?Sized> LayoutMeasurer for &mut M {
    fn measure(
        &mut self,
        markup: &str,
        width: i32,
        height: LayoutHeight,
    ) -> Result<usize, MeasureError> {
        (**self).measure(markup, width, height)
    }

    fn fingerprint(&self) -> String {
        (**self).fingerprint()
    }
}

impl<M: LayoutMeasurer + ?Sized> LayoutMeasurer for Box<M> {
    fn measure(
        &mut self,
        markup: &str,
        width: i32,
        height: LayoutHeight,
    ) -> Result<usize, MeasureError> {
        (**self).measure(markup, width, height)
    }

    fn fingerprint(&self) -> String {
        (**self).fingerprint()
    }
}

/// Measurer failure, e.g. markup that cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeasureError {
    message: String,
    offset: Option<usize>,
}

impl MeasureError {
    /// Failure with a message and no position.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            offset: None,
        }
    }

    /// Attach the byte offset in the markup where the failure was detected.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Human-readable cause.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Byte offset into the measured markup, when known.
    pub fn offset(&self) -> Option<usize> {
        self.offset
    }
}

impl fmt::Display for MeasureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(offset) = self.offset {
            write!(f, " [offset={}]", offset)?;
        }
        Ok(())
    }
}

impl std::error::Error for MeasureError {}

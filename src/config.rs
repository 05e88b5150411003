//! Page geometry configuration.

use serde::{Deserialize, Serialize};

use crate::error::PagerError;

/// Fixed page geometry used for a whole document.
///
/// All values are logical units. Content dimensions subtract the margin on
/// both sides.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page width.
    pub page_width: i32,
    /// Page height.
    pub page_height: i32,
    /// Inset applied to every side before layout.
    pub margin: i32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_width: 660,
            page_height: 900,
            margin: 40,
        }
    }
}

impl PaginationConfig {
    /// Page of the given size with the default margin.
    pub fn for_page(width: i32, height: i32) -> Self {
        Self {
            page_width: width,
            page_height: height,
            ..Self::default()
        }
    }

    /// Replace the margin applied to every side.
    pub fn with_margin(mut self, margin: i32) -> Self {
        self.margin = margin;
        self
    }

    /// Width available to text; at least 1.
    pub fn content_width(self) -> i32 {
        inset(self.page_width, self.margin).unwrap_or(0).max(1)
    }

    /// Height available to text on one page; at least 1.
    pub fn content_height(self) -> i32 {
        inset(self.page_height, self.margin).unwrap_or(0).max(1)
    }

    /// Reject geometry that leaves no room for content.
    pub fn validate(self) -> Result<Self, PagerError> {
        if self.page_width <= 0 || self.page_height <= 0 {
            return Err(PagerError::Config(format!(
                "page size must be positive (width={} height={})",
                self.page_width, self.page_height
            )));
        }
        if self.margin < 0 {
            return Err(PagerError::Config(format!(
                "margin must not be negative (margin={})",
                self.margin
            )));
        }
        let width = inset(self.page_width, self.margin);
        let height = inset(self.page_height, self.margin);
        if !matches!((width, height), (Some(w), Some(h)) if w > 0 && h > 0) {
            return Err(PagerError::Config(format!(
                "margin {} leaves no content area on a {}x{} page",
                self.margin, self.page_width, self.page_height
            )));
        }
        Ok(self)
    }

    /// Parse and validate a JSON config document. Missing fields keep defaults.
    pub fn from_json_str(json: &str) -> Result<Self, PagerError> {
        let cfg: Self = serde_json::from_str(json)?;
        cfg.validate()
    }
}

/// `extent - 2 * margin`, or `None` on `i32` overflow.
fn inset(extent: i32, margin: i32) -> Option<i32> {
    margin.checked_mul(2).and_then(|both| extent.checked_sub(both))
}

/// Engine options, analogous to a display profile.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PagerOptions {
    /// Page geometry.
    pub pagination: PaginationConfig,
}

impl PagerOptions {
    /// Options for a page of the given size.
    pub fn for_page(width: i32, height: i32) -> Self {
        Self {
            pagination: PaginationConfig::for_page(width, height),
        }
    }
}

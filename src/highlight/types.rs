//! Core types for locating and marking text on rendered pages

use serde::{Deserialize, Serialize};

use super::request::RequestId;

/// Axis-aligned rectangle in pixel coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge X coordinate
    pub x: f32,
    /// Top edge Y coordinate
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub fn left(&self) -> f32 {
        self.x
    }

    #[must_use]
    pub fn top(&self) -> f32 {
        self.y
    }

    /// Right edge, never left of `x` even for a negative width
    #[must_use]
    pub fn right(&self) -> f32 {
        self.x + self.width.max(0.0)
    }

    /// Bottom edge, never above `y` even for a negative height
    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.y + self.height.max(0.0)
    }

    /// Smallest rectangle covering both `self` and `other`
    #[must_use]
    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.left().min(other.left());
        let top = self.top().min(other.top());
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(left, top, right - left, bottom - top)
    }

    /// Move the rectangle by (-dx, -dy), i.e. express it relative to (dx, dy)
    #[must_use]
    pub fn relative_to(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.x - dx, self.y - dy, self.width, self.height)
    }

    /// Multiply position and extent by `factor`
    #[must_use]
    pub fn scaled(&self, factor: f32) -> Rect {
        Rect::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }

    /// Check whether `other` lies entirely inside this rectangle
    #[must_use]
    pub fn contains(&self, other: &Rect) -> bool {
        other.left() >= self.left()
            && other.top() >= self.top()
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }
}

/// A positioned run of text as reported by the rendering backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextFragment {
    pub content: String,
    #[serde(rename = "box")]
    pub bounds: Rect,
}

impl TextFragment {
    pub fn new(content: impl Into<String>, bounds: Rect) -> Self {
        Self {
            content: content.into(),
            bounds,
        }
    }
}

/// All text fragments of one rendered page, in reading order
#[derive(Clone, Debug, PartialEq)]
pub struct PageFragmentSet {
    /// Page number (1-indexed)
    pub page: usize,
    /// Page container rectangle, in the same space as the fragment boxes
    pub origin: Rect,
    /// Render scale the fragments were produced at
    pub scale: f32,
    pub fragments: Vec<TextFragment>,
}

impl PageFragmentSet {
    #[must_use]
    pub fn new(page: usize, origin: Rect, scale: f32, fragments: Vec<TextFragment>) -> Self {
        Self {
            page,
            origin,
            scale,
            fragments,
        }
    }

    /// A rendered page whose text layer has not been populated yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.len()
    }
}

/// The marker rectangle for a located match, relative to its page origin
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct OverlayRegion {
    /// Request that produced this region
    pub request: RequestId,
    /// Page number (1-indexed)
    pub page: usize,
    pub rect: Rect,
}

/// View parameters that affect where fragments are positioned on screen
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    /// Current zoom factor
    pub scale: f32,
    /// Page currently scrolled into view (1-indexed)
    pub visible_page: usize,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            scale: Self::DEFAULT_SCALE,
            visible_page: 1,
        }
    }
}

impl ViewState {
    pub const DEFAULT_SCALE: f32 = 1.2;
    pub const MIN_SCALE: f32 = 0.5;
    pub const MAX_SCALE: f32 = 3.0;

    #[must_use]
    pub fn new(scale: f32, visible_page: usize) -> Self {
        Self {
            scale: Self::clamp_scale(scale),
            visible_page: visible_page.max(1),
        }
    }

    #[must_use]
    pub fn with_scale(self, scale: f32) -> Self {
        Self::new(scale, self.visible_page)
    }

    #[must_use]
    pub fn with_visible_page(self, page: usize) -> Self {
        Self::new(self.scale, page)
    }

    /// Clamp scale to the supported range, handling NaN/Inf
    pub fn clamp_scale(scale: f32) -> f32 {
        if !scale.is_finite() {
            Self::DEFAULT_SCALE
        } else {
            scale.clamp(Self::MIN_SCALE, Self::MAX_SCALE)
        }
    }
}

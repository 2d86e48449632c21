//! Overlay marker ownership
//!
//! All visual mutation goes through [`OverlayManager`], which owns a single
//! slot. Showing a region first removes whatever was shown before, on any
//! page, so a superseded request never leaves a stale marker behind.

use serde::{Deserialize, Serialize};

use super::types::OverlayRegion;

/// RGBA color with alpha in `0.0..=1.0`
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

/// How the host should paint the marker
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OverlayStyle {
    #[serde(default = "default_fill")]
    pub fill: Rgba,

    #[serde(default = "default_corner_radius")]
    pub corner_radius: f32,

    /// Stacking order: above the text layer, below UI chrome
    #[serde(default = "default_z_index")]
    pub z_index: i32,

    /// Pointer input falls through to the content underneath
    #[serde(default = "default_true")]
    pub pass_through: bool,
}

fn default_fill() -> Rgba {
    Rgba {
        r: 255,
        g: 255,
        b: 0,
        a: 0.35,
    }
}

fn default_corner_radius() -> f32 {
    2.0
}

fn default_z_index() -> i32 {
    50
}

fn default_true() -> bool {
    true
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            fill: default_fill(),
            corner_radius: default_corner_radius(),
            z_index: default_z_index(),
            pass_through: true,
        }
    }
}

/// Rendering surface that can paint and remove overlay markers
pub trait OverlaySurface {
    fn draw(&mut self, region: &OverlayRegion, style: &OverlayStyle);

    fn erase(&mut self, region: &OverlayRegion);
}

impl<S: OverlaySurface + ?Sized> OverlaySurface for Box<S> {
    fn draw(&mut self, region: &OverlayRegion, style: &OverlayStyle) {
        (**self).draw(region, style);
    }

    fn erase(&mut self, region: &OverlayRegion) {
        (**self).erase(region);
    }
}

/// Sole owner of the visible overlay
pub struct OverlayManager<S: OverlaySurface> {
    surface: S,
    style: OverlayStyle,
    current: Option<OverlayRegion>,
}

impl<S: OverlaySurface> OverlayManager<S> {
    #[must_use]
    pub fn new(surface: S, style: OverlayStyle) -> Self {
        Self {
            surface,
            style,
            current: None,
        }
    }

    /// Replace whatever is shown with `region`
    pub fn show(&mut self, region: OverlayRegion) {
        self.clear();
        self.surface.draw(&region, &self.style);
        self.current = Some(region);
    }

    /// Remove the shown overlay, if any
    pub fn clear(&mut self) {
        if let Some(region) = self.current.take() {
            self.surface.erase(&region);
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<&OverlayRegion> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    #[must_use]
    pub fn surface(&self) -> &S {
        &self.surface
    }
}

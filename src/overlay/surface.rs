//! Render surface bounds query
//!
//! The engine never draws. It asks the surface for the current viewport
//! before each spawn and falls back to a fixed box when none is reported.

use serde::{Deserialize, Serialize};

use crate::overlay::constants::surface::*;

/// Viewport size reported by the render surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Bounding box a projectile moves within
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub max_width: f64,
    pub max_height: f64,
}

impl Bounds {
    /// Bounds for a viewport. Missing or zero dimensions fall back
    /// independently to the default 100x100 box; the floor sits one
    /// sprite above the bottom edge.
    pub fn from_viewport(viewport: Option<Viewport>) -> Self {
        let usable = |v: f64| v.is_finite() && v > 0.0;

        let height = viewport
            .map(|v| v.height)
            .filter(|h| usable(*h))
            .unwrap_or(DEFAULT_HEIGHT);
        let width = viewport
            .map(|v| v.width)
            .filter(|w| usable(*w))
            .unwrap_or(DEFAULT_WIDTH);

        Self {
            max_width: width,
            max_height: height - SPRITE_SIZE,
        }
    }
}

/// Anything that can report the current viewport
pub trait RenderSurface: Send {
    fn viewport(&self) -> Option<Viewport>;
}

/// Surface with a fixed size, used by the headless binary
#[derive(Debug, Clone, Copy)]
pub struct FixedSurface {
    viewport: Viewport,
}

impl FixedSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            viewport: Viewport::new(width, height),
        }
    }
}

impl RenderSurface for FixedSurface {
    fn viewport(&self) -> Option<Viewport> {
        Some(self.viewport)
    }
}

/// Surface that has not been laid out yet
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedSurface;

impl RenderSurface for DetachedSurface {
    fn viewport(&self) -> Option<Viewport> {
        None
    }
}

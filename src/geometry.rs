//! World/screen coordinate transforms and node handle geometry.
//!
//! World space is the coordinate system nodes and edges live in. Screen space
//! is the canvas-local pixel space after pan and zoom have been applied:
//!
//! ```text
//! screen = world * zoom + pan
//! world  = (screen - pan) / zoom
//! ```

use serde::{Deserialize, Serialize};

/// Width of every node card, in world units.
pub const NODE_WIDTH: f32 = 224.0;
/// Height of every node card, in world units.
pub const NODE_HEIGHT: f32 = 128.0;

pub const MIN_ZOOM: f32 = 0.6;
pub const MAX_ZOOM: f32 = 1.6;
/// Increment used by the zoom buttons and by each wheel notch.
pub const ZOOM_STEP: f32 = 0.1;
pub const DEFAULT_ZOOM: f32 = 0.8;
pub const DEFAULT_PAN: Point = Point { x: 80.0, y: 60.0 };

/// A 2D point or vector.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn minus(self, other: Point) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }

    pub fn plus(self, other: Point) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }

    pub fn distance_to(self, other: Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f32, f32)> for Point {
    fn from((x, y): (f32, f32)) -> Self {
        Self::new(x, y)
    }
}

/// Which connector on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Left-centre connector, terminates edges.
    Input,
    /// Right-centre connector, originates edges.
    Output,
}

/// Clamp a zoom factor into `[MIN_ZOOM, MAX_ZOOM]`.
///
/// NaN collapses to `MIN_ZOOM` so a corrupt value can never escape the range.
pub fn clamp_zoom(zoom: f32) -> f32 {
    if zoom.is_nan() {
        return MIN_ZOOM;
    }
    MAX_ZOOM.min(MIN_ZOOM.max(zoom))
}

/// Apply one zoom step of `delta`, rounded to two decimals and clamped.
///
/// Rounding keeps repeated steps on the 0.1 grid instead of drifting
/// (0.8 + 0.1 + 0.1 must land on 1.0, not 0.99999994).
pub fn step_zoom(zoom: f32, delta: f32) -> f32 {
    let next = ((zoom + delta) * 100.0).round() / 100.0;
    clamp_zoom(next)
}

pub fn world_to_screen(point: Point, pan: Point, zoom: f32) -> Point {
    Point::new(point.x * zoom + pan.x, point.y * zoom + pan.y)
}

pub fn screen_to_world(point: Point, pan: Point, zoom: f32) -> Point {
    let z = if zoom > 0.0 { zoom } else { 1.0 };
    Point::new((point.x - pan.x) / z, (point.y - pan.y) / z)
}

/// World-space position of a node's connector, given the node's top-left corner.
pub fn handle_position(origin: Point, handle: HandleKind) -> Point {
    let x = match handle {
        HandleKind::Input => origin.x,
        HandleKind::Output => origin.x + NODE_WIDTH,
    };
    Point::new(x, origin.y + NODE_HEIGHT / 2.0)
}

/// Whether a world point lies inside the node card whose top-left is `origin`.
pub fn node_contains(origin: Point, point: Point) -> bool {
    point.x >= origin.x
        && point.x <= origin.x + NODE_WIDTH
        && point.y >= origin.y
        && point.y <= origin.y + NODE_HEIGHT
}

/// Pan and zoom of the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub pan: Point,
    pub zoom: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            pan: DEFAULT_PAN,
            zoom: DEFAULT_ZOOM,
        }
    }
}

impl Viewport {
    /// Build a viewport, clamping the zoom.
    pub fn new(pan: Point, zoom: f32) -> Self {
        Self {
            pan,
            zoom: clamp_zoom(zoom),
        }
    }

    pub fn world_to_screen(&self, point: Point) -> Point {
        world_to_screen(point, self.pan, self.zoom)
    }

    pub fn screen_to_world(&self, point: Point) -> Point {
        screen_to_world(point, self.pan, self.zoom)
    }

    /// Zoom one wheel notch around `anchor` (screen space).
    ///
    /// A positive `wheel_delta` (scrolling down) zooms out. The world point under
    /// the anchor stays under the anchor. Returns `None` when the clamped zoom
    /// does not change.
    pub fn zoom_at(&self, anchor: Point, wheel_delta: f32) -> Option<Viewport> {
        let step = if wheel_delta > 0.0 { -ZOOM_STEP } else { ZOOM_STEP };
        let next_zoom = step_zoom(self.zoom, step);
        if next_zoom == self.zoom {
            return None;
        }
        let world = self.screen_to_world(anchor);
        Some(Viewport {
            pan: Point::new(anchor.x - world.x * next_zoom, anchor.y - world.y * next_zoom),
            zoom: next_zoom,
        })
    }
}

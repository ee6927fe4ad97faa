//! Edge curve geometry: the cubic bezier every edge is drawn and picked with.
//!
//! Edges leave the source's output handle and enter the target's input handle
//! horizontally. Control points are pushed out by `max(120, |dx| / 2)` so that
//! backwards edges still form a readable S-curve.

use crate::geometry::Point;

/// Minimum horizontal control point offset, in world units.
pub const BEZIER_MIN_OFFSET: f32 = 120.0;

/// Length of the arrowhead drawn at the target end, in screen pixels.
pub const ARROW_LENGTH: f32 = 14.0;

/// Half-angle of the arrowhead.
const ARROW_SPREAD: f32 = std::f32::consts::PI / 7.0;

/// Cubic bezier curve for drawing and distance calculations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicBezier {
    pub p0: Point, // Start point
    pub p1: Point, // Control point 1
    pub p2: Point, // Control point 2
    pub p3: Point, // End point
}

impl CubicBezier {
    /// Build the edge curve between an output handle and an input handle.
    pub fn for_edge(start: Point, end: Point) -> Self {
        let offset = BEZIER_MIN_OFFSET.max((end.x - start.x).abs() * 0.5);
        CubicBezier {
            p0: start,
            p1: start.offset(offset, 0.0),
            p2: end.offset(-offset, 0.0),
            p3: end,
        }
    }

    /// Map every control point through `f`.
    ///
    /// Beziers are affine invariant, so mapping through the world→screen
    /// transform yields exactly the on-screen curve.
    pub fn map(&self, f: impl Fn(Point) -> Point) -> Self {
        CubicBezier {
            p0: f(self.p0),
            p1: f(self.p1),
            p2: f(self.p2),
            p3: f(self.p3),
        }
    }

    /// Evaluate the bezier curve at parameter t (0.0 to 1.0)
    pub fn eval(&self, t: f32) -> Point {
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        let x = mt3 * self.p0.x
            + 3.0 * mt2 * t * self.p1.x
            + 3.0 * mt * t2 * self.p2.x
            + t3 * self.p3.x;
        let y = mt3 * self.p0.y
            + 3.0 * mt2 * t * self.p1.y
            + 3.0 * mt * t2 * self.p2.y
            + t3 * self.p3.y;

        Point::new(x, y)
    }

    /// Polyline approximation with `steps` segments (`steps + 1` points).
    pub fn flatten(&self, steps: usize) -> Vec<Point> {
        let steps = steps.max(1);
        (0..=steps)
            .map(|i| self.eval(i as f32 / steps as f32))
            .collect()
    }

    /// Arrowhead triangle at the end of the curve: tip, left wing, right wing.
    ///
    /// The direction follows the tangent from the second control point to the
    /// end point.
    pub fn arrowhead(&self, length: f32) -> [Point; 3] {
        let angle = (self.p3.y - self.p2.y).atan2(self.p3.x - self.p2.x);
        let wing = |a: f32| Point::new(self.p3.x - length * a.cos(), self.p3.y - length * a.sin());
        [self.p3, wing(angle - ARROW_SPREAD), wing(angle + ARROW_SPREAD)]
    }
}

/// Generate SVG path command for a bezier curve
///
/// # Returns
/// SVG path command string (e.g., "M 10 20 C 60 20 90 80 140 80")
pub fn generate_bezier_path(curve: &CubicBezier) -> String {
    format!(
        "M {} {} C {} {} {} {} {} {}",
        curve.p0.x,
        curve.p0.y,
        curve.p1.x,
        curve.p1.y,
        curve.p2.x,
        curve.p2.y,
        curve.p3.x,
        curve.p3.y
    )
}

/// Generate SVG path command for a straight segment.
pub fn generate_line_path(start: Point, end: Point) -> String {
    format!("M {} {} L {} {}", start.x, start.y, end.x, end.y)
}

/// Generate a closed SVG path for a filled polygon.
pub fn generate_polygon_path(points: &[Point]) -> String {
    let mut commands = String::new();
    for (i, p) in points.iter().enumerate() {
        let op = if i == 0 { "M" } else { " L" };
        commands.push_str(&format!("{} {} {}", op, p.x, p.y));
    }
    if !points.is_empty() {
        commands.push_str(" Z");
    }
    commands
}

/// Distance from a point to a line segment.
pub fn distance_to_segment(point: Point, a: Point, b: Point) -> f32 {
    let ab = b.minus(a);
    let ap = point.minus(a);

    let ab_len_sq = ab.x * ab.x + ab.y * ab.y;

    if ab_len_sq < f32::EPSILON {
        // Degenerate segment (a == b)
        return (ap.x * ap.x + ap.y * ap.y).sqrt();
    }

    // Project point onto line, clamped to segment
    let t = ((ap.x * ab.x + ap.y * ab.y) / ab_len_sq).clamp(0.0, 1.0);

    let closest = Point::new(a.x + t * ab.x, a.y + t * ab.y);
    point.distance_to(closest)
}

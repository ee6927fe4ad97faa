use crate::geometry::Viewport;

/// Background grid spacing at zoom 1, in world units.
pub const GRID_SPACING: f32 = 28.0;

/// Below this on-screen spacing the grid is skipped.
const MIN_VISIBLE_SPACING: f32 = 4.0;

/// Generate SVG path commands for the background grid.
///
/// Lines are `spacing * zoom` pixels apart and shifted by the pan (modulo the
/// spacing), so the grid scrolls with the canvas and appears infinite.
///
/// # Arguments
/// * `width` - Canvas width in pixels
/// * `height` - Canvas height in pixels
/// * `viewport` - Current pan and zoom
/// * `spacing` - Grid spacing before zoom
///
/// # Returns
/// SVG path commands string (e.g., "M 28 0 L 28 600 M 56 0 L 56 600...")
pub fn generate_grid_commands(
    width: f32,
    height: f32,
    viewport: &Viewport,
    spacing: f32,
) -> String {
    let effective_spacing = spacing * viewport.zoom;

    if effective_spacing < MIN_VISIBLE_SPACING {
        return String::new();
    }

    let offset_x = viewport.pan.x.rem_euclid(effective_spacing);
    let offset_y = viewport.pan.y.rem_euclid(effective_spacing);

    let mut commands = String::new();

    let mut x = offset_x;
    while x < width + effective_spacing {
        if !commands.is_empty() {
            commands.push(' ');
        }
        commands.push_str(&format!("M {} 0 L {} {}", x, x, height));
        x += effective_spacing;
    }

    let mut y = offset_y;
    while y < height + effective_spacing {
        commands.push(' ');
        commands.push_str(&format!("M 0 {} L {} {}", y, width, y));
        y += effective_spacing;
    }

    commands
}

//! Field-of-view: Bresenham line-of-sight over the terrain grid.
//!
//! Visibility is recomputed from scratch each turn: everything the player
//! could see fades to remembered, then every tile inside a square window
//! around the viewer is re-tested with a straight-line trace. The outdoor
//! day/night overrides layer on top of this in the session.

use crate::game::{MapGrid, Position, Visibility, VisibilityGrid};

/// Traces a straight line from `from` to `to` and reports whether it arrives
/// without crossing opaque terrain.
///
/// The viewer's own tile never blocks, and the target tile is reachable even
/// when it is itself opaque, so wall faces light up when looked at.
pub fn line_of_sight(grid: &MapGrid, from: Position, to: Position) -> bool {
    let dx = (to.x - from.x).abs();
    let dy = (to.y - from.y).abs();
    let sx = if from.x < to.x { 1 } else { -1 };
    let sy = if from.y < to.y { 1 } else { -1 };
    let mut err = dx - dy;
    let mut current = from;

    loop {
        if current == to {
            return true;
        }
        if current != from && grid.tile(current).is_some_and(|tile| tile.blocks_sight()) {
            return false;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            current.x += sx;
        }
        if e2 < dx {
            err += dx;
            current.y += sy;
        }
    }
}

/// One fog-of-war refresh: fade what was visible to remembered, then mark
/// every line-of-sight tile within `radius` (a square window, clipped to the
/// grid) visible again.
pub fn update_visibility(
    visibility: &mut VisibilityGrid,
    grid: &MapGrid,
    viewer: Position,
    radius: i32,
) {
    visibility.downgrade_visible();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let target = Position::new(viewer.x + dx, viewer.y + dy);
            if grid.in_bounds(target) && line_of_sight(grid, viewer, target) {
                visibility.set(target, Visibility::Visible);
            }
        }
    }
}

//! World coordinates, tile conversion and map bounds.
//!
//! World positions are `glam::IVec3` with `x`/`y` on the ground plane and
//! `z` as height. One map tile spans [`TILE_UNITS`] world units.

use glam::{IVec2, IVec3};
use serde::{Deserialize, Serialize};

/// World units per map tile.
pub const TILE_UNITS: i32 = 128;

/// Converts a world coordinate to the tile containing it.
#[must_use]
pub const fn map_coord(world: i32) -> i32 {
    world.div_euclid(TILE_UNITS)
}

/// Converts a tile coordinate to the world coordinate of its corner.
#[must_use]
pub const fn world_coord(tile: i32) -> i32 {
    tile * TILE_UNITS
}

/// Squared distance on the ground plane.
#[must_use]
pub fn planar_dist_sq(a: IVec3, b: IVec3) -> i64 {
    let dx = i64::from(a.x - b.x);
    let dy = i64::from(a.y - b.y);
    dx * dx + dy * dy
}

/// Squared distance in three dimensions.
#[must_use]
pub fn dist_sq(a: IVec3, b: IVec3) -> i64 {
    let dz = i64::from(a.z - b.z);
    planar_dist_sq(a, b) + dz * dz
}

/// Playable map extent in tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapBounds {
    /// Width in tiles
    pub width: u32,
    /// Height in tiles
    pub height: u32,
}

impl MapBounds {
    /// Creates map bounds from a tile extent.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width in world units.
    #[must_use]
    pub const fn world_width(self) -> i32 {
        self.width as i32 * TILE_UNITS
    }

    /// Height in world units.
    #[must_use]
    pub const fn world_height(self) -> i32 {
        self.height as i32 * TILE_UNITS
    }

    /// Checks a world-space ground position lies on the map.
    #[must_use]
    pub const fn contains(self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.world_width() && y < self.world_height()
    }

    /// Checks a world position (ignoring height) lies on the map.
    #[must_use]
    pub const fn contains_pos(self, pos: IVec3) -> bool {
        self.contains(pos.x, pos.y)
    }

    /// Clamps a ground position into the playable area.
    #[must_use]
    pub fn clamp(self, pos: IVec2) -> IVec2 {
        IVec2::new(
            pos.x.clamp(0, (self.world_width() - 1).max(0)),
            pos.y.clamp(0, (self.world_height() - 1).max(0)),
        )
    }
}

impl Default for MapBounds {
    fn default() -> Self {
        Self::new(64, 64)
    }
}

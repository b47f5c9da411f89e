//! Tile grid and world container.
//!
//! The world is a densely packed row-major `Vec<Tile>`; all derived layers
//! index it as `y * width + x`. Neighbor enumeration order is fixed
//! N, E, S, W (then the diagonals) everywhere in the engine — changing it
//! changes tie-breaking and therefore world hashes.

use bitcode::{Decode, Encode};
use serde::{Deserialize, Serialize};

use crate::config::{COMMERCIAL_CAPACITY, INDUSTRIAL_CAPACITY, RESIDENTIAL_CAPACITY, clamp_level};
use crate::stats::Stats;

/// Cardinal neighbor offsets in canonical N, E, S, W order.
pub const NEIGHBORS4: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

/// All eight neighbor offsets: N, E, S, W, then NE, SE, SW, NW.
pub const NEIGHBORS8: [(i32, i32); 8] = [
    (0, -1),
    (1, 0),
    (0, 1),
    (-1, 0),
    (1, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
];

// Road adjacency bits stored in the low nibble of `Tile::variation`.
pub const ROAD_MASK_N: u8 = 1 << 0;
pub const ROAD_MASK_E: u8 = 1 << 1;
pub const ROAD_MASK_S: u8 = 1 << 2;
pub const ROAD_MASK_W: u8 = 1 << 3;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Encode, Decode,
)]
pub enum Terrain {
    Water,
    Sand,
    #[default]
    Grass,
}

impl Terrain {
    pub fn name(self) -> &'static str {
        match self {
            Terrain::Water => "water",
            Terrain::Sand => "sand",
            Terrain::Grass => "grass",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Encode, Decode,
)]
pub enum Overlay {
    #[default]
    None,
    Road,
    Residential,
    Commercial,
    Industrial,
    Park,
    School,
    Hospital,
    PoliceStation,
    FireStation,
}

impl Overlay {
    pub fn is_zone(self) -> bool {
        matches!(
            self,
            Overlay::Residential | Overlay::Commercial | Overlay::Industrial
        )
    }

    pub fn is_civic(self) -> bool {
        matches!(
            self,
            Overlay::School | Overlay::Hospital | Overlay::PoliceStation | Overlay::FireStation
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Overlay::None => "none",
            Overlay::Road => "road",
            Overlay::Residential => "residential",
            Overlay::Commercial => "commercial",
            Overlay::Industrial => "industrial",
            Overlay::Park => "park",
            Overlay::School => "school",
            Overlay::Hospital => "hospital",
            Overlay::PoliceStation => "police_station",
            Overlay::FireStation => "fire_station",
        }
    }

    /// Parse the name produced by [`Overlay::name`]. Used by the script
    /// runner and save tooling.
    pub fn parse(s: &str) -> Option<Overlay> {
        Some(match s {
            "none" => Overlay::None,
            "road" => Overlay::Road,
            "residential" => Overlay::Residential,
            "commercial" => Overlay::Commercial,
            "industrial" => Overlay::Industrial,
            "park" => Overlay::Park,
            "school" => Overlay::School,
            "hospital" => Overlay::Hospital,
            "police_station" => Overlay::PoliceStation,
            "fire_station" => Overlay::FireStation,
            _ => return None,
        })
    }
}

/// A single grid cell. Kept small and `Copy`; the whole world is a dense
/// array of these.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Tile {
    pub terrain: Terrain,
    pub overlay: Overlay,
    /// Zone density / facility capacity level, 1..=3.
    pub level: u8,
    /// Stable district partition tag, 0..DISTRICT_COUNT.
    pub district: u8,
    /// Terrain elevation in [0, 1].
    pub height: f32,
    /// Low nibble: road adjacency mask (N/E/S/W). High nibble: stable
    /// per-tile randomness stamped at generation time.
    pub variation: u8,
    /// Population / employment / stock currently on this tile.
    pub occupants: u8,
}

impl Default for Tile {
    fn default() -> Self {
        Self {
            terrain: Terrain::Grass,
            overlay: Overlay::None,
            level: 1,
            district: 0,
            height: 0.0,
            variation: 0,
            occupants: 0,
        }
    }
}

impl Tile {
    #[inline]
    pub fn road_mask(&self) -> u8 {
        self.variation & 0x0F
    }
}

/// Occupant capacity of a tile given its overlay and level. Non-zone tiles
/// have no capacity.
pub fn capacity_for_tile(tile: &Tile) -> i32 {
    let li = clamp_level(tile.level);
    match tile.overlay {
        Overlay::Residential => RESIDENTIAL_CAPACITY[li],
        Overlay::Commercial => COMMERCIAL_CAPACITY[li],
        Overlay::Industrial => INDUSTRIAL_CAPACITY[li],
        _ => 0,
    }
}

/// A tile coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// The owned world: dimensions, seed, tile array, and the current stats
/// snapshot. Mutated only by the simulator tick, the autonomous builder,
/// and explicit edit commands.
#[derive(Debug, Clone, PartialEq)]
pub struct World {
    width: i32,
    height: i32,
    seed: u64,
    tiles: Vec<Tile>,
    stats: Stats,
}

impl World {
    pub fn new(width: i32, height: i32, seed: u64) -> Self {
        let n = (width.max(0) as usize) * (height.max(0) as usize);
        Self {
            width: width.max(0),
            height: height.max(0),
            seed,
            tiles: vec![Tile::default(); n],
            stats: Stats::default(),
        }
    }

    /// Rebuild a world from raw parts (used by the save reader and the
    /// world transform). The tile vector length must equal `width * height`.
    pub fn from_parts(width: i32, height: i32, seed: u64, tiles: Vec<Tile>, stats: Stats) -> Self {
        debug_assert_eq!(tiles.len(), (width.max(0) as usize) * (height.max(0) as usize));
        Self {
            width: width.max(0),
            height: height.max(0),
            seed,
            tiles,
            stats,
        }
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    #[inline]
    pub fn idx(&self, x: i32, y: i32) -> usize {
        (y as usize) * (self.width as usize) + (x as usize)
    }

    #[inline]
    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }

    #[inline]
    pub fn at(&self, x: i32, y: i32) -> &Tile {
        &self.tiles[self.idx(x, y)]
    }

    #[inline]
    pub fn at_mut(&mut self, x: i32, y: i32) -> &mut Tile {
        let i = self.idx(x, y);
        &mut self.tiles[i]
    }

    #[inline]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    #[inline]
    pub fn tile_at_index(&self, idx: usize) -> &Tile {
        &self.tiles[idx]
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut Stats {
        &mut self.stats
    }

    /// Buildable: dry land without a road. (Roads can still be *extended*
    /// over buildable land; they just are not buildable targets themselves.)
    pub fn is_buildable(&self, x: i32, y: i32) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let t = self.at(x, y);
        t.terrain != Terrain::Water && t.overlay != Overlay::Road
    }

    /// Dry land with no overlay at all.
    pub fn is_empty_land(&self, x: i32, y: i32) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let t = self.at(x, y);
        t.terrain != Terrain::Water && t.overlay == Overlay::None
    }

    /// Place an overlay, resetting level and occupants. Placing or removing
    /// a road through this path keeps the adjacency masks consistent.
    pub fn set_overlay(&mut self, overlay: Overlay, x: i32, y: i32) {
        if !self.in_bounds(x, y) {
            return;
        }
        let was_road = self.at(x, y).overlay == Overlay::Road;
        {
            let t = self.at_mut(x, y);
            t.overlay = overlay;
            t.level = 1;
            t.occupants = 0;
        }
        if was_road || overlay == Overlay::Road {
            self.update_road_masks_around(x, y);
        }
    }

    /// Place (or re-class) a road tile. Roads may overlay water (bridges).
    pub fn set_road(&mut self, x: i32, y: i32) {
        self.set_road_level(x, y, 1);
    }

    pub fn set_road_level(&mut self, x: i32, y: i32, level: u8) {
        if !self.in_bounds(x, y) {
            return;
        }
        {
            let t = self.at_mut(x, y);
            t.overlay = Overlay::Road;
            t.level = level.clamp(1, 3);
            t.occupants = 0;
        }
        self.update_road_masks_around(x, y);
    }

    /// Road adjacency mask for a tile as implied by the current grid.
    pub fn computed_road_mask(&self, x: i32, y: i32) -> u8 {
        let mut mask = 0u8;
        for (i, (dx, dy)) in NEIGHBORS4.iter().enumerate() {
            let (nx, ny) = (x + dx, y + dy);
            if self.in_bounds(nx, ny) && self.at(nx, ny).overlay == Overlay::Road {
                mask |= 1 << i;
            }
        }
        mask
    }

    /// Refresh the stored mask for one tile. Non-road tiles get a zero mask.
    fn refresh_road_mask(&mut self, x: i32, y: i32) {
        if !self.in_bounds(x, y) {
            return;
        }
        let mask = if self.at(x, y).overlay == Overlay::Road {
            self.computed_road_mask(x, y)
        } else {
            0
        };
        let t = self.at_mut(x, y);
        t.variation = (t.variation & 0xF0) | mask;
    }

    /// Fix the five tiles whose masks a single-tile road edit can affect.
    pub fn update_road_masks_around(&mut self, x: i32, y: i32) {
        self.refresh_road_mask(x, y);
        for (dx, dy) in NEIGHBORS4 {
            self.refresh_road_mask(x + dx, y + dy);
        }
    }

    /// Rescan every tile and refresh the low mask nibble. Required after
    /// bulk edits and world transforms (masks are direction-dependent).
    pub fn recompute_road_masks(&mut self) {
        for y in 0..self.height {
            for x in 0..self.width {
                self.refresh_road_mask(x, y);
            }
        }
    }
}

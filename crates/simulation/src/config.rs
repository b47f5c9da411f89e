//! Engine-wide constant tables.
//!
//! These are plain `const` tables, never globals with state. Everything
//! tunable per run lives in the config structs that flow down the call tree.

/// Number of district partitions a world is divided into.
pub const DISTRICT_COUNT: usize = 8;

/// Money a freshly generated world starts with.
pub const DEFAULT_START_MONEY: i64 = 150;

/// Occupant capacity per zone level (index = level - 1).
pub const RESIDENTIAL_CAPACITY: [i32; 3] = [16, 40, 96];
pub const COMMERCIAL_CAPACITY: [i32; 3] = [12, 30, 72];
pub const INDUSTRIAL_CAPACITY: [i32; 3] = [14, 34, 80];

/// Travel time per road tile in milli-steps (index = road level - 1).
/// A reference street step costs 1000.
pub const ROAD_TRAVEL_TIME_MILLI: [i32; 3] = [1000, 700, 400];

/// Bridge (road on water) travel times. Strictly dearer than the dry
/// counterpart of the same class.
pub const BRIDGE_TRAVEL_TIME_MILLI: [i32; 3] = [1250, 850, 500];

/// Per-class capacity multiplier applied to the base road-tile capacity.
pub const ROAD_CAPACITY_MULT: [i32; 3] = [1, 2, 4];

#[inline]
pub fn clamp_level(level: u8) -> usize {
    (level.clamp(1, 3) - 1) as usize
}

pub fn road_travel_time_milli(level: u8) -> i32 {
    ROAD_TRAVEL_TIME_MILLI[clamp_level(level)]
}

pub fn bridge_travel_time_milli(level: u8) -> i32 {
    BRIDGE_TRAVEL_TIME_MILLI[clamp_level(level)]
}

pub fn road_capacity(base: i32, level: u8) -> i32 {
    base.max(1) * ROAD_CAPACITY_MULT[clamp_level(level)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_travel_times_monotone_in_class() {
        assert!(ROAD_TRAVEL_TIME_MILLI[0] > ROAD_TRAVEL_TIME_MILLI[1]);
        assert!(ROAD_TRAVEL_TIME_MILLI[1] > ROAD_TRAVEL_TIME_MILLI[2]);
    }

    #[test]
    fn test_bridges_strictly_dearer() {
        for i in 0..3 {
            assert!(BRIDGE_TRAVEL_TIME_MILLI[i] > ROAD_TRAVEL_TIME_MILLI[i]);
        }
    }

    #[test]
    fn test_capacities_monotone_in_level() {
        for caps in [
            RESIDENTIAL_CAPACITY,
            COMMERCIAL_CAPACITY,
            INDUSTRIAL_CAPACITY,
        ] {
            assert!(caps[0] < caps[1] && caps[1] < caps[2]);
        }
    }

    #[test]
    fn test_level_clamped() {
        assert_eq!(road_travel_time_milli(0), ROAD_TRAVEL_TIME_MILLI[0]);
        assert_eq!(road_travel_time_milli(9), ROAD_TRAVEL_TIME_MILLI[2]);
        assert_eq!(road_capacity(28, 3), 28 * 4);
    }
}

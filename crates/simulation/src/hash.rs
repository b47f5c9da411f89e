//! Structural world hashing.
//!
//! `hash_world` folds the integer content of every tile (and optionally the
//! integer stats fields) into a single u64 with the splitmix finalizer.
//! Float fields are deliberately excluded: the hash must be stable across
//! compilers, and terrain classification already captures the only
//! float-derived decision that matters structurally.

use crate::grid::World;
use crate::rng::mix64;
use crate::stats::Stats;

#[inline]
fn fold(h: u64, v: u64) -> u64 {
    mix64(h ^ v)
}

fn fold_stats(mut h: u64, s: &Stats) -> u64 {
    h = fold(h, s.day as u64);
    h = fold(h, s.population as u64);
    h = fold(h, s.money as u64);
    h = fold(h, s.housing_capacity as u64);
    h = fold(h, s.jobs_capacity as u64);
    h = fold(h, s.jobs_capacity_accessible as u64);
    h = fold(h, s.employed as u64);
    h = fold(h, s.roads as u64);
    h = fold(h, s.parks as u64);
    h = fold(h, s.commuters as u64);
    h = fold(h, s.commuters_unreachable as u64);
    h = fold(h, s.congested_road_tiles as u64);
    h = fold(h, s.max_road_traffic as u64);
    h = fold(h, s.goods_demand as u64);
    h = fold(h, s.goods_delivered as u64);
    h = fold(h, s.goods_produced as u64);
    h = fold(h, s.goods_imported as u64);
    h = fold(h, s.goods_exported as u64);
    h = fold(h, s.goods_unreachable_demand as u64);
    h = fold(h, s.max_road_goods_traffic as u64);
    h = fold(h, s.services_maintenance_cost as u64);
    h = fold(h, u64::from(s.economy_event_kind));
    h = fold(h, s.economy_event_days_left as u64);
    h = fold(h, s.income as u64);
    h = fold(h, s.expenses as u64);
    h = fold(h, s.tax_revenue as u64);
    h = fold(h, s.maintenance_cost as u64);
    h = fold(h, s.upgrade_cost as u64);
    h = fold(h, s.import_cost as u64);
    h = fold(h, s.export_revenue as u64);
    h = fold(h, s.fire_incident_damaged as u64);
    h = fold(h, s.fire_incident_destroyed as u64);
    h = fold(h, s.fire_incident_displaced as u64);
    h = fold(h, s.fire_incident_cost as u64);
    h = fold(h, s.traffic_incident_injuries as u64);
    h = fold(h, s.traffic_incident_cost as u64);
    h
}

/// Fold a world into a stable u64. Identical worlds hash identically on
/// every platform at a given save version.
pub fn hash_world(world: &World, include_stats: bool) -> u64 {
    let mut h = 0xC17F_5EED_0000_0001u64;
    h = fold(h, world.width() as u64);
    h = fold(h, world.height() as u64);
    h = fold(h, world.seed());

    for t in world.tiles() {
        let packed = u64::from(t.terrain as u8)
            | (u64::from(t.overlay as u8) << 8)
            | (u64::from(t.level) << 16)
            | (u64::from(t.district) << 24)
            | (u64::from(t.variation) << 32)
            | (u64::from(t.occupants) << 40);
        h = fold(h, packed);
    }

    if include_stats {
        h = fold_stats(h, world.stats());
    }

    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Overlay;

    #[test]
    fn test_identical_worlds_hash_identically() {
        let a = World::new(9, 7, 42);
        let b = World::new(9, 7, 42);
        assert_eq!(hash_world(&a, true), hash_world(&b, true));
    }

    #[test]
    fn test_tile_edit_changes_hash() {
        let a = World::new(9, 7, 42);
        let mut b = a.clone();
        b.set_overlay(Overlay::Park, 4, 4);
        assert_ne!(hash_world(&a, false), hash_world(&b, false));
    }

    #[test]
    fn test_stats_only_visible_when_included() {
        let a = World::new(5, 5, 1);
        let mut b = a.clone();
        b.stats_mut().money += 10;
        assert_eq!(hash_world(&a, false), hash_world(&b, false));
        assert_ne!(hash_world(&a, true), hash_world(&b, true));
    }

    #[test]
    fn test_dimension_and_seed_mix_in() {
        assert_ne!(
            hash_world(&World::new(5, 4, 1), false),
            hash_world(&World::new(4, 5, 1), false)
        );
        assert_ne!(
            hash_world(&World::new(5, 5, 1), false),
            hash_world(&World::new(5, 5, 2), false)
        );
    }
}

//! Payload encoding: world content, stats, and config blobs.
//!
//! The payload is a `bitcode`-encoded [`SaveBody`]; tiles are stored in
//! canonical row-major order. Optional lz4 compression happens at the
//! framing layer above, never here.

use bitcode::{Decode, Encode};

use simulation::grid::{Tile, World};
use simulation::procgen::ProcGenConfig;
use simulation::sim::SimConfig;
use simulation::stats::Stats;

use crate::save_error::SaveError;

/// Logical save schema (format version 1).
#[derive(Encode, Decode)]
pub struct SaveBody {
    pub tiles: Vec<Tile>,
    pub stats: Stats,
    pub proc_cfg: ProcGenConfig,
    pub sim_cfg: SimConfig,
}

pub fn encode_body(world: &World, proc_cfg: &ProcGenConfig, sim_cfg: &SimConfig) -> Vec<u8> {
    let body = SaveBody {
        tiles: world.tiles().to_vec(),
        stats: *world.stats(),
        proc_cfg: *proc_cfg,
        sim_cfg: sim_cfg.clone(),
    };
    bitcode::encode(&body)
}

pub fn decode_body(
    bytes: &[u8],
    width: i32,
    height: i32,
    seed: u64,
) -> Result<(World, ProcGenConfig, SimConfig), SaveError> {
    let body: SaveBody = bitcode::decode(bytes)
        .map_err(|e| SaveError::Corrupted(format!("payload decode failed: {e}")))?;

    let expected = (width.max(0) as usize) * (height.max(0) as usize);
    if body.tiles.len() != expected {
        return Err(SaveError::Corrupted(format!(
            "tile count {} does not match header dimensions {width}x{height}",
            body.tiles.len()
        )));
    }

    let mut world = World::from_parts(width, height, seed, body.tiles, body.stats);
    // Stored masks are trusted input; recompute so a hand-edited save can
    // never leave the grid inconsistent.
    world.recompute_road_masks();
    Ok((world, body.proc_cfg, body.sim_cfg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use simulation::grid::Overlay;

    #[test]
    fn test_encode_decode_roundtrip() {
        let mut world = World::new(6, 4, 77);
        world.set_road(2, 2);
        world.set_overlay(Overlay::Residential, 2, 1);
        world.at_mut(2, 1).occupants = 9;
        world.stats_mut().day = 5;

        let bytes = encode_body(&world, &ProcGenConfig::default(), &SimConfig::default());
        let (decoded, _, _) = decode_body(&bytes, 6, 4, 77).unwrap();
        assert_eq!(decoded.at(2, 1).occupants, 9);
        assert_eq!(decoded.at(2, 2).overlay, Overlay::Road);
        assert_eq!(decoded.stats().day, 5);
        assert_eq!(
            simulation::hash::hash_world(&decoded, true),
            simulation::hash::hash_world(&world, true)
        );
    }

    #[test]
    fn test_dimension_mismatch_detected() {
        let world = World::new(4, 4, 1);
        let bytes = encode_body(&world, &ProcGenConfig::default(), &SimConfig::default());
        let err = decode_body(&bytes, 8, 8, 1).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_garbage_payload_rejected() {
        let err = decode_body(b"definitely not bitcode", 4, 4, 1).unwrap_err();
        assert!(matches!(err, SaveError::Corrupted(_)));
    }
}

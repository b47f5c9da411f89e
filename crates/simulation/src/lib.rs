//! Deterministic, headless procedural city simulation engine.
//!
//! Given `(seed, config, script)` the engine generates a tile world,
//! advances a discrete-time simulation (zoning growth, road networks,
//! commute and goods flows, services accessibility, environmental hazards,
//! incidents, budget) and exposes the derived analytical layers as pure
//! functions of the world. Everything on the simulation path is
//! single-threaded and deterministic: no wall clock, no hash-map iteration
//! order, no float-environment dependence in the structural world hash.

pub mod air_pollution;
pub mod autobuild;
pub mod budget;
pub mod config;
pub mod crime;
pub mod districts;
pub mod economy;
pub mod fire_risk;
pub mod goods;
pub mod grid;
pub mod happiness;
pub mod hash;
pub mod heat_island;
pub mod incidents;
pub mod isochrone;
pub mod jobs;
pub mod land_value;
pub mod livability;
pub mod noise_pollution;
pub mod park_optimizer;
pub mod pathfind;
pub mod procgen;
pub mod rng;
pub mod roads;
pub mod script;
pub mod service_optimizer;
pub mod services;
pub mod sim;
pub mod stats;
pub mod traffic;
pub mod traffic_safety;
pub mod value_noise;
pub mod walkability;
pub mod world_transform;
pub mod zone_access;

#[cfg(test)]
mod integration_tests;

pub use grid::{Overlay, Point, Terrain, Tile, World};
pub use hash::hash_world;
pub use procgen::{ProcGenConfig, generate_world};
pub use rng::SimRng;
pub use sim::{SimConfig, Simulator};
pub use stats::Stats;

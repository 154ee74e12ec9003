//! The relief terrain plugin for Bevy Engine.
//!
//! Streams elevation and imagery for a square grid of map tiles around a point and keeps the resulting meshes in sync
//! between a hosting device and any number of clients. The engine itself lives in [`map`].

mod config;

pub use config::Config;

pub use relief_map as map;
pub use relief_map::plugin::*;

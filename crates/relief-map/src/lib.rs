//! The relief terrain engine.
//!
//! # Tiles
//!
//! A map is a square grid of slippy-map [`Tile`]s around one center tile, all at the same zoom level. Each tile owns a square
//! grid mesh whose vertices are lifted by elevation samples taken at the matching geographic points, so the sample grid and
//! the mesh share one row-major vertex order.
//!
//! # Load Cycles
//!
//! [`MapAssembler::show`] lays out the grid and hands back the fetches that the caller must run (texture and elevation per
//! re-targeted tile). Completions are fed back one at a time. Once every elevation fetch of the cycle has resolved, the
//! lowest vertex of the whole grid becomes the zero of the vertical axis. That baseline is applied once per assembler.
//!
//! # Sessions
//!
//! A host runs the elevation pipeline and broadcasts every tile it rebuilds as a [`TileUpdate`]. Clients never fetch
//! elevation; they overwrite their tiles with whatever the host sends. See [`Session`].

mod assembler;
mod config;
mod elevation;
mod error;
mod geocoding;
mod imagery;
mod mesh;
mod sync;
mod tile;
mod transport;

#[cfg(feature = "bevy_plugin")]
pub mod plugin;

pub use assembler::*;
pub use config::*;
pub use elevation::*;
pub use error::MapError;
pub use geocoding::Geocoder;
pub use imagery::*;
pub use mesh::TileMesh;
pub use sync::*;
pub use tile::*;
pub use transport::*;

pub use relief_core as core;
pub use relief_core::{GeoPoint, TileCoordinate};

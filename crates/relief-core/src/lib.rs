//! Math shared by every relief crate: slippy-map geodesy and the small amount of geometry needed to pick terrain.

pub mod geodesy;
pub mod geometry;

mod error;

pub use error::GeodesyError;
pub use geodesy::{grid_edge_length, GeoPoint, TileCoordinate};

use ahash::{AHashMap, AHashSet};
pub type SmallKeyHashMap<K, V> = AHashMap<K, V>;
pub type SmallKeyHashSet<K> = AHashSet<K>;

// Re-exports.
pub use approx;
pub use glam;

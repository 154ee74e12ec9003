//! Slippy-map tile projection.
//!
//! At zoom `z` the world is cut into `2^z x 2^z` tiles. Tile `x` grows eastward from the antimeridian and tile `y` grows
//! southward from the northern limit of the web-mercator projection. See
//! <https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames>.

use crate::GeodesyError;

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Edge length of one imagery tile, in pixels.
pub const TILE_PIXEL_SIZE: f32 = 256.0;

/// Meters per pixel at each zoom level, see <https://wiki.openstreetmap.org/wiki/Zoom_levels>.
const ZOOM_SCALES: [f32; 20] = [
    156412.0, 78206.0, 39103.0, 19551.0, 9776.0, 4888.0, 2444.0, 1222.0, 610.984, 305.492, 152.746,
    76.373, 38.187, 19.093, 9.547, 4.773, 2.387, 1.193, 0.596, 0.298,
];

/// The largest zoom level with a known vertical scale.
pub const MAX_ZOOM: u8 = (ZOOM_SCALES.len() - 1) as u8;

// Tile corners computed by the inverse projection land within rounding error of a tile boundary, on either side of it.
const BOUNDARY_EPSILON: f64 = 1e-9;

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// One tile of the slippy-map grid.
///
/// Equality and hashing only consider `(x, y, zoom)`; `tile_size_meters` is carried along for the local mesh but is not part
/// of the tile's identity.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct TileCoordinate {
    pub x: i32,
    pub y: i32,
    pub zoom: u8,
    pub tile_size_meters: f32,
}

impl PartialEq for TileCoordinate {
    fn eq(&self, other: &Self) -> bool {
        self.x == other.x && self.y == other.y && self.zoom == other.zoom
    }
}

impl Eq for TileCoordinate {}

impl Hash for TileCoordinate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.x.hash(state);
        self.y.hash(state);
        self.zoom.hash(state);
    }
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "X={},Y={},zoom={}", self.x, self.y, self.zoom)
    }
}

impl TileCoordinate {
    pub const fn new(x: i32, y: i32, zoom: u8, tile_size_meters: f32) -> Self {
        Self {
            x,
            y,
            zoom,
            tile_size_meters,
        }
    }

    /// The tile containing `point` at `zoom`.
    ///
    /// Points outside of `[-90, 90] x [-180, 180]` (or beyond the mercator limit of ~85.05°) produce coordinates outside of
    /// `[0, 2^zoom)`; validating the input is up to the caller.
    pub fn from_geo(point: GeoPoint, zoom: u8, tile_size_meters: f32) -> Self {
        let n = tiles_per_axis(zoom);
        let lat_rad = point.latitude.to_radians();
        let x = (point.longitude + 180.0) / 360.0 * n;
        let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;

        Self::new(snap_floor(x), snap_floor(y), zoom, tile_size_meters)
    }

    /// The tile `(dx, dy)` tiles away at the same zoom.
    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.zoom, self.tile_size_meters)
    }

    pub fn north_west(&self) -> GeoPoint {
        north_west_corner(self.x, self.y, self.zoom)
    }

    pub fn north_east(&self) -> GeoPoint {
        north_west_corner(self.x + 1, self.y, self.zoom)
    }

    pub fn south_west(&self) -> GeoPoint {
        north_west_corner(self.x, self.y + 1, self.zoom)
    }

    /// Divisor that converts an elevation in meters into local mesh units at this tile's zoom.
    pub fn scale_factor(&self) -> Result<f32, GeodesyError> {
        ZOOM_SCALES
            .get(self.zoom as usize)
            .map(|meters_per_pixel| meters_per_pixel * TILE_PIXEL_SIZE)
            .ok_or(GeodesyError::InvalidZoomLevel(self.zoom))
    }

    /// The points at which elevation is sampled for a tile mesh of `vertex_count` vertices.
    ///
    /// The grid is row-major, starting at the south-west corner: index `i` lies in row `i / n` (northward) and column `i % n`
    /// (eastward), where `n * n == vertex_count`. The last point is the north-east corner.
    pub fn sample_grid(&self, vertex_count: usize) -> Result<Vec<GeoPoint>, GeodesyError> {
        let n = grid_edge_length(vertex_count)?;
        let south_west = self.south_west();
        let north_east = self.north_east();
        let steps = (n - 1) as f64;
        let lat_step = (north_east.latitude - south_west.latitude).abs() / steps;
        let lon_step = (north_east.longitude - south_west.longitude).abs() / steps;

        Ok((0..vertex_count)
            .map(|i| {
                GeoPoint::new(
                    south_west.latitude + lat_step * (i / n) as f64,
                    south_west.longitude + lon_step * (i % n) as f64,
                )
            })
            .collect())
    }
}

/// The number of vertices along one edge of a square grid of `vertex_count` vertices.
pub fn grid_edge_length(vertex_count: usize) -> Result<usize, GeodesyError> {
    let n = (vertex_count as f64).sqrt().round() as usize;
    if n < 2 || n * n != vertex_count {
        return Err(GeodesyError::InvalidVertexCount(vertex_count));
    }
    Ok(n)
}

fn tiles_per_axis(zoom: u8) -> f64 {
    2f64.powi(zoom as i32)
}

fn snap_floor(tile_units: f64) -> i32 {
    (tile_units + BOUNDARY_EPSILON).floor() as i32
}

fn north_west_corner(x: i32, y: i32, zoom: u8) -> GeoPoint {
    let n = tiles_per_axis(zoom);
    let longitude = x as f64 / n * 360.0 - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * y as f64 / n)).sinh().atan();

    GeoPoint::new(lat_rad.to_degrees(), longitude)
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

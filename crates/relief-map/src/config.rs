use crate::core::{grid_edge_length, GeoPoint, GeodesyError, TileCoordinate};

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct MapConfig {
    /// Slippy-map zoom level shared by every tile of the grid.
    pub zoom: u8,
    /// Edge length of one tile mesh in local units.
    pub tile_size_meters: f32,
    /// The map is `grid_size_tiles x grid_size_tiles` tiles.
    pub grid_size_tiles: u32,
    /// Vertices along one edge of a tile mesh. Each tile has `mesh_resolution^2` vertices.
    pub mesh_resolution: usize,
    /// Where the map is centered when no other point is requested.
    pub default_center: GeoPoint,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            zoom: 12,
            tile_size_meters: 0.5,
            grid_size_tiles: 12,
            mesh_resolution: 11,
            default_center: GeoPoint::new(45.832675, 6.865166),
        }
    }
}

impl MapConfig {
    pub fn vertices_per_tile(&self) -> usize {
        self.mesh_resolution * self.mesh_resolution
    }

    /// Fails on a zoom level without a known vertical scale or a mesh that isn't at least 2x2.
    pub fn validate(&self) -> Result<(), GeodesyError> {
        TileCoordinate::new(0, 0, self.zoom, self.tile_size_meters).scale_factor()?;
        grid_edge_length(self.vertices_per_tile())?;
        Ok(())
    }

    /// Local grid indices `(x, y)` in slot order. Indices run over `[-(g / 2), g - g / 2)` on both axes, `x` major.
    pub fn grid_positions(&self) -> impl Iterator<Item = (i32, i32)> {
        let size = self.grid_size_tiles as i32;
        let lo = -(size / 2);

        (lo..lo + size).flat_map(move |x| (lo..lo + size).map(move |y| (x, y)))
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum HttpMethod {
    Put,
    Post,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ElevationServiceConfig {
    pub url: String,
    /// The open-elevation API accepts both; some deployments only route one.
    pub method: HttpMethod,
}

impl Default for ElevationServiceConfig {
    fn default() -> Self {
        Self {
            url: "https://api.open-elevation.com/api/v1/lookup".into(),
            method: HttpMethod::Put,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ImageryConfig {
    /// Tile URL with `{zoom}`, `{x}` and `{y}` placeholders. The API key is appended verbatim.
    pub url_template: String,
    pub api_key: String,
}

impl Default for ImageryConfig {
    fn default() -> Self {
        Self {
            url_template: "https://api.maptiler.com/tiles/satellite/{zoom}/{x}/{y}.jpg?key=".into(),
            api_key: String::new(),
        }
    }
}

impl ImageryConfig {
    pub fn tile_url(&self, coordinate: &TileCoordinate) -> String {
        let mut url = self
            .url_template
            .replace("{zoom}", &coordinate.zoom.to_string())
            .replace("{x}", &coordinate.x.to_string())
            .replace("{y}", &coordinate.y.to_string());
        url.push_str(&self.api_key);
        url
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GeocodingConfig {
    /// Location query endpoint; the query string is appended as the last path segment.
    pub url: String,
    pub api_key: String,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            url: "https://dev.virtualearth.net/REST/v1/Locations".into(),
            api_key: String::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ServicesConfig {
    pub elevation: ElevationServiceConfig,
    pub imagery: ImageryConfig,
    pub geocoding: GeocodingConfig,
    /// Applies to every HTTP request.
    pub request_timeout_secs: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            elevation: ElevationServiceConfig::default(),
            imagery: ImageryConfig::default(),
            geocoding: GeocodingConfig::default(),
            request_timeout_secs: 20,
        }
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

use crate::core::glam::Vec3A;
use crate::{
    ElevationSample, ImageryConfig, MapError, NetworkRole, SyncMessage, TileCoordinate, TileMesh, TileTexture, TileUpdate,
};
use crate::core::GeoPoint;

use std::sync::Arc;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadState {
    /// No coordinate assigned yet.
    Empty,
    /// Waiting on both the texture and the elevation fetch.
    Loading,
    TextureRequested,
    ElevationRequested,
    Ready,
}

/// Fetch elevation samples for one tile.
#[derive(Clone, Debug)]
pub struct ElevationJob {
    pub slot: usize,
    pub coordinate: TileCoordinate,
    pub points: Vec<GeoPoint>,
}

/// Fetch and decode the imagery for one tile.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TextureJob {
    pub slot: usize,
    pub url: String,
}

/// Asynchronous work requested by the map. The caller runs it and reports back through the [`MapAssembler`](crate::MapAssembler).
#[derive(Clone, Debug)]
pub enum FetchJob {
    Elevation(ElevationJob),
    Texture(TextureJob),
}

/// One square patch of terrain in a grid slot of the map.
#[derive(Debug)]
pub struct Tile {
    slot: usize,
    grid_position: (i32, i32),
    identifier: String,
    coordinate: Option<TileCoordinate>,
    mesh: TileMesh,
    texture_url: Option<String>,
    texture: Option<Arc<TileTexture>>,
    texture_pending: bool,
    elevation_pending: bool,
    local_min_elevation: Option<f32>,
}

impl Tile {
    pub fn new(slot: usize, grid_position: (i32, i32), mesh: TileMesh) -> Self {
        Self {
            slot,
            grid_position,
            identifier: tile_identifier(grid_position),
            coordinate: None,
            mesh,
            texture_url: None,
            texture: None,
            texture_pending: false,
            elevation_pending: false,
            local_min_elevation: None,
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn grid_position(&self) -> (i32, i32) {
        self.grid_position
    }

    /// Names the tile by its grid position, e.g. `"(-1,0)"`. Hosts and clients with the same grid size agree on it.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn coordinate(&self) -> Option<TileCoordinate> {
        self.coordinate
    }

    pub fn mesh(&self) -> &TileMesh {
        &self.mesh
    }

    pub fn texture_url(&self) -> Option<&str> {
        self.texture_url.as_deref()
    }

    pub fn texture(&self) -> Option<&Arc<TileTexture>> {
        self.texture.as_ref()
    }

    /// The lowest vertex height reported by the last elevation fetch, before any baseline was subtracted.
    pub fn local_min_elevation(&self) -> Option<f32> {
        self.local_min_elevation
    }

    /// Offset of the tile's mesh from the map root.
    pub fn local_offset(&self, tile_size: f32) -> Vec3A {
        Vec3A::new(
            tile_size * self.grid_position.0 as f32,
            0.0,
            tile_size * self.grid_position.1 as f32,
        )
    }

    pub fn state(&self) -> LoadState {
        match (self.coordinate, self.texture_pending, self.elevation_pending) {
            (None, _, _) => LoadState::Empty,
            (Some(_), true, true) => LoadState::Loading,
            (Some(_), true, false) => LoadState::TextureRequested,
            (Some(_), false, true) => LoadState::ElevationRequested,
            (Some(_), false, false) => LoadState::Ready,
        }
    }

    /// Re-targets the tile to `coordinate`. Returns the fetches needed to load it, or nothing if the tile already shows
    /// `coordinate`.
    ///
    /// Without `request_elevation` only the texture is fetched; the geometry is expected from the network.
    pub fn assign_coordinate(
        &mut self,
        coordinate: TileCoordinate,
        imagery: &ImageryConfig,
        request_elevation: bool,
    ) -> Result<Vec<FetchJob>, MapError> {
        if self.coordinate == Some(coordinate) {
            return Ok(Vec::new());
        }

        let mut jobs = Vec::with_capacity(2);
        if request_elevation {
            let points = coordinate.sample_grid(self.mesh.vertex_count())?;
            jobs.push(FetchJob::Elevation(ElevationJob {
                slot: self.slot,
                coordinate,
                points,
            }));
        }
        self.coordinate = Some(coordinate);
        self.elevation_pending = request_elevation;
        self.local_min_elevation = None;
        if let Some(job) = self.set_texture_url(imagery.tile_url(&coordinate)) {
            jobs.push(FetchJob::Texture(job));
        }

        Ok(jobs)
    }

    /// Lifts every vertex to its sample's elevation in local units, shifted by `offset`. Returns the tile's new minimum
    /// height.
    ///
    /// On error the vertices are left untouched.
    pub fn apply_elevations(
        &mut self,
        samples: &[ElevationSample],
        offset: f32,
        role: &NetworkRole,
    ) -> Result<f32, MapError> {
        let coordinate = self
            .coordinate
            .ok_or_else(|| MapError::UnassignedTile(self.identifier.clone()))?;
        let scale = coordinate.scale_factor()?;
        self.mesh
            .set_heights(samples.iter().map(|s| s.elevation_meters as f32 / scale + offset))?;
        self.elevation_pending = false;
        self.rebuild(role);

        let min = self.mesh.min_height();
        self.local_min_elevation = Some(min);
        Ok(min)
    }

    /// Overwrites the vertices with geometry computed by the host.
    pub fn apply_network_vertices(&mut self, vertices: Vec<[f32; 3]>, role: &NetworkRole) -> Result<(), MapError> {
        self.mesh.set_positions(vertices)?;
        self.elevation_pending = false;
        self.rebuild(role);
        Ok(())
    }

    pub fn translate_vertical(&mut self, dy: f32, role: &NetworkRole) {
        self.mesh.translate_vertical(dy);
        self.rebuild(role);
    }

    /// Points the tile at new imagery. Returns the fetch for it unless the tile already uses `url`.
    pub fn set_texture_url(&mut self, url: String) -> Option<TextureJob> {
        if self.texture_url.as_deref() == Some(url.as_str()) {
            return None;
        }
        self.texture_url = Some(url.clone());
        self.texture = None;
        self.texture_pending = true;

        Some(TextureJob {
            slot: self.slot,
            url,
        })
    }

    /// Returns false if the tile has moved on to different imagery since the fetch for `url` started.
    pub fn complete_texture(&mut self, url: &str, texture: Arc<TileTexture>) -> bool {
        if self.texture_url.as_deref() != Some(url) {
            return false;
        }
        self.texture = Some(texture);
        self.texture_pending = false;
        true
    }

    pub fn to_update(&self) -> TileUpdate {
        TileUpdate {
            identifier: self.identifier.clone(),
            vertices: self.mesh.positions().to_vec(),
            texture: self.texture_url.clone().unwrap_or_default(),
        }
    }

    /// Refreshes derived geometry after a vertex change. Hosts also publish the tile.
    fn rebuild(&mut self, role: &NetworkRole) {
        self.mesh.rebuild();
        if let NetworkRole::Host(sink) = role {
            sink.send(SyncMessage::TileUpdate(self.to_update()));
        }
    }
}

pub fn tile_identifier((x, y): (i32, i32)) -> String {
    format!("({},{})", x, y)
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

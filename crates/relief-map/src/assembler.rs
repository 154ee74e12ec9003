use crate::core::geometry::Ray;
use crate::core::glam::{Quat, Vec3, Vec3A};
use crate::core::{SmallKeyHashMap, SmallKeyHashSet};
use crate::{
    tile_identifier, ElevationSample, FetchJob, GeoPoint, ImageryConfig, MapConfig, MapError, NetworkRole, SyncMessage,
    TextureJob, Tile, TileCoordinate, TileMesh, TileTexture, TileUpdate,
};

use float_ord::FloatOrd;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// The root transform of the map. It never carries a translation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MapTransform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for MapTransform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl MapTransform {
    /// Takes a world-space ray into map-local space. Hit times are preserved.
    pub fn local_ray(&self, ray: &Ray) -> Ray {
        let inverse = self.rotation.inverse();
        let scale = Vec3A::from(self.scale);
        let start = inverse.mul_vec3a(ray.start - Vec3A::from(self.position)) / scale;
        let velocity = inverse.mul_vec3a(ray.velocity()) / scale;

        Ray::new(start, velocity)
    }
}

/// Where the elevation fetches of the current load cycle stand.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoadProgress {
    Pending { remaining: usize },
    /// The cycle drained and every tile was lowered by `baseline`.
    Normalized { baseline: f32 },
    /// The cycle drained without normalizing, either because the baseline was already applied or because no tile got
    /// elevations.
    Drained,
}

/// The elevation fetches issued by one `show`, keyed by slot and the coordinate the slot had when the fetch started.
#[derive(Debug, Default)]
struct LoadCycle {
    pending: SmallKeyHashSet<(usize, TileCoordinate)>,
    minimum: Option<f32>,
}

impl LoadCycle {
    fn report_minimum(&mut self, min: f32) {
        self.minimum = Some(self.minimum.map_or(min, |m| m.min(min)));
    }

    fn progress(&self) -> LoadProgress {
        LoadProgress::Pending {
            remaining: self.pending.len(),
        }
    }
}

/// A point where a ray met the terrain, in map-local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TerrainHit {
    pub slot: usize,
    pub time: f32,
    pub point: Vec3A,
}

/// Lays out the tile grid, tracks its load cycles, and owns the map's root transform.
///
/// Fetches are not run here. [`MapAssembler::show`] returns them, and the caller reports each result back through
/// [`MapAssembler::complete_elevation`] or [`MapAssembler::complete_texture`].
#[derive(Debug)]
pub struct MapAssembler {
    config: MapConfig,
    imagery: ImageryConfig,
    role: NetworkRole,
    center_tile: Option<TileCoordinate>,
    tiles: Vec<Tile>,
    slots_by_identifier: SmallKeyHashMap<String, usize>,
    transform: MapTransform,
    cycle: LoadCycle,
    baseline: Option<f32>,
}

impl MapAssembler {
    /// Fails if `config` names a zoom level without a vertical scale or a degenerate mesh resolution.
    pub fn new(config: MapConfig, imagery: ImageryConfig, role: NetworkRole) -> Result<Self, MapError> {
        config.validate()?;

        Ok(Self {
            config,
            imagery,
            role,
            center_tile: None,
            tiles: Vec::new(),
            slots_by_identifier: SmallKeyHashMap::default(),
            transform: MapTransform::default(),
            cycle: LoadCycle::default(),
            baseline: None,
        })
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn role(&self) -> &NetworkRole {
        &self.role
    }

    pub fn center_tile(&self) -> Option<TileCoordinate> {
        self.center_tile
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile(&self, identifier: &str) -> Option<&Tile> {
        self.slots_by_identifier
            .get(identifier)
            .map(|&slot| &self.tiles[slot])
    }

    pub fn transform(&self) -> &MapTransform {
        &self.transform
    }

    pub fn has_applied_baseline(&self) -> bool {
        self.baseline.is_some()
    }

    /// The elevation, in local units, that became the map's zero.
    pub fn baseline(&self) -> Option<f32> {
        self.baseline
    }

    /// Lays out the grid around the tile containing `center` and returns the fetches for every tile that changed.
    ///
    /// Local grid index `(x, y)` shows tile `(center.x - x, center.y + y)`. Clients only get texture fetches.
    pub fn show(&mut self, center: GeoPoint) -> Result<Vec<FetchJob>, MapError> {
        let Self {
            config,
            imagery,
            role,
            tiles,
            slots_by_identifier,
            cycle,
            ..
        } = self;

        let center_tile = TileCoordinate::from_geo(center, config.zoom, config.tile_size_meters);
        log::info!("Showing map around {} ({:?})", center_tile, center);

        let mut jobs = Vec::new();
        for (slot, (x, y)) in config.grid_positions().enumerate() {
            if slot == tiles.len() {
                let tile = Tile::new(
                    slot,
                    (x, y),
                    TileMesh::flat(config.mesh_resolution, config.tile_size_meters),
                );
                slots_by_identifier.insert(tile.identifier().to_owned(), slot);
                tiles.push(tile);
            }
            let tile_jobs = tiles[slot].assign_coordinate(
                center_tile.offset(-x, y),
                imagery,
                role.runs_elevation_pipeline(),
            )?;
            for job in tile_jobs.iter() {
                if let FetchJob::Elevation(job) = job {
                    cycle.pending.insert((job.slot, job.coordinate));
                }
            }
            jobs.extend(tile_jobs);
        }
        self.center_tile = Some(center_tile);

        Ok(jobs)
    }

    /// Reports the outcome of an elevation fetch returned by [`MapAssembler::show`].
    ///
    /// Results for a slot that was re-targeted while the fetch was in flight are discarded. Failures are logged and still
    /// count as resolved. When the last fetch of the cycle resolves, the first cycle of this assembler lowers every tile by
    /// the lowest height seen in the cycle.
    pub fn complete_elevation(
        &mut self,
        slot: usize,
        coordinate: TileCoordinate,
        result: Result<Vec<ElevationSample>, MapError>,
    ) -> LoadProgress {
        if !self.cycle.pending.remove(&(slot, coordinate)) {
            log::debug!("Ignoring elevations for {} outside of the load cycle", coordinate);
            return self.cycle.progress();
        }

        let Self {
            role,
            tiles,
            cycle,
            baseline,
            ..
        } = self;
        // Later cycles land relative to the first one's zero.
        let offset = -baseline.unwrap_or(0.0);
        match tiles.get_mut(slot) {
            Some(tile) if tile.coordinate() == Some(coordinate) => {
                match result.and_then(|samples| tile.apply_elevations(&samples, offset, role)) {
                    Ok(min) => cycle.report_minimum(min),
                    Err(e) => log::warn!("Tile {} ({}) keeps its geometry: {}", tile.identifier(), coordinate, e),
                }
            }
            _ => log::debug!("Discarding stale elevations for slot {} ({})", slot, coordinate),
        }

        if cycle.pending.is_empty() {
            self.finish_cycle()
        } else {
            cycle.progress()
        }
    }

    fn finish_cycle(&mut self) -> LoadProgress {
        let minimum = self.cycle.minimum.take();
        match minimum {
            Some(baseline) if self.baseline.is_none() => {
                log::info!("Load cycle complete; lowering map by {}", baseline);
                for tile in self.tiles.iter_mut() {
                    tile.translate_vertical(-baseline, &self.role);
                }
                self.baseline = Some(baseline);
                LoadProgress::Normalized { baseline }
            }
            _ => {
                log::info!("Load cycle complete");
                LoadProgress::Drained
            }
        }
    }

    /// Reports a decoded texture for the imagery at `url`. Returns false if the slot moved on to other imagery.
    pub fn complete_texture(&mut self, slot: usize, url: &str, result: Result<TileTexture, MapError>) -> bool {
        let Some(tile) = self.tiles.get_mut(slot) else {
            return false;
        };
        match result {
            Ok(texture) => tile.complete_texture(url, Arc::new(texture)),
            Err(e) => {
                log::warn!("Tile {} stays untextured: {}", tile.identifier(), e);
                false
            }
        }
    }

    /// Overwrites a tile with the host's copy. Updates for tiles that don't exist yet are dropped.
    ///
    /// Returns the texture fetch if the update points the tile at new imagery.
    pub fn apply_tile_update(&mut self, update: TileUpdate) -> Result<Option<TextureJob>, MapError> {
        let Some(&slot) = self.slots_by_identifier.get(&update.identifier) else {
            log::debug!("Dropping update for unknown tile {}", update.identifier);
            return Ok(None);
        };
        let tile = &mut self.tiles[slot];
        tile.apply_network_vertices(update.vertices, &self.role)?;

        Ok((!update.texture.is_empty())
            .then(|| tile.set_texture_url(update.texture))
            .flatten())
    }

    /// Host: publish the rotation and every tile, for clients catching up.
    pub fn resend_all(&self) {
        if !matches!(self.role, NetworkRole::Host(_)) {
            return;
        }
        self.role.send(SyncMessage::RotationUpdate {
            rotation: self.transform.rotation.to_array(),
        });
        for tile in self.tiles.iter().filter(|t| t.coordinate().is_some()) {
            self.role.send(SyncMessage::TileUpdate(tile.to_update()));
        }
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.transform.scale = scale;
        self.transform.position = Vec3::ZERO;
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.transform.rotation = rotation;
        self.transform.position = Vec3::ZERO;
    }

    /// Applies a finished scale gesture and shares it with the session.
    pub fn commit_scale(&mut self, scale: Vec3) {
        self.set_scale(scale);
        self.role.send(SyncMessage::ScaleUpdate {
            scale: scale.to_array(),
        });
    }

    /// Shares a flag placed by this participant at a map-local point. Returns false for clients, whose flag appears once
    /// the host relays it back.
    pub fn publish_flag(&self, point: Vec3A) -> bool {
        self.role.send(SyncMessage::FlagPlaced {
            position: point.to_array(),
        });
        self.role.runs_elevation_pipeline()
    }

    /// The slot whose footprint contains a map-local point.
    pub fn slot_at(&self, point: Vec3A) -> Option<usize> {
        let tile_size = self.config.tile_size_meters;
        let x = (point.x / tile_size).round() as i32;
        let y = (point.z / tile_size).round() as i32;
        self.slots_by_identifier.get(&tile_identifier((x, y))).copied()
    }

    /// The nearest terrain hit of a ray given in map-local space.
    pub fn raycast(&self, ray: &Ray) -> Option<TerrainHit> {
        let tile_size = self.config.tile_size_meters;

        // Visit tiles in order of bounding box entrance.
        let mut heap = BinaryHeap::new();
        for tile in self.tiles.iter() {
            let bounds = tile.mesh().bounds().translated(tile.local_offset(tile_size));
            if let Some([tmin, _]) = ray.cast_at_aabb(&bounds) {
                heap.push(TileCandidate {
                    slot: tile.slot(),
                    tmin,
                });
            }
        }

        let mut nearest: Option<TerrainHit> = None;
        while let Some(candidate) = heap.pop() {
            if nearest.map_or(false, |hit| hit.time <= candidate.tmin) {
                break;
            }
            let tile = &self.tiles[candidate.slot];
            let offset = tile.local_offset(tile_size);
            let tile_ray = Ray::new(ray.start - offset, ray.velocity());
            if let Some(time) = tile.mesh().cast_ray(&tile_ray) {
                if nearest.map_or(true, |hit| time < hit.time) {
                    nearest = Some(TerrainHit {
                        slot: candidate.slot,
                        time,
                        point: ray.position_at(time),
                    });
                }
            }
        }

        nearest
    }
}

#[derive(Clone, Copy)]
struct TileCandidate {
    slot: usize,
    tmin: f32,
}

impl PartialEq for TileCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
    }
}

impl Eq for TileCandidate {}

impl PartialOrd for TileCandidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TileCandidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        FloatOrd(self.tmin).cmp(&FloatOrd(other.tmin)).reverse()
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

#[cfg(test)]
mod test {
    use super::*;

    use crate::core::approx::assert_relative_eq;
    use crate::{ElevationJob, MessageSink};

    use crossbeam::channel;

    const MONT_BLANC: GeoPoint = GeoPoint::new(45.832675, 6.865166);

    fn config(grid_size_tiles: u32) -> MapConfig {
        MapConfig {
            grid_size_tiles,
            mesh_resolution: 3,
            ..Default::default()
        }
    }

    fn solo(grid_size_tiles: u32) -> MapAssembler {
        MapAssembler::new(config(grid_size_tiles), ImageryConfig::default(), NetworkRole::Solo).unwrap()
    }

    fn elevation_jobs(jobs: Vec<FetchJob>) -> Vec<ElevationJob> {
        jobs.into_iter()
            .filter_map(|job| match job {
                FetchJob::Elevation(job) => Some(job),
                FetchJob::Texture(_) => None,
            })
            .collect()
    }

    fn constant(job: &ElevationJob, meters: i32) -> Vec<ElevationSample> {
        job.points
            .iter()
            .map(|&point| ElevationSample {
                point,
                elevation_meters: meters,
            })
            .collect()
    }

    fn scale() -> f32 {
        TileCoordinate::new(0, 0, 12, 0.5).scale_factor().unwrap()
    }

    #[test]
    fn layout_inverts_local_x() {
        let mut map = solo(3);
        let jobs = map.show(MONT_BLANC).unwrap();
        assert_eq!(jobs.len(), 18);

        let center = map.center_tile().unwrap();
        assert_eq!((center.x, center.y), (2126, 1459));
        for tile in map.tiles() {
            let (x, y) = tile.grid_position();
            assert_eq!(tile.coordinate(), Some(center.offset(-x, y)));
        }
        let east = map.tile("(1,0)").unwrap();
        assert_eq!(east.coordinate().unwrap().x, 2125);
        assert_eq!(east.local_offset(0.5), Vec3A::new(0.5, 0.0, 0.0));
        assert_eq!(map.tile("(0,-1)").unwrap().coordinate().unwrap().y, 1458);
    }

    #[test]
    fn showing_same_center_twice_is_a_no_op() {
        let mut map = solo(2);
        assert_eq!(map.show(MONT_BLANC).unwrap().len(), 8);
        assert!(map.show(MONT_BLANC).unwrap().is_empty());
        assert_eq!(map.tiles().len(), 4);
    }

    #[test]
    fn single_tile_constant_elevation_is_flat_at_zero() {
        let mut map = MapAssembler::new(
            MapConfig {
                grid_size_tiles: 1,
                ..Default::default()
            },
            ImageryConfig::default(),
            NetworkRole::Solo,
        )
        .unwrap();
        let jobs = elevation_jobs(map.show(MONT_BLANC).unwrap());
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].points.len(), 121);

        let progress = map.complete_elevation(jobs[0].slot, jobs[0].coordinate, Ok(constant(&jobs[0], 100)));
        assert_eq!(
            progress,
            LoadProgress::Normalized {
                baseline: 100.0 / scale()
            }
        );
        assert!(map.has_applied_baseline());
        for p in map.tiles()[0].mesh().positions() {
            assert_eq!(p[1], 0.0);
        }
    }

    #[test]
    fn normalization_waits_for_every_tile_and_uses_grid_minimum() {
        let mut map = solo(2);
        let jobs = elevation_jobs(map.show(MONT_BLANC).unwrap());
        assert_eq!(jobs.len(), 4);

        let elevations = [5, -3, 10, 7];
        for (i, job) in jobs.iter().enumerate().take(3) {
            let progress = map.complete_elevation(job.slot, job.coordinate, Ok(constant(job, elevations[i])));
            assert_eq!(progress, LoadProgress::Pending { remaining: 3 - i });
            assert!(!map.has_applied_baseline());
        }
        let last = &jobs[3];
        let progress = map.complete_elevation(last.slot, last.coordinate, Ok(constant(last, elevations[3])));
        let baseline = -3.0 / scale();
        assert_eq!(progress, LoadProgress::Normalized { baseline });

        let minimums: Vec<f32> = map.tiles().iter().map(|t| t.mesh().min_height()).collect();
        for (i, min) in minimums.iter().enumerate() {
            assert_relative_eq!(*min, elevations[jobs[i].slot] as f32 / scale() - baseline);
            assert!(*min >= 0.0);
        }
        assert!(minimums.iter().any(|&m| m == 0.0));
    }

    #[test]
    fn baseline_is_applied_once() {
        let mut map = solo(1);
        let job = elevation_jobs(map.show(MONT_BLANC).unwrap()).remove(0);
        map.complete_elevation(job.slot, job.coordinate, Ok(constant(&job, 100)));

        let elsewhere = GeoPoint::new(46.5, 7.5);
        let job = elevation_jobs(map.show(elsewhere).unwrap()).remove(0);
        let progress = map.complete_elevation(job.slot, job.coordinate, Ok(constant(&job, 300)));
        assert_eq!(progress, LoadProgress::Drained);
        assert_eq!(map.baseline(), Some(100.0 / scale()));
        assert_relative_eq!(map.tiles()[0].mesh().min_height(), (300.0 - 100.0) / scale());
    }

    #[test]
    fn retargeted_tiles_stay_level_with_failed_neighbors() {
        let mut map = solo(2);
        for job in elevation_jobs(map.show(MONT_BLANC).unwrap()) {
            map.complete_elevation(job.slot, job.coordinate, Ok(constant(&job, 100)));
        }
        assert!(map.tiles().iter().all(|t| t.mesh().min_height() == 0.0));

        // Moving by one tile east re-targets every slot. One fetch fails and that tile keeps its old, already lowered
        // geometry.
        let jobs = elevation_jobs(map.show(GeoPoint::new(45.832675, 6.96)).unwrap());
        assert_eq!(jobs.len(), 4);
        map.complete_elevation(
            jobs[0].slot,
            jobs[0].coordinate,
            Err(MapError::ElevationFetchFailed("timeout".into())),
        );
        for job in jobs.iter().skip(1) {
            map.complete_elevation(job.slot, job.coordinate, Ok(constant(job, 100)));
        }

        for tile in map.tiles() {
            assert_relative_eq!(tile.mesh().min_height(), 0.0);
            assert_relative_eq!(tile.mesh().bounds().max.y, 0.0);
        }
    }

    #[test]
    fn failed_fetches_resolve_without_a_minimum() {
        let mut map = solo(2);
        let jobs = elevation_jobs(map.show(MONT_BLANC).unwrap());

        map.complete_elevation(
            jobs[0].slot,
            jobs[0].coordinate,
            Err(MapError::ElevationFetchFailed("timeout".into())),
        );
        let mut short = constant(&jobs[1], 1);
        short.pop();
        map.complete_elevation(jobs[1].slot, jobs[1].coordinate, Ok(short));
        map.complete_elevation(jobs[2].slot, jobs[2].coordinate, Ok(constant(&jobs[2], 40)));
        let progress = map.complete_elevation(jobs[3].slot, jobs[3].coordinate, Ok(constant(&jobs[3], 20)));

        let baseline = 20.0 / scale();
        assert_eq!(progress, LoadProgress::Normalized { baseline });
        // The unflattened tiles still move with the rest of the map.
        assert_relative_eq!(map.tiles()[jobs[0].slot].mesh().min_height(), -baseline);
        assert_relative_eq!(map.tiles()[jobs[1].slot].mesh().min_height(), -baseline);
    }

    #[test]
    fn all_failed_cycle_leaves_baseline_unset() {
        let mut map = solo(1);
        let job = elevation_jobs(map.show(MONT_BLANC).unwrap()).remove(0);
        let progress = map.complete_elevation(
            job.slot,
            job.coordinate,
            Err(MapError::ElevationFetchFailed("offline".into())),
        );
        assert_eq!(progress, LoadProgress::Drained);
        assert!(!map.has_applied_baseline());
    }

    #[test]
    fn stale_elevations_are_discarded() {
        let mut map = solo(1);
        let old = elevation_jobs(map.show(MONT_BLANC).unwrap()).remove(0);
        let new = elevation_jobs(map.show(GeoPoint::new(46.5, 7.5)).unwrap()).remove(0);

        let progress = map.complete_elevation(old.slot, old.coordinate, Ok(constant(&old, 500)));
        assert_eq!(progress, LoadProgress::Pending { remaining: 1 });
        assert_eq!(map.tiles()[0].mesh().min_height(), 0.0);

        let progress = map.complete_elevation(new.slot, new.coordinate, Ok(constant(&new, 200)));
        assert_eq!(
            progress,
            LoadProgress::Normalized {
                baseline: 200.0 / scale()
            }
        );

        // Unknown completions don't disturb anything.
        assert_eq!(
            map.complete_elevation(old.slot, old.coordinate, Ok(Vec::new())),
            LoadProgress::Pending { remaining: 0 }
        );
    }

    #[test]
    fn same_inputs_produce_identical_vertices() {
        let build = || {
            let mut map = solo(2);
            let jobs = elevation_jobs(map.show(MONT_BLANC).unwrap());
            for job in jobs.iter() {
                let samples = job
                    .points
                    .iter()
                    .enumerate()
                    .map(|(i, &point)| ElevationSample {
                        point,
                        elevation_meters: 4000 + 37 * i as i32 - 11 * job.slot as i32,
                    })
                    .collect();
                map.complete_elevation(job.slot, job.coordinate, Ok(samples));
            }
            map.tiles()
                .iter()
                .map(|t| t.mesh().positions().to_vec())
                .collect::<Vec<_>>()
        };

        let a = build();
        let b = build();
        for (ta, tb) in a.iter().zip(b.iter()) {
            for (va, vb) in ta.iter().zip(tb.iter()) {
                for k in 0..3 {
                    assert_eq!(va[k].to_bits(), vb[k].to_bits());
                }
            }
        }
    }

    fn networked(host: bool) -> (MapAssembler, channel::Receiver<SyncMessage>) {
        let (tx, rx) = channel::unbounded::<SyncMessage>();
        let sink: Arc<dyn MessageSink> = Arc::new(tx);
        let role = if host {
            NetworkRole::Host(sink)
        } else {
            NetworkRole::Client(sink)
        };
        (
            MapAssembler::new(config(2), ImageryConfig::default(), role).unwrap(),
            rx,
        )
    }

    #[test]
    fn client_mirrors_host_geometry() {
        let (mut host, host_out) = networked(true);
        let (mut client, client_out) = networked(false);

        let client_jobs = client.show(MONT_BLANC).unwrap();
        assert!(client_jobs
            .iter()
            .all(|job| matches!(job, FetchJob::Texture(_))));

        for job in elevation_jobs(host.show(MONT_BLANC).unwrap()) {
            host.complete_elevation(job.slot, job.coordinate, Ok(constant(&job, 1000 + job.slot as i32)));
        }
        assert!(host.has_applied_baseline());

        // One update per elevation rebuild, then one per tile for the baseline.
        let updates: Vec<_> = host_out.try_iter().collect();
        assert_eq!(updates.len(), 8);
        for message in updates {
            match message {
                SyncMessage::TileUpdate(update) => {
                    client.apply_tile_update(update).unwrap();
                }
                other => panic!("unexpected {:?}", other),
            }
        }

        for (h, c) in host.tiles().iter().zip(client.tiles()) {
            assert_eq!(h.mesh(), c.mesh());
        }
        assert!(!client.has_applied_baseline());
        assert!(client_out.try_recv().is_err());
    }

    #[test]
    fn tile_update_for_unknown_tile_is_dropped() {
        let (mut client, _) = networked(false);
        let update = TileUpdate {
            identifier: "(0,0)".into(),
            vertices: vec![[0.0, 1.0, 0.0]; 9],
            texture: "t".into(),
        };
        assert!(client.apply_tile_update(update.clone()).unwrap().is_none());

        client.show(MONT_BLANC).unwrap();
        let job = client.apply_tile_update(update.clone()).unwrap().unwrap();
        assert_eq!(job.url, "t");
        let tile = client.tile("(0,0)").unwrap();
        assert_eq!(tile.mesh().positions(), update.vertices.as_slice());
        assert_eq!(tile.mesh().bounds().min.y, 1.0);

        // Same imagery again needs no fetch.
        assert!(client.apply_tile_update(update).unwrap().is_none());
    }

    #[test]
    fn mismatched_tile_update_leaves_tile_unchanged() {
        let (mut client, _) = networked(false);
        client.show(MONT_BLANC).unwrap();
        let before = client.tile("(0,0)").unwrap().mesh().clone();

        let result = client.apply_tile_update(TileUpdate {
            identifier: "(0,0)".into(),
            vertices: vec![[0.0; 3]; 4],
            texture: String::new(),
        });
        assert!(matches!(result, Err(MapError::VertexCountMismatch { .. })));
        assert_eq!(client.tile("(0,0)").unwrap().mesh(), &before);
    }

    #[test]
    fn transforms_never_translate() {
        let (mut client, client_out) = networked(false);
        client.transform.position = Vec3::ONE;
        client.set_rotation(Quat::from_rotation_y(1.0));
        assert_eq!(client.transform().position, Vec3::ZERO);

        client.transform.position = Vec3::ONE;
        client.commit_scale(Vec3::splat(2.0));
        assert_eq!(client.transform().position, Vec3::ZERO);
        assert_eq!(client.transform().scale, Vec3::splat(2.0));
        assert_eq!(
            client_out.try_recv().unwrap(),
            SyncMessage::ScaleUpdate {
                scale: [2.0, 2.0, 2.0]
            }
        );
    }

    #[test]
    fn raycast_finds_nearest_tile() {
        let mut map = solo(3);
        for job in elevation_jobs(map.show(MONT_BLANC).unwrap()) {
            map.complete_elevation(job.slot, job.coordinate, Ok(constant(&job, 1000)));
        }

        // Straight down onto the tile east of center.
        let ray = Ray::new(Vec3A::new(0.6, 1.0, 0.1), Vec3A::new(0.0, -1.0, 0.0));
        let hit = map.raycast(&ray).unwrap();
        assert_eq!(map.tiles()[hit.slot].identifier(), "(1,0)");
        assert_relative_eq!(hit.time, 1.0);
        assert_relative_eq!(hit.point.y, 0.0);

        let miss = Ray::new(Vec3A::new(5.0, 1.0, 0.0), Vec3A::new(0.0, -1.0, 0.0));
        assert_eq!(map.raycast(&miss), None);
    }

    #[test]
    fn local_ray_undoes_root_transform() {
        let transform = MapTransform {
            position: Vec3::ZERO,
            rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
            scale: Vec3::splat(2.0),
        };
        let world = Ray::new(Vec3A::new(0.0, 2.0, -2.0), Vec3A::new(0.0, -1.0, 0.0));
        let local = transform.local_ray(&world);
        assert_relative_eq!(local.start.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(local.start.y, 1.0, epsilon = 1e-6);
        assert_relative_eq!(local.start.z, 0.0, epsilon = 1e-6);
        assert_relative_eq!(local.velocity().y, -0.5, epsilon = 1e-6);
    }

    #[test]
    fn slot_at_finds_tile_footprints() {
        let mut map = solo(2);
        assert_eq!(map.slot_at(Vec3A::ZERO), None);
        map.show(MONT_BLANC).unwrap();

        let slot = |x, z| map.slot_at(Vec3A::new(x, 0.3, z)).map(|s| map.tiles()[s].identifier().to_owned());
        assert_eq!(slot(0.12, 0.07).as_deref(), Some("(0,0)"));
        assert_eq!(slot(-0.4, -0.3).as_deref(), Some("(-1,-1)"));
        assert_eq!(slot(-0.6, 0.2).as_deref(), Some("(-1,0)"));
        assert_eq!(slot(0.3, 0.0), None);
    }

    #[test]
    fn only_clients_wait_for_their_flags_to_come_back() {
        let point = Vec3A::new(0.1, 0.0, 0.2);
        let expected = SyncMessage::FlagPlaced {
            position: point.to_array(),
        };

        assert!(solo(1).publish_flag(point));

        let (host, host_out) = networked(true);
        assert!(host.publish_flag(point));
        assert_eq!(host_out.try_iter().collect::<Vec<_>>(), [expected.clone()]);

        let (client, client_out) = networked(false);
        assert!(!client.publish_flag(point));
        assert_eq!(client_out.try_iter().collect::<Vec<_>>(), [expected]);
    }
}

use super::{ShowMap, TerrainServices};
use crate::{ElevationSample, FetchJob, LoadProgress, MapAssembler, MapError, TileCoordinate, TileTexture};

use bevy::prelude::*;
use bevy::tasks::{IoTaskPool, Task};
use futures_lite::future;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct LoaderConfig {
    /// The maximum number of fetches in flight at once. The rest wait in queue order.
    pub max_pending_fetches: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_pending_fetches: 16,
        }
    }
}

/// Sent whenever a load cycle drains. `baseline` is set only for the cycle that normalized the map.
#[derive(Clone, Copy, Debug)]
pub struct MapLoaded {
    pub baseline: Option<f32>,
}

struct FetchedElevations {
    slot: usize,
    coordinate: TileCoordinate,
    result: Result<Vec<ElevationSample>, MapError>,
}

struct FetchedTexture {
    slot: usize,
    url: String,
    result: Result<TileTexture, MapError>,
}

#[derive(Default)]
pub struct PendingFetches {
    queue: VecDeque<FetchJob>,
    elevation_tasks: Vec<Task<FetchedElevations>>,
    texture_tasks: Vec<Task<FetchedTexture>>,
}

impl PendingFetches {
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.elevation_tasks.is_empty() && self.texture_tasks.is_empty()
    }

    pub(crate) fn extend(&mut self, jobs: impl IntoIterator<Item = FetchJob>) {
        self.queue.extend(jobs);
    }

    fn in_flight(&self) -> usize {
        self.elevation_tasks.len() + self.texture_tasks.len()
    }
}

pub fn show_map_system(
    mut requests: EventReader<ShowMap>,
    mut assembler: ResMut<MapAssembler>,
    mut fetches: ResMut<PendingFetches>,
) {
    for ShowMap { center } in requests.iter() {
        match assembler.show(*center) {
            Ok(jobs) => fetches.extend(jobs),
            Err(e) => log::error!("Failed to show map: {}", e),
        }
    }
}

pub fn loader_system(
    config: Res<LoaderConfig>,
    services: Res<TerrainServices>,
    io_pool: Res<IoTaskPool>,
    mut assembler: ResMut<MapAssembler>,
    mut fetches: ResMut<PendingFetches>,
    mut loaded: EventWriter<MapLoaded>,
) {
    let fetches = &mut *fetches;

    // Each completion goes straight back to the assembler; there is no ordering between tiles.
    fetches.elevation_tasks.retain_mut(|task| {
        let Some(fetched) = future::block_on(future::poll_once(task)) else {
            return true;
        };
        match assembler.complete_elevation(fetched.slot, fetched.coordinate, fetched.result) {
            LoadProgress::Pending { remaining } => log::trace!("{} elevation fetches left", remaining),
            LoadProgress::Normalized { baseline } => loaded.send(MapLoaded {
                baseline: Some(baseline),
            }),
            LoadProgress::Drained => loaded.send(MapLoaded { baseline: None }),
        }
        false
    });
    fetches.texture_tasks.retain_mut(|task| {
        let Some(fetched) = future::block_on(future::poll_once(task)) else {
            return true;
        };
        assembler.complete_texture(fetched.slot, &fetched.url, fetched.result);
        false
    });

    while fetches.in_flight() < config.max_pending_fetches {
        let Some(job) = fetches.queue.pop_front() else {
            break;
        };
        match job {
            FetchJob::Elevation(job) => {
                let service = services.elevation.clone();
                fetches.elevation_tasks.push(io_pool.spawn(async move {
                    let result = service.request_elevations(&job.points);
                    FetchedElevations {
                        slot: job.slot,
                        coordinate: job.coordinate,
                        result,
                    }
                }));
            }
            FetchJob::Texture(job) => {
                let service = services.imagery.clone();
                fetches.texture_tasks.push(io_pool.spawn(async move {
                    let result = service.fetch_texture(&job.url);
                    FetchedTexture {
                        slot: job.slot,
                        url: job.url,
                        result,
                    }
                }));
            }
        }
    }
}

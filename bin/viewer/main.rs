//! Loads a map headlessly and reports on it.
//!
//! `viewer [CONFIG] [PLACE]` reads `CONFIG` (default `config/relief.ron`) and centers the map on `PLACE` if it geocodes,
//! or on the configured default center otherwise.

use relief::map::{GeoPoint, Geocoder, MapAssembler};
use relief::{Config, MapLoaded, SessionMode, ShowMap, TerrainServices};

use bevy::app::{AppExit, ScheduleRunnerSettings};
use bevy::log::LogPlugin;
use bevy::prelude::*;
use std::time::Duration;

struct StartPoint(GeoPoint);

fn main() {
    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "config/relief.ron".to_owned());
    let config = Config::read_file(&config_path).expect("Failed to read config");

    let center = match args.next() {
        Some(place) => {
            let timeout = Duration::from_secs(config.services.request_timeout_secs);
            Geocoder::new(config.services.geocoding.clone(), timeout)
                .expect("Failed to create HTTP client")
                .geocode(&place)
                .unwrap_or_else(|e| {
                    eprintln!("Could not find {:?} ({}), using the default center", place, e);
                    config.map.default_center
                })
        }
        None => config.map.default_center,
    };

    let services = TerrainServices::http(&config.services).expect("Failed to create HTTP client");
    let plugin = config
        .plugin(services, SessionMode::Solo)
        .expect("Invalid map configuration");

    App::new()
        .insert_resource(ScheduleRunnerSettings::run_loop(Duration::from_millis(10)))
        .insert_resource(StartPoint(center))
        .add_plugins(MinimalPlugins)
        .add_plugin(LogPlugin)
        .add_plugin(plugin)
        .add_startup_system(show_start_point)
        .add_system(report_system)
        .run();
}

fn show_start_point(start: Res<StartPoint>, mut show: EventWriter<ShowMap>) {
    show.send(ShowMap { center: start.0 });
}

fn report_system(
    mut loaded: EventReader<MapLoaded>,
    assembler: Res<MapAssembler>,
    mut exit: EventWriter<AppExit>,
) {
    for MapLoaded { baseline } in loaded.iter() {
        let textured = assembler
            .tiles()
            .iter()
            .filter(|t| t.texture().is_some())
            .count();
        let peak = assembler
            .tiles()
            .iter()
            .map(|t| t.mesh().bounds().max.y)
            .fold(f32::NEG_INFINITY, f32::max);
        log::info!(
            "Loaded {} tiles around {:?} ({} textured); baseline {:?}, peak {}",
            assembler.tiles().len(),
            assembler.center_tile(),
            textured,
            baseline,
            peak
        );
        exit.send(AppExit);
    }
}

use relief_map::plugin::{LoaderConfig, SessionMode, TerrainPlugin, TerrainServices};
use relief_map::{MapConfig, MapError, ServicesConfig};

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Config {
    pub map: MapConfig,
    pub services: ServicesConfig,
    pub loader: LoaderConfig,
}

impl Config {
    pub fn read_file(path: &str) -> Result<Self, ron::Error> {
        let reader = std::fs::File::open(path)?;

        ron::de::from_reader(reader)
    }

    pub fn plugin(&self, services: TerrainServices, mode: SessionMode) -> Result<TerrainPlugin, MapError> {
        TerrainPlugin::new(
            self.map,
            self.services.imagery.clone(),
            self.loader,
            services,
            mode,
        )
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

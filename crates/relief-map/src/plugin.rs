mod loader;
mod scene;
mod session;

pub use loader::{LoaderConfig, MapLoaded, PendingFetches};
pub use scene::{Flag, MapGesture, MapRoot, MapScene, PlaceFlag, TerrainTile};
pub use session::{SessionCommand, SessionLink};

use loader::{loader_system, show_map_system};
use scene::{gesture_system, place_flag_system, scene_system, spawn_map_root};
use session::{session_command_system, session_inbound_system, session_outbound_system};

use crate::{
    ElevationService, GeoPoint, HttpImagery, ImageryConfig, ImageryService, MapAssembler, MapConfig, MapError,
    MessageSink, NetworkRole, OpenElevationClient, ServicesConfig, SessionTransport, SyncMessage,
};

use bevy::prelude::{App, CoreStage, Plugin};
use crossbeam::channel;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Ask the map to lay itself out around `center`.
#[derive(Clone, Copy, Debug)]
pub struct ShowMap {
    pub center: GeoPoint,
}

/// The blocking services that fetches run against.
#[derive(Clone)]
pub struct TerrainServices {
    pub elevation: Arc<dyn ElevationService>,
    pub imagery: Arc<dyn ImageryService>,
}

impl TerrainServices {
    /// Talks to the endpoints in `config` over HTTP.
    pub fn http(config: &ServicesConfig) -> reqwest::Result<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);

        Ok(Self {
            elevation: Arc::new(OpenElevationClient::new(config.elevation.clone(), timeout)?),
            imagery: Arc::new(HttpImagery::new(timeout)?),
        })
    }
}

/// Which side of a shared session this app plays, and how it reaches the other side.
#[derive(Clone)]
pub enum SessionMode {
    Solo,
    Host(Arc<dyn SessionTransport>),
    Client(Arc<dyn SessionTransport>),
}

pub struct TerrainPlugin {
    loader: LoaderConfig,
    services: TerrainServices,
    // Taken by the first `build`.
    state: Mutex<Option<(MapAssembler, Option<SessionLink>)>>,
}

impl TerrainPlugin {
    /// Fails if the map configuration is unusable.
    pub fn new(
        map: MapConfig,
        imagery: ImageryConfig,
        loader: LoaderConfig,
        services: TerrainServices,
        mode: SessionMode,
    ) -> Result<Self, MapError> {
        let (outbox_tx, outbox_rx) = channel::unbounded::<SyncMessage>();
        let sink: Arc<dyn MessageSink> = Arc::new(outbox_tx);
        let (role, transport) = match mode {
            SessionMode::Solo => (NetworkRole::Solo, None),
            SessionMode::Host(transport) => (NetworkRole::Host(sink), Some(transport)),
            SessionMode::Client(transport) => (NetworkRole::Client(sink), Some(transport)),
        };
        let assembler = MapAssembler::new(map, imagery, role)?;
        let link = transport.map(|transport| SessionLink::new(transport, outbox_rx));

        Ok(Self {
            loader,
            services,
            state: Mutex::new(Some((assembler, link))),
        })
    }
}

impl Plugin for TerrainPlugin {
    fn build(&self, app: &mut App) {
        let Some((assembler, link)) = self.state.lock().take() else {
            log::warn!("TerrainPlugin can only be added to one app");
            return;
        };

        app.insert_resource(assembler)
            .insert_resource(self.loader)
            .insert_resource(self.services.clone())
            .insert_resource(PendingFetches::default())
            .add_event::<ShowMap>()
            .add_event::<MapLoaded>()
            .add_event::<MapGesture>()
            .add_event::<PlaceFlag>()
            .add_startup_system(spawn_map_root)
            .add_system_to_stage(CoreStage::Update, show_map_system)
            .add_system_to_stage(CoreStage::Update, gesture_system)
            .add_system_to_stage(CoreStage::Update, place_flag_system)
            .add_system_to_stage(CoreStage::PostUpdate, loader_system)
            .add_system_to_stage(CoreStage::Last, scene_system);

        if let Some(link) = link {
            app.insert_resource(link)
                .add_event::<SessionCommand>()
                .add_system_to_stage(CoreStage::PreUpdate, session_command_system)
                .add_system_to_stage(CoreStage::PreUpdate, session_inbound_system)
                .add_system_to_stage(CoreStage::Last, session_outbound_system);
        }
    }
}

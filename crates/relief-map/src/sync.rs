//! Host/client replication of the map.
//!
//! The host owns the geometry. Every tile it rebuilds goes out as a [`TileUpdate`], and clients overwrite their copy of the
//! tile with it. Tile updates carry no version; the last one delivered wins.

use crate::core::glam::{Quat, Vec3, Vec3A};
use crate::{FetchJob, MapAssembler, MapError};

use crossbeam::channel::Sender;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TileUpdate {
    pub identifier: String,
    pub vertices: Vec<[f32; 3]>,
    pub texture: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum SyncMessage {
    /// Host to all: the full geometry and imagery of one tile.
    TileUpdate(TileUpdate),
    /// Host to all, in reply to a [`SyncMessage::SyncRequest`].
    RotationUpdate { rotation: [f32; 4] },
    /// Whoever committed a scale gesture. The host applies client scales without echoing them.
    ScaleUpdate { scale: [f32; 3] },
    /// Host to all: start showing the map.
    SessionStart,
    /// Client to host: resend everything.
    SyncRequest,
    /// Host to all: correlation id of the shared spatial anchor.
    CloudAnchorId { id: String },
    /// Client to host: ask for the anchor id.
    CloudAnchorRequest,
    /// A flag was placed at this map-local point. Clients send theirs to the host, which spawns it and relays it to all.
    FlagPlaced { position: [f32; 3] },
}

impl SyncMessage {
    pub fn encode(&self) -> Result<Vec<u8>, MapError> {
        postcard::to_allocvec(self).map_err(MapError::NetworkMessageEncodeFailure)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, MapError> {
        postcard::from_bytes(bytes).map_err(MapError::NetworkMessageDecodeFailure)
    }
}

/// Where outbound messages go. For a host that's every client, for a client it's the host.
pub trait MessageSink: Send + Sync {
    fn send(&self, message: SyncMessage);
}

impl MessageSink for Sender<SyncMessage> {
    fn send(&self, message: SyncMessage) {
        if Sender::send(self, message).is_err() {
            log::debug!("Outbound session channel closed; dropping message");
        }
    }
}

/// How this participant takes part in a shared session.
#[derive(Clone)]
pub enum NetworkRole {
    /// No session. Runs the elevation pipeline and publishes nothing.
    Solo,
    /// Runs the elevation pipeline and publishes every tile rebuild.
    Host(Arc<dyn MessageSink>),
    /// Never fetches elevation. Geometry comes from the host.
    Client(Arc<dyn MessageSink>),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RoleKind {
    Solo,
    Host,
    Client,
}

impl NetworkRole {
    pub fn kind(&self) -> RoleKind {
        match self {
            Self::Solo => RoleKind::Solo,
            Self::Host(_) => RoleKind::Host,
            Self::Client(_) => RoleKind::Client,
        }
    }

    pub fn runs_elevation_pipeline(&self) -> bool {
        !matches!(self, Self::Client(_))
    }

    /// Sends to the other side of the session, if there is one.
    pub fn send(&self, message: SyncMessage) {
        match self {
            Self::Solo => {}
            Self::Host(sink) | Self::Client(sink) => sink.send(message),
        }
    }
}

impl fmt::Debug for NetworkRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.kind(), f)
    }
}

/// Follow-up work for the caller of [`Session::handle`].
#[derive(Clone, Debug)]
pub enum SessionAction {
    /// Lay out the map around the configured center.
    ShowMap,
    Fetch(FetchJob),
    /// Put a flag on the map at this map-local point.
    SpawnFlag(Vec3A),
}

/// The message handling of one session participant. Which side it plays is taken from the assembler's [`NetworkRole`].
#[derive(Debug, Default)]
pub struct Session {
    anchor_id: Option<String>,
}

impl Session {
    pub fn anchor_id(&self) -> Option<&str> {
        self.anchor_id.as_deref()
    }

    /// Host: tell every client to show the map.
    pub fn start_hosting(&self, assembler: &MapAssembler) {
        assembler.role().send(SyncMessage::SessionStart);
    }

    /// Host: the shared anchor is ready.
    pub fn anchor_hosted(&mut self, assembler: &MapAssembler, id: String) {
        log::info!("Hosted anchor {}", id);
        assembler.role().send(SyncMessage::CloudAnchorId { id: id.clone() });
        self.anchor_id = Some(id);
    }

    /// Client: ask the host for the anchor id.
    pub fn join(&self, assembler: &MapAssembler) {
        assembler.role().send(SyncMessage::CloudAnchorRequest);
    }

    /// Client: the anchor resolved, so catch up with the host's state.
    pub fn anchor_resolved(&self, assembler: &MapAssembler) -> Vec<SessionAction> {
        assembler.role().send(SyncMessage::SyncRequest);
        vec![SessionAction::ShowMap]
    }

    pub fn handle(&mut self, assembler: &mut MapAssembler, message: SyncMessage) -> Vec<SessionAction> {
        match assembler.role().kind() {
            RoleKind::Host => self.handle_as_host(assembler, message),
            RoleKind::Client => self.handle_as_client(assembler, message),
            RoleKind::Solo => {
                log::warn!("Dropping {:?} outside of a session", message);
                Vec::new()
            }
        }
    }

    fn handle_as_host(&mut self, assembler: &mut MapAssembler, message: SyncMessage) -> Vec<SessionAction> {
        match message {
            SyncMessage::SyncRequest => {
                log::debug!("Resending map state");
                assembler.resend_all();
            }
            SyncMessage::ScaleUpdate { scale } => assembler.set_scale(Vec3::from(scale)),
            SyncMessage::CloudAnchorRequest => match &self.anchor_id {
                Some(id) => assembler
                    .role()
                    .send(SyncMessage::CloudAnchorId { id: id.clone() }),
                None => log::debug!("Anchor requested before it was hosted"),
            },
            SyncMessage::FlagPlaced { position } => {
                assembler.role().send(SyncMessage::FlagPlaced { position });
                return vec![SessionAction::SpawnFlag(Vec3A::from(position))];
            }
            other => log::warn!("Host dropping unexpected {:?}", other),
        }
        Vec::new()
    }

    fn handle_as_client(&mut self, assembler: &mut MapAssembler, message: SyncMessage) -> Vec<SessionAction> {
        match message {
            SyncMessage::TileUpdate(update) => match assembler.apply_tile_update(update) {
                Ok(job) => return job.map(|j| SessionAction::Fetch(FetchJob::Texture(j))).into_iter().collect(),
                Err(e) => log::warn!("Dropping tile update: {}", e),
            },
            SyncMessage::RotationUpdate { rotation } => assembler.set_rotation(Quat::from_array(rotation)),
            SyncMessage::ScaleUpdate { scale } => assembler.set_scale(Vec3::from(scale)),
            SyncMessage::SessionStart => return vec![SessionAction::ShowMap],
            SyncMessage::CloudAnchorId { id } => {
                log::info!("Received anchor {}", id);
                self.anchor_id = Some(id);
            }
            SyncMessage::FlagPlaced { position } => return vec![SessionAction::SpawnFlag(Vec3A::from(position))],
            other => log::warn!("Client dropping unexpected {:?}", other),
        }
        Vec::new()
    }
}

// ████████╗███████╗███████╗████████╗
// ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝
//    ██║   █████╗  ███████╗   ██║
//    ██║   ██╔══╝  ╚════██║   ██║
//    ██║   ███████╗███████║   ██║
//    ╚═╝   ╚══════╝╚══════╝   ╚═╝

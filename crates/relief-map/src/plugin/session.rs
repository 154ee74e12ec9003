use super::scene::spawn_flag;
use super::{MapScene, PendingFetches, ShowMap};
use crate::{MapAssembler, Session, SessionAction, SessionTransport, SyncMessage};

use bevy::prelude::*;
use crossbeam::channel::Receiver;
use std::sync::Arc;

/// Session lifecycle steps driven from outside the map, e.g. by the anchor workflow.
#[derive(Clone, Debug)]
pub enum SessionCommand {
    /// Host: tell clients to show the map.
    StartHosting,
    /// Host: the shared anchor has this id.
    AnchorHosted(String),
    /// Client: ask the host for its anchor.
    Join,
    /// Client: the anchor resolved; catch up with the host.
    AnchorResolved,
}

pub struct SessionLink {
    session: Session,
    transport: Arc<dyn SessionTransport>,
    /// Messages published by the assembler, waiting to be encoded.
    outbox: Receiver<SyncMessage>,
}

impl SessionLink {
    pub(crate) fn new(transport: Arc<dyn SessionTransport>, outbox: Receiver<SyncMessage>) -> Self {
        Self {
            session: Session::default(),
            transport,
            outbox,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

/// Where session actions land in the world.
struct ActionTargets<'a, 'w, 's> {
    commands: &'a mut Commands<'w, 's>,
    scene: &'a MapScene,
    fetches: &'a mut PendingFetches,
}

fn run_actions(
    actions: Vec<SessionAction>,
    assembler: &MapAssembler,
    targets: &mut ActionTargets,
    show: &mut EventWriter<ShowMap>,
) {
    for action in actions {
        match action {
            SessionAction::ShowMap => show.send(ShowMap {
                center: assembler.config().default_center,
            }),
            SessionAction::Fetch(job) => targets.fetches.extend([job]),
            SessionAction::SpawnFlag(point) => match assembler.slot_at(point) {
                Some(slot) => spawn_flag(targets.commands, targets.scene, slot, point),
                None => log::warn!("Dropping flag at {:?} outside of the map", point),
            },
        }
    }
}

pub fn session_command_system(
    mut commands: Commands,
    mut requests: EventReader<SessionCommand>,
    mut link: ResMut<SessionLink>,
    assembler: Res<MapAssembler>,
    scene: Res<MapScene>,
    mut fetches: ResMut<PendingFetches>,
    mut show: EventWriter<ShowMap>,
) {
    let mut targets = ActionTargets {
        commands: &mut commands,
        scene: &*scene,
        fetches: &mut *fetches,
    };
    for command in requests.iter() {
        match command {
            SessionCommand::StartHosting => link.session.start_hosting(&assembler),
            SessionCommand::AnchorHosted(id) => link.session.anchor_hosted(&assembler, id.clone()),
            SessionCommand::Join => link.session.join(&assembler),
            SessionCommand::AnchorResolved => {
                let actions = link.session.anchor_resolved(&assembler);
                run_actions(actions, &assembler, &mut targets, &mut show);
            }
        }
    }
}

pub fn session_inbound_system(
    mut commands: Commands,
    mut link: ResMut<SessionLink>,
    mut assembler: ResMut<MapAssembler>,
    scene: Res<MapScene>,
    mut fetches: ResMut<PendingFetches>,
    mut show: EventWriter<ShowMap>,
) {
    let SessionLink {
        session, transport, ..
    } = &mut *link;
    let mut targets = ActionTargets {
        commands: &mut commands,
        scene: &*scene,
        fetches: &mut *fetches,
    };

    while let Some(bytes) = transport.try_recv() {
        let message = match SyncMessage::decode(&bytes) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("{}", e);
                continue;
            }
        };
        let actions = session.handle(&mut *assembler, message);
        run_actions(actions, &assembler, &mut targets, &mut show);
    }
}

pub fn session_outbound_system(link: Res<SessionLink>) {
    for message in link.outbox.try_iter() {
        match message.encode() {
            Ok(bytes) => link.transport.send(bytes),
            Err(e) => log::error!("{}", e),
        }
    }
}

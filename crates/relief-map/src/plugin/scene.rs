use crate::core::geometry::Ray;
use crate::core::glam::Vec3A;
use crate::MapAssembler;

use bevy::prelude::*;

/// The single parent of every tile and flag. Carries the map's rotation and scale.
#[derive(Component)]
pub struct MapRoot;

#[derive(Component)]
pub struct TerrainTile {
    pub slot: usize,
}

/// A marker placed on the terrain.
#[derive(Component)]
pub struct Flag {
    pub slot: usize,
}

pub struct MapScene {
    root: Entity,
    tiles: Vec<Entity>,
}

impl MapScene {
    pub fn root(&self) -> Entity {
        self.root
    }

    /// Tile entities by slot.
    pub fn tiles(&self) -> &[Entity] {
        &self.tiles
    }
}

/// A finished gesture on the map root.
#[derive(Clone, Copy, Debug)]
pub enum MapGesture {
    /// Shared with the session.
    Scale(Vec3),
    Rotate(Quat),
}

/// Put a flag where this world-space ray meets the terrain. Other session participants see it too.
#[derive(Clone, Copy, Debug)]
pub struct PlaceFlag {
    pub ray: Ray,
}

pub fn spawn_map_root(mut commands: Commands) {
    let root = commands
        .spawn()
        .insert_bundle((MapRoot, Transform::identity(), GlobalTransform::identity()))
        .id();
    commands.insert_resource(MapScene {
        root,
        tiles: Vec::new(),
    });
}

pub fn gesture_system(mut gestures: EventReader<MapGesture>, mut assembler: ResMut<MapAssembler>) {
    for gesture in gestures.iter() {
        match *gesture {
            MapGesture::Scale(scale) => assembler.commit_scale(scale),
            MapGesture::Rotate(rotation) => assembler.set_rotation(rotation),
        }
    }
}

/// Mirrors the assembler's grid and root transform into the world.
pub fn scene_system(
    mut commands: Commands,
    assembler: Res<MapAssembler>,
    mut scene: ResMut<MapScene>,
    mut transforms: Query<&mut Transform>,
) {
    if !assembler.is_changed() {
        return;
    }

    let MapScene { root, tiles } = &mut *scene;
    let tile_size = assembler.config().tile_size_meters;
    for tile in assembler.tiles().iter().skip(tiles.len()) {
        let translation = Vec3::from(tile.local_offset(tile_size));
        let entity = commands
            .spawn()
            .insert_bundle((
                TerrainTile { slot: tile.slot() },
                Transform::from_translation(translation),
                GlobalTransform::identity(),
            ))
            .id();
        commands.entity(*root).push_children(&[entity]);
        tiles.push(entity);
    }

    if let Ok(mut root_transform) = transforms.get_mut(*root) {
        let map = assembler.transform();
        root_transform.translation = map.position;
        root_transform.rotation = map.rotation;
        root_transform.scale = map.scale;
    }
}

pub fn place_flag_system(
    mut commands: Commands,
    mut requests: EventReader<PlaceFlag>,
    assembler: Res<MapAssembler>,
    scene: Res<MapScene>,
) {
    for PlaceFlag { ray } in requests.iter() {
        let local_ray = assembler.transform().local_ray(ray);
        let Some(hit) = assembler.raycast(&local_ray) else {
            log::debug!("Flag ray missed the terrain");
            continue;
        };
        log::info!("Placing flag at {:?} on {}", hit.point, assembler.tiles()[hit.slot].identifier());

        if assembler.publish_flag(hit.point) {
            spawn_flag(&mut commands, &scene, hit.slot, hit.point);
        }
    }
}

pub(super) fn spawn_flag(commands: &mut Commands, scene: &MapScene, slot: usize, point: Vec3A) {
    let flag = commands
        .spawn()
        .insert_bundle((
            Flag { slot },
            Transform::from_translation(Vec3::from(point)),
            GlobalTransform::identity(),
        ))
        .id();
    commands.entity(scene.root).push_children(&[flag]);
}

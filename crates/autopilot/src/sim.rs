//! Reference world: a tile level with doors, pickups and static hostiles.
//! This module exists so the autopilot can be exercised end to end without a game engine.
//! It does not render, and hostiles never move or shoot back.

use std::collections::{BTreeMap, BTreeSet};

use glam::Vec2;
use slotmap::SlotMap;

use crate::types::*;
use crate::world::{Hostile, LockKind, Passage, WorldQuery};

pub mod grid;
pub mod level;
mod physics;
pub mod scenario;

pub use grid::{Grid, TileKind};
pub use physics::{AVATAR_RADIUS, MOVE_SPEED};
pub use scenario::{Outcome, Scenario, TICK_SECONDS};

pub const HOSTILE_HP: i32 = 50;

#[derive(Clone, Debug)]
pub struct SimHostile {
    pub pos: Vec2,
    pub hp: i32,
}

#[derive(Clone, Debug)]
pub struct Pickup {
    pub pos: Vec2,
    pub weapon: Option<Weapon>,
    pub taken: bool,
}

/// A wall-mounted control that sets `flag` when used.
#[derive(Clone, Debug)]
pub struct Interactable {
    pub pos: Vec2,
    pub flag: String,
    pub requires: Option<Weapon>,
}

#[derive(Clone, Debug)]
pub struct SimWorld {
    pub grid: Grid,
    pub rooms: Vec<(RoomId, Rect)>,
    pub passages: SlotMap<PassageId, Passage>,
    pub passage_tiles: BTreeMap<Pos, PassageId>,
    pub hostiles: SlotMap<EntityId, SimHostile>,
    pub pickups: BTreeMap<String, Pickup>,
    pub interactables: BTreeMap<String, Interactable>,
    /// Floor tiles that set a flag when stepped on.
    pub triggers: BTreeMap<Pos, String>,
    pub flags: BTreeMap<String, bool>,
    pub inventory: BTreeSet<String>,
    pub weapons: BTreeSet<Weapon>,
    pub equipped: Weapon,
    pub avatar: AvatarView,
    pub fire_cooldown: f32,
    pub tick: u64,
}

impl SimWorld {
    pub fn new(grid: Grid, spawn: Vec2) -> Self {
        Self {
            grid,
            rooms: Vec::new(),
            passages: SlotMap::with_key(),
            passage_tiles: BTreeMap::new(),
            hostiles: SlotMap::with_key(),
            pickups: BTreeMap::new(),
            interactables: BTreeMap::new(),
            triggers: BTreeMap::new(),
            flags: BTreeMap::new(),
            inventory: BTreeSet::new(),
            weapons: BTreeSet::from([Weapon::Knife, Weapon::Pistol]),
            equipped: Weapon::Pistol,
            avatar: AvatarView { pos: spawn, heading: 0.0 },
            fire_cooldown: 0.0,
            tick: 0,
        }
    }

    pub fn avatar_view(&self) -> AvatarView {
        self.avatar
    }

    pub fn add_room(&mut self, room: RoomId, bounds: Rect) {
        self.rooms.push((room, bounds));
    }

    /// Registers a passage over `tiles`, marking them as passage tiles on the grid.
    pub fn add_passage(&mut self, tiles: Vec<Pos>, lock: LockKind) -> PassageId {
        for tile in &tiles {
            self.grid.set_tile(*tile, TileKind::Passage);
        }
        let covered = tiles.clone();
        let id = self.passages.insert(Passage::new(tiles, lock));
        for tile in covered {
            self.passage_tiles.insert(tile, id);
        }
        id
    }

    pub fn add_hostile(&mut self, pos: Vec2) -> EntityId {
        self.hostiles.insert(SimHostile { pos, hp: HOSTILE_HP })
    }

    pub fn add_pickup(&mut self, id: &str, pos: Vec2, weapon: Option<Weapon>) {
        self.pickups.insert(id.to_string(), Pickup { pos, weapon, taken: false });
    }

    pub fn add_interactable(&mut self, id: &str, pos: Vec2, flag: &str, requires: Option<Weapon>) {
        let control = Interactable { pos, flag: flag.to_string(), requires };
        self.interactables.insert(id.to_string(), control);
        self.flags.entry(flag.to_string()).or_insert(false);
    }

    pub fn add_trigger(&mut self, tile: Pos, flag: &str) {
        self.triggers.insert(tile, flag.to_string());
        self.flags.entry(flag.to_string()).or_insert(false);
    }

    /// Skips the opening animation; used to stage scenarios.
    pub fn open_passage_now(&mut self, id: PassageId) {
        if let Some(passage) = self.passages.get_mut(id) {
            passage.locked = false;
            passage.opening = false;
            passage.open = true;
            passage.progress = 1.0;
        }
    }

    /// Replaces a passage with an identical copy under a fresh handle, as a level reload would.
    pub fn rebuild_passage(&mut self, id: PassageId) -> Option<PassageId> {
        let passage = self.passages.remove(id)?;
        let tiles = passage.tiles.clone();
        let fresh = self.passages.insert(passage);
        for tile in tiles {
            self.passage_tiles.insert(tile, fresh);
        }
        Some(fresh)
    }

    pub fn take_pickup(&mut self, id: &str) {
        if let Some(pickup) = self.pickups.get_mut(id) {
            pickup.taken = true;
            self.inventory.insert(id.to_string());
            if let Some(weapon) = pickup.weapon {
                self.weapons.insert(weapon);
            }
        }
    }

    pub fn set_flag(&mut self, name: &str) {
        self.flags.insert(name.to_string(), true);
    }

    pub fn kill_hostiles_in(&mut self, room: RoomId) {
        let Some(bounds) = self.room_bounds(room) else {
            return;
        };
        for hostile in self.hostiles.values_mut() {
            if bounds.contains(hostile.pos) {
                hostile.hp = 0;
            }
        }
    }

    pub fn living_hostiles(&self) -> usize {
        self.hostiles.values().filter(|hostile| hostile.hp > 0).count()
    }
}

impl WorldQuery for SimWorld {
    fn room_id_at(&self, point: Vec2) -> Option<RoomId> {
        self.rooms.iter().find(|(_, bounds)| bounds.contains(point)).map(|(room, _)| *room)
    }

    fn room_bounds(&self, room: RoomId) -> Option<Rect> {
        self.rooms.iter().find(|(id, _)| *id == room).map(|(_, bounds)| *bounds)
    }

    fn passages(&self) -> &SlotMap<PassageId, Passage> {
        &self.passages
    }

    fn passage_at(&self, tile: Pos) -> Option<PassageId> {
        self.passage_tiles.get(&tile).copied().filter(|id| self.passages.contains_key(*id))
    }

    fn named_pickup_position(&self, id: &str) -> Option<Vec2> {
        self.pickups.get(id).map(|pickup| pickup.pos)
    }

    fn named_interactable_position(&self, id: &str) -> Option<Vec2> {
        self.interactables.get(id).map(|control| control.pos)
    }

    fn is_tile_walkable(&self, tile: Pos) -> bool {
        match self.grid.tile_at(tile) {
            TileKind::Floor => true,
            TileKind::Wall => false,
            TileKind::Passage => self
                .passage_at(tile)
                .and_then(|id| self.passages.get(id))
                .is_some_and(Passage::is_fully_open),
        }
    }

    fn has_line_of_sight(&self, a: Vec2, b: Vec2) -> bool {
        grid::has_direct_line_of_sight(
            |tile| self.is_tile_walkable(tile),
            Pos::of_point(a),
            Pos::of_point(b),
        )
    }

    fn hostiles(&self) -> Vec<Hostile> {
        self.hostiles
            .iter()
            .map(|(id, hostile)| Hostile { id, pos: hostile.pos, alive: hostile.hp > 0 })
            .collect()
    }

    fn hostile(&self, id: EntityId) -> Option<Hostile> {
        self.hostiles.get(id).map(|hostile| Hostile { id, pos: hostile.pos, alive: hostile.hp > 0 })
    }

    fn has_item(&self, id: &str) -> bool {
        self.inventory.contains(id)
    }

    fn flag(&self, name: &str) -> Option<bool> {
        self.flags.get(name).copied()
    }

    fn can_unlock(&self, passage: &Passage) -> bool {
        match &passage.lock {
            LockKind::None => true,
            LockKind::Key(item) => self.has_item(item),
            LockKind::Switch(flag) => self.flag(flag).unwrap_or(false),
        }
    }
}

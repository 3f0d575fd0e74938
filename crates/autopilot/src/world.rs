//! Read-side contract between the autopilot and the live world.
//! This module exists so the decision core never depends on a concrete level or renderer.
//! It does not own geometry construction, door animation, or damage resolution.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::types::*;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockKind {
    None,
    Key(String),
    Switch(String),
}

/// One physical opening (door or gate). Owned by the world, referenced by handle everywhere else.
#[derive(Clone, Debug, PartialEq)]
pub struct Passage {
    pub key: Pos,
    pub tiles: Vec<Pos>,
    pub center: Vec2,
    pub opening: bool,
    pub open: bool,
    pub progress: f32,
    pub locked: bool,
    pub lock: LockKind,
}

impl Passage {
    pub fn new(tiles: Vec<Pos>, lock: LockKind) -> Self {
        let key = tiles.first().copied().unwrap_or(Pos { y: 0, x: 0 });
        let center = if tiles.is_empty() {
            key.center()
        } else {
            tiles.iter().map(|tile| tile.center()).sum::<Vec2>() / tiles.len() as f32
        };
        let locked = lock != LockKind::None;
        Self { key, tiles, center, opening: false, open: false, progress: 0.0, locked, lock }
    }

    /// Fully open passages are permanently passable.
    pub fn is_fully_open(&self) -> bool {
        self.progress >= 1.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Hostile {
    pub id: EntityId,
    pub pos: Vec2,
    pub alive: bool,
}

pub trait WorldQuery {
    fn room_id_at(&self, point: Vec2) -> Option<RoomId>;

    fn room_bounds(&self, room: RoomId) -> Option<Rect>;

    fn passages(&self) -> &SlotMap<PassageId, Passage>;

    fn passage_at(&self, tile: Pos) -> Option<PassageId>;

    fn named_pickup_position(&self, id: &str) -> Option<Vec2>;

    fn named_interactable_position(&self, id: &str) -> Option<Vec2>;

    fn is_tile_walkable(&self, tile: Pos) -> bool;

    fn has_line_of_sight(&self, a: Vec2, b: Vec2) -> bool;

    fn hostiles(&self) -> Vec<Hostile>;

    fn hostile(&self, id: EntityId) -> Option<Hostile> {
        self.hostiles().into_iter().find(|hostile| hostile.id == id)
    }

    fn has_item(&self, id: &str) -> bool;

    /// `None` when the flag has never been initialized.
    fn flag(&self, name: &str) -> Option<bool>;

    /// Whether the avatar currently satisfies the passage's lock.
    fn can_unlock(&self, passage: &Passage) -> bool;
}

pub(crate) fn is_openable(world: &dyn WorldQuery, passage: &Passage) -> bool {
    !passage.is_fully_open() && (!passage.locked || world.can_unlock(passage))
}

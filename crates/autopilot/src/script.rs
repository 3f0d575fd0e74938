//! Declarative level scripts: the ordered objective list a route is built from.
//! This module exists so level data can live in JSON files and be validated before a run.
//! It does not resolve positions or evaluate progress; see `pilot::route` for that.

use std::collections::BTreeSet;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::types::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Pickup,
    Door,
    Gate,
    KeyDoor,
    Button,
    Waypoint,
    EnterRoom,
}

impl StepKind {
    pub fn is_passage(self) -> bool {
        matches!(self, StepKind::Door | StepKind::Gate | StepKind::KeyDoor)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepDescriptor {
    pub kind: StepKind,
    pub label: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub position: Option<Vec2>,
    #[serde(default)]
    pub offset: Option<Vec2>,
    /// Anchor room for pickups/buttons/enter-room, destination room for doors and gates.
    #[serde(default)]
    pub room: Option<RoomId>,
    /// Branch destinations for key doors.
    #[serde(default)]
    pub rooms: Vec<RoomId>,
    #[serde(default)]
    pub flag: Option<String>,
    #[serde(default)]
    pub weapon: Option<Weapon>,
    /// Tile key of the passage this step opens.
    #[serde(default)]
    pub door: Option<Pos>,
    /// Name of a registered predicate that replaces the synthesized one.
    #[serde(default)]
    pub custom: Option<String>,
}

impl StepDescriptor {
    pub fn new(kind: StepKind, label: &str) -> Self {
        Self {
            kind,
            label: label.to_string(),
            id: None,
            position: None,
            offset: None,
            room: None,
            rooms: Vec::new(),
            flag: None,
            weapon: None,
            door: None,
            custom: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn at(mut self, position: Vec2) -> Self {
        self.position = Some(position);
        self
    }

    pub fn offset(mut self, offset: Vec2) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn room(mut self, room: RoomId) -> Self {
        self.room = Some(room);
        self
    }

    pub fn rooms(mut self, rooms: &[RoomId]) -> Self {
        self.rooms = rooms.to_vec();
        self
    }

    pub fn flag(mut self, flag: &str) -> Self {
        self.flag = Some(flag.to_string());
        self
    }

    pub fn weapon(mut self, weapon: Weapon) -> Self {
        self.weapon = Some(weapon);
        self
    }

    pub fn door(mut self, door: Pos) -> Self {
        self.door = Some(door);
        self
    }

    pub fn custom(mut self, name: &str) -> Self {
        self.custom = Some(name.to_string());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LevelScript {
    pub name: String,
    /// Total forward order over rooms; later means further into the level.
    pub room_order: Vec<RoomId>,
    #[serde(default)]
    pub explore_room: Option<RoomId>,
    pub steps: Vec<StepDescriptor>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptError {
    EmptyRoomOrder,
    DuplicateRoom(RoomId),
    MissingPassageReference { step: usize },
    MissingDestinations { step: usize },
    MissingAnchor { step: usize },
    UnknownRoom { step: usize, room: RoomId },
}

impl LevelScript {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Room the explore fallback heads to: the declared room, else the second room in order.
    pub fn explore_target(&self) -> Option<RoomId> {
        self.explore_room.or_else(|| self.room_order.get(1).copied())
    }

    pub fn validate(&self) -> Result<(), ScriptError> {
        if self.room_order.is_empty() {
            return Err(ScriptError::EmptyRoomOrder);
        }
        let mut seen = BTreeSet::new();
        for room in &self.room_order {
            if !seen.insert(*room) {
                return Err(ScriptError::DuplicateRoom(*room));
            }
        }

        for (index, step) in self.steps.iter().enumerate() {
            for room in step.room.iter().chain(step.rooms.iter()) {
                if !seen.contains(room) {
                    return Err(ScriptError::UnknownRoom { step: index, room: *room });
                }
            }
            if step.custom.is_some() {
                continue;
            }
            match step.kind {
                StepKind::Door | StepKind::Gate | StepKind::KeyDoor
                    if step.door.is_none() && step.position.is_none() =>
                {
                    return Err(ScriptError::MissingPassageReference { step: index });
                }
                StepKind::KeyDoor if step.rooms.is_empty() => {
                    return Err(ScriptError::MissingDestinations { step: index });
                }
                StepKind::Pickup | StepKind::Button if step.id.is_none() => {
                    return Err(ScriptError::MissingAnchor { step: index });
                }
                StepKind::EnterRoom if step.room.is_none() => {
                    return Err(ScriptError::MissingAnchor { step: index });
                }
                StepKind::Waypoint if step.flag.is_none() && step.position.is_none() => {
                    return Err(ScriptError::MissingAnchor { step: index });
                }
                _ => {}
            }
        }
        Ok(())
    }
}

use glam::Vec2;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    pub struct EntityId;
    pub struct PassageId;
}

/// A tile coordinate on the navigation grid. One tile is one world unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub y: i32,
    pub x: i32,
}

impl Pos {
    pub fn of_point(point: Vec2) -> Self {
        Self { y: point.y.floor() as i32, x: point.x.floor() as i32 }
    }

    pub fn center(self) -> Vec2 {
        Vec2::new(self.x as f32 + 0.5, self.y as f32 + 0.5)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u16);

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    /// Builds the rectangle covering tiles `min..=max`.
    pub fn from_tiles(min: Pos, max: Pos) -> Self {
        Self {
            min: Vec2::new(min.x as f32, min.y as f32),
            max: Vec2::new(max.x as f32 + 1.0, max.y as f32 + 1.0),
        }
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x < self.max.x && point.y >= self.min.y && point.y < self.max.y
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weapon {
    Knife,
    Pistol,
    MachineGun,
    Chaingun,
}

impl Weapon {
    pub fn slot(self) -> u8 {
        match self {
            Weapon::Knife => 1,
            Weapon::Pistol => 2,
            Weapon::MachineGun => 3,
            Weapon::Chaingun => 4,
        }
    }
}

/// Where the controlled avatar is this tick. Heading is in radians, measured from +x toward +y.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AvatarView {
    pub pos: Vec2,
    pub heading: f32,
}

/// Synthetic input produced once per tick for the movement and interaction collaborators.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentInput {
    pub turn: f32,
    pub forward: bool,
    pub back: bool,
    pub strafe_left: bool,
    pub strafe_right: bool,
    pub fire: bool,
    pub interact: bool,
    pub weapon_request: Option<Weapon>,
}

impl AgentInput {
    pub fn is_idle(&self) -> bool {
        *self == AgentInput::default()
    }

    pub fn is_moving(&self) -> bool {
        self.forward || self.back || self.strafe_left || self.strafe_right
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalAction {
    Fire,
    Interact,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalKind {
    Enemy,
    Door,
    Waypoint,
    Interact,
}

/// What the agent is trying to do this tick. Recomputed from scratch every tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Goal {
    Enemy { id: EntityId, pos: Vec2 },
    Door { passage: PassageId, pos: Vec2, step: Option<usize> },
    Waypoint { pos: Vec2, step: Option<usize> },
    Interact { pos: Vec2, step: usize, weapon: Option<Weapon> },
}

impl Goal {
    pub fn kind(&self) -> GoalKind {
        match self {
            Goal::Enemy { .. } => GoalKind::Enemy,
            Goal::Door { .. } => GoalKind::Door,
            Goal::Waypoint { .. } => GoalKind::Waypoint,
            Goal::Interact { .. } => GoalKind::Interact,
        }
    }

    pub fn position(&self) -> Vec2 {
        match *self {
            Goal::Enemy { pos, .. }
            | Goal::Door { pos, .. }
            | Goal::Waypoint { pos, .. }
            | Goal::Interact { pos, .. } => pos,
        }
    }

    pub fn action(&self) -> Option<GoalAction> {
        match self {
            Goal::Enemy { .. } => Some(GoalAction::Fire),
            Goal::Door { .. } | Goal::Interact { .. } => Some(GoalAction::Interact),
            Goal::Waypoint { .. } => None,
        }
    }

    pub fn step(&self) -> Option<usize> {
        match *self {
            Goal::Enemy { .. } => None,
            Goal::Door { step, .. } | Goal::Waypoint { step, .. } => step,
            Goal::Interact { step, .. } => Some(step),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    PassageAlreadyOpen,
    PassageUnresolved,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TraceEvent {
    GoalChanged { kind: GoalKind, target: Pos, step: Option<usize> },
    GoalCleared,
    StepCompleted { step: usize },
    StepSkipped { step: usize, reason: SkipReason },
    PassageRelinked { step: usize, passage: PassageId },
    MemoryDropped { enemy: EntityId },
    RecoveryStarted { replan_count: u32 },
    RecoveryFinished,
}

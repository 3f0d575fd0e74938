//! Persistent per-agent memory and the short-lived path cache.

use std::collections::BTreeSet;

use glam::Vec2;

use crate::types::*;

/// Everything the autopilot remembers between ticks. Only reset explicitly.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AgentState {
    /// Simulated seconds since the session started.
    pub clock: f32,
    pub last_enemy: Option<EntityId>,
    pub last_enemy_time: f32,
    pub stuck_timer: f32,
    pub best_progress_distance: Option<f32>,
    pub progress_target: Option<Vec2>,
    pub null_path_timer: f32,
    /// Set while BACKING-UP; the maneuver ends once the clock passes it.
    pub backup_until: Option<f32>,
    pub replan_count: u32,
    pub visited_rooms: BTreeSet<RoomId>,
    pub last_room: Option<RoomId>,
    pub last_step: Option<usize>,
}

impl AgentState {
    pub fn is_backing_up(&self) -> bool {
        self.backup_until.is_some()
    }

    pub fn forget_enemy(&mut self) {
        self.last_enemy = None;
        self.last_enemy_time = 0.0;
    }

    pub(super) fn reset_progress(&mut self) {
        self.stuck_timer = 0.0;
        self.best_progress_distance = None;
        self.progress_target = None;
        self.null_path_timer = 0.0;
    }
}

/// Identity of whatever a cached path was computed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GoalKey {
    Step(usize),
    Enemy(EntityId),
    Fallback,
}

impl GoalKey {
    pub fn of(goal: &Goal) -> Self {
        match goal {
            Goal::Enemy { id, .. } => GoalKey::Enemy(*id),
            _ => goal.step().map_or(GoalKey::Fallback, GoalKey::Step),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PathCacheEntry {
    pub start: Pos,
    pub end: Pos,
    pub key: GoalKey,
    /// `None` records a failed search so it is not repeated every tick.
    pub path: Option<Vec<Pos>>,
    pub timestamp: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathCache {
    entry: Option<PathCacheEntry>,
}

impl PathCache {
    pub fn lookup(
        &self,
        start: Pos,
        end: Pos,
        key: GoalKey,
        now: f32,
        ttl: f32,
    ) -> Option<&PathCacheEntry> {
        self.entry.as_ref().filter(|entry| {
            entry.start == start
                && entry.end == end
                && entry.key == key
                && now - entry.timestamp < ttl
        })
    }

    pub fn store(&mut self, entry: PathCacheEntry) {
        self.entry = Some(entry);
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }

    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }
}

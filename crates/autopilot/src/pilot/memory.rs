//! Combat memory: keeps the agent committed to an enemy that briefly slips out of sight.

use glam::Vec2;

use super::*;
use crate::world::Hostile;

impl Autopilot {
    pub(super) fn remember_enemy(&mut self, id: EntityId) {
        self.state.last_enemy = Some(id);
        self.state.last_enemy_time = self.state.clock;
    }

    /// The remembered enemy, if it is still alive, in range and inside the grace window.
    /// Stale memory is cleared as a side effect.
    pub(super) fn remembered_threat(&mut self, world: &dyn WorldQuery, from: Vec2) -> Option<Hostile> {
        let id = self.state.last_enemy?;
        let fresh = self.state.clock - self.state.last_enemy_time <= self.config.memory_grace;
        let hostile = world.hostile(id).filter(|hostile| hostile.alive);
        match hostile {
            Some(hostile) if fresh => {
                (hostile.pos.distance(from) <= self.config.engagement_range).then_some(hostile)
            }
            _ => {
                self.state.forget_enemy();
                None
            }
        }
    }
}

/// Nearest living hostile within `range` that `from` can see. Ties keep the first reported.
pub(super) fn nearest_visible_hostile(world: &dyn WorldQuery, from: Vec2, range: f32) -> Option<Hostile> {
    let mut best: Option<(f32, Hostile)> = None;
    for hostile in world.hostiles() {
        if !hostile.alive {
            continue;
        }
        let distance = hostile.pos.distance(from);
        if distance > range || !world.has_line_of_sight(from, hostile.pos) {
            continue;
        }
        if best.is_none_or(|(closest, _)| distance < closest) {
            best = Some((distance, hostile));
        }
    }
    best.map(|(_, hostile)| hostile)
}

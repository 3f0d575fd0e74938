//! The per-tick autopilot decision loop.
//! This module wires goal selection, pathing, steering and stuck recovery together and owns
//! all state that survives between ticks.
//! It does not mutate the world; the produced `AgentInput` is applied by the caller.

use std::collections::{BTreeSet, VecDeque};
use std::hash::Hasher;

use glam::Vec2;
use tracing::debug;
use xxhash_rust::xxh3::Xxh3;

use crate::config::AutopilotConfig;
use crate::script::LevelScript;
use crate::types::*;
use crate::world::WorldQuery;

mod goal;
mod memory;
mod pathfinding;
mod recovery;
mod route;
mod state;
mod steering;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;

pub use pathfinding::{approach_tile, bfs_path, manhattan, neighbors};
pub use route::{
    Completion, CustomPredicate, CustomPredicates, PredicateContext, RoomOrder, Route, Step,
    build_route,
};
pub use state::{AgentState, GoalKey, PathCache, PathCacheEntry};

pub(crate) use route::nearest_walkable_point;

/// Development overlay data for the most recent tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Diagnostics {
    pub tick: u64,
    pub goal: Option<Goal>,
    pub active_step: Option<usize>,
    pub active_label: Option<String>,
    pub skipped: Vec<(usize, SkipReason)>,
    pub path_len: Option<usize>,
    pub backing_up: bool,
}

impl Diagnostics {
    pub fn summary(&self) -> String {
        let goal = match &self.goal {
            None => "idle".to_string(),
            Some(goal) => {
                let target = Pos::of_point(goal.position());
                format!("{:?} @ ({}, {})", goal.kind(), target.x, target.y)
            }
        };
        let step = match (self.active_step, &self.active_label) {
            (Some(index), Some(label)) => format!("#{index} {label}"),
            (Some(index), None) => format!("#{index}"),
            _ => "-".to_string(),
        };
        let mut line = format!("tick {} | {goal} | step {step}", self.tick);
        if let Some(len) = self.path_len {
            line.push_str(&format!(" | path {len}"));
        }
        for (index, reason) in &self.skipped {
            line.push_str(&format!(" | skip #{index} {reason:?}"));
        }
        if self.backing_up {
            line.push_str(" | backing up");
        }
        line
    }
}

#[derive(Clone)]
pub struct Autopilot {
    config: AutopilotConfig,
    script: LevelScript,
    predicates: CustomPredicates,
    route: Option<Route>,
    state: AgentState,
    cache: PathCache,
    diagnostics: Diagnostics,
    events: VecDeque<TraceEvent>,
    // Steps already reported as unresolvable, so the warning is logged once.
    warned_steps: BTreeSet<usize>,
    tick: u64,
}

impl Autopilot {
    pub fn new(script: LevelScript, config: AutopilotConfig) -> Self {
        Self {
            config,
            script,
            predicates: CustomPredicates::default(),
            route: None,
            state: AgentState::default(),
            cache: PathCache::default(),
            diagnostics: Diagnostics::default(),
            events: VecDeque::new(),
            warned_steps: BTreeSet::new(),
            tick: 0,
        }
    }

    pub fn with_predicates(mut self, predicates: CustomPredicates) -> Self {
        self.predicates = predicates;
        self.route = None;
        self
    }

    /// Forgets everything learned this session, including the built route.
    pub fn reset(&mut self) {
        self.route = None;
        self.state = AgentState::default();
        self.cache.clear();
        self.diagnostics = Diagnostics::default();
        self.events.clear();
        self.warned_steps.clear();
        self.tick = 0;
    }

    /// Runs one decision pass. Flags start neutral every tick.
    pub fn tick(&mut self, world: &dyn WorldQuery, avatar: AvatarView, dt: f32) -> AgentInput {
        self.tick += 1;
        self.state.clock += dt;
        if self.route.is_none() {
            self.route = Some(build_route(&self.script, world, &self.predicates));
        }
        self.observe_room(world, avatar.pos);

        let selection = self.select_goal(world, avatar);
        self.track_active_step(selection.active_step);
        self.track_goal(selection.goal, selection.active_step);

        let active_label = selection
            .active_step
            .and_then(|index| self.route.as_ref().and_then(|route| route.steps.get(index)))
            .map(|step| step.label.clone());
        let mut diagnostics = Diagnostics {
            tick: self.tick,
            goal: selection.goal,
            active_step: selection.active_step,
            active_label,
            skipped: selection.skipped,
            path_len: None,
            backing_up: false,
        };

        let input = match selection.goal {
            None => {
                self.stand_down();
                AgentInput::default()
            }
            Some(goal @ Goal::Enemy { .. }) => self.steer_combat(world, avatar, goal, dt, &mut diagnostics),
            Some(goal) => self.steer_navigation(world, avatar, goal, dt, &mut diagnostics),
        };
        diagnostics.backing_up = self.state.is_backing_up();
        self.diagnostics = diagnostics;
        input
    }

    pub fn config(&self) -> &AutopilotConfig {
        &self.config
    }

    pub fn script(&self) -> &LevelScript {
        &self.script
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    /// Scenario setup hook, e.g. to mark rooms as already visited.
    pub fn state_mut(&mut self) -> &mut AgentState {
        &mut self.state
    }

    pub fn path_cache(&self) -> &PathCache {
        &self.cache
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn events(&self) -> impl Iterator<Item = &TraceEvent> {
        self.events.iter()
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    fn observe_room(&mut self, world: &dyn WorldQuery, pos: Vec2) {
        if let Some(room) = world.room_id_at(pos) {
            self.state.visited_rooms.insert(room);
            self.state.last_room = Some(room);
        }
    }

    /// Room used for progress checks; doorways belong to the room last stood in.
    fn current_room(&self, world: &dyn WorldQuery, pos: Vec2) -> Option<RoomId> {
        world.room_id_at(pos).or(self.state.last_room)
    }

    fn track_active_step(&mut self, active: Option<usize>) {
        let previous = self.state.last_step;
        if previous == active {
            return;
        }
        self.cache.clear();
        if let Some(done) = previous
            && active.is_none_or(|next| next > done)
        {
            self.push_event(TraceEvent::StepCompleted { step: done });
        }
        debug!(from = ?previous, to = ?active, "active route step changed");
        self.state.last_step = active;
    }

    fn track_goal(&mut self, goal: Option<Goal>, active: Option<usize>) {
        let previous = self.diagnostics.goal;
        let changed = match (previous, goal) {
            (None, None) => false,
            (Some(before), Some(after)) => {
                before.kind() != after.kind()
                    || before.step() != after.step()
                    || Pos::of_point(before.position()) != Pos::of_point(after.position())
            }
            _ => true,
        };
        if !changed {
            return;
        }
        match goal {
            Some(goal) => {
                let target = Pos::of_point(goal.position());
                debug!(kind = ?goal.kind(), x = target.x, y = target.y, step = ?active, "goal changed");
                self.push_event(TraceEvent::GoalChanged { kind: goal.kind(), target, step: goal.step() });
            }
            None => {
                debug!("goal cleared");
                self.push_event(TraceEvent::GoalCleared);
            }
        }
    }

    fn stand_down(&mut self) {
        if self.state.is_backing_up() {
            self.push_event(TraceEvent::RecoveryFinished);
        }
        self.state.backup_until = None;
        self.state.reset_progress();
    }

    fn push_event(&mut self, event: TraceEvent) {
        self.events.push_back(event);
        while self.events.len() > self.config.event_log_capacity {
            self.events.pop_front();
        }
    }

    fn cached_path(
        &mut self,
        world: &dyn WorldQuery,
        start: Pos,
        end: Pos,
        key: GoalKey,
    ) -> Option<Vec<Pos>> {
        let now = self.state.clock;
        if let Some(entry) = self.cache.lookup(start, end, key, now, self.config.path_ttl) {
            return entry.path.clone();
        }
        let path = bfs_path(world, start, end, self.config.max_bfs_expansions);
        self.cache.store(PathCacheEntry { start, end, key, path: path.clone(), timestamp: now });
        path
    }
}

/// Stable fingerprint of one tick's decision, used by determinism checks.
pub fn decision_hash(input: &AgentInput, goal: Option<&Goal>) -> u64 {
    let mut hasher = Xxh3::new();
    hasher.write_u32(input.turn.to_bits());
    let flags = [
        input.forward,
        input.back,
        input.strafe_left,
        input.strafe_right,
        input.fire,
        input.interact,
    ];
    for flag in flags {
        hasher.write_u8(u8::from(flag));
    }
    hasher.write_u8(input.weapon_request.map_or(0, Weapon::slot));
    if let Some(goal) = goal {
        hasher.write_u8(goal.kind() as u8 + 1);
        hasher.write_u32(goal.position().x.to_bits());
        hasher.write_u32(goal.position().y.to_bits());
    }
    hasher.finish()
}

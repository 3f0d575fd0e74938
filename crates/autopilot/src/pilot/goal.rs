//! Goal selection. Priority each tick: visible enemy, remembered enemy, active route step,
//! then the start-room fallback.

use tracing::warn;

use super::memory::nearest_visible_hostile;
use super::*;
use crate::script::StepKind;
use crate::world::{Passage, is_openable};

pub(super) struct Selection {
    pub goal: Option<Goal>,
    pub active_step: Option<usize>,
    pub skipped: Vec<(usize, SkipReason)>,
}

enum PassageLookup {
    Linked,
    Relinked(PassageId),
    Missing,
}

impl Autopilot {
    pub(super) fn select_goal(&mut self, world: &dyn WorldQuery, avatar: AvatarView) -> Selection {
        let (active_step, skipped) = self.scan_route(world, avatar.pos);
        let mut selection = Selection { goal: None, active_step, skipped };

        if let Some(hostile) = nearest_visible_hostile(world, avatar.pos, self.config.engagement_range) {
            self.remember_enemy(hostile.id);
            selection.goal = Some(Goal::Enemy { id: hostile.id, pos: hostile.pos });
            return selection;
        }

        if let Some(hostile) = self.remembered_threat(world, avatar.pos) {
            if self.active_step_is_closed_passage(world, active_step) {
                // An unseen enemy must not pin the agent in front of the door it needs.
                self.state.forget_enemy();
                self.push_event(TraceEvent::MemoryDropped { enemy: hostile.id });
            } else {
                selection.goal = Some(Goal::Enemy { id: hostile.id, pos: hostile.pos });
                return selection;
            }
        }

        selection.goal = match active_step {
            Some(index) => self.goal_for_step(world, index),
            None => self.fallback_goal(world, avatar.pos),
        };
        selection
    }

    /// Finds the first incomplete step, re-resolving passage handles along the way.
    fn scan_route(
        &mut self,
        world: &dyn WorldQuery,
        pos: Vec2,
    ) -> (Option<usize>, Vec<(usize, SkipReason)>) {
        let current_room = self.current_room(world, pos);
        let mut skipped = Vec::new();
        let mut events = Vec::new();
        let mut active = None;

        let Some(route) = self.route.as_mut() else {
            return (None, skipped);
        };
        for index in 0..route.steps.len() {
            if route.steps[index].kind.is_passage() {
                match resolve_passage(world, &route.steps[index]) {
                    PassageLookup::Linked => {}
                    PassageLookup::Relinked(passage) => {
                        route.steps[index].link_passage(passage);
                        events.push(TraceEvent::PassageRelinked { step: index, passage });
                    }
                    PassageLookup::Missing => {
                        skipped.push((index, SkipReason::PassageUnresolved));
                        if self.warned_steps.insert(index) {
                            warn!(step = index, label = %route.steps[index].label, "no passage matches this step");
                            events.push(TraceEvent::StepSkipped {
                                step: index,
                                reason: SkipReason::PassageUnresolved,
                            });
                        }
                        continue;
                    }
                }
            }

            let step = &route.steps[index];
            let ctx = PredicateContext { world, state: &self.state, order: &route.order, current_room };
            if step.completion.is_met(&ctx, &self.predicates) {
                continue;
            }
            if step.kind.is_passage()
                && step
                    .passage
                    .and_then(|id| world.passages().get(id))
                    .is_some_and(Passage::is_fully_open)
            {
                skipped.push((index, SkipReason::PassageAlreadyOpen));
                continue;
            }
            active = Some(index);
            break;
        }

        for event in events {
            self.push_event(event);
        }
        (active, skipped)
    }

    fn active_step_is_closed_passage(&self, world: &dyn WorldQuery, active: Option<usize>) -> bool {
        let Some(step) = active.and_then(|index| self.route.as_ref()?.steps.get(index)) else {
            return false;
        };
        step.kind.is_passage()
            && step
                .passage
                .and_then(|id| world.passages().get(id))
                .is_some_and(|passage| !passage.is_fully_open())
    }

    fn goal_for_step(&self, world: &dyn WorldQuery, index: usize) -> Option<Goal> {
        let step = self.route.as_ref()?.steps.get(index)?;
        match step.kind {
            StepKind::Door | StepKind::Gate | StepKind::KeyDoor => {
                let passage = step.passage?;
                let center = world.passages().get(passage)?.center;
                Some(Goal::Door { passage, pos: center, step: Some(index) })
            }
            StepKind::Button => {
                Some(Goal::Interact { pos: step.position, step: index, weapon: step.weapon })
            }
            StepKind::Pickup | StepKind::Waypoint | StepKind::EnterRoom => {
                Some(Goal::Waypoint { pos: step.position, step: Some(index) })
            }
        }
    }

    /// Only used while still in the start room: open the nearest reachable door, else explore.
    fn fallback_goal(&self, world: &dyn WorldQuery, pos: Vec2) -> Option<Goal> {
        let route = self.route.as_ref()?;
        let start = route.start_room()?;
        if self.current_room(world, pos) != Some(start) {
            return None;
        }

        let mut nearest: Option<(f32, PassageId, Vec2)> = None;
        for (id, passage) in world.passages() {
            if !is_openable(world, passage) {
                continue;
            }
            let distance = passage.center.distance(pos);
            if distance > self.config.fallback_door_radius {
                continue;
            }
            if nearest.is_none_or(|(closest, _, _)| distance < closest) {
                nearest = Some((distance, id, passage.center));
            }
        }
        if let Some((_, passage, center)) = nearest {
            return Some(Goal::Door { passage, pos: center, step: None });
        }

        let bounds = world.room_bounds(route.explore_room?)?;
        Some(Goal::Waypoint { pos: nearest_walkable_point(world, bounds.center()), step: None })
    }
}

/// Passages this much further away than the nearest one still count as tied with it.
const RELINK_TIE_RADIUS: f32 = 1.5;

fn resolve_passage(world: &dyn WorldQuery, step: &Step) -> PassageLookup {
    if step.passage.is_some_and(|id| world.passages().contains_key(id)) {
        return PassageLookup::Linked;
    }
    if let Some(id) = step.door_key.and_then(|key| world.passage_at(key)) {
        return PassageLookup::Relinked(id);
    }
    // Nearest passage to the declared position. A closed one only wins a near tie.
    let candidates: Vec<(PassageId, f32, bool)> = world
        .passages()
        .iter()
        .map(|(id, passage)| (id, passage.center.distance(step.position), passage.is_fully_open()))
        .collect();
    let Some(nearest) = candidates.iter().map(|(_, distance, _)| *distance).min_by(f32::total_cmp)
    else {
        return PassageLookup::Missing;
    };
    candidates
        .into_iter()
        .filter(|(_, distance, _)| *distance <= nearest + RELINK_TIE_RADIUS)
        .min_by(|a, b| a.2.cmp(&b.2).then(a.1.total_cmp(&b.1)))
        .map_or(PassageLookup::Missing, |(id, _, _)| PassageLookup::Relinked(id))
}

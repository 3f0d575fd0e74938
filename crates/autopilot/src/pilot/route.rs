//! Route construction and completion-predicate evaluation.
//! This module exists to turn a declarative level script into steps with resolved positions
//! and inspectable completion predicates.
//! It does not pick goals or track which step is active; see `goal` for that.

use std::collections::BTreeMap;
use std::rc::Rc;

use glam::Vec2;
use tracing::warn;

use super::state::AgentState;
use crate::script::{LevelScript, StepDescriptor, StepKind};
use crate::types::*;
use crate::world::WorldQuery;

/// Inputs every predicate is evaluated against.
pub struct PredicateContext<'a> {
    pub world: &'a dyn WorldQuery,
    pub state: &'a AgentState,
    pub order: &'a RoomOrder,
    pub current_room: Option<RoomId>,
}

pub type CustomPredicate = Rc<dyn Fn(&PredicateContext<'_>) -> Option<bool>>;

/// Caller-registered predicates, referenced from level scripts by name.
#[derive(Clone, Default)]
pub struct CustomPredicates {
    by_name: BTreeMap<String, CustomPredicate>,
}

impl CustomPredicates {
    pub fn register<F>(&mut self, name: &str, predicate: F)
    where
        F: Fn(&PredicateContext<'_>) -> Option<bool> + 'static,
    {
        self.by_name.insert(name.to_string(), Rc::new(predicate));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<&CustomPredicate> {
        self.by_name.get(name)
    }
}

/// Total forward order over rooms.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoomOrder {
    rooms: Vec<RoomId>,
}

impl RoomOrder {
    pub fn new(rooms: Vec<RoomId>) -> Self {
        Self { rooms }
    }

    pub fn index_of(&self, room: RoomId) -> Option<usize> {
        self.rooms.iter().position(|candidate| *candidate == room)
    }

    pub fn first(&self) -> Option<RoomId> {
        self.rooms.first().copied()
    }

    /// Whether `room` lies strictly further into the level than `anchor`.
    pub fn is_past(&self, room: RoomId, anchor: RoomId) -> bool {
        matches!((self.index_of(room), self.index_of(anchor)), (Some(a), Some(b)) if a > b)
    }

    pub fn is_in_or_past(&self, room: RoomId, anchor: RoomId) -> bool {
        room == anchor || self.is_past(room, anchor)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Completion {
    OwnsItem(String),
    PassageOpen(PassageId),
    InOrPastRoom(RoomId),
    PastRoom(RoomId),
    FlagSet(String),
    RoomVisited(RoomId),
    Custom(String),
    Any(Vec<Completion>),
}

impl Completion {
    pub fn is_met(&self, ctx: &PredicateContext<'_>, predicates: &CustomPredicates) -> bool {
        match self {
            Completion::OwnsItem(id) => ctx.world.has_item(id),
            Completion::PassageOpen(passage) => {
                ctx.world.passages().get(*passage).is_some_and(|passage| passage.is_fully_open())
            }
            Completion::InOrPastRoom(room) => {
                ctx.current_room.is_some_and(|current| ctx.order.is_in_or_past(current, *room))
            }
            Completion::PastRoom(room) => {
                ctx.current_room.is_some_and(|current| ctx.order.is_past(current, *room))
            }
            Completion::FlagSet(name) => ctx.world.flag(name).unwrap_or(false),
            Completion::RoomVisited(room) => ctx.state.visited_rooms.contains(room),
            Completion::Custom(name) => {
                predicates.get(name).and_then(|predicate| predicate(ctx)).unwrap_or(false)
            }
            Completion::Any(options) => options.iter().any(|option| option.is_met(ctx, predicates)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub kind: StepKind,
    pub label: String,
    pub position: Vec2,
    pub completion: Completion,
    pub passage: Option<PassageId>,
    pub door_key: Option<Pos>,
    pub weapon: Option<Weapon>,
}

impl Step {
    /// Points this step at `passage`, replacing any stale open-check in its predicate.
    pub(super) fn link_passage(&mut self, passage: PassageId) {
        self.passage = Some(passage);
        if let Completion::Any(options) = &mut self.completion {
            options.retain(|option| !matches!(option, Completion::PassageOpen(_)));
            options.insert(0, Completion::PassageOpen(passage));
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    pub steps: Vec<Step>,
    pub order: RoomOrder,
    pub explore_room: Option<RoomId>,
}

impl Route {
    pub fn start_room(&self) -> Option<RoomId> {
        self.order.first()
    }
}

pub fn build_route(
    script: &LevelScript,
    world: &dyn WorldQuery,
    predicates: &CustomPredicates,
) -> Route {
    let steps = script
        .steps
        .iter()
        .map(|descriptor| build_step(descriptor, world, predicates))
        .collect();
    Route {
        steps,
        order: RoomOrder::new(script.room_order.clone()),
        explore_room: script.explore_target(),
    }
}

fn build_step(
    descriptor: &StepDescriptor,
    world: &dyn WorldQuery,
    predicates: &CustomPredicates,
) -> Step {
    let passage = descriptor.door.and_then(|key| world.passage_at(key));
    let completion = match &descriptor.custom {
        Some(name) => {
            if !predicates.contains(name) {
                warn!(step = %descriptor.label, predicate = %name, "custom predicate is not registered");
            }
            Completion::Custom(name.clone())
        }
        None => synthesize_completion(descriptor, passage),
    };
    Step {
        kind: descriptor.kind,
        label: descriptor.label.clone(),
        position: resolve_position(descriptor, world),
        completion,
        passage,
        door_key: descriptor.door,
        weapon: descriptor.weapon,
    }
}

fn synthesize_completion(descriptor: &StepDescriptor, passage: Option<PassageId>) -> Completion {
    let mut options = Vec::new();
    match descriptor.kind {
        StepKind::Pickup => {
            if let Some(id) = &descriptor.id {
                options.push(Completion::OwnsItem(id.clone()));
            }
            if let Some(room) = descriptor.room {
                options.push(Completion::PastRoom(room));
            }
        }
        StepKind::Door | StepKind::Gate => {
            options.extend(passage.map(Completion::PassageOpen));
            options.extend(descriptor.room.map(Completion::InOrPastRoom));
        }
        StepKind::KeyDoor => {
            options.extend(passage.map(Completion::PassageOpen));
            options.extend(descriptor.rooms.iter().copied().map(Completion::InOrPastRoom));
            options.extend(descriptor.room.map(Completion::InOrPastRoom));
        }
        StepKind::Button => {
            options.extend(descriptor.flag.clone().map(Completion::FlagSet));
            options.extend(descriptor.room.map(Completion::PastRoom));
        }
        StepKind::Waypoint => match (&descriptor.flag, descriptor.room) {
            (Some(flag), _) => options.push(Completion::FlagSet(flag.clone())),
            (None, Some(room)) => options.push(Completion::InOrPastRoom(room)),
            (None, None) => {}
        },
        StepKind::EnterRoom => {
            if let Some(room) = descriptor.room {
                options.push(Completion::RoomVisited(room));
                options.push(Completion::PastRoom(room));
            }
        }
    }
    Completion::Any(options)
}

fn is_room_anchored(descriptor: &StepDescriptor) -> bool {
    matches!(descriptor.kind, StepKind::EnterRoom | StepKind::Waypoint) && descriptor.room.is_some()
}

fn resolve_position(descriptor: &StepDescriptor, world: &dyn WorldQuery) -> Vec2 {
    let needs_floor = matches!(descriptor.kind, StepKind::EnterRoom | StepKind::Waypoint);

    if let Some(position) = descriptor.position
        && descriptor.room.is_none()
    {
        return if needs_floor { nearest_walkable_point(world, position) } else { position };
    }
    if let Some(id) = &descriptor.id
        && let Some(position) =
            world.named_pickup_position(id).or_else(|| world.named_interactable_position(id))
    {
        return position;
    }
    if is_room_anchored(descriptor)
        && let Some(bounds) = descriptor.room.and_then(|room| world.room_bounds(room))
    {
        let anchor = bounds.center() + descriptor.offset.unwrap_or(Vec2::ZERO);
        return nearest_walkable_point(world, anchor);
    }
    if let Some(position) = descriptor.position {
        return if needs_floor { nearest_walkable_point(world, position) } else { position };
    }
    descriptor.door.map_or(Vec2::ZERO, Pos::center)
}

const NUDGE_RADIUS: i32 = 4;

/// Keeps `point` when its tile is walkable, else snaps to the closest walkable tile center nearby.
pub(crate) fn nearest_walkable_point(world: &dyn WorldQuery, point: Vec2) -> Vec2 {
    let origin = Pos::of_point(point);
    if world.is_tile_walkable(origin) {
        return point;
    }
    for radius in 1..=NUDGE_RADIUS {
        let mut best: Option<(f32, Pos)> = None;
        for y in (origin.y - radius)..=(origin.y + radius) {
            for x in (origin.x - radius)..=(origin.x + radius) {
                if (y - origin.y).abs() != radius && (x - origin.x).abs() != radius {
                    continue;
                }
                let tile = Pos { y, x };
                if !world.is_tile_walkable(tile) {
                    continue;
                }
                let dist = tile.center().distance_squared(point);
                if best.is_none_or(|(best_dist, _)| dist < best_dist) {
                    best = Some((dist, tile));
                }
            }
        }
        if let Some((_, tile)) = best {
            return tile.center();
        }
    }
    point
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pilot::test_support::*;
    use crate::sim::level;

    #[test]
    fn door_steps_link_the_passage_at_their_key_tile() {
        let world = level::demo_world();
        let route = build_route(&level::demo_script(), &world, &CustomPredicates::default());
        let door = &route.steps[0];
        let expected = world.passage_at(Pos { y: 3, x: 8 });
        assert!(expected.is_some());
        assert_eq!(door.passage, expected);
        assert!(matches!(
            &door.completion,
            Completion::Any(options) if options[0] == Completion::PassageOpen(expected.unwrap())
        ));
    }

    #[test]
    fn positions_resolve_from_named_lookups_and_room_centers() {
        let world = level::demo_world();
        let route = build_route(&level::demo_script(), &world, &CustomPredicates::default());
        let button = route.steps.iter().find(|step| step.kind == StepKind::Button).unwrap();
        assert_eq!(button.position, Pos { y: 0, x: 12 }.center());

        let enter = route.steps.iter().find(|step| step.kind == StepKind::EnterRoom).unwrap();
        let bounds = world.room_bounds(RoomId(2)).unwrap();
        assert_eq!(enter.position, bounds.center());
    }

    #[test]
    fn waypoint_inside_a_wall_is_nudged_to_floor() {
        let world = corridor_world();
        let script = LevelScript {
            name: "nudge".to_string(),
            room_order: vec![RoomId(1)],
            explore_room: None,
            steps: vec![
                StepDescriptor::new(StepKind::Waypoint, "in the wall")
                    .at(Vec2::new(4.5, 1.5))
                    .flag("never"),
            ],
        };
        let route = build_route(&script, &world, &CustomPredicates::default());
        let position = route.steps[0].position;
        assert!(world.is_tile_walkable(Pos::of_point(position)));
        assert_eq!(position, Pos { y: 2, x: 4 }.center());
    }

    #[test]
    fn missing_flags_and_unknown_custom_predicates_are_not_complete() {
        let world = corridor_world();
        let state = AgentState::default();
        let order = RoomOrder::new(vec![RoomId(1)]);
        let ctx = PredicateContext { world: &world, state: &state, order: &order, current_room: None };
        let predicates = CustomPredicates::default();
        assert!(!Completion::FlagSet("uninitialized".to_string()).is_met(&ctx, &predicates));
        assert!(!Completion::Custom("unregistered".to_string()).is_met(&ctx, &predicates));
        assert!(!Completion::Any(vec![]).is_met(&ctx, &predicates));
    }

    #[test]
    fn custom_predicate_overrides_and_none_means_incomplete() {
        let world = corridor_world();
        let state = AgentState::default();
        let order = RoomOrder::new(vec![RoomId(1)]);
        let ctx = PredicateContext { world: &world, state: &state, order: &order, current_room: None };
        let mut predicates = CustomPredicates::default();
        predicates.register("yes", |_| Some(true));
        predicates.register("broken", |ctx| ctx.world.flag("missing").map(|flag| !flag));
        assert!(Completion::Custom("yes".to_string()).is_met(&ctx, &predicates));
        assert!(!Completion::Custom("broken".to_string()).is_met(&ctx, &predicates));
    }

    #[test]
    fn past_room_follows_the_forward_order() {
        let order = RoomOrder::new(vec![RoomId(3), RoomId(1), RoomId(2)]);
        assert!(order.is_past(RoomId(2), RoomId(1)));
        assert!(order.is_past(RoomId(1), RoomId(3)));
        assert!(!order.is_past(RoomId(3), RoomId(2)));
        assert!(!order.is_past(RoomId(1), RoomId(1)));
        assert!(order.is_in_or_past(RoomId(1), RoomId(1)));
        assert!(!order.is_past(RoomId(9), RoomId(1)));
    }

    #[test]
    fn key_door_is_met_from_any_of_its_destination_rooms() {
        let world = level::demo_world();
        let route = build_route(&level::demo_script(), &world, &CustomPredicates::default());
        let gold_door = &route.steps[6];
        assert_eq!(gold_door.kind, StepKind::KeyDoor);
        let passage = gold_door.passage.unwrap();
        assert!(!world.passages()[passage].is_fully_open());

        let state = AgentState::default();
        let predicates = CustomPredicates::default();
        let met_from = |room: RoomId| {
            let ctx = PredicateContext {
                world: &world,
                state: &state,
                order: &route.order,
                current_room: Some(room),
            };
            gold_door.completion.is_met(&ctx, &predicates)
        };
        assert!(met_from(RoomId(5)));
        assert!(met_from(RoomId(4)));
        assert!(!met_from(RoomId(3)));
    }

    #[test]
    fn visited_room_stays_complete_after_returning_to_an_earlier_room() {
        let world = level::demo_world();
        let route = build_route(&level::demo_script(), &world, &CustomPredicates::default());
        let hall = &route.steps[1];
        assert_eq!(hall.kind, StepKind::EnterRoom);

        let mut state = AgentState::default();
        state.visited_rooms.insert(RoomId(2));
        let ctx = PredicateContext {
            world: &world,
            state: &state,
            order: &route.order,
            current_room: Some(RoomId(1)),
        };
        assert!(hall.completion.is_met(&ctx, &CustomPredicates::default()));
    }

    #[test]
    fn relinking_replaces_a_stale_open_check() {
        let mut world = level::demo_world();
        let mut route = build_route(&level::demo_script(), &world, &CustomPredicates::default());
        let gate = world.passage_at(Pos { y: 3, x: 16 }).unwrap();
        route.steps[0].link_passage(gate);
        assert_eq!(route.steps[0].passage, Some(gate));
        let Completion::Any(options) = &route.steps[0].completion else {
            panic!("door completion should be a disjunction");
        };
        let open_checks =
            options.iter().filter(|option| matches!(option, Completion::PassageOpen(_))).count();
        assert_eq!(open_checks, 1);
        assert_eq!(options[0], Completion::PassageOpen(gate));

        world.open_passage_now(gate);
        let state = AgentState::default();
        let ctx = PredicateContext {
            world: &world,
            state: &state,
            order: &route.order,
            current_room: Some(RoomId(1)),
        };
        assert!(route.steps[0].completion.is_met(&ctx, &CustomPredicates::default()));
    }
}

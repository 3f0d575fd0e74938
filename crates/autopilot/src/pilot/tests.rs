use std::f32::consts::FRAC_PI_2;

use super::test_support::*;
use super::*;
use crate::sim::{Scenario, SimWorld, TileKind, level};

fn demo_pilot() -> Autopilot {
    Autopilot::new(level::demo_script(), AutopilotConfig::default())
}

fn open_first_door(world: &mut SimWorld) -> PassageId {
    let door = world.passage_at(Pos { y: 3, x: 8 }).unwrap();
    world.open_passage_now(door);
    door
}

#[test]
fn corridor_waypoint_is_reached_then_pilot_goes_idle() {
    let mut world = corridor_world();
    let mut pilot = Autopilot::new(corridor_script(), AutopilotConfig::default());
    let ticks = drive(&mut pilot, &mut world, 600, |world| world.flag("corridor_end") == Some(true));
    assert!(ticks.is_some_and(|ticks| ticks < 300), "took {ticks:?} ticks");

    let input = pilot.tick(&world, world.avatar_view(), DT);
    assert_eq!(pilot.diagnostics().goal, None);
    assert_eq!(pilot.diagnostics().active_step, None);
    assert!(input.is_idle());
    assert!(pilot.events().any(|event| *event == TraceEvent::StepCompleted { step: 0 }));
}

#[test]
fn waypoint_ahead_means_forward_without_turning() {
    let world = corridor_world();
    let mut pilot = Autopilot::new(corridor_script(), AutopilotConfig::default());
    let input = pilot.tick(&world, view(1.5, 2.5, 0.0), DT);
    assert!(input.forward);
    assert!(!input.back && !input.strafe_left && !input.strafe_right);
    assert_eq!(input.turn, 0.0);
    assert!(!input.fire && !input.interact);
    assert_eq!(pilot.diagnostics().path_len, Some(8));
}

#[test]
fn remembered_enemy_survives_brief_occlusion_then_expires() {
    let mut world = pillar_world();
    let hostile = world.add_hostile(Pos { y: 2, x: 7 }.center());
    let mut pilot = Autopilot::new(endless_script(Vec2::new(8.5, 1.5)), AutopilotConfig::default());

    pilot.tick(&world, view(4.5, 1.5, 0.0), DT);
    assert!(matches!(pilot.diagnostics().goal, Some(Goal::Enemy { id, .. }) if id == hostile));

    let hidden = view(2.5, 2.5, 0.0);
    assert!(!world.has_line_of_sight(hidden.pos, world.hostiles[hostile].pos));
    pilot.tick(&world, hidden, DT);
    assert!(
        matches!(pilot.diagnostics().goal, Some(Goal::Enemy { id, .. }) if id == hostile),
        "still committed inside the grace window"
    );

    pilot.tick(&world, hidden, 1.0);
    assert!(matches!(pilot.diagnostics().goal, Some(Goal::Waypoint { step: Some(0), .. })));
    assert_eq!(pilot.state().last_enemy, None);
}

#[test]
fn closed_door_step_overrides_a_remembered_enemy_in_the_same_tick() {
    let mut world = level::demo_world();
    let door = open_first_door(&mut world);
    let mut pilot = demo_pilot();
    let avatar = view(6.5, 3.5, 0.0);
    pilot.tick(&world, avatar, DT);
    let Some(Goal::Enemy { id: enemy, .. }) = pilot.diagnostics().goal else {
        panic!("expected the room-two hostile to be engaged");
    };

    let passage = &mut world.passages[door];
    passage.progress = 0.0;
    passage.open = false;
    pilot.tick(&world, avatar, DT);

    assert!(matches!(
        pilot.diagnostics().goal,
        Some(Goal::Door { passage, step: Some(0), .. }) if passage == door
    ));
    assert!(pilot.events().any(|event| *event == TraceEvent::MemoryDropped { enemy }));
    assert_eq!(pilot.state().last_enemy, None);
}

#[test]
fn dead_enemies_are_never_targeted() {
    let mut world = level::demo_world();
    open_first_door(&mut world);
    let mut pilot = demo_pilot();
    let avatar = view(6.5, 3.5, 0.0);
    pilot.tick(&world, avatar, DT);
    let Some(Goal::Enemy { id: first, .. }) = pilot.diagnostics().goal else {
        panic!("expected an enemy goal");
    };

    world.hostiles[first].hp = 0;
    pilot.tick(&world, avatar, DT);
    match pilot.diagnostics().goal {
        Some(Goal::Enemy { id, .. }) => {
            assert_ne!(id, first);
            assert!(world.hostiles[id].hp > 0);
        }
        other => panic!("the second hostile is still visible, got {other:?}"),
    }
}

#[test]
fn fires_only_when_aimed_with_line_of_sight() {
    let mut world = level::demo_world();
    open_first_door(&mut world);
    let mut pilot = demo_pilot();

    let aimed = pilot.tick(&world, view(10.5, 2.5, 0.0), DT);
    assert!(aimed.fire);

    let mut pilot = demo_pilot();
    let looking_away = pilot.tick(&world, view(10.5, 2.5, FRAC_PI_2), DT);
    assert!(!looking_away.fire);
    assert!(looking_away.turn < 0.0, "turns back toward the enemy");
}

#[test]
fn too_close_backs_off_while_firing() {
    let mut world = level::demo_world();
    open_first_door(&mut world);
    let mut pilot = demo_pilot();
    let input = pilot.tick(&world, view(12.8, 2.5, 0.0), DT);
    assert!(matches!(pilot.diagnostics().goal, Some(Goal::Enemy { .. })));
    assert!(input.back && !input.forward);
    assert!(input.fire);
}

#[test]
fn interact_goal_requests_its_weapon_and_presses_in_reach() {
    let scenario = Scenario::finale();
    let world = scenario.world;
    let mut pilot = Autopilot::new(scenario.script, AutopilotConfig::default());
    let input = pilot.tick(&world, view(28.5, 10.5, FRAC_PI_2), DT);
    assert!(matches!(pilot.diagnostics().goal, Some(Goal::Interact { step: 9, .. })));
    assert_eq!(input.weapon_request, Some(Weapon::Chaingun));
    assert!(input.interact);
}

#[test]
fn path_cache_follows_the_active_goal() {
    let mut world = corridor_world();
    let mut pilot = Autopilot::new(corridor_script(), AutopilotConfig::default());
    pilot.tick(&world, view(1.5, 2.5, 0.0), DT);
    let now = pilot.state().clock;
    let ttl = pilot.config().path_ttl;
    let start = Pos { y: 2, x: 1 };
    let end = Pos { y: 2, x: 8 };
    assert!(pilot.path_cache().lookup(start, end, GoalKey::Step(0), now, ttl).is_some());
    assert!(pilot.path_cache().lookup(start, end, GoalKey::Fallback, now, ttl).is_none());

    world.set_flag("corridor_end");
    pilot.tick(&world, view(1.5, 2.5, 0.0), DT);
    assert!(pilot.path_cache().is_empty(), "step change drops the cached path");
}

#[test]
fn unreachable_goal_triggers_back_up_and_replans() {
    let rows = ["##########", "##########", "#....#...#", "##########", "##########"];
    let mut world = level::world_from_rows(&rows, Pos { y: 2, x: 2 }.center());
    world.add_room(RoomId(1), Rect::from_tiles(Pos { y: 2, x: 1 }, Pos { y: 2, x: 4 }));
    let mut pilot = Autopilot::new(endless_script(Vec2::new(7.5, 2.5)), AutopilotConfig::default());

    let mut backed_up = false;
    for _ in 0..180 {
        let input = pilot.tick(&world, world.avatar_view(), DT);
        if pilot.state().is_backing_up() {
            backed_up |= input.back && (input.strafe_left || input.strafe_right);
        }
        world.apply_input(&input, DT);
    }
    assert!(backed_up);
    assert!(pilot.state().replan_count >= 1);
    assert!(pilot.events().any(|event| matches!(event, TraceEvent::RecoveryStarted { .. })));
    assert!(pilot.events().any(|event| *event == TraceEvent::RecoveryFinished));
}

#[test]
fn blocked_agent_recovers_and_reaches_its_waypoint_once_the_way_clears() {
    let mut world = corridor_world();
    let blocker = Pos { y: 2, x: 5 };
    world.grid.set_tile(blocker, TileKind::Wall);
    let mut pilot = Autopilot::new(corridor_script(), AutopilotConfig::default());

    let mut ticks = 0;
    while pilot.state().replan_count == 0 {
        let input = pilot.tick(&world, world.avatar_view(), DT);
        world.apply_input(&input, DT);
        ticks += 1;
        assert!(ticks < 300, "recovery never started: {}", pilot.diagnostics().summary());
    }
    assert!(pilot.state().is_backing_up());

    world.grid.set_tile(blocker, TileKind::Floor);
    let reached = drive(&mut pilot, &mut world, 900, |world| world.flag("corridor_end") == Some(true));
    assert!(reached.is_some(), "never reached the end: {}", pilot.diagnostics().summary());
    assert!(!pilot.state().is_backing_up());
    assert!(pilot.events().any(|event| *event == TraceEvent::RecoveryFinished));
}

#[test]
fn enter_room_step_stays_done_after_walking_back() {
    let mut world = level::demo_world();
    open_first_door(&mut world);
    world.kill_hostiles_in(RoomId(2));
    let mut pilot = demo_pilot();

    pilot.tick(&world, view(3.5, 3.5, 0.0), DT);
    assert_eq!(pilot.diagnostics().active_step, Some(1));

    pilot.tick(&world, view(11.5, 3.5, 0.0), DT);
    assert!(pilot.state().visited_rooms.contains(&RoomId(2)));
    assert_eq!(pilot.diagnostics().active_step, Some(2));

    for _ in 0..30 {
        pilot.tick(&world, view(3.5, 3.5, 0.0), DT);
        assert_eq!(pilot.diagnostics().active_step, Some(2), "hall step became active again");
    }
    assert!(pilot.events().any(|event| *event == TraceEvent::StepCompleted { step: 1 }));
}

#[test]
fn key_door_branch_is_passed_from_a_later_destination_room() {
    let mut world = level::demo_world();
    for room in [RoomId(2), RoomId(4)] {
        world.kill_hostiles_in(room);
    }
    let gold_door = world.passage_at(Pos { y: 3, x: 24 }).unwrap();
    assert!(!world.passages[gold_door].is_fully_open());
    let mut pilot = demo_pilot();

    pilot.tick(&world, view(27.5, 8.5, 0.0), DT);
    let active = pilot.diagnostics().active_step;
    assert!(active.is_some_and(|index| index > 6), "active step {active:?}");
    assert!(!pilot.diagnostics().skipped.iter().any(|(index, _)| *index == 6));
}

#[test]
fn cloned_pilots_make_identical_decisions() {
    let mut world = level::demo_world();
    let mut pilot = demo_pilot();
    drive(&mut pilot, &mut world, 45, |_| false);

    let mut twin = pilot.clone();
    let avatar = world.avatar_view();
    let a = pilot.tick(&world, avatar, DT);
    let b = twin.tick(&world, avatar, DT);
    assert_eq!(a, b);
    assert_eq!(pilot.diagnostics(), twin.diagnostics());
    assert_eq!(pilot.state(), twin.state());
    assert_eq!(
        decision_hash(&a, pilot.diagnostics().goal.as_ref()),
        decision_hash(&b, twin.diagnostics().goal.as_ref())
    );
}

#[test]
fn decision_hash_separates_different_inputs() {
    let idle = AgentInput::default();
    let moving = AgentInput { forward: true, ..idle };
    assert_eq!(decision_hash(&idle, None), decision_hash(&AgentInput::default(), None));
    assert_ne!(decision_hash(&idle, None), decision_hash(&moving, None));
    let goal = Goal::Waypoint { pos: Vec2::new(1.5, 2.5), step: Some(0) };
    assert_ne!(decision_hash(&idle, None), decision_hash(&idle, Some(&goal)));
}

#[test]
fn event_log_keeps_only_the_newest_entries() {
    let config = AutopilotConfig { event_log_capacity: 4, ..AutopilotConfig::default() };
    let mut pilot = Autopilot::new(corridor_script(), config);
    for step in 0..10 {
        pilot.push_event(TraceEvent::StepCompleted { step });
    }
    let kept: Vec<_> = pilot.events().cloned().collect();
    assert_eq!(kept.len(), 4);
    assert_eq!(kept[0], TraceEvent::StepCompleted { step: 6 });
    assert_eq!(kept[3], TraceEvent::StepCompleted { step: 9 });
}

#[test]
fn reset_forgets_route_and_memory() {
    let mut world = level::demo_world();
    let mut pilot = demo_pilot();
    drive(&mut pilot, &mut world, 30, |_| false);
    assert!(pilot.route().is_some());
    assert!(pilot.state().clock > 0.0);

    pilot.reset();
    assert!(pilot.route().is_none());
    assert_eq!(pilot.state(), &AgentState::default());
    assert!(pilot.path_cache().is_empty());
    assert_eq!(pilot.events().count(), 0);
    assert_eq!(pilot.current_tick(), 0);
}

#[test]
fn diagnostics_summary_names_goal_and_step() {
    let world = level::demo_world();
    let mut pilot = demo_pilot();
    pilot.tick(&world, world.avatar_view(), DT);
    let summary = pilot.diagnostics().summary();
    assert!(summary.contains("Door @ (8, 3)"), "{summary}");
    assert!(summary.contains("#0 first door"), "{summary}");
}

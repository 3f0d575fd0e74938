use autopilot::AutopilotConfig;
use autopilot::sim::{Outcome, Scenario, TileKind};
use autopilot::{Pos, Weapon, WorldQuery};

fn run(scenario: Scenario) -> Outcome {
    let budget = scenario.max_ticks;
    let outcome = scenario.run(AutopilotConfig::default());
    assert!(
        outcome.succeeded,
        "{} did not finish within {budget} ticks; last state: {}",
        outcome.name,
        outcome.pilot.diagnostics().summary()
    );
    outcome
}

#[test]
fn door_scenario_walks_through_the_first_door() {
    let outcome = run(Scenario::door());
    let door = outcome.world.passage_at(Pos { y: 3, x: 8 }).expect("first door");
    assert!(outcome.world.passages[door].is_fully_open());
}

#[test]
fn button_scenario_presses_the_gate_switch() {
    let outcome = run(Scenario::button());
    let gate = outcome.world.passage_at(Pos { y: 3, x: 16 }).expect("gate");
    assert!(outcome.world.can_unlock(&outcome.world.passages[gate]));
}

#[test]
fn weapon_scenario_picks_up_the_chaingun() {
    let outcome = run(Scenario::weapon());
    assert!(outcome.world.has_item("chaingun"));
}

#[test]
fn finale_scenario_uses_the_altar_with_the_chaingun() {
    let scenario = Scenario::finale();
    assert_eq!(scenario.world.equipped, Weapon::Chaingun, "starts with the final weapon drawn");
    let outcome = run(scenario);
    assert_eq!(outcome.world.equipped, Weapon::Chaingun);
    assert_eq!(outcome.world.flag("final_phase"), Some(true));
}

#[test]
fn full_run_never_moves_backward_through_the_route() {
    let mut last_step = None;
    let mut regressions = Vec::new();
    let outcome = Scenario::full().run_with(AutopilotConfig::default(), |world, pilot, _| {
        let step = pilot.diagnostics().active_step;
        if let (Some(before), Some(now)) = (last_step, step)
            && now < before
        {
            regressions.push((pilot.current_tick(), before, now));
        }
        if step.is_some() {
            last_step = step;
        }
        let tile = Pos::of_point(world.avatar.pos);
        assert_ne!(world.grid.tile_at(tile), TileKind::Wall, "avatar inside a wall at {tile:?}");
    });
    assert!(outcome.succeeded, "full run stalled: {}", outcome.pilot.diagnostics().summary());
    assert!(regressions.is_empty(), "active step moved backward: {regressions:?}");
    assert_eq!(outcome.pilot.state().visited_rooms.len(), 5);
}

#[test]
fn every_named_scenario_resolves() {
    for name in Scenario::NAMES {
        let scenario = Scenario::by_name(name).expect("named scenario");
        assert_eq!(scenario.name, name);
    }
    assert!(Scenario::by_name("nowhere").is_none());
}

//! Staged runs of the demo level, each starting partway through and ending on one objective.

use std::f32::consts::FRAC_PI_2;
use std::hash::Hasher;

use xxhash_rust::xxh3::Xxh3;

use super::*;
use crate::config::AutopilotConfig;
use crate::pilot::{Autopilot, decision_hash};
use crate::script::LevelScript;

pub const TICK_SECONDS: f32 = 1.0 / 60.0;

pub struct Scenario {
    pub name: &'static str,
    pub world: SimWorld,
    pub script: LevelScript,
    pub max_ticks: u32,
    pub success: fn(&SimWorld) -> bool,
}

pub struct Outcome {
    pub name: &'static str,
    pub succeeded: bool,
    pub ticks: u32,
    /// Fold of every tick's decision hash, in order.
    pub decision_digest: u64,
    pub world: SimWorld,
    pub pilot: Autopilot,
}

impl Outcome {
    pub fn replan_count(&self) -> u32 {
        self.pilot.state().replan_count
    }
}

fn open(world: &mut SimWorld, key: Pos) {
    if let Some(id) = world.passage_at(key) {
        world.open_passage_now(id);
    }
}

impl Scenario {
    pub const NAMES: [&'static str; 5] = ["door", "button", "weapon", "finale", "full"];

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "door" => Some(Self::door()),
            "button" => Some(Self::button()),
            "weapon" => Some(Self::weapon()),
            "finale" => Some(Self::finale()),
            "full" => Some(Self::full()),
            _ => None,
        }
    }

    /// Just inside the first room; done once through the first door.
    pub fn door() -> Self {
        let mut world = level::demo_world();
        world.avatar.pos = Vec2::new(6.5, 3.5);
        Self {
            name: "door",
            world,
            script: level::demo_script(),
            max_ticks: 900,
            success: |world| world.avatar.pos.x > 9.0,
        }
    }

    /// Second room cleared; done once the gate switch is pressed.
    pub fn button() -> Self {
        let mut world = level::demo_world();
        open(&mut world, Pos { y: 3, x: 8 });
        world.kill_hostiles_in(RoomId(2));
        world.avatar.pos = Vec2::new(10.5, 3.5);
        Self {
            name: "button",
            world,
            script: level::demo_script(),
            max_ticks: 900,
            success: |world| world.flag("switch_pressed") == Some(true),
        }
    }

    /// Gate already open; done once the chaingun is picked up.
    pub fn weapon() -> Self {
        let mut world = level::demo_world();
        open(&mut world, Pos { y: 3, x: 8 });
        open(&mut world, Pos { y: 3, x: 16 });
        world.set_flag("switch_pressed");
        world.kill_hostiles_in(RoomId(2));
        world.avatar.pos = Vec2::new(14.5, 3.5);
        Self {
            name: "weapon",
            world,
            script: level::demo_script(),
            max_ticks: 900,
            success: |world| world.has_item("chaingun"),
        }
    }

    /// Standing on the light with the chaingun drawn; done once the altar accepts it.
    pub fn finale() -> Self {
        let mut world = level::demo_world();
        for key in [Pos { y: 3, x: 8 }, Pos { y: 3, x: 16 }, Pos { y: 3, x: 24 }, Pos { y: 6, x: 27 }] {
            open(&mut world, key);
        }
        world.set_flag("switch_pressed");
        world.set_flag("light_reached");
        world.take_pickup("chaingun");
        world.take_pickup("gold_key");
        for room in [RoomId(2), RoomId(4)] {
            world.kill_hostiles_in(room);
        }
        world.equipped = Weapon::Chaingun;
        world.avatar.pos = Pos { y: 10, x: 28 }.center();
        world.avatar.heading = -FRAC_PI_2;
        Self {
            name: "finale",
            world,
            script: level::demo_script(),
            max_ticks: 600,
            success: |world| world.flag("final_phase") == Some(true),
        }
    }

    /// The whole level from spawn.
    pub fn full() -> Self {
        Self {
            name: "full",
            world: level::demo_world(),
            script: level::demo_script(),
            max_ticks: 4800,
            success: |world| world.flag("final_phase") == Some(true),
        }
    }

    pub fn run(self, config: AutopilotConfig) -> Outcome {
        self.run_with(config, |_, _, _| {})
    }

    /// Runs until success or the tick budget is spent. `observe` sees every tick after the
    /// input has been applied.
    pub fn run_with(
        self,
        config: AutopilotConfig,
        mut observe: impl FnMut(&SimWorld, &Autopilot, &AgentInput),
    ) -> Outcome {
        let Scenario { name, mut world, script, max_ticks, success } = self;
        let mut pilot = Autopilot::new(script, config);
        let mut digest = Xxh3::new();
        let mut ticks = 0;
        let mut succeeded = success(&world);
        while !succeeded && ticks < max_ticks {
            let input = pilot.tick(&world, world.avatar_view(), TICK_SECONDS);
            digest.write_u64(decision_hash(&input, pilot.diagnostics().goal.as_ref()));
            world.apply_input(&input, TICK_SECONDS);
            ticks += 1;
            observe(&world, &pilot, &input);
            succeeded = success(&world);
        }
        Outcome { name, succeeded, ticks, decision_digest: digest.finish(), world, pilot }
    }
}

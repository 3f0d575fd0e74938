//! Shared fixtures for the `pilot` test suites.
//! This module exists to avoid repeating level and script setup across many tests.
//! It does not own production steering logic.

use super::*;
use crate::script::{StepDescriptor, StepKind};
use crate::sim::{SimWorld, level};

pub const DT: f32 = 1.0 / 60.0;

/// A single east-west corridor on row 2, tiles x=1..=8, all of it room 1.
pub fn corridor_world() -> SimWorld {
    let rows = ["##########", "##########", "#........#", "##########", "##########"];
    let mut world = level::world_from_rows(&rows, Pos { y: 2, x: 1 }.center());
    world.add_room(RoomId(1), Rect::from_tiles(Pos { y: 2, x: 1 }, Pos { y: 2, x: 8 }));
    world.add_trigger(Pos { y: 2, x: 8 }, "corridor_end");
    world
}

/// One waypoint at the far end of `corridor_world`, complete once the end tile is stepped on.
pub fn corridor_script() -> LevelScript {
    LevelScript {
        name: "corridor".to_string(),
        room_order: vec![RoomId(1)],
        explore_room: None,
        steps: vec![
            StepDescriptor::new(StepKind::Waypoint, "far end")
                .at(Pos { y: 2, x: 8 }.center())
                .flag("corridor_end"),
        ],
    }
}

pub fn view(x: f32, y: f32, heading: f32) -> AvatarView {
    AvatarView { pos: Vec2::new(x, y), heading }
}

/// Steps `world` under `pilot` for up to `ticks` ticks, stopping early once `done` holds.
pub fn drive(
    pilot: &mut Autopilot,
    world: &mut SimWorld,
    ticks: u32,
    done: impl Fn(&SimWorld) -> bool,
) -> Option<u32> {
    for tick in 0..ticks {
        if done(world) {
            return Some(tick);
        }
        let input = pilot.tick(&*world, world.avatar_view(), DT);
        world.apply_input(&input, DT);
    }
    done(world).then_some(ticks)
}

/// One open room with a single pillar at (4, 2) for breaking sight lines.
pub fn pillar_world() -> SimWorld {
    let rows = ["##########", "#........#", "#...#....#", "#........#", "##########"];
    let mut world = level::world_from_rows(&rows, Pos { y: 1, x: 4 }.center());
    world.add_room(RoomId(1), Rect::from_tiles(Pos { y: 1, x: 1 }, Pos { y: 3, x: 8 }));
    world
}

/// A script whose only step never completes on its own.
pub fn endless_script(target: Vec2) -> LevelScript {
    LevelScript {
        name: "endless".to_string(),
        room_order: vec![RoomId(1)],
        explore_room: None,
        steps: vec![StepDescriptor::new(StepKind::Waypoint, "unreachable").at(target).flag("never")],
    }
}

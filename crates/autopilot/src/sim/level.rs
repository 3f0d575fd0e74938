//! The five-room demo level and its objective script.

use std::collections::BTreeMap;

use glam::Vec2;

use super::*;
use crate::pilot::neighbors;
use crate::script::{LevelScript, StepDescriptor, StepKind};
use crate::world::LockKind;

/// `#` wall, `.` floor, `D` door, `G` switch gate, `K` gold-key door.
pub const DEMO_MAP: [&str; 12] = [
    "################################",
    "#.......#.......#.......#......#",
    "#.......#.......#.......#......#",
    "#.......D.......G.......K......#",
    "#.......#.......G.......#......#",
    "#.......#.......#.......#......#",
    "###########################D####",
    "#########################......#",
    "#########################......#",
    "#########################......#",
    "#########################......#",
    "################################",
];

pub const SPAWN: Vec2 = Vec2::new(3.5, 3.5);

fn lock_for(symbol: char) -> LockKind {
    match symbol {
        'G' => LockKind::Switch("switch_pressed".to_string()),
        'K' => LockKind::Key("gold_key".to_string()),
        _ => LockKind::None,
    }
}

/// Parses `rows` into a world. Adjacent passage symbols of the same kind form one passage.
pub fn world_from_rows(rows: &[&str], spawn: Vec2) -> SimWorld {
    let height = rows.len();
    let width = rows.iter().map(|row| row.len()).max().unwrap_or(0);
    let mut grid = Grid::filled(width, height, TileKind::Wall);
    let mut symbols = BTreeMap::new();
    for (y, row) in rows.iter().enumerate() {
        for (x, symbol) in row.chars().enumerate() {
            let pos = Pos { y: y as i32, x: x as i32 };
            match symbol {
                '#' => {}
                '.' => grid.set_tile(pos, TileKind::Floor),
                other => {
                    symbols.insert(pos, other);
                }
            }
        }
    }

    let mut world = SimWorld::new(grid, spawn);
    while let Some((seed, symbol)) = symbols.pop_first() {
        let mut tiles = Vec::new();
        let mut frontier = vec![seed];
        while let Some(tile) = frontier.pop() {
            tiles.push(tile);
            for next in neighbors(tile) {
                if symbols.get(&next) == Some(&symbol) {
                    symbols.remove(&next);
                    frontier.push(next);
                }
            }
        }
        tiles.sort();
        world.add_passage(tiles, lock_for(symbol));
    }
    world
}

pub fn demo_world() -> SimWorld {
    let mut world = world_from_rows(&DEMO_MAP, SPAWN);
    let rooms = [
        (1, Pos { y: 1, x: 1 }, Pos { y: 5, x: 7 }),
        (2, Pos { y: 1, x: 9 }, Pos { y: 5, x: 15 }),
        (3, Pos { y: 1, x: 17 }, Pos { y: 5, x: 23 }),
        (4, Pos { y: 1, x: 25 }, Pos { y: 5, x: 30 }),
        (5, Pos { y: 7, x: 25 }, Pos { y: 10, x: 30 }),
    ];
    for (id, min, max) in rooms {
        world.add_room(RoomId(id), Rect::from_tiles(min, max));
    }

    world.add_interactable("switch_1", Pos { y: 0, x: 12 }.center(), "switch_pressed", None);
    world.add_pickup("chaingun", Pos { y: 3, x: 21 }.center(), Some(Weapon::Chaingun));
    world.add_pickup("gold_key", Pos { y: 1, x: 18 }.center(), None);
    world.add_trigger(Pos { y: 10, x: 28 }, "light_reached");
    world.add_interactable("altar", Pos { y: 11, x: 28 }.center(), "final_phase", Some(Weapon::Chaingun));

    world.add_hostile(Pos { y: 2, x: 13 }.center());
    world.add_hostile(Pos { y: 4, x: 14 }.center());
    world.add_hostile(Pos { y: 2, x: 29 }.center());
    world
}

pub fn demo_script() -> LevelScript {
    let room = RoomId;
    LevelScript {
        name: "demo".to_string(),
        room_order: (1..=5).map(room).collect(),
        explore_room: None,
        steps: vec![
            StepDescriptor::new(StepKind::Door, "first door").door(Pos { y: 3, x: 8 }).room(room(2)),
            StepDescriptor::new(StepKind::EnterRoom, "hall").room(room(2)),
            StepDescriptor::new(StepKind::Button, "gate switch")
                .with_id("switch_1")
                .room(room(2))
                .flag("switch_pressed"),
            StepDescriptor::new(StepKind::Gate, "gate").door(Pos { y: 3, x: 16 }).room(room(3)),
            StepDescriptor::new(StepKind::Pickup, "chaingun")
                .with_id("chaingun")
                .room(room(3))
                .weapon(Weapon::Chaingun),
            StepDescriptor::new(StepKind::Pickup, "gold key").with_id("gold_key").room(room(3)),
            StepDescriptor::new(StepKind::KeyDoor, "gold door")
                .door(Pos { y: 3, x: 24 })
                .rooms(&[room(4), room(5)]),
            StepDescriptor::new(StepKind::Door, "cellar door").door(Pos { y: 6, x: 27 }).room(room(5)),
            StepDescriptor::new(StepKind::Waypoint, "light")
                .at(Pos { y: 10, x: 28 }.center())
                .flag("light_reached"),
            StepDescriptor::new(StepKind::Button, "altar")
                .with_id("altar")
                .room(room(5))
                .flag("final_phase")
                .weapon(Weapon::Chaingun),
        ],
    }
}

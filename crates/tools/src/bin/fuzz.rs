use std::io;

use anyhow::{Result, bail};
use autopilot::pilot::bfs_path;
use autopilot::sim::level::world_from_rows;
use autopilot::sim::{SimWorld, TICK_SECONDS, TileKind};
use autopilot::{
    Autopilot, AutopilotConfig, LevelScript, Pos, Rect, RoomId, StepDescriptor, StepKind,
    WorldQuery,
};
use clap::Parser;
use rand_chacha::{
    ChaCha8Rng,
    rand_core::{Rng, SeedableRng},
};
use tracing::warn;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = 42)]
    seed: u64,
    /// Number of random levels to try
    #[arg(short, long, default_value_t = 50)]
    cases: u32,
    #[arg(short, long, default_value_t = 1800)]
    ticks: u32,
    #[arg(long, default_value_t = 16)]
    size: usize,
}

const GOAL_FLAG: &str = "goal_reached";

fn pick(rng: &mut ChaCha8Rng, size: usize) -> Pos {
    let span = (size - 2) as u64;
    Pos { y: 1 + (rng.next_u64() % span) as i32, x: 1 + (rng.next_u64() % span) as i32 }
}

/// An open room with scattered single-tile pillars, plus a reachable spawn and goal.
fn random_level(rng: &mut ChaCha8Rng, size: usize) -> Option<(SimWorld, Pos)> {
    let rows: Vec<String> = (0..size)
        .map(|y| {
            (0..size)
                .map(|x| {
                    let border = x == 0 || y == 0 || x == size - 1 || y == size - 1;
                    if border || rng.next_u64() % 9 == 0 { '#' } else { '.' }
                })
                .collect()
        })
        .collect();
    let rows: Vec<&str> = rows.iter().map(String::as_str).collect();

    let spawn = pick(rng, size);
    let goal = pick(rng, size);
    let mut world = world_from_rows(&rows, spawn.center());
    bfs_path(&world, spawn, goal, usize::MAX)?;
    let last = (size - 2) as i32;
    world.add_room(RoomId(1), Rect::from_tiles(Pos { y: 1, x: 1 }, Pos { y: last, x: last }));
    world.add_trigger(goal, GOAL_FLAG);
    Some((world, goal))
}

fn script_to(goal: Pos) -> LevelScript {
    LevelScript {
        name: "fuzz".to_string(),
        room_order: vec![RoomId(1)],
        explore_room: None,
        steps: vec![
            StepDescriptor::new(StepKind::Waypoint, "goal").at(goal.center()).flag(GOAL_FLAG),
        ],
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();
    let args = Args::parse();
    if args.size < 4 {
        bail!("--size must be at least 4");
    }

    println!("Starting fuzz harness on seed {} for {} levels...", args.seed, args.cases);
    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let config = AutopilotConfig::default();
    let mut reached = 0;
    let mut stalled = Vec::new();
    let mut tried = 0;

    while tried < args.cases {
        let Some((mut world, goal)) = random_level(&mut rng, args.size) else {
            continue;
        };
        tried += 1;
        let mut pilot = Autopilot::new(script_to(goal), config.clone());
        let mut done = false;
        for _ in 0..args.ticks {
            let input = pilot.tick(&world, world.avatar_view(), TICK_SECONDS);
            world.apply_input(&input, TICK_SECONDS);
            let tile = Pos::of_point(world.avatar.pos);
            assert!(
                world.grid.tile_at(tile) != TileKind::Wall,
                "Invariant failed: avatar inside wall at {tile:?} on case {tried}"
            );
            if world.flag(GOAL_FLAG) == Some(true) {
                done = true;
                break;
            }
        }
        if done {
            reached += 1;
        } else {
            warn!(case = tried, summary = %pilot.diagnostics().summary(), "goal not reached");
            stalled.push(tried);
        }
    }

    println!("Reached {reached}/{tried} goals.");
    if !stalled.is_empty() {
        bail!("Autopilot stalled on cases {stalled:?}");
    }
    println!("Fuzzing completed successfully.");
    Ok(())
}

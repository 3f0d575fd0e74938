//! Breadth-first tile search and approach-tile selection.
//! This module exists so navigation rules are reusable by goal steering and combat advance.
//! It does not own caching policy or decide which goal to path toward.

use std::collections::{BTreeMap, VecDeque, btree_map::Entry};

use glam::Vec2;

use crate::types::*;
use crate::world::WorldQuery;

/// Shortest 4-connected path from `start` to `goal`, both ends inclusive.
///
/// Ties between equal-length routes go to whichever neighbor was discovered first
/// (north, east, south, west). Gives up once `max_expansions` tiles have been popped.
pub fn bfs_path(
    world: &dyn WorldQuery,
    start: Pos,
    goal: Pos,
    max_expansions: usize,
) -> Option<Vec<Pos>> {
    if !world.is_tile_walkable(start) || !world.is_tile_walkable(goal) {
        return None;
    }
    if start == goal {
        return Some(vec![start]);
    }

    let mut came_from = BTreeMap::new();
    let mut queue = VecDeque::new();
    came_from.insert(start, start);
    queue.push_back(start);
    let mut expansions = 0usize;

    while let Some(current) = queue.pop_front() {
        expansions += 1;
        if expansions > max_expansions {
            return None;
        }
        for neighbor in neighbors(current) {
            if !world.is_tile_walkable(neighbor) {
                continue;
            }
            if let Entry::Vacant(entry) = came_from.entry(neighbor) {
                entry.insert(current);
                if neighbor == goal {
                    return Some(reconstruct_path(&came_from, start, goal));
                }
                queue.push_back(neighbor);
            }
        }
    }
    None
}

fn reconstruct_path(came: &BTreeMap<Pos, Pos>, start: Pos, goal: Pos) -> Vec<Pos> {
    let mut result = vec![goal];
    let mut current = goal;
    while current != start {
        let Some(previous) = came.get(&current).copied() else {
            break;
        };
        current = previous;
        result.push(current);
    }
    result.reverse();
    result
}

/// Tile the agent should stand on to act on `goal`.
///
/// Walkable goal tiles are used as-is. For a solid goal (door, button, wall pickup) this is
/// the neighbor offset toward the agent on the axis with the larger separation, then the
/// other axis, then any walkable neighbor closest to the agent. Falls back to the goal tile,
/// which the search then reports as unreachable.
pub fn approach_tile(world: &dyn WorldQuery, goal: Vec2, agent: Vec2) -> Pos {
    let tile = Pos::of_point(goal);
    if world.is_tile_walkable(tile) {
        return tile;
    }

    let delta = agent - goal;
    let step_x = Pos { y: tile.y, x: tile.x + axis_sign(delta.x) };
    let step_y = Pos { y: tile.y + axis_sign(delta.y), x: tile.x };
    let (primary, secondary) =
        if delta.x.abs() >= delta.y.abs() { (step_x, step_y) } else { (step_y, step_x) };

    for candidate in [primary, secondary] {
        if candidate != tile && world.is_tile_walkable(candidate) {
            return candidate;
        }
    }

    let mut others: Vec<Pos> =
        neighbors(tile).into_iter().filter(|next| world.is_tile_walkable(*next)).collect();
    others.sort_by(|a, b| {
        a.center().distance_squared(agent).total_cmp(&b.center().distance_squared(agent))
    });
    others.first().copied().unwrap_or(tile)
}

fn axis_sign(value: f32) -> i32 {
    if value > f32::EPSILON {
        1
    } else if value < -f32::EPSILON {
        -1
    } else {
        0
    }
}

pub fn neighbors(p: Pos) -> [Pos; 4] {
    [
        Pos { y: p.y - 1, x: p.x },
        Pos { y: p.y, x: p.x + 1 },
        Pos { y: p.y + 1, x: p.x },
        Pos { y: p.y, x: p.x - 1 },
    ]
}

pub fn manhattan(a: Pos, b: Pos) -> u32 {
    a.x.abs_diff(b.x) + a.y.abs_diff(b.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pilot::test_support::*;
    use crate::sim::level;

    #[test]
    fn straight_corridor_path_includes_both_ends() {
        let world = corridor_world();
        let path = bfs_path(&world, Pos { y: 2, x: 1 }, Pos { y: 2, x: 6 }, 512).expect("path");
        assert_eq!(path.first(), Some(&Pos { y: 2, x: 1 }));
        assert_eq!(path.last(), Some(&Pos { y: 2, x: 6 }));
        assert_eq!(path.len(), 6);
        for pair in path.windows(2) {
            assert_eq!(manhattan(pair[0], pair[1]), 1);
        }
    }

    #[test]
    fn closed_door_blocks_until_fully_open() {
        let mut world = level::demo_world();
        let start = Pos { y: 3, x: 6 };
        let beyond = Pos { y: 3, x: 10 };
        assert!(bfs_path(&world, start, beyond, 4096).is_none());

        let door = world.passage_at(Pos { y: 3, x: 8 }).unwrap();
        world.passages[door].progress = 0.5;
        assert!(bfs_path(&world, start, beyond, 4096).is_none(), "half-open doors are still solid");

        world.open_passage_now(door);
        let path = bfs_path(&world, start, beyond, 4096).expect("door is open");
        assert_eq!(path.len(), 5);
        assert!(path.contains(&Pos { y: 3, x: 8 }));
    }

    #[test]
    fn solid_start_or_goal_and_expansion_bound_give_no_path() {
        let world = corridor_world();
        assert!(bfs_path(&world, Pos { y: 1, x: 1 }, Pos { y: 2, x: 6 }, 512).is_none());
        assert!(bfs_path(&world, Pos { y: 2, x: 1 }, Pos { y: 1, x: 6 }, 512).is_none());
        assert!(bfs_path(&world, Pos { y: 2, x: 1 }, Pos { y: 2, x: 8 }, 3).is_none());
        let here = Pos { y: 2, x: 3 };
        assert_eq!(bfs_path(&world, here, here, 1), Some(vec![here]));
    }

    #[test]
    fn approach_tile_prefers_axis_toward_agent() {
        let world = level::demo_world();
        let button = Pos { y: 0, x: 12 }.center();

        let below = Vec2::new(12.5, 3.5);
        assert_eq!(approach_tile(&world, button, below), Pos { y: 1, x: 12 });

        let side = Vec2::new(9.5, 1.5);
        assert_eq!(
            approach_tile(&world, button, side),
            Pos { y: 1, x: 12 },
            "x offset leads into the wall, so the y neighbor is used"
        );

        let door = Pos { y: 3, x: 8 }.center();
        assert_eq!(approach_tile(&world, door, Vec2::new(3.5, 3.5)), Pos { y: 3, x: 7 });
        assert_eq!(approach_tile(&world, door, Vec2::new(12.5, 2.5)), Pos { y: 3, x: 9 });
    }

    #[test]
    fn walkable_goal_is_its_own_approach_tile() {
        let world = corridor_world();
        let goal = Vec2::new(5.2, 2.7);
        assert_eq!(approach_tile(&world, goal, Vec2::new(1.5, 2.5)), Pos { y: 2, x: 5 });
    }
}

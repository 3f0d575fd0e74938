//! Converts the chosen goal into turn, movement, fire and interact signals.

use std::f32::consts::{PI, TAU};

use super::*;

/// Share of the unit direction an axis needs before its movement flag is set.
const AXIS_THRESHOLD: f32 = 0.38;

/// Wraps an angle into `(-PI, PI]`.
pub(super) fn wrap_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// Signed angle from the avatar's heading to `point`; positive turns toward +y.
pub(super) fn aim_error(avatar: AvatarView, point: Vec2) -> f32 {
    let delta = point - avatar.pos;
    if delta.length_squared() < 1e-8 {
        return 0.0;
    }
    wrap_angle(delta.y.atan2(delta.x) - avatar.heading)
}

/// Bounded turn toward `point`. Never overshoots the remaining error.
pub(super) fn turn_toward(config: &AutopilotConfig, avatar: AvatarView, point: Vec2, dt: f32) -> f32 {
    let error = aim_error(avatar, point);
    if error.abs() <= config.turn_dead_zone {
        return 0.0;
    }
    let max_step = config.max_turn_rate * dt;
    error.clamp(-max_step, max_step)
}

/// Sets movement flags for the direction to `point` expressed in the avatar's frame.
pub(super) fn drive_toward(input: &mut AgentInput, avatar: AvatarView, point: Vec2, arrival: f32) {
    let delta = point - avatar.pos;
    let distance = delta.length();
    if distance <= arrival {
        return;
    }
    let direction = delta / distance;
    let forward = Vec2::from_angle(avatar.heading);
    let along = direction.dot(forward);
    let across = direction.dot(forward.perp());
    input.forward = along > AXIS_THRESHOLD;
    input.back = along < -AXIS_THRESHOLD;
    input.strafe_right = across > AXIS_THRESHOLD;
    input.strafe_left = across < -AXIS_THRESHOLD;
}

/// Index into `path` of the node to move toward next, skipping nodes already reached.
pub(super) fn next_node(path: &[Pos], pos: Vec2, arrival: f32) -> Option<usize> {
    let reached = path.iter().rposition(|tile| tile.center().distance(pos) <= arrival).unwrap_or(0);
    (reached + 1 < path.len()).then_some(reached + 1)
}

/// Swaps a forward push into a wall for a strafe toward whichever side is open.
fn avoid_walls(
    world: &dyn WorldQuery,
    config: &AutopilotConfig,
    avatar: AvatarView,
    input: &mut AgentInput,
    target: Vec2,
) {
    if !input.forward || input.strafe_left || input.strafe_right {
        return;
    }
    let reach = config.wall_probe_distance;
    let lined_up = aim_error(avatar, target).abs() < config.forward_cone;
    if !lined_up || avatar.pos.distance(target) <= reach {
        return;
    }
    let forward = Vec2::from_angle(avatar.heading);
    if world.is_tile_walkable(Pos::of_point(avatar.pos + forward * reach)) {
        return;
    }
    let right = forward.perp();
    let right_open = world.is_tile_walkable(Pos::of_point(avatar.pos + right * reach));
    let left_open = world.is_tile_walkable(Pos::of_point(avatar.pos - right * reach));
    let prefer_right = aim_error(avatar, target) >= 0.0;
    match (left_open, right_open) {
        (_, true) if prefer_right => input.strafe_right = true,
        (true, _) => input.strafe_left = true,
        (false, true) => input.strafe_right = true,
        (false, false) => return,
    }
    input.forward = false;
}

/// True during the first half of each `period`-long cycle.
fn first_half(clock: f32, period: f32) -> bool {
    if period <= 0.0 {
        return true;
    }
    (clock / period).rem_euclid(2.0) < 1.0
}

impl Autopilot {
    pub(super) fn steer_navigation(
        &mut self,
        world: &dyn WorldQuery,
        avatar: AvatarView,
        goal: Goal,
        dt: f32,
        diagnostics: &mut Diagnostics,
    ) -> AgentInput {
        let goal_point = goal.position();
        let end = approach_tile(world, goal_point, avatar.pos);
        let interaction = goal.action() == Some(GoalAction::Interact);
        let final_point = if !interaction && world.is_tile_walkable(Pos::of_point(goal_point)) {
            goal_point
        } else {
            end.center()
        };

        if let Some(input) = self.continue_backup(avatar, final_point, dt) {
            return input;
        }

        let start = Pos::of_point(avatar.pos);
        let path = self.cached_path(world, start, end, GoalKey::of(&goal));
        diagnostics.path_len = path.as_ref().map(Vec::len);

        let arrival = self.config.arrival_radius;
        let next = path
            .as_deref()
            .and_then(|path| next_node(path, avatar.pos, arrival).map(|index| (index, path)));
        // The last node is replaced by the exact point the goal needs.
        let target = match next {
            Some((index, path)) if index + 1 < path.len() => path[index].center(),
            _ => final_point,
        };

        let mut input = AgentInput::default();
        let in_reach = interaction && avatar.pos.distance(goal_point) <= self.config.interact_range;
        let aim = if in_reach { goal_point } else { target };
        if in_reach || avatar.pos.distance(aim) > arrival {
            input.turn = turn_toward(&self.config, avatar, aim, dt);
        }
        drive_toward(&mut input, avatar, target, arrival);
        avoid_walls(world, &self.config, avatar, &mut input, target);
        input.interact =
            in_reach && aim_error(avatar, goal_point).abs() < self.config.interact_aim_tolerance;
        if let Goal::Interact { weapon, .. } = goal {
            input.weapon_request = weapon;
        }

        self.monitor_progress(target, avatar.pos.distance(target), path.is_some(), dt);
        input
    }

    pub(super) fn steer_combat(
        &mut self,
        world: &dyn WorldQuery,
        avatar: AvatarView,
        goal: Goal,
        dt: f32,
        diagnostics: &mut Diagnostics,
    ) -> AgentInput {
        if self.state.is_backing_up() {
            self.push_event(TraceEvent::RecoveryFinished);
        }
        self.state.backup_until = None;
        self.state.reset_progress();

        let enemy = goal.position();
        let distance = avatar.pos.distance(enemy);
        let clock = self.state.clock;
        let mut input = AgentInput::default();
        input.turn = turn_toward(&self.config, avatar, enemy, dt);

        if distance > self.config.no_advance_distance {
            let start = Pos::of_point(avatar.pos);
            let end = approach_tile(world, enemy, avatar.pos);
            let path = self.cached_path(world, start, end, GoalKey::of(&goal));
            diagnostics.path_len = path.as_ref().map(Vec::len);
            let arrival = self.config.arrival_radius;
            let target = path
                .as_deref()
                .and_then(|path| next_node(path, avatar.pos, arrival).map(|index| path[index].center()))
                .unwrap_or(enemy);
            drive_toward(&mut input, avatar, target, arrival);
            let orbiting = distance <= self.config.no_advance_distance + self.config.orbit_band;
            if orbiting && !input.strafe_left && !input.strafe_right {
                if first_half(clock, self.config.orbit_period) {
                    input.strafe_right = true;
                } else {
                    input.strafe_left = true;
                }
            }
            avoid_walls(world, &self.config, avatar, &mut input, target);
        } else if distance < self.config.back_off_distance {
            input.back = true;
        } else if first_half(clock, self.config.standoff_strafe_period) {
            input.strafe_left = true;
        } else {
            input.strafe_right = true;
        }

        input.fire = aim_error(avatar, enemy).abs() < self.config.fire_tolerance(distance)
            && world.has_line_of_sight(avatar.pos, enemy);
        input
    }
}

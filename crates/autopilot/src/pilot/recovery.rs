//! Stuck detection and the timed back-up maneuver. Navigation goals only; combat never
//! triggers recovery.

use super::steering::turn_toward;
use super::*;

impl Autopilot {
    /// Input for the back-up maneuver while it lasts. Ends the maneuver once its time is up.
    pub(super) fn continue_backup(
        &mut self,
        avatar: AvatarView,
        target: Vec2,
        dt: f32,
    ) -> Option<AgentInput> {
        let until = self.state.backup_until?;
        if self.state.clock >= until {
            self.state.backup_until = None;
            self.state.reset_progress();
            self.push_event(TraceEvent::RecoveryFinished);
            debug!(replans = self.state.replan_count, "back-up finished");
            return None;
        }

        let wiggle = (self.state.clock / self.config.wiggle_half_period).floor() as i64;
        let mut input = AgentInput { back: true, ..AgentInput::default() };
        if wiggle.rem_euclid(2) == 0 {
            input.strafe_left = true;
        } else {
            input.strafe_right = true;
        }
        input.turn = turn_toward(&self.config, avatar, target, dt);
        Some(input)
    }

    /// Tracks progress toward `target` and starts a back-up when it stalls.
    pub(super) fn monitor_progress(&mut self, target: Vec2, distance: f32, has_path: bool, dt: f32) {
        let config = &self.config;
        let state = &mut self.state;
        if has_path {
            state.null_path_timer = 0.0;
        } else {
            state.null_path_timer += dt;
        }

        let retargeted = state.progress_target.is_none_or(|previous| previous.distance(target) > 0.01);
        if distance <= config.arrival_radius || retargeted {
            state.progress_target = Some(target);
            state.best_progress_distance = Some(distance);
            state.stuck_timer = 0.0;
        } else if state
            .best_progress_distance
            .is_none_or(|best| distance < best - config.progress_margin)
        {
            state.best_progress_distance = Some(distance);
            state.stuck_timer = 0.0;
        } else {
            state.stuck_timer += dt;
        }

        let stalled = state.stuck_timer > config.no_progress_timeout;
        let pathless = state.null_path_timer > config.null_path_timeout;
        if stalled || pathless {
            self.begin_backup();
        }
    }

    fn begin_backup(&mut self) {
        self.cache.clear();
        self.state.backup_until = Some(self.state.clock + self.config.backup_duration);
        self.state.replan_count += 1;
        self.state.reset_progress();
        let replan_count = self.state.replan_count;
        debug!(replan_count, clock = self.state.clock, "no progress; backing up");
        self.push_event(TraceEvent::RecoveryStarted { replan_count });
    }
}

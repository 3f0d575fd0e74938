//! Tuning knobs for the autopilot, loadable from TOML.

use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutopilotConfig {
    /// Hostiles further than this are never engaged.
    pub engagement_range: f32,
    /// How long a hostile stays the goal after line of sight is lost.
    pub memory_grace: f32,
    /// Search radius for the starting-room door fallback.
    pub fallback_door_radius: f32,
    pub path_ttl: f32,
    pub max_bfs_expansions: usize,
    pub arrival_radius: f32,
    pub interact_range: f32,
    pub interact_aim_tolerance: f32,
    /// Radians per second.
    pub max_turn_rate: f32,
    pub turn_dead_zone: f32,
    /// Aim error below which the agent counts as lined up with its steering target.
    pub forward_cone: f32,
    pub wall_probe_distance: f32,
    pub no_advance_distance: f32,
    pub back_off_distance: f32,
    pub orbit_band: f32,
    pub orbit_period: f32,
    pub standoff_strafe_period: f32,
    pub fire_tolerance_near: f32,
    pub fire_tolerance_far: f32,
    pub fire_tolerance_near_range: f32,
    pub fire_tolerance_far_range: f32,
    pub progress_margin: f32,
    pub no_progress_timeout: f32,
    pub null_path_timeout: f32,
    pub backup_duration: f32,
    pub wiggle_half_period: f32,
    pub event_log_capacity: usize,
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            engagement_range: 12.0,
            memory_grace: 0.6,
            fallback_door_radius: 10.0,
            path_ttl: 0.5,
            max_bfs_expansions: 8192,
            arrival_radius: 0.3,
            interact_range: 1.5,
            interact_aim_tolerance: 0.35,
            max_turn_rate: 6.0,
            turn_dead_zone: 0.02,
            forward_cone: 0.6,
            wall_probe_distance: 0.55,
            no_advance_distance: 3.0,
            back_off_distance: 1.0,
            orbit_band: 1.5,
            orbit_period: 1.2,
            standoff_strafe_period: 0.8,
            fire_tolerance_near: 0.3,
            fire_tolerance_far: 0.06,
            fire_tolerance_near_range: 1.0,
            fire_tolerance_far_range: 8.0,
            progress_margin: 0.05,
            no_progress_timeout: 1.2,
            null_path_timeout: 0.8,
            backup_duration: 0.55,
            wiggle_half_period: 0.25,
            event_log_capacity: 256,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "invalid autopilot config: {e}"),
        }
    }
}

impl Error for ConfigError {}

impl AutopilotConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(ConfigError::Parse)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml_str(&text)
    }

    /// Aim tolerance for firing, tightening linearly from point-blank to medium range.
    pub fn fire_tolerance(&self, distance: f32) -> f32 {
        let span = (self.fire_tolerance_far_range - self.fire_tolerance_near_range).max(f32::EPSILON);
        let t = ((distance - self.fire_tolerance_near_range) / span).clamp(0.0, 1.0);
        self.fire_tolerance_near + (self.fire_tolerance_far - self.fire_tolerance_near) * t
    }
}

pub mod config;
pub mod pilot;
pub mod script;
pub mod sim;
pub mod trace_file;
pub mod types;
pub mod world;

pub use config::{AutopilotConfig, ConfigError};
pub use pilot::{Autopilot, Diagnostics, decision_hash};
pub use script::{LevelScript, ScriptError, StepDescriptor, StepKind};
pub use types::*;
pub use world::{Hostile, LockKind, Passage, WorldQuery};

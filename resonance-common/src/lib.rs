pub mod config;
pub mod sim_params;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{SimulationConfig, GridConfig, FieldConfig, TimingConfig, TissueConfig, OutputConfig, ScriptEntry, DrivenGradient};
pub use sim_params::ModelParams;
pub use snapshot::{FieldState, HistoryLog, Snapshot};
pub use vecmath::{Vec2, deg_to_rad, linspace, rotation_index, cell_screen_positions};

use serde::{Deserialize, Serialize};
use crate::config::DrivenGradient;

/// Construction parameters for the oscillator model, derived from the configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelParams {
    // Grid & canvas
    pub columns: usize, // m
    pub rows: usize,    // n
    pub canvas_width: f64,
    pub canvas_height: f64,

    // Initial field settings (b0set, b1set, f1set)
    pub static_magnitude: f64,
    pub driven_magnitude: f64,
    pub driven_frequency: f64, // Hz

    // Field generation
    pub noise_amplitude: f64,
    pub driven_gradient: DrivenGradient,
    pub seed: u64,
}

impl ModelParams {
    pub fn cell_count(&self) -> usize {
        self.columns * self.rows
    }
}

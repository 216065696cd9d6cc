use serde::{Serialize, Deserialize};

/// Operator-controlled field settings at one moment of the run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldState {
    pub static_magnitude: f64,
    pub driven_magnitude: f64,
    /// Driven field frequency in Hz.
    pub driven_frequency: f64,
    pub static_on: bool,
    pub driven_on: bool,
}

impl FieldState {
    /// Static magnitude as it acts on the arrows (zero while switched off).
    pub fn effective_static_magnitude(&self) -> f64 {
        if self.static_on { self.static_magnitude } else { 0.0 }
    }

    /// Driven frequency as it acts on the arrows (zero while switched off).
    pub fn effective_driven_frequency(&self) -> f64 {
        if self.driven_on { self.driven_frequency } else { 0.0 }
    }
}

/// A decimated sample of the model state, taken for the history plot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Simulated time of the sample.
    pub time: f64,
    pub fields: FieldState,
    /// Orientation of every cell reduced to `[0, 360)`, column-major.
    pub orientations: Vec<f64>,
    /// Population standard deviation of the unreduced orientations.
    pub orientation_spread: f64,
}

/// Everything the plotting and rendering side needs after a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryLog {
    pub columns: usize,
    pub rows: usize,
    pub canvas_width: f64,
    pub canvas_height: f64,
    /// Pixel centre of each arrow, same order as the orientation grids.
    pub cell_positions: Vec<(f64, f64)>,
    pub samples: Vec<Snapshot>,
    /// Times at which a full reset was triggered.
    pub resets: Vec<f64>,
    /// Unreduced orientations at the end of the run.
    pub final_orientations: Vec<f64>,
    pub final_fields: FieldState,
    /// Simulated time the run stopped at.
    pub end_time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn switched_off_fields_read_as_zero() {
        let mut fields = FieldState {
            static_magnitude: 4000.0,
            driven_magnitude: 1000.0,
            driven_frequency: 1.5,
            static_on: true,
            driven_on: true,
        };
        assert_eq!(fields.effective_static_magnitude(), 4000.0);
        assert_eq!(fields.effective_driven_frequency(), 1.5);

        fields.static_on = false;
        fields.driven_on = false;
        assert_eq!(fields.effective_static_magnitude(), 0.0);
        assert_eq!(fields.effective_driven_frequency(), 0.0);
        // the settings themselves are kept
        assert_eq!(fields.static_magnitude, 4000.0);
    }
}

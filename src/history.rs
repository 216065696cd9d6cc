use crate::model::OscillatorGrid;
use log::debug;
use resonance_common::{FieldState, HistoryLog, Snapshot};

/// Decimated record of the run for the plotter.
///
/// A sample is kept only once more than `record_interval` of simulated time
/// has passed since the previous one, so long runs stay bounded.
#[derive(Debug, Clone)]
pub struct History {
    record_interval: f64,
    last_recorded: f64,
    samples: Vec<Snapshot>,
    resets: Vec<f64>,
}

impl History {
    pub fn new(start_time: f64, record_interval: f64) -> Self {
        Self {
            record_interval,
            last_recorded: start_time,
            samples: Vec::new(),
            resets: Vec::new(),
        }
    }

    /// Stores a sample if the record interval has elapsed. Returns whether it did.
    pub fn record(&mut self, sim_time: f64, fields: FieldState, orientation: &[f64]) -> bool {
        if sim_time - self.last_recorded <= self.record_interval {
            return false;
        }
        self.last_recorded = sim_time;

        self.samples.push(Snapshot {
            time: sim_time,
            fields,
            orientations: orientation.iter().map(|theta| theta.rem_euclid(360.0)).collect(),
            orientation_spread: std_dev(orientation),
        });
        true
    }

    /// Remembers when a full reset happened, for annotating the plot.
    pub fn mark_reset(&mut self, sim_time: f64) {
        debug!("Reset marked at t={:.3}", sim_time);
        self.resets.push(sim_time);
    }

    pub fn samples(&self) -> &[Snapshot] {
        &self.samples
    }

    pub fn resets(&self) -> &[f64] {
        &self.resets
    }

    /// Bundles the history with the grid layout and final state.
    pub fn into_log(self, model: &OscillatorGrid, canvas: (f64, f64), end_time: f64) -> HistoryLog {
        HistoryLog {
            columns: model.columns(),
            rows: model.rows(),
            canvas_width: canvas.0,
            canvas_height: canvas.1,
            cell_positions: model.cell_positions().to_vec(),
            samples: self.samples,
            resets: self.resets,
            final_orientations: model.orientation().to_vec(),
            final_fields: model.field_state(),
            end_time,
        }
    }
}

/// Population standard deviation.
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n).sqrt()
}

use rand::Rng;
use resonance_common::{linspace, DrivenGradient};

/// Lower end of the spatial field ramps.
const RAMP_START: f64 = 0.1;
const RAMP_END: f64 = 1.0;

/// Fixed per-cell multipliers for the static and driven fields.
///
/// Both grids are `columns x rows`, column-major (`i * rows + j`), and never
/// change after construction; only the scalar field magnitudes vary per step.
#[derive(Debug, Clone)]
pub struct FieldGenerator {
    static_gradient: Vec<f64>,
    driven_gradient: Vec<f64>,
}

impl FieldGenerator {
    /// Builds both gradients.
    ///
    /// The static gradient ramps 0.1..1.0 along the row axis, identical for
    /// every column, and each cell is scaled by `1 + noise * (U(0,1) - 0.5)` so
    /// no two arrows respond identically. The driven ramp runs along the
    /// column axis but is only kept for [`DrivenGradient::Ramp`]; the default
    /// replaces it with a uniform 1.0 grid.
    pub fn new<R: Rng>(
        columns: usize,
        rows: usize,
        noise_amplitude: f64,
        driven_mode: DrivenGradient,
        rng: &mut R,
    ) -> Self {
        let count = columns * rows;

        let row_ramp = linspace(RAMP_START, RAMP_END, rows);
        let mut static_gradient = Vec::with_capacity(count);
        for _i in 0..columns {
            for ramp in &row_ramp {
                let jitter = 1.0 + noise_amplitude * (rng.random::<f64>() - 0.5);
                static_gradient.push(ramp * jitter);
            }
        }

        let column_ramp = linspace(RAMP_START, RAMP_END, columns);
        let mut driven_gradient = Vec::with_capacity(count);
        for ramp in &column_ramp {
            driven_gradient.extend(std::iter::repeat(*ramp).take(rows));
        }
        if driven_mode == DrivenGradient::Uniform {
            driven_gradient.iter_mut().for_each(|g| *g = 1.0);
        }

        Self { static_gradient, driven_gradient }
    }

    pub fn static_gradient(&self) -> &[f64] {
        &self.static_gradient
    }

    pub fn driven_gradient(&self) -> &[f64] {
        &self.driven_gradient
    }

    /// Writes `magnitude * static_gradient` into `out`.
    pub fn static_field_into(&self, magnitude: f64, out: &mut [f64]) {
        for (o, g) in out.iter_mut().zip(&self.static_gradient) {
            *o = magnitude * g;
        }
    }

    /// Writes `magnitude * cos(2 pi f t) * driven_gradient` into `out`.
    pub fn driven_field_into(&self, magnitude: f64, frequency: f64, sim_time: f64, out: &mut [f64]) {
        let amplitude = magnitude * (2.0 * std::f64::consts::PI * frequency * sim_time).cos();
        for (o, g) in out.iter_mut().zip(&self.driven_gradient) {
            *o = amplitude * g;
        }
    }
}

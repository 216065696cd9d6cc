use crate::error::ModelError;
use crate::field::FieldGenerator;
use crate::tissue::TissueMap;
use crate::torque::torque_into;
use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::SeedableRng;
use resonance_common::{cell_screen_positions, rotation_index, FieldState, ModelParams};

/// Orientation every arrow starts at.
pub const INITIAL_ORIENTATION_DEG: f64 = 180.0;
/// Orientation a full reset returns to. Differs from the start angle on purpose.
pub const RESET_ORIENTATION_DEG: f64 = 140.0;
/// Angular velocity damping, fixed for every cell.
pub const DAMPING_COEFFICIENT: f64 = 0.6;

/// Grid of damped, driven rotational oscillators.
///
/// All per-cell grids are `columns x rows`, stored column-major (`i * rows + j`).
/// Only the driver mutates the model, through `advance` and the named
/// operations below; there is no internal scheduling.
#[derive(Debug)]
pub struct OscillatorGrid {
    columns: usize,
    rows: usize,

    // Operator-controlled scalars
    static_magnitude: f64,
    driven_magnitude: f64,
    driven_frequency: f64,
    static_on: bool,
    driven_on: bool,

    // State, in degrees and degrees per time unit
    orientation: Vec<f64>,
    angular_velocity: Vec<f64>,

    fields: FieldGenerator,
    tissue: TissueMap,
    cell_positions: Vec<(f64, f64)>,

    // Scratch buffers reused every step
    static_field: Vec<f64>,
    driven_field: Vec<f64>,
    torque: Vec<f64>,
}

impl OscillatorGrid {
    /// Builds the model, seeding the field jitter from `params.seed`.
    pub fn new(params: &ModelParams, tissue: TissueMap) -> Result<Self, ModelError> {
        let mut rng = StdRng::seed_from_u64(params.seed);
        Self::with_rng(params, tissue, &mut rng)
    }

    pub fn with_rng(params: &ModelParams, tissue: TissueMap, rng: &mut StdRng) -> Result<Self, ModelError> {
        let (columns, rows) = (params.columns, params.rows);
        if columns == 0 || rows == 0 {
            return Err(ModelError::InvalidDimensions { columns, rows });
        }
        if tissue.columns() != columns || tissue.rows() != rows {
            return Err(ModelError::ShapeMismatch {
                expected: (columns, rows),
                found: (tissue.columns(), tissue.rows()),
            });
        }

        let count = params.cell_count();
        let cell_positions = cell_screen_positions(columns, rows, params.canvas_width, params.canvas_height);
        let fields = FieldGenerator::new(columns, rows, params.noise_amplitude, params.driven_gradient, rng);

        info!(
            "Oscillator grid {}x{} | B0 {:.3} | B1 {:.3} | f1 {:.3} Hz",
            columns, rows, params.static_magnitude, params.driven_magnitude, params.driven_frequency
        );

        Ok(Self {
            columns,
            rows,
            static_magnitude: params.static_magnitude,
            driven_magnitude: params.driven_magnitude,
            driven_frequency: params.driven_frequency,
            static_on: true,
            driven_on: true,
            orientation: vec![INITIAL_ORIENTATION_DEG; count],
            angular_velocity: vec![0.0; count],
            fields,
            tissue,
            cell_positions,
            static_field: vec![0.0; count],
            driven_field: vec![0.0; count],
            torque: vec![0.0; count],
        })
    }

    /// One explicit Euler step at simulated time `sim_time`. No-op unless `dt > 0`.
    ///
    /// `a = tissue * torque(B0, B1, theta) - damping * v`, then `v += a dt`
    /// and `theta += v dt`. Large `dt` diverges; the caller clamps it.
    pub fn advance(&mut self, sim_time: f64, dt: f64) {
        if !(dt > 0.0) {
            return;
        }

        if self.static_on {
            self.fields.static_field_into(self.static_magnitude, &mut self.static_field);
        } else {
            self.static_field.fill(0.0);
        }
        if self.driven_on {
            self.fields.driven_field_into(self.driven_magnitude, self.driven_frequency, sim_time, &mut self.driven_field);
        } else {
            self.driven_field.fill(0.0);
        }

        torque_into(&self.static_field, &self.driven_field, &self.orientation, &mut self.torque);

        let tissue = self.tissue.as_slice();
        for k in 0..self.orientation.len() {
            let acceleration = tissue[k] * self.torque[k] - DAMPING_COEFFICIENT * self.angular_velocity[k];
            self.angular_velocity[k] += acceleration * dt;
            self.orientation[k] += self.angular_velocity[k] * dt;
        }
        trace!("advanced to t={:.4} (dt={:.4})", sim_time, dt);
    }

    pub fn scale_static_field_magnitude(&mut self, factor: f64) {
        self.static_magnitude *= factor;
    }

    pub fn scale_driven_field_magnitude(&mut self, factor: f64) {
        self.driven_magnitude *= factor;
    }

    pub fn scale_driven_field_frequency(&mut self, factor: f64) {
        self.driven_frequency *= factor;
    }

    pub fn toggle_static_field(&mut self) {
        self.static_on = !self.static_on;
        debug!("Static field {}", if self.static_on { "on" } else { "off" });
    }

    pub fn toggle_driven_field(&mut self) {
        self.driven_on = !self.driven_on;
        debug!("Driven field {}", if self.driven_on { "on" } else { "off" });
    }

    /// Stops every arrow where it is.
    pub fn zero_velocity(&mut self) {
        self.angular_velocity.fill(0.0);
    }

    /// Stops every arrow and turns it back to the reset angle.
    pub fn full_reset(&mut self) {
        self.angular_velocity.fill(0.0);
        self.orientation.fill(RESET_ORIENTATION_DEG);
        debug!("Full reset to {} deg", RESET_ORIENTATION_DEG);
    }

    // --- Read access for the driver, renderer and history ---

    pub fn orientation(&self) -> &[f64] {
        &self.orientation
    }

    pub fn angular_velocity(&self) -> &[f64] {
        &self.angular_velocity
    }

    /// Sprite rotation index `round(theta) mod 360` for every cell.
    pub fn rotation_indices(&self) -> Vec<u16> {
        self.orientation.iter().map(|&theta| rotation_index(theta)).collect()
    }

    pub fn static_magnitude(&self) -> f64 {
        self.static_magnitude
    }

    pub fn driven_magnitude(&self) -> f64 {
        self.driven_magnitude
    }

    pub fn driven_frequency(&self) -> f64 {
        self.driven_frequency
    }

    pub fn static_on(&self) -> bool {
        self.static_on
    }

    pub fn driven_on(&self) -> bool {
        self.driven_on
    }

    /// Current magnitudes, frequency and on/off switches, as shown in the panel and history.
    pub fn field_state(&self) -> FieldState {
        FieldState {
            static_magnitude: self.static_magnitude,
            driven_magnitude: self.driven_magnitude,
            driven_frequency: self.driven_frequency,
            static_on: self.static_on,
            driven_on: self.driven_on,
        }
    }

    pub fn effective_static_magnitude(&self) -> f64 {
        self.field_state().effective_static_magnitude()
    }

    pub fn effective_driven_frequency(&self) -> f64 {
        self.field_state().effective_driven_frequency()
    }

    pub fn static_gradient(&self) -> &[f64] {
        self.fields.static_gradient()
    }

    pub fn driven_gradient(&self) -> &[f64] {
        self.fields.driven_gradient()
    }

    pub fn tissue(&self) -> &TissueMap {
        &self.tissue
    }

    pub fn cell_positions(&self) -> &[(f64, f64)] {
        &self.cell_positions
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cell_count(&self) -> usize {
        self.orientation.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonance_common::DrivenGradient;

    fn params(columns: usize, rows: usize, b0: f64, b1: f64, f1: f64) -> ModelParams {
        ModelParams {
            columns,
            rows,
            canvas_width: 1000.0,
            canvas_height: 800.0,
            static_magnitude: b0,
            driven_magnitude: b1,
            driven_frequency: f1,
            noise_amplitude: 0.03,
            driven_gradient: DrivenGradient::Uniform,
            seed: 42,
        }
    }

    fn grid(columns: usize, rows: usize, b0: f64, b1: f64, f1: f64) -> OscillatorGrid {
        OscillatorGrid::new(&params(columns, rows, b0, b1, f1), TissueMap::uniform(columns, rows)).unwrap()
    }

    #[test]
    fn construction_sets_initial_state() {
        let model = grid(5, 4, 4000.0, 1000.0, 1.0);
        assert_eq!(model.cell_count(), 20);
        assert!(model.orientation().iter().all(|&t| t == INITIAL_ORIENTATION_DEG));
        assert!(model.angular_velocity().iter().all(|&v| v == 0.0));
        assert!(model.static_on() && model.driven_on());
        assert_eq!(model.cell_positions().len(), 20);
        assert!(model.rotation_indices().iter().all(|&r| r == 180));
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        let err = OscillatorGrid::new(&params(0, 3, 1.0, 1.0, 1.0), TissueMap::uniform(0, 3)).unwrap_err();
        assert_eq!(err, ModelError::InvalidDimensions { columns: 0, rows: 3 });
    }

    #[test]
    fn mismatched_tissue_is_rejected() {
        let err = OscillatorGrid::new(&params(2, 2, 1.0, 1.0, 1.0), TissueMap::uniform(2, 3)).unwrap_err();
        assert!(matches!(err, ModelError::ShapeMismatch { .. }));
    }

    #[test]
    fn zero_dt_is_a_no_op() {
        let mut model = grid(3, 2, 4000.0, 1000.0, 1.0);
        model.advance(0.1, 0.05);
        let theta = model.orientation().to_vec();
        let v = model.angular_velocity().to_vec();
        model.advance(0.2, 0.0);
        model.advance(0.2, -0.1);
        assert_eq!(model.orientation(), theta.as_slice());
        assert_eq!(model.angular_velocity(), v.as_slice());
    }

    #[test]
    fn one_step_matches_hand_computed_euler() {
        let mut model = grid(1, 1, 2.0, 0.0, 1.0);
        let g = model.static_gradient()[0];
        let dt = 0.01;
        model.advance(0.0, dt);
        // field along +x with magnitude 2g, arrow at 180 deg: sin(pi) ~ 0
        let a = 2.0 * g * std::f64::consts::PI.sin();
        assert!((model.angular_velocity()[0] - a * dt).abs() < 1e-12);
        assert!((model.orientation()[0] - (180.0 + a * dt * dt)).abs() < 1e-12);

        let mut model = grid(1, 1, 2.0, 0.0, 1.0);
        model.full_reset();
        model.advance(0.0, dt);
        let a = 2.0 * g * 140f64.to_radians().sin();
        assert!((model.angular_velocity()[0] - a * dt).abs() < 1e-9);
        assert!((model.orientation()[0] - (140.0 + a * dt * dt)).abs() < 1e-9);
    }

    #[test]
    fn fields_off_leaves_pure_damping() {
        let mut model = grid(2, 2, 4000.0, 1000.0, 1.0);
        model.toggle_static_field();
        model.toggle_driven_field();
        model.angular_velocity.fill(50.0);

        let dt = 0.01;
        let mut previous = 50.0;
        for step in 0..200 {
            model.advance(step as f64 * dt, dt);
            for &v in model.angular_velocity() {
                assert!(v.abs() < previous, "step {step}: |v| {v} did not decay");
                let expected = previous * (1.0 - DAMPING_COEFFICIENT * dt);
                assert!((v - expected).abs() < 1e-9);
            }
            previous = model.angular_velocity()[0];
        }
    }

    #[test]
    fn tissue_scales_the_torque() {
        let tissue = TissueMap::parse("1.0,0.0\n", 2, 1).unwrap();
        let mut model = OscillatorGrid::new(&params(2, 1, 100.0, 0.0, 1.0), tissue).unwrap();
        model.full_reset();
        model.advance(0.0, 0.01);
        assert!(model.angular_velocity()[0].abs() > 0.0);
        assert_eq!(model.angular_velocity()[1], 0.0);
        assert_eq!(model.orientation()[1], RESET_ORIENTATION_DEG);
    }

    #[test]
    fn full_reset_restores_reset_angle() {
        let mut model = grid(3, 3, 4000.0, 1000.0, 2.0);
        for step in 0..50 {
            model.advance(step as f64 * 0.02, 0.02);
        }
        model.full_reset();
        assert!(model.orientation().iter().all(|&t| t == 140.0));
        assert!(model.angular_velocity().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn zero_velocity_keeps_orientation() {
        let mut model = grid(3, 2, 4000.0, 1000.0, 1.0);
        model.full_reset();
        for step in 0..20 {
            model.advance(step as f64 * 0.01, 0.01);
        }
        let before: Vec<u64> = model.orientation().iter().map(|t| t.to_bits()).collect();
        model.zero_velocity();
        let after: Vec<u64> = model.orientation().iter().map(|t| t.to_bits()).collect();
        assert_eq!(before, after);
        assert!(model.angular_velocity().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn scaling_is_multiplicative() {
        let mut model = grid(1, 1, 3.0, 5.0, 0.5);
        model.scale_static_field_magnitude(2.0);
        assert_eq!(model.static_magnitude(), 6.0);
        model.scale_static_field_magnitude(2.0);
        assert_eq!(model.static_magnitude(), 12.0);
        model.scale_driven_field_magnitude(0.5);
        assert_eq!(model.driven_magnitude(), 2.5);
        model.scale_driven_field_frequency(4.0);
        assert_eq!(model.driven_frequency(), 2.0);
    }

    #[test]
    fn toggles_gate_the_effective_values() {
        let mut model = grid(1, 1, 3.0, 5.0, 0.5);
        model.toggle_static_field();
        assert_eq!(model.effective_static_magnitude(), 0.0);
        model.toggle_driven_field();
        assert_eq!(model.effective_driven_frequency(), 0.0);
        model.toggle_static_field();
        assert_eq!(model.effective_static_magnitude(), 3.0);

        let fields = model.field_state();
        assert!(fields.static_on && !fields.driven_on);
        assert_eq!((fields.driven_magnitude, fields.driven_frequency), (5.0, 0.5));
    }

    #[test]
    fn undriven_grid_stays_at_rest() {
        let mut model = grid(2, 1, 0.0, 0.0, 1.0);
        let dt = 0.01;
        let mut sim_time = 0.0;
        for _ in 0..100 {
            sim_time += dt;
            model.advance(sim_time, dt);
        }
        assert!(model.orientation().iter().all(|&t| (t - 180.0).abs() < 1e-12));
        assert!(model.angular_velocity().iter().all(|&v| v.abs() < 1e-12));
    }

    #[test]
    fn static_field_pulls_arrows_towards_alignment() {
        let mut model = grid(1, 1, 50.0, 0.0, 1.0);
        model.toggle_driven_field();
        model.full_reset();
        let dt = 0.01;
        for step in 0..20_000 {
            model.advance(step as f64 * dt, dt);
        }
        // torque |B| sin(theta) vanishes at theta = 180 (mod 360), the stable point for this sign
        let theta = model.orientation()[0].rem_euclid(360.0);
        assert!((theta - 180.0).abs() < 1.0, "settled at {theta}");
        assert!(model.angular_velocity()[0].abs() < 1e-3);
    }
}

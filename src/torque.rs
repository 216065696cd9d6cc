use resonance_common::{deg_to_rad, Vec2};

/// Torque on a single arrow at `theta_deg` in the field `(bx, by)`.
///
/// `|B| * sin(theta - angle(B))`; no wrapping needed, the sine is periodic.
#[inline(always)]
pub fn cell_torque(bx: f64, by: f64, theta_deg: f64) -> f64 {
    let field = Vec2::new(bx, by);
    field.length() * (deg_to_rad(theta_deg) - field.angle()).sin()
}

/// Torque on every cell, writing into `out`.
pub fn torque_into(field_x: &[f64], field_y: &[f64], orientation_deg: &[f64], out: &mut [f64]) {
    debug_assert_eq!(field_x.len(), orientation_deg.len());
    debug_assert_eq!(field_y.len(), orientation_deg.len());
    for (((t, &bx), &by), &theta) in out.iter_mut().zip(field_x).zip(field_y).zip(orientation_deg) {
        *t = cell_torque(bx, by, theta);
    }
}

/// Torque on every cell for the given field component grids.
pub fn torque(field_x: &[f64], field_y: &[f64], orientation_deg: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; orientation_deg.len()];
    torque_into(field_x, field_y, orientation_deg, &mut out);
    out
}

use serde::{Serialize, Deserialize};

// Field vector in the plane: x carries the static field, y the driven field.
#[derive(Copy, Clone, Default, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    #[inline(always)]
    pub fn new(x: f64, y: f64) -> Self { Self { x, y } }
    #[inline(always)]
    pub fn length_squared(self) -> f64 { self.x * self.x + self.y * self.y }
    #[inline(always)]
    pub fn length(self) -> f64 { self.length_squared().sqrt() }
    #[inline(always)]
    pub fn scale(self, scalar: f64) -> Self { Self::new(self.x * scalar, self.y * scalar) }

    /// Direction of the vector in radians, quadrant-correct (`atan2(y, x)`).
    #[inline(always)]
    pub fn angle(self) -> f64 { self.y.atan2(self.x) }

    /// Unit vector pointing along `theta` (radians).
    #[inline(always)]
    pub fn from_angle(theta: f64) -> Self { Self::new(theta.cos(), theta.sin()) }
}

#[inline(always)]
pub fn deg_to_rad(deg: f64) -> f64 { deg / 360.0 * 2.0 * std::f64::consts::PI }

/// Maps an unbounded angle in degrees onto a sprite rotation index in `0..360`.
#[inline(always)]
pub fn rotation_index(theta_deg: f64) -> u16 {
    if !theta_deg.is_finite() {
        return 0;
    }
    (theta_deg.round().rem_euclid(360.0) as u16) % 360
}

/// Evenly spaced samples over `[start, stop]`, numpy style (`count == 1` yields `[start]`).
pub fn linspace(start: f64, stop: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (count - 1) as f64;
            let mut samples: Vec<f64> = (0..count).map(|k| start + step * k as f64).collect();
            samples[count - 1] = stop;
            samples
        }
    }
}

/// Pixel centres of the oscillator arrows, column-major like the physics grids.
///
/// Columns sit at `i * W / (m + 1)` for `i = 1..=m`; rows start two spacings
/// down to leave room for the text panel: `(j + 2) * H / (n + 2)`.
pub fn cell_screen_positions(columns: usize, rows: usize, width: f64, height: f64) -> Vec<(f64, f64)> {
    let xdist = width / (columns + 1) as f64;
    let ydist = height / (rows + 2) as f64;
    let mut positions = Vec::with_capacity(columns * rows);
    for i in 0..columns {
        for j in 0..rows {
            positions.push((xdist * (i + 1) as f64, ydist * (j + 2) as f64));
        }
    }
    positions
}

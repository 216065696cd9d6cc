use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::sim_params::ModelParams;
use std::path::Path;

// Oscillator grid dimensions and the canvas the arrows are laid out on
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct GridConfig {
    pub columns: usize,
    pub rows: usize,
    #[serde(default = "default_canvas_width")]
    pub canvas_width: f64,
    #[serde(default = "default_canvas_height")]
    pub canvas_height: f64,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DrivenGradient {
    /// No spatial variation in the driven field.
    #[default]
    Uniform,
    /// Linear 0.1..1.0 ramp along the column axis.
    Ramp,
}

// Initial field settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FieldConfig {
    pub static_magnitude: f64,
    pub driven_magnitude: f64,
    pub driven_frequency: f64,
    #[serde(default = "default_noise_amplitude")]
    pub noise_amplitude: f64,
    #[serde(default)]
    pub driven_gradient: DrivenGradient,
    pub seed: u64,
}

// Configuration for timing of the driver loop
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    /// Largest step handed to the integrator; explicit Euler diverges beyond this.
    pub max_dt: f64,
    /// Elapsed time per headless frame.
    pub frame_dt: f64,
    /// Runtime ceiling in simulated seconds.
    pub total_time: f64,
    pub record_interval: f64,
    #[serde(default = "default_adjust_factor")]
    pub adjust_factor: f64,
    #[serde(default = "default_frequency_adjust_exponent")]
    pub frequency_adjust_exponent: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TissueConfig {
    /// Tissue file name inside `data_dir`; empty means uniform tissue.
    #[serde(default)]
    pub source: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_history: bool,
    pub save_orientations: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
    /// key = value file that remembers the tuned field settings between runs.
    #[serde(default)]
    pub settings_file: Option<String>,
}

/// One scheduled control event for the headless driver.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ScriptEntry {
    pub at: f64,
    #[serde(default)]
    pub until: Option<f64>,
    pub event: String,
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub grid: GridConfig,
    pub fields: FieldConfig,
    pub timing: TimingConfig,
    #[serde(default)]
    pub tissue: TissueConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub script: Vec<ScriptEntry>,
}

impl Default for TissueConfig {
    fn default() -> Self {
        TissueConfig {
            source: String::new(),
            data_dir: default_data_dir(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            grid: GridConfig {
                columns: 5,
                rows: 4,
                canvas_width: default_canvas_width(),
                canvas_height: default_canvas_height(),
            },
            fields: FieldConfig {
                static_magnitude: 4000.0,
                driven_magnitude: 1000.0,
                driven_frequency: 1.0,
                noise_amplitude: default_noise_amplitude(),
                driven_gradient: DrivenGradient::Uniform,
                seed: 42,
            },
            timing: TimingConfig {
                max_dt: 0.1,
                frame_dt: 1.0 / 60.0,
                total_time: 300.0,
                record_interval: 0.1,
                adjust_factor: default_adjust_factor(),
                frequency_adjust_exponent: default_frequency_adjust_exponent(),
            },
            tissue: TissueConfig::default(),
            output: OutputConfig {
                base_filename: "resonance".to_string(),
                save_history: true,
                save_orientations: true,
                format: None,
                settings_file: None,
            },
            script: Vec::new(),
        }
    }
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config: SimulationConfig = toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML from '{}': {}", path_ref.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects settings the model or driver cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.grid.columns == 0 || self.grid.rows == 0 {
            anyhow::bail!("grid columns and rows must be greater than 0 (got {}x{}).", self.grid.columns, self.grid.rows);
        }
        if !(self.timing.max_dt > 0.0) {
            anyhow::bail!("max_dt must be positive.");
        }
        if !(self.timing.frame_dt > 0.0) {
            anyhow::bail!("frame_dt must be positive.");
        }
        if !(self.timing.record_interval > 0.0) {
            anyhow::bail!("record_interval must be positive.");
        }
        if !(self.timing.adjust_factor > 0.0) {
            anyhow::bail!("adjust_factor must be positive.");
        }
        if !(self.timing.total_time.is_finite() && self.timing.total_time >= 0.0) {
            anyhow::bail!("total_time must be finite and not negative (got {}).", self.timing.total_time);
        }
        let fields = &self.fields;
        if ![fields.static_magnitude, fields.driven_magnitude, fields.driven_frequency, fields.noise_amplitude]
            .iter()
            .all(|v| v.is_finite())
        {
            anyhow::bail!("field magnitudes, frequency and noise must be finite.");
        }
        for entry in &self.script {
            if let Some(until) = entry.until {
                if until < entry.at {
                    anyhow::bail!("script entry '{}' ends at {} before it starts at {}.", entry.event, until, entry.at);
                }
            }
        }
        Ok(())
    }

    /// Converts the configuration into the parameters the oscillator model is built from.
    pub fn model_params(&self) -> ModelParams {
        ModelParams {
            columns: self.grid.columns,
            rows: self.grid.rows,
            canvas_width: self.grid.canvas_width,
            canvas_height: self.grid.canvas_height,
            static_magnitude: self.fields.static_magnitude,
            driven_magnitude: self.fields.driven_magnitude,
            driven_frequency: self.fields.driven_frequency,
            noise_amplitude: self.fields.noise_amplitude,
            driven_gradient: self.fields.driven_gradient,
            seed: self.fields.seed,
        }
    }
}

fn default_canvas_width() -> f64 {
    1000.0
}

fn default_canvas_height() -> f64 {
    800.0
}

fn default_noise_amplitude() -> f64 {
    0.03 // +-1.5% jitter per cell
}

fn default_adjust_factor() -> f64 {
    std::f64::consts::SQRT_2 // doubling in 2 seconds
}

fn default_frequency_adjust_exponent() -> f64 {
    0.7
}

fn default_data_dir() -> String {
    "data".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [grid]
        columns = 3
        rows = 2

        [fields]
        static_magnitude = 10.0
        driven_magnitude = 2.0
        driven_frequency = 0.5
        seed = 7

        [timing]
        max_dt = 0.1
        frame_dt = 0.02
        total_time = 5.0
        record_interval = 0.1

        [output]
        base_filename = "run"
        save_history = false
        save_orientations = false
    "#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: SimulationConfig = toml::from_str(MINIMAL).unwrap();
        config.validate().unwrap();
        assert_eq!(config.grid.canvas_width, 1000.0);
        assert_eq!(config.fields.noise_amplitude, 0.03);
        assert_eq!(config.fields.driven_gradient, DrivenGradient::Uniform);
        assert_eq!(config.tissue.data_dir, "data");
        assert!(config.tissue.source.is_empty());
        assert!(config.script.is_empty());
        assert!((config.timing.adjust_factor - 2f64.sqrt()).abs() < 1e-12);

        let params = config.model_params();
        assert_eq!((params.columns, params.rows), (3, 2));
        assert_eq!(params.seed, 7);
    }

    #[test]
    fn zero_sized_grid_is_rejected() {
        let mut config = SimulationConfig::default();
        config.grid.rows = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn runtime_ceiling_must_be_finite() {
        let mut config = SimulationConfig::default();
        for bad in [f64::NAN, f64::INFINITY, -1.0] {
            config.timing.total_time = bad;
            assert!(config.validate().is_err(), "accepted total_time {bad}");
        }
        config.timing.total_time = 0.0;
        config.validate().unwrap();
    }

    #[test]
    fn script_entries_parse_with_optional_end() {
        let text = format!(
            "{}\n[[script]]\nat = 1.0\nuntil = 2.0\nevent = \"static_up\"\n\n[[script]]\nat = 3.0\nevent = \"full_reset\"\n",
            MINIMAL
        );
        let config: SimulationConfig = toml::from_str(&text).unwrap();
        assert_eq!(config.script.len(), 2);
        assert_eq!(config.script[0].until, Some(2.0));
        assert_eq!(config.script[1].until, None);
        assert_eq!(config.script[1].event, "full_reset");
    }

    #[test]
    fn backwards_script_window_is_rejected() {
        let mut config = SimulationConfig::default();
        config.script.push(ScriptEntry { at: 2.0, until: Some(1.0), event: "static_up".into() });
        assert!(config.validate().is_err());
    }
}

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info, warn};
use resonance_common::{HistoryLog, SimulationConfig};
use resonance_engine::settings::{self, Settings, DRIVEN_FIELD_KEY, DRIVEN_FREQUENCY_KEY, STATIC_FIELD_KEY};
use resonance_engine::{ControlScript, OscillatorGrid, Simulation};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Headless driver for the precession grid simulation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Initial static field (B0) magnitude
    #[arg(long)]
    static_field: Option<f64>,

    /// Initial driven field (B1) magnitude
    #[arg(long)]
    driven_field: Option<f64>,

    /// Initial driven field frequency in Hz
    #[arg(long)]
    driven_frequency: Option<f64>,

    /// Tissue file name inside the tissue data directory
    #[arg(long)]
    tissue: Option<String>,

    /// Path to the config.toml file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the runtime ceiling in simulated seconds
    #[arg(long)]
    total_time: Option<f64>,
}

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();
    let args = Args::parse();

    info!("Starting precession grid simulation...");

    // --- Load Configuration ---
    let mut config = if args.config.exists() {
        SimulationConfig::load(&args.config)?
    } else {
        warn!("Config file '{}' not found, using built-in defaults.", args.config.display());
        SimulationConfig::default()
    };
    apply_overrides(&mut config, &args)?;
    config.validate()?;
    debug!("Configuration: {:#?}", config);

    // --- Initialize Simulation ---
    let mut sim = Simulation::new(&config)?;
    let mut script = ControlScript::from_entries(&config.script)?;

    // --- Simulation Loop ---
    let start_time = Instant::now();
    sim.run_headless(config.timing.frame_dt, config.timing.total_time, &mut script)?;
    let total_duration = start_time.elapsed();
    info!(
        "Simulated {:.2} s in {} steps, wall time {:.3} s.",
        sim.sim_time(),
        sim.steps(),
        total_duration.as_secs_f64()
    );

    let (model, log) = sim.finish();

    // --- Save Recorded Data ---
    if config.output.save_history {
        save_history(&config, &log);
    } else {
        info!("Skipping saving history as per config (save_history is false).");
    }

    if config.output.save_orientations {
        save_orientations(&config, &model)?;
    } else {
        info!("Skipping saving final orientations as per config.");
    }

    if let Some(path) = &config.output.settings_file {
        persist_settings(Path::new(path), &model)?;
    }

    info!("Ready.");
    Ok(())
}

/// CLI arguments win over the settings file, which wins over config.toml.
fn apply_overrides(config: &mut SimulationConfig, args: &Args) -> Result<()> {
    if let Some(path) = &config.output.settings_file {
        let path = Path::new(path);
        if path.exists() {
            let saved = Settings::load(path).with_context(|| format!("Failed to read settings from '{}'", path.display()))?;
            info!("Using saved field settings from {}", path.display());
            let fields = &mut config.fields;
            fields.static_magnitude = saved.static_magnitude.unwrap_or(fields.static_magnitude);
            fields.driven_magnitude = saved.driven_magnitude.unwrap_or(fields.driven_magnitude);
            fields.driven_frequency = saved.driven_frequency.unwrap_or(fields.driven_frequency);
        }
    }

    if let Some(b0) = args.static_field {
        config.fields.static_magnitude = b0;
    }
    if let Some(b1) = args.driven_field {
        config.fields.driven_magnitude = b1;
    }
    if let Some(f1) = args.driven_frequency {
        config.fields.driven_frequency = f1;
    }
    if let Some(tissue) = &args.tissue {
        config.tissue.source = tissue.clone();
    }
    if let Some(total_time) = args.total_time {
        config.timing.total_time = total_time;
    }
    Ok(())
}

fn save_history(config: &SimulationConfig, log: &HistoryLog) {
    let output_format = config.output.format.as_deref().unwrap_or("json");
    let base = &config.output.base_filename;

    match output_format {
        "bincode" => {
            // Binary format (much more compact)
            let filename = format!("{}_history.bin", base);
            match File::create(&filename) {
                Ok(file) => match bincode::serialize_into(file, log) {
                    Ok(_) => info!("History saved to {} (binary format)", filename),
                    Err(e) => error!("Error serializing history to bincode: {}", e),
                },
                Err(e) => error!("Error creating history file '{}': {}", filename, e),
            }
        }
        "messagepack" => {
            // MessagePack format (compact and cross-platform)
            let filename = format!("{}_history.msgpack", base);
            match &mut File::create(&filename) {
                Ok(file) => match rmp_serde::encode::write(file, log) {
                    Ok(_) => info!("History saved to {} (MessagePack format)", filename),
                    Err(e) => error!("Error serializing history to MessagePack: {}", e),
                },
                Err(e) => error!("Error creating history file '{}': {}", filename, e),
            }
        }
        other => {
            if other != "json" {
                error!("Unknown output format: {}. Using JSON instead.", other);
            }
            let filename = format!("{}_history.json", base);
            match File::create(&filename) {
                Ok(mut file) => match serde_json::to_string(log) {
                    Ok(json_string) => {
                        if let Err(e) = file.write_all(json_string.as_bytes()) {
                            error!("Error writing history JSON to file '{}': {}", filename, e);
                        } else {
                            info!("History saved to {} ({} samples)", filename, log.samples.len());
                        }
                    }
                    Err(e) => error!("Error serializing history to JSON: {}", e),
                },
                Err(e) => error!("Error creating history file '{}': {}", filename, e),
            }
        }
    }
}

fn save_orientations(config: &SimulationConfig, model: &OscillatorGrid) -> Result<()> {
    let filename = format!("{}_final_orientations.csv", config.output.base_filename);
    match csv::Writer::from_path(&filename) {
        Ok(mut writer) => {
            writer.write_record(["column", "row", "theta_deg", "rotation_index"])?;
            let rotations = model.rotation_indices();
            for i in 0..model.columns() {
                for j in 0..model.rows() {
                    let k = i * model.rows() + j;
                    writer.write_record(&[
                        i.to_string(),
                        j.to_string(),
                        format!("{:.4}", model.orientation()[k]),
                        rotations[k].to_string(),
                    ])?;
                }
            }
            writer.flush()?;
            info!("Final orientations saved to {}", filename);
        }
        Err(e) => error!("Error saving CSV file '{}': {}", filename, e),
    }
    Ok(())
}

fn persist_settings(path: &Path, model: &OscillatorGrid) -> Result<()> {
    let values = [
        (STATIC_FIELD_KEY, model.static_magnitude()),
        (DRIVEN_FIELD_KEY, model.driven_magnitude()),
        (DRIVEN_FREQUENCY_KEY, model.driven_frequency()),
    ];
    if !path.exists() {
        return Settings::write_defaults(path, values[0].1, values[1].1, values[2].1)
            .with_context(|| format!("Failed to create settings file '{}'", path.display()));
    }
    settings::set_vars(path, &values)
        .with_context(|| format!("Failed to store field settings in '{}'", path.display()))?;
    info!("Field settings saved to {}", path.display());
    Ok(())
}

use crate::error::ModelError;
use log::{debug, info};
use std::path::Path;

pub const STATIC_FIELD_KEY: &str = "B0";
pub const DRIVEN_FIELD_KEY: &str = "B1";
pub const DRIVEN_FREQUENCY_KEY: &str = "F1";

/// Field settings remembered between runs in a `key = value` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub static_magnitude: Option<f64>,
    pub driven_magnitude: Option<f64>,
    pub driven_frequency: Option<f64>,
}

impl Settings {
    /// Reads the known keys; unknown keys, comments and blank lines are ignored.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let text = read(path.as_ref())?;
        let mut settings = Settings::default();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let slot = match key.trim() {
                STATIC_FIELD_KEY => &mut settings.static_magnitude,
                DRIVEN_FIELD_KEY => &mut settings.driven_magnitude,
                DRIVEN_FREQUENCY_KEY => &mut settings.driven_frequency,
                _ => continue,
            };
            let value = value.trim();
            *slot = Some(value.parse().map_err(|_| ModelError::Format {
                line: number as u64 + 1,
                reason: format!("'{value}' is not a number"),
            })?);
        }
        Ok(settings)
    }

    /// Creates a settings file holding the given values.
    pub fn write_defaults(path: impl AsRef<Path>, static_magnitude: f64, driven_magnitude: f64, driven_frequency: f64) -> Result<(), ModelError> {
        let text = format!(
            "# Field settings, rewritten at the end of each run\n{STATIC_FIELD_KEY} = {static_magnitude}\n{DRIVEN_FIELD_KEY} = {driven_magnitude}\n{DRIVEN_FREQUENCY_KEY} = {driven_frequency}\n"
        );
        write(path.as_ref(), &text)?;
        info!("Created settings file {}", path.as_ref().display());
        Ok(())
    }
}

/// Rewrites every line whose first two non-blank characters are `key` as `key = value`.
///
/// All other lines are kept as they are. A key that does not appear in the
/// file is an error and leaves the file untouched.
pub fn set_var(path: impl AsRef<Path>, key: &str, value: f64) -> Result<(), ModelError> {
    set_vars(path, &[(key, value)])
}

/// Like [`set_var`] for several keys, written in one pass.
///
/// Every key is checked before anything is written, so the file is either
/// fully updated or not touched at all.
pub fn set_vars(path: impl AsRef<Path>, values: &[(&str, f64)]) -> Result<(), ModelError> {
    if let Some((key, _)) = values.iter().find(|(key, _)| key.chars().count() != 2) {
        return Err(ModelError::InvalidSettingKey { key: key.to_string() });
    }
    let path = path.as_ref();
    let text = read(path)?;

    let mut found = vec![false; values.len()];
    let mut rewritten = String::with_capacity(text.len());
    for line in text.lines() {
        let line = line.trim_end();
        match values.iter().position(|(key, _)| line.trim_start().starts_with(key)) {
            Some(k) => {
                found[k] = true;
                let (key, value) = values[k];
                rewritten.push_str(&format!("{key} = {value}"));
            }
            None => rewritten.push_str(line),
        }
        rewritten.push('\n');
    }

    if let Some(k) = found.iter().position(|&f| !f) {
        return Err(ModelError::SettingNotFound { key: values[k].0.to_string() });
    }
    write(path, &rewritten)?;
    debug!("{} setting(s) written to {}", values.len(), path.display());
    Ok(())
}

fn read(path: &Path) -> Result<String, ModelError> {
    std::fs::read_to_string(path).map_err(|e| ModelError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn write(path: &Path, text: &str) -> Result<(), ModelError> {
    std::fs::write(path, text).map_err(|e| ModelError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

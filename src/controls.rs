use anyhow::Result;
use resonance_common::ScriptEntry;
use std::str::FromStr;

/// Named control events, as produced by the input side once per poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlEvent {
    StaticUp,
    StaticDown,
    DrivenUp,
    DrivenDown,
    FrequencyUp,
    FrequencyDown,
    ToggleStatic,
    ToggleDriven,
    ZeroVelocity,
    FullReset,
    ShowFields,
    Quit,
}

impl ControlEvent {
    /// Adjust events act for as long as they are held; everything else fires once.
    pub fn is_held(self) -> bool {
        matches!(
            self,
            Self::StaticUp
                | Self::StaticDown
                | Self::DrivenUp
                | Self::DrivenDown
                | Self::FrequencyUp
                | Self::FrequencyDown
                | Self::ShowFields
        )
    }
}

impl FromStr for ControlEvent {
    type Err = anyhow::Error;

    fn from_str(name: &str) -> Result<Self> {
        let event = match name.trim().to_ascii_lowercase().as_str() {
            "static_up" => Self::StaticUp,
            "static_down" => Self::StaticDown,
            "driven_up" => Self::DrivenUp,
            "driven_down" => Self::DrivenDown,
            "frequency_up" => Self::FrequencyUp,
            "frequency_down" => Self::FrequencyDown,
            "toggle_static" => Self::ToggleStatic,
            "toggle_driven" => Self::ToggleDriven,
            "zero_velocity" => Self::ZeroVelocity,
            "full_reset" => Self::FullReset,
            "show_fields" => Self::ShowFields,
            "quit" => Self::Quit,
            other => anyhow::bail!("Unknown control event '{}'.", other),
        };
        Ok(event)
    }
}

#[derive(Debug, Clone)]
struct Scheduled {
    at: f64,
    until: Option<f64>,
    event: ControlEvent,
    fired: bool,
}

/// Timed control events standing in for keyboard polling in a headless run.
#[derive(Debug, Clone, Default)]
pub struct ControlScript {
    entries: Vec<Scheduled>,
}

impl ControlScript {
    pub fn from_entries(entries: &[ScriptEntry]) -> Result<Self> {
        let entries = entries
            .iter()
            .map(|entry| {
                Ok(Scheduled {
                    at: entry.at,
                    until: entry.until,
                    event: entry.event.parse()?,
                    fired: false,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Events active at simulated time `t`.
    ///
    /// Held events with an end time repeat on every poll in `[at, until)`.
    /// Events without an end time fire once, on the first poll at or after `at`.
    pub fn poll(&mut self, t: f64) -> Vec<ControlEvent> {
        let mut active = Vec::new();
        for entry in &mut self.entries {
            if t < entry.at {
                continue;
            }
            match entry.until {
                Some(until) if entry.event.is_held() => {
                    if t < until {
                        active.push(entry.event);
                    }
                }
                _ => {
                    if !entry.fired {
                        entry.fired = true;
                        active.push(entry.event);
                    }
                }
            }
        }
        active
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

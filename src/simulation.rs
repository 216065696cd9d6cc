use crate::controls::{ControlEvent, ControlScript};
use crate::history::History;
use crate::model::OscillatorGrid;
use crate::tissue::TissueMap;
use anyhow::{Context, Result};
use log::{debug, info, trace};
use resonance_common::{HistoryLog, SimulationConfig};

/// Minimum simulated time between two "show fields" log lines.
const FIELD_REPORT_INTERVAL: f64 = 0.2;

/// Whether the driver should keep going after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Quit,
}

/// Owns the oscillator model and everything around one run: simulated time,
/// step clamping, control handling and the history for the plotter.
pub struct Simulation {
    model: OscillatorGrid,
    history: History,
    sim_time: f64,
    max_dt: f64,
    adjust_factor: f64,
    frequency_adjust_exponent: f64,
    canvas: (f64, f64),
    last_field_report: Option<f64>,
    steps: u64,
}

impl Simulation {
    /// Builds the tissue and model described by `config`.
    pub fn new(config: &SimulationConfig) -> Result<Self> {
        let params = config.model_params();
        let tissue = TissueMap::load(&config.tissue.source, &config.tissue.data_dir, params.columns, params.rows)
            .with_context(|| format!("Failed to load tissue '{}'", config.tissue.source))?;
        let model = OscillatorGrid::new(&params, tissue).context("Failed to build oscillator grid")?;
        Ok(Self::from_model(model, config))
    }

    pub fn from_model(model: OscillatorGrid, config: &SimulationConfig) -> Self {
        Self {
            model,
            history: History::new(0.0, config.timing.record_interval),
            sim_time: 0.0,
            max_dt: config.timing.max_dt,
            adjust_factor: config.timing.adjust_factor,
            frequency_adjust_exponent: config.timing.frequency_adjust_exponent,
            canvas: (config.grid.canvas_width, config.grid.canvas_height),
            last_field_report: None,
            steps: 0,
        }
    }

    /// One iteration of the driver loop.
    ///
    /// Samples the history, advances the model by the elapsed time clamped to
    /// `[0, max_dt]`, then applies this poll's control events so they take
    /// effect from the next step on.
    pub fn tick(&mut self, elapsed: f64, events: &[ControlEvent]) -> TickOutcome {
        let dt = elapsed.clamp(0.0, self.max_dt);

        self.history.record(self.sim_time, self.model.field_state(), self.model.orientation());

        self.sim_time += dt;
        if dt > 0.0 {
            self.model.advance(self.sim_time, dt);
            self.steps += 1;
        }

        let mut outcome = TickOutcome::Continue;
        for &event in events {
            if self.apply(event, dt) == TickOutcome::Quit {
                outcome = TickOutcome::Quit;
            }
        }
        outcome
    }

    /// Translates one control event into the matching model operation.
    pub fn apply(&mut self, event: ControlEvent, dt: f64) -> TickOutcome {
        let step = self.adjust_factor.powf(dt);
        let frequency_step = self.adjust_factor.powf(dt * self.frequency_adjust_exponent);
        match event {
            ControlEvent::StaticUp => self.model.scale_static_field_magnitude(step),
            ControlEvent::StaticDown => self.model.scale_static_field_magnitude(step.recip()),
            ControlEvent::DrivenUp => self.model.scale_driven_field_magnitude(step),
            ControlEvent::DrivenDown => self.model.scale_driven_field_magnitude(step.recip()),
            ControlEvent::FrequencyUp => self.model.scale_driven_field_frequency(frequency_step),
            ControlEvent::FrequencyDown => self.model.scale_driven_field_frequency(frequency_step.recip()),
            ControlEvent::ToggleStatic => self.model.toggle_static_field(),
            ControlEvent::ToggleDriven => self.model.toggle_driven_field(),
            ControlEvent::ZeroVelocity => {
                debug!("Angular velocity zeroed at t={:.3}", self.sim_time);
                self.model.zero_velocity();
            }
            ControlEvent::FullReset => {
                self.model.full_reset();
                self.history.mark_reset(self.sim_time);
            }
            ControlEvent::ShowFields => self.report_fields(),
            ControlEvent::Quit => return TickOutcome::Quit,
        }
        TickOutcome::Continue
    }

    fn report_fields(&mut self) {
        let due = self
            .last_field_report
            .map_or(true, |last| self.sim_time - last >= FIELD_REPORT_INTERVAL);
        if due {
            self.last_field_report = Some(self.sim_time);
            info!(
                "B0 magnitude | {:.5} | B1 magnitude | {:.5} | B1 frequency | {:.5}",
                self.model.static_magnitude(),
                self.model.driven_magnitude(),
                self.model.driven_frequency()
            );
        }
    }

    /// Fixed-step stand-in for the wall-clock loop.
    ///
    /// Runs until `total_time` of simulated time has passed or the script
    /// issues `Quit`.
    pub fn run_headless(&mut self, frame_dt: f64, total_time: f64, script: &mut ControlScript) -> Result<()> {
        if !(frame_dt > 0.0) {
            anyhow::bail!("frame_dt must be positive, got {}", frame_dt);
        }
        info!(
            "Running {} cells for {:.1} s of simulated time ({} scripted events).",
            self.model.cell_count(),
            total_time,
            script.len()
        );

        let mut next_progress = 0.0;
        while self.sim_time < total_time {
            let events = script.poll(self.sim_time);
            if self.tick(frame_dt, &events) == TickOutcome::Quit {
                info!("Quit requested at t={:.3}", self.sim_time);
                break;
            }

            if self.sim_time >= next_progress {
                info!(
                    "t={:7.2} s | B0 {:10.3} | B1 {:10.3} | f1 {:7.4} Hz | samples {}",
                    self.sim_time,
                    self.model.effective_static_magnitude(),
                    self.model.driven_magnitude(),
                    self.model.effective_driven_frequency(),
                    self.history.samples().len()
                );
                next_progress += (total_time / 10.0).max(frame_dt);
            } else {
                trace!("t={:.4} step {}", self.sim_time, self.steps);
            }
        }
        Ok(())
    }

    pub fn model(&self) -> &OscillatorGrid {
        &self.model
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn sim_time(&self) -> f64 {
        self.sim_time
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Ends the run, handing back the model's final state and the history.
    pub fn finish(self) -> (OscillatorGrid, HistoryLog) {
        let log = self.history.into_log(&self.model, self.canvas, self.sim_time);
        (self.model, log)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonance_common::ScriptEntry;

    fn config(b0: f64, b1: f64) -> SimulationConfig {
        let mut config = SimulationConfig::default();
        config.grid.columns = 2;
        config.grid.rows = 1;
        config.fields.static_magnitude = b0;
        config.fields.driven_magnitude = b1;
        config
    }

    #[test]
    fn elapsed_time_is_clamped() {
        let mut sim = Simulation::new(&config(4000.0, 1000.0)).unwrap();
        sim.tick(5.0, &[]);
        assert!((sim.sim_time() - 0.1).abs() < 1e-12);
        sim.tick(-1.0, &[]);
        assert!((sim.sim_time() - 0.1).abs() < 1e-12);
        assert_eq!(sim.steps(), 1);
    }

    #[test]
    fn adjust_events_ramp_exponentially() {
        let mut sim = Simulation::new(&config(4000.0, 1000.0)).unwrap();
        // sqrt(2) per second: two seconds of holding doubles the field
        for _ in 0..20 {
            sim.tick(0.1, &[ControlEvent::StaticUp, ControlEvent::DrivenDown]);
        }
        assert!((sim.model().static_magnitude() - 8000.0).abs() < 1e-6);
        assert!((sim.model().driven_magnitude() - 500.0).abs() < 1e-6);

        for _ in 0..10 {
            sim.tick(0.1, &[ControlEvent::FrequencyUp]);
        }
        let expected = 2f64.sqrt().powf(0.7);
        assert!((sim.model().driven_frequency() - expected).abs() < 1e-9);
    }

    #[test]
    fn full_reset_is_recorded_for_the_plot() {
        let mut sim = Simulation::new(&config(4000.0, 1000.0)).unwrap();
        sim.tick(0.05, &[]);
        sim.tick(0.05, &[ControlEvent::FullReset]);
        assert!(sim.model().orientation().iter().all(|&t| t == 140.0));
        assert_eq!(sim.history().resets().len(), 1);
        assert!((sim.history().resets()[0] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn toggled_off_fields_leave_arrows_at_rest() {
        let mut sim = Simulation::new(&config(0.0, 0.0)).unwrap();
        sim.tick(0.01, &[ControlEvent::ToggleStatic, ControlEvent::ToggleDriven]);
        for _ in 0..100 {
            sim.tick(0.01, &[]);
        }
        assert!(!sim.model().static_on() && !sim.model().driven_on());
        assert!(sim.model().orientation().iter().all(|&t| (t - 180.0).abs() < 1e-12));
        assert!(sim.model().angular_velocity().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn history_samples_carry_the_field_switches() {
        let mut sim = Simulation::new(&config(4000.0, 1000.0)).unwrap();
        sim.tick(0.1, &[ControlEvent::ToggleDriven]);
        for _ in 0..5 {
            sim.tick(0.1, &[]);
        }
        let (_, log) = sim.finish();
        let last = log.samples.last().unwrap();
        assert!(last.fields.static_on && !last.fields.driven_on);
        assert_eq!(last.fields.driven_magnitude, 1000.0);
        assert_eq!(last.fields.effective_driven_frequency(), 0.0);
        assert!(!log.final_fields.driven_on);
        assert!((log.end_time - 0.6).abs() < 1e-9);
    }

    #[test]
    fn quit_stops_a_headless_run() {
        let mut config = config(4000.0, 1000.0);
        config.script.push(ScriptEntry { at: 1.0, until: None, event: "quit".into() });
        let mut script = ControlScript::from_entries(&config.script).unwrap();

        let mut sim = Simulation::new(&config).unwrap();
        sim.run_headless(0.05, 300.0, &mut script).unwrap();
        assert!(sim.sim_time() >= 1.0 && sim.sim_time() < 1.2, "stopped at {}", sim.sim_time());
    }

    #[test]
    fn headless_run_stops_at_runtime_ceiling_and_logs_history() {
        let config = config(4000.0, 1000.0);
        let mut sim = Simulation::new(&config).unwrap();
        sim.run_headless(0.02, 2.0, &mut ControlScript::default()).unwrap();
        assert!(sim.sim_time() >= 2.0 && sim.sim_time() < 2.05);

        let (model, log) = sim.finish();
        assert_eq!((log.columns, log.rows), (2, 1));
        assert_eq!(log.cell_positions.len(), 2);
        assert_eq!(log.final_orientations, model.orientation().to_vec());
        assert!(!log.samples.is_empty());
        assert!(log.samples.iter().all(|s| s.orientations.iter().all(|t| (0.0..360.0).contains(t))));
        assert!(model.orientation().iter().all(|t| t.is_finite()));
    }

    #[test]
    fn missing_tissue_file_fails_construction() {
        let mut config = config(1.0, 1.0);
        config.tissue.source = "no-such-tissue".into();
        config.tissue.data_dir = std::env::temp_dir().display().to_string();
        assert!(Simulation::new(&config).is_err());
    }
}

//! Grid of damped, driven rotational oscillators: a toy picture of spin
//! precession in a magnetic-resonance experiment.
//!
//! The physics core is [`model::OscillatorGrid`], built from a
//! [`tissue::TissueMap`] and a [`field::FieldGenerator`] and stepped with the
//! torque from [`torque`]. [`simulation::Simulation`] is the driver around it.

pub mod controls;
pub mod error;
pub mod field;
pub mod history;
pub mod model;
pub mod settings;
pub mod simulation;
pub mod tissue;
pub mod torque;

pub use controls::{ControlEvent, ControlScript};
pub use error::ModelError;
pub use model::OscillatorGrid;
pub use simulation::{Simulation, TickOutcome};
pub use tissue::TissueMap;

//! BDD step definitions for the PMU monitor

pub mod alert_steps;
pub mod gate_steps;
pub mod polling_steps;
pub mod protocol_steps;

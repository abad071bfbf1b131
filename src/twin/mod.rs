// Live digital twins and their manager

mod digital_twin;
mod disruption;
pub mod history;
mod manager;
pub mod monitor;
mod registry;
mod types;

pub use digital_twin::DigitalTwin;
pub use manager::DigitalTwinManager;
pub use registry::{InMemoryTwinRegistry, TwinRegistry};
pub use types::{
    DisruptionEffect, DisruptionKind, ScenarioConfig, ScenarioResult, Severity, TwinConfig, TwinData,
    TwinEvent, TwinEventKind, TwinStatus, TwinStatusSnapshot, TwinSummary,
};

#[cfg(test)]
mod tests;

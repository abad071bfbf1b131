// Error type shared by every component
pub mod error;

// TOML configuration and environment overrides
pub mod config;

// Process models and the simulation engine
pub mod simulation;

// Live digital twins
pub mod twin;

// Parameter and schedule optimization
pub mod optimization;

pub use error::{Error, Result};

//! Fleet Configuration Module
//!
//! Provides the dashboard configuration loaded from TOML files.
//!
//! ## Loading Order
//!
//! 1. `COUGARS_CONFIG` environment variable (path to TOML file)
//! 2. `fleet_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! The loaded config is owned by `main` and handed to each component at
//! construction; there is no process-global copy.

mod fleet_config;
pub mod defaults;

pub use fleet_config::*;

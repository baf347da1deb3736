// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs`: TOML data model and the runtime [`RunConfiguration`].
//! - `loader.rs`: reading a config file from disk.
//! - `validate.rs`: semantic checks.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    config_root_dir, default_config_path, load_and_validate, load_from_path,
    load_run_configuration,
};
pub use model::{
    ConfigFile, DEFAULT_WORKER_PROGRAM, LogSection, RunConfiguration, RunSection,
    TransformSection, WorkerCommand,
};
pub use validate::validate_config;

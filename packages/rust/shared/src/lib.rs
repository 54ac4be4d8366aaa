//! Shared types, error model, and configuration for berclean.
//!
//! This crate is the foundation depended on by all other berclean crates.
//! It provides:
//! - [`BerCleanError`], the unified error type
//! - Domain types ([`Table`], [`EraBand`], [`ThermalEra`], [`Location`], [`RunManifest`])
//! - Configuration ([`AppConfig`], [`PipelineOptions`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, PipelineOptions, RulesConfig, config_dir, config_file_path,
    init_config, load_config, load_config_from,
};
pub use error::{BerCleanError, Result};
pub use types::{
    CURRENT_SCHEMA_VERSION, EraBand, Location, RunId, RunManifest, Table, ThermalEra,
    UnknownTypologyPolicy,
};

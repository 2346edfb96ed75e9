//! Configuration module for Tessera
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use tessera::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("tessera.toml")).unwrap();
//! println!("Flushing every {} outcomes", config.persistence.flush_threshold);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, HttpConfig, PersistenceConfig, StorageConfig,
    DEFAULT_ACCEPT_LANGUAGE, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::{effective_concurrency, normalize_region, validate_concurrency};

//! # Storage Layer
//!
//! File formats consumed and produced around a dispatch pass.
//!
//! | Data | Format | Module |
//! |------|--------|--------|
//! | Message batch | JSON array, `{"items": [...]}`, or JSONL | [`batch`] |
//! | Handler config | JSON or TOML, keyed by message type | [`config`] |
//! | Temporary ID map | Pretty JSON object | [`id_map`] |
//!
//! ## Key Types
//!
//! - [`PartitionedConfig`] - Regular and project handler configuration
//! - [`IdMapFile`] - Locked read/write of the temporary ID map

pub mod batch;
pub mod config;
pub mod id_map;

pub use batch::{parse_batch, read_batch, BatchError};
pub use config::{
    is_project_type, load_config_file, partition, ConfigError, HandlerConfig, PartitionedConfig,
    PROJECT_MESSAGE_TYPES,
};
pub use id_map::IdMapFile;

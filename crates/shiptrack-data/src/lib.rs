//! Tracker configuration: the serde schema and the file loader.
//!
//! A configuration directory holds at most one `tracker.{ron,toml,json}`.
//! Every field has a default, so an empty file (or no file) yields the
//! built-in behaviour.

pub mod loader;
pub mod schema;

pub use loader::{
    CONFIG_BASE_NAME, DataLoadError, Format, detect_format, find_data_file, load_config_dir,
    load_config_file, parse_config_str, serialize_config,
};
pub use schema::{
    ConfigError, DestinationData, LogFormat, LoggingConfig, NetworkConfig, TrackerConfig,
};

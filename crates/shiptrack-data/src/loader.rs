//! Config file discovery, format detection and deserialization.
//!
//! RON, TOML and JSON are all accepted; the format comes from the file
//! extension. Loaded configs are validated before they are returned.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use crate::schema::{ConfigError, TrackerConfig};

/// Base name of the tracker config file inside a config directory.
pub const CONFIG_BASE_NAME: &str = "tracker";

const INLINE_SOURCE: &str = "<inline>";

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("{file}: expected a .ron, .toml or .json config file")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("found both {a} and {b}; keep one config file")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("cannot parse {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// The file parsed but holds values the runtime rejects.
    #[error("invalid config in {file}: {source}")]
    Invalid {
        file: PathBuf,
        #[source]
        source: ConfigError,
    },

    /// Serializing a config back to text failed.
    #[error("could not write {format:?}: {detail}")]
    Serialize { format: Format, detail: String },

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported config file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Ron, Format::Toml, Format::Json];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// more than one format exists for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for format in Format::ALL {
        let candidate = dir.join(format!("{base_name}.{}", format.extension()));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_as<T: DeserializeOwned>(format: Format, content: &str) -> Result<T, String> {
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| e.to_string()),
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
    }
}

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    parse_as(format, &content).map_err(|detail| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    })
}

fn validated(config: TrackerConfig, file: &Path) -> Result<TrackerConfig, DataLoadError> {
    config.validate().map_err(|source| DataLoadError::Invalid {
        file: file.to_path_buf(),
        source,
    })?;
    Ok(config)
}

/// Parse and validate config text in the given format.
pub fn parse_config_str(format: Format, text: &str) -> Result<TrackerConfig, DataLoadError> {
    let config = parse_as(format, text).map_err(|detail| DataLoadError::Parse {
        file: PathBuf::from(INLINE_SOURCE),
        detail,
    })?;
    validated(config, Path::new(INLINE_SOURCE))
}

/// Render a config as text in the given format.
pub fn serialize_config(config: &TrackerConfig, format: Format) -> Result<String, DataLoadError> {
    fn render<T: Serialize>(value: &T, format: Format) -> Result<String, String> {
        match format {
            Format::Ron => ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())
                .map_err(|e| e.to_string()),
            Format::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
            Format::Toml => toml::to_string_pretty(value).map_err(|e| e.to_string()),
        }
    }
    render(config, format).map_err(|detail| DataLoadError::Serialize { format, detail })
}

// ===========================================================================
// Loading
// ===========================================================================

/// Load and validate a config file. The file must exist.
pub fn load_config_file(path: &Path) -> Result<TrackerConfig, DataLoadError> {
    let config: TrackerConfig = deserialize_file(path)?;
    let config = validated(config, path)?;
    tracing::debug!(path = %path.display(), "loaded tracker config");
    Ok(config)
}

/// Load `tracker.{ron,toml,json}` from `dir`, or the defaults when the
/// directory has none.
pub fn load_config_dir(dir: &Path) -> Result<TrackerConfig, DataLoadError> {
    match find_data_file(dir, CONFIG_BASE_NAME)? {
        Some(path) => load_config_file(&path),
        None => {
            tracing::debug!(dir = %dir.display(), "no tracker config found, using defaults");
            Ok(TrackerConfig::default())
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::LogFormat;
    use std::fs;

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("shiptrack-loader-{}-{label}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    // -----------------------------------------------------------------------
    // detect_format
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("tracker.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("tracker.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("tracker.json")).unwrap(), Format::Json);
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        for name in ["tracker.yaml", "tracker"] {
            assert!(matches!(
                detect_format(Path::new(name)),
                Err(DataLoadError::UnsupportedFormat { .. })
            ));
        }
    }

    // -----------------------------------------------------------------------
    // find_data_file
    // -----------------------------------------------------------------------

    #[test]
    fn locates_the_single_config() {
        let dir = scratch_dir("found");
        fs::write(dir.join("tracker.toml"), "").unwrap();

        let result = find_data_file(&dir, "tracker").unwrap();
        assert_eq!(result, Some(dir.join("tracker.toml")));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn absent_config_is_none() {
        let dir = scratch_dir("missing");
        assert_eq!(find_data_file(&dir, "tracker").unwrap(), None);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn two_formats_for_one_name_conflict() {
        let dir = scratch_dir("conflict");
        fs::write(dir.join("tracker.ron"), "()").unwrap();
        fs::write(dir.join("tracker.json"), "{}").unwrap();

        assert!(matches!(
            find_data_file(&dir, "tracker"),
            Err(DataLoadError::ConflictingFormats { .. })
        ));

        let _ = fs::remove_dir_all(&dir);
    }

    // -----------------------------------------------------------------------
    // parse_config_str
    // -----------------------------------------------------------------------

    #[test]
    fn empty_documents_are_defaults() {
        assert_eq!(parse_config_str(Format::Ron, "()").unwrap(), TrackerConfig::default());
        assert_eq!(parse_config_str(Format::Toml, "").unwrap(), TrackerConfig::default());
        assert_eq!(parse_config_str(Format::Json, "{}").unwrap(), TrackerConfig::default());
    }

    #[test]
    fn partial_toml_overrides_only_named_keys() {
        let text = r#"
initial_batch = 5
seed = 42

[timing]
generation_ms = 500

[logging]
format = "json"
"#;
        let config = parse_config_str(Format::Toml, text).unwrap();
        assert_eq!(config.initial_batch, 5);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.timing.generation_ms, 500);
        assert_eq!(config.timing.aggregation_ms, 2000);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn ron_network_override() {
        let text = r#"(
    network: Some((
        warehouses: [(name: "Reno, NV", lat: 39.5, lng: -119.8)],
        destinations: [
            (city: "Denver", state: Some("CO"), country: "USA", lat: 39.7, lng: -105.0),
            (city: "Tokyo", country: "Japan", lat: 35.7, lng: 139.7, weight: Some(4)),
        ],
    )),
)"#;
        let config = parse_config_str(Format::Ron, text).unwrap();
        let catalog = config.catalog().unwrap();
        assert_eq!(catalog.warehouses().len(), 1);
        assert_eq!(catalog.destinations().total_weight(), 3 + 4);
    }

    #[test]
    fn json_milestone_override() {
        let text = r#"{
            "milestones": [
                {"metric": "orders", "threshold": 3, "emoji": "*", "title": "Three", "description": "3 orders"}
            ]
        }"#;
        let config = parse_config_str(Format::Json, text).unwrap();
        assert_eq!(config.milestone_table().len(), 1);
        assert_eq!(config.milestone_table()[0].threshold, 3);
    }

    #[test]
    fn invalid_values_are_rejected_after_parse() {
        let err = parse_config_str(Format::Json, r#"{"history_capacity": 0}"#).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::Invalid {
                source: ConfigError::Zero { field: "history_capacity" },
                ..
            }
        ));
    }

    #[test]
    fn syntax_errors_are_parse_errors() {
        let err = parse_config_str(Format::Ron, "this is not valid RON {{{").unwrap_err();
        assert!(matches!(err, DataLoadError::Parse { .. }));
        assert!(err.to_string().contains(INLINE_SOURCE));
    }

    // -----------------------------------------------------------------------
    // serialize_config
    // -----------------------------------------------------------------------

    #[test]
    fn customised_config_survives_every_format() {
        let mut config = TrackerConfig::default();
        config.seed = Some(7);
        config.initial_batch = 12;
        config.goals.celebrations_enabled = false;
        config.logging.format = LogFormat::Json;

        for format in Format::ALL {
            let text = serialize_config(&config, format).unwrap();
            let back = parse_config_str(format, &text).unwrap();
            assert_eq!(back, config, "{format:?}");
        }
    }

    // -----------------------------------------------------------------------
    // load_config_file / load_config_dir
    // -----------------------------------------------------------------------

    #[test]
    fn load_dir_without_file_uses_defaults() {
        let dir = scratch_dir("load_defaults");
        assert_eq!(load_config_dir(&dir).unwrap(), TrackerConfig::default());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_dir_reads_tracker_file() {
        let dir = scratch_dir("load_dir");
        fs::write(dir.join("tracker.json"), r#"{"replay_window_cap": 20}"#).unwrap();

        let config = load_config_dir(&dir).unwrap();
        assert_eq!(config.replay_window_cap, 20);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_file_requires_existence() {
        let dir = scratch_dir("load_missing");
        let result = load_config_file(&dir.join("tracker.ron"));
        assert!(matches!(result, Err(DataLoadError::Io(_))));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_file_reports_path_on_invalid() {
        let dir = scratch_dir("load_invalid");
        let path = dir.join("tracker.toml");
        fs::write(&path, "[timing]\nreplay_base_ms = 0\n").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(err.to_string().contains("tracker.toml"));
        assert!(matches!(err, DataLoadError::Invalid { .. }));

        let _ = fs::remove_dir_all(&dir);
    }
}

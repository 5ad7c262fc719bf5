//! Configuration management for model-bridge
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (bridge.toml)
//! - Environment variables (BRIDGE__*)
//!
//! ## Example config file (bridge.toml):
//! ```toml
//! [naming]
//! spacer = " "
//! case_insensitive = true
//! scope = "global"
//!
//! [translation]
//! validate_required = true
//! exclude_tags = ["LifeCycleCost:Parameters"]
//! root_priority = ["Building", "Zone", "Construction"]
//! fail_on_error = false
//!
//! [logging]
//! filter = "model_bridge=info"
//!
//! [[mapping]]
//! variant = "ThermalZone"
//! tag = "Zone"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Record naming
    #[serde(default)]
    pub naming: NamingConfig,

    /// Run options
    #[serde(default)]
    pub translation: TranslationOptions,

    /// Log filter for the binaries
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Generic variant -> record tag mappings
    #[serde(default)]
    pub mapping: MappingConfig,
}

/// Namespace used for name uniqueness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NamingScope {
    /// Names are unique per record tag. References stay plain names, so
    /// records of different tags may then share a name.
    PerTag,
    /// Names are unique across the whole run
    #[default]
    Global,
}

/// Naming configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Separator between a base name and its counter ("Zone 2")
    #[serde(default = "default_spacer")]
    pub spacer: String,

    /// Compare names ignoring ASCII case
    #[serde(default = "default_true")]
    pub case_insensitive: bool,

    #[serde(default)]
    pub scope: NamingScope,
}

/// Options for one translation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationOptions {
    /// Report records whose required fields are empty as failures
    #[serde(default = "default_true")]
    pub validate_required: bool,

    /// Record tags that are never emitted
    #[serde(default)]
    pub exclude_tags: Vec<String>,

    /// Tags translated first by `translate_all`, in this order
    #[serde(default)]
    pub root_priority: Vec<String>,

    /// Exit non-zero when a run reports error-level failures
    #[serde(default)]
    pub fail_on_error: bool,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Fallback for RUST_LOG
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

/// Generic variant -> record tag mappings, as `[[mapping]]` entries.
///
/// Variant names are values rather than table keys: file sources fold
/// keys to lowercase, which would lose the variant's case on the way back.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct MappingConfig {
    pub entries: Vec<TagMapping>,
}

/// One `[[mapping]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagMapping {
    pub variant: String,
    pub tag: String,
}

// Default value functions
fn default_spacer() -> String {
    " ".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            spacer: default_spacer(),
            case_insensitive: true,
            scope: NamingScope::Global,
        }
    }
}

impl Default for TranslationOptions {
    fn default() -> Self {
        Self {
            validate_required: true,
            exclude_tags: Vec::new(),
            root_priority: Vec::new(),
            fail_on_error: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl TranslationOptions {
    /// Whether records of `tag` are suppressed
    pub fn is_excluded(&self, tag: &str) -> bool {
        self.exclude_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Position of `tag` in the root priority list; unlisted tags sort last
    pub fn priority_of(&self, tag: &str) -> usize {
        self.root_priority
            .iter()
            .position(|t| t.eq_ignore_ascii_case(tag))
            .unwrap_or(self.root_priority.len())
    }
}

impl MappingConfig {
    /// Add a mapping, replacing an earlier entry for the same variant
    pub fn insert(&mut self, variant: impl Into<String>, tag: impl Into<String>) {
        let variant = variant.into();
        self.entries.retain(|m| !m.variant.eq_ignore_ascii_case(&variant));
        self.entries.push(TagMapping {
            variant,
            tag: tag.into(),
        });
    }

    /// Builder-style insert
    pub fn with(mut self, variant: impl Into<String>, tag: impl Into<String>) -> Self {
        self.insert(variant, tag);
        self
    }

    /// Record tag configured for a variant (ignoring case)
    pub fn tag_for(&self, variant: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|m| m.variant.eq_ignore_ascii_case(variant))
            .map(|m| m.tag.as_str())
    }

    /// Variant configured for a record tag (first match), with its case
    /// as written
    pub fn variant_for(&self, tag: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|m| m.tag.eq_ignore_ascii_case(tag))
            .map(|m| m.variant.as_str())
    }
}

impl BridgeConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["bridge.toml", ".bridge.toml", "config/bridge.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "model-bridge") {
            let xdg_config = config_dir.config_dir().join("bridge.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // BRIDGE__NAMING__SPACER=_ etc.
        builder = builder.add_source(
            Environment::with_prefix("BRIDGE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.naming.spacer, " ");
        assert!(config.naming.case_insensitive);
        assert_eq!(config.naming.scope, NamingScope::Global);
        assert!(config.mapping.entries.is_empty());
        assert!(config.translation.validate_required);
        assert!(!config.translation.fail_on_error);
    }

    #[test]
    fn test_serialize_config() {
        let config = BridgeConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[naming]"));
        assert!(toml_str.contains("[translation]"));
    }

    #[test]
    fn test_priority_and_exclusion() {
        let options = TranslationOptions {
            exclude_tags: vec!["LifeCycleCost".into()],
            root_priority: vec!["Zone".into(), "Construction".into()],
            ..TranslationOptions::default()
        };
        assert!(options.is_excluded("lifecyclecost"));
        assert!(!options.is_excluded("Zone"));
        assert_eq!(options.priority_of("Zone"), 0);
        assert_eq!(options.priority_of("construction"), 1);
        assert_eq!(options.priority_of("Material"), 2);
    }

    #[test]
    fn test_load_and_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        let mut config = BridgeConfig::default();
        config.naming.spacer = "_".into();
        config.naming.scope = NamingScope::PerTag;
        config.translation.exclude_tags = vec!["Output:Variable".into()];
        config.mapping.insert("ThermalZone", "Zone");
        config.save(path.to_str().unwrap()).unwrap();

        let loaded = BridgeConfig::load_from(path.to_str()).unwrap();
        assert_eq!(loaded.naming.spacer, "_");
        assert_eq!(loaded.naming.scope, NamingScope::PerTag);
        assert_eq!(loaded.translation.exclude_tags, vec!["Output:Variable"]);
        assert_eq!(loaded.mapping.tag_for("ThermalZone"), Some("Zone"));
        assert_eq!(loaded.mapping.variant_for("Zone"), Some("ThermalZone"));
    }

    #[test]
    fn test_mapping_file_keeps_variant_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.toml");
        std::fs::write(
            &path,
            "[[mapping]]\nvariant = \"ThermalZone\"\ntag = \"Zone\"\n\n\
             [[mapping]]\nvariant = \"AirLoopHVAC\"\ntag = \"Loop\"\n",
        )
        .unwrap();

        let loaded = BridgeConfig::load_from(path.to_str()).unwrap();
        assert_eq!(loaded.mapping.entries.len(), 2);
        assert_eq!(loaded.mapping.variant_for("Zone"), Some("ThermalZone"));
        assert_eq!(loaded.mapping.variant_for("Loop"), Some("AirLoopHVAC"));
        assert_eq!(loaded.mapping.tag_for("thermalzone"), Some("Zone"));
    }

    #[test]
    fn test_mapping_insert_replaces_variant() {
        let mut mapping = MappingConfig::default().with("ThermalZone", "Zone");
        mapping.insert("thermalzone", "Space");
        assert_eq!(mapping.entries.len(), 1);
        assert_eq!(mapping.tag_for("ThermalZone"), Some("Space"));
    }
}

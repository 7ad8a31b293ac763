//! Tool configuration loader.
//!
//! Loads the tool table and presets from YAML:
//!
//! ```yaml
//! tools:
//!   dummy-tagger:
//!     kind: dummy-tagger
//!     source_fields: [form]
//!     target_fields: []
//! presets:
//!   dummy: [dummy-tagger]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dummy_tagger::DummyTagger;
use crate::stage::{StageError, StageOptions};

/// Named tool chains: preset name -> tool names.
pub type Presets = IndexMap<String, Vec<String>>;

/// Error type for loading and initialising tool configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("tool '{tool}' uses unknown kind '{kind}'")]
    UnknownKind { tool: String, kind: String },

    #[error("preset '{preset}' references unknown tool '{tool}'")]
    UnknownPresetTool { preset: String, tool: String },

    #[error("preset '{0}' has the same name as a tool")]
    PresetShadowsTool(String),

    #[error("preset '{0}' lists no tools")]
    EmptyPreset(String),

    #[error("failed to initialise tool '{tool}': {source}")]
    Stage {
        tool: String,
        #[source]
        source: StageError,
    },
}

/// One entry of the tool table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEntry {
    /// Registry kind used to construct the stage
    pub kind: String,

    #[serde(flatten)]
    pub options: StageOptions,
}

/// Tool table and presets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub tools: IndexMap<String, ToolEntry>,
    pub presets: Presets,
}

impl ToolsConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, is not valid YAML, or its
    /// presets do not line up with its tools.
    ///
    /// # Example
    /// ```ignore
    /// use dummytagger::runtime::ToolsConfig;
    ///
    /// let config = ToolsConfig::load_from_file("config/tools.yaml")?;
    /// println!("Tools: {:?}", config.tool_names());
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml_str(&contents)
    }

    /// Parse and validate configuration from YAML text.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ToolsConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// The built-in table: a single `dummy-tagger` tool reading `form`.
    pub fn builtin() -> Self {
        let mut tools = IndexMap::new();
        tools.insert(
            DummyTagger::KIND.to_string(),
            ToolEntry {
                kind: DummyTagger::KIND.to_string(),
                options: StageOptions::new().with_source_fields(["form"]),
            },
        );

        Self {
            tools,
            presets: Presets::new(),
        }
    }

    /// Check that presets only name existing tools and do not shadow them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (preset, members) in &self.presets {
            if self.tools.contains_key(preset) {
                return Err(ConfigError::PresetShadowsTool(preset.clone()));
            }
            if members.is_empty() {
                return Err(ConfigError::EmptyPreset(preset.clone()));
            }
            if let Some(missing) = members.iter().find(|tool| !self.tools.contains_key(*tool)) {
                return Err(ConfigError::UnknownPresetTool {
                    preset: preset.clone(),
                    tool: missing.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
tools:
  dummy-tagger:
    kind: dummy-tagger
    source_fields: [form]
    target_fields: []
  strip-header:
    kind: dummy-tagger
    pass_header: false
    class_path: /opt/tagger/tagger.jar
    vm_opts: ["-Xmx2G"]
presets:
  dummy: [dummy-tagger, strip-header]
"#;

    #[test]
    fn test_parse_sample() {
        let config = ToolsConfig::from_yaml_str(SAMPLE).unwrap();

        assert_eq!(config.tool_names(), vec!["dummy-tagger", "strip-header"]);

        let strip = &config.tools["strip-header"];
        assert_eq!(strip.kind, "dummy-tagger");
        assert!(!strip.options.pass_header);
        assert_eq!(strip.options.class_path, "/opt/tagger/tagger.jar");
        assert_eq!(strip.options.vm_opts, vec!["-Xmx2G"]);
        assert!(strip.options.extra.is_empty());

        assert_eq!(config.presets["dummy"], vec!["dummy-tagger", "strip-header"]);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = ToolsConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.tools.len(), 2);
    }

    #[test]
    fn test_missing_file() {
        let result = ToolsConfig::load_from_file("/nonexistent/tools.yaml");
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_invalid_yaml() {
        let result = ToolsConfig::from_yaml_str("tools: [not, a, map");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_preset_with_unknown_tool() {
        let yaml = "tools:\n  a:\n    kind: dummy-tagger\npresets:\n  p: [a, b]\n";
        let err = ToolsConfig::from_yaml_str(yaml).unwrap_err();

        assert!(err.to_string().contains("unknown tool 'b'"));
    }

    #[test]
    fn test_preset_shadowing_tool() {
        let yaml = "tools:\n  a:\n    kind: dummy-tagger\npresets:\n  a: [a]\n";
        let result = ToolsConfig::from_yaml_str(yaml);

        assert!(matches!(result, Err(ConfigError::PresetShadowsTool(name)) if name == "a"));
    }

    #[test]
    fn test_empty_preset() {
        let yaml = "tools:\n  a:\n    kind: dummy-tagger\npresets:\n  p: []\n";
        assert!(matches!(
            ToolsConfig::from_yaml_str(yaml),
            Err(ConfigError::EmptyPreset(_))
        ));
    }

    #[test]
    fn test_builtin_table() {
        let config = ToolsConfig::builtin();
        let entry = &config.tools[DummyTagger::KIND];

        assert!(entry.options.source_fields.contains("form"));
        assert!(entry.options.target_fields.is_empty());
        assert!(config.validate().is_ok());
    }
}

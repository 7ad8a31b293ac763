//! Tool registry and initialisation.
//!
//! Maps a kind name from the configuration to a factory that builds the stage,
//! so new stages can be plugged in without touching the runner.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::dummy_tagger::DummyTagger;
use crate::runtime::config_loader::{ConfigError, ToolsConfig};
use crate::stage::{DynStage, StageError, StageOptions};

/// Trait for stage factories
pub trait StageFactory: Send + Sync {
    /// Build a stage from its construction options.
    ///
    /// # Returns
    ///
    /// * `Ok(stage)` - Stage constructed
    /// * `Err(StageError::Config)` - Options are malformed for this kind
    fn create(&self, options: StageOptions) -> Result<Box<dyn DynStage>, StageError>;
}

/// Simple function-based implementation of StageFactory
impl<F> StageFactory for F
where
    F: Fn(StageOptions) -> Result<Box<dyn DynStage>, StageError> + Send + Sync,
{
    fn create(&self, options: StageOptions) -> Result<Box<dyn DynStage>, StageError> {
        self(options)
    }
}

/// Registry of stage kinds
pub struct ToolRegistry {
    factories: HashMap<String, Box<dyn StageFactory>>,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with the stages shipped in this crate
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(
            DummyTagger::KIND,
            Box::new(
                |options: StageOptions| -> Result<Box<dyn DynStage>, StageError> {
                    Ok(Box::new(DummyTagger::new(options)))
                },
            ),
        );
        registry
    }

    /// Register a stage factory under a kind name
    ///
    /// # Example
    ///
    /// ```ignore
    /// use dummytagger::runtime::ToolRegistry;
    ///
    /// let mut registry = ToolRegistry::with_builtins();
    /// registry.register("my-tagger", Box::new(|options| {
    ///     let model = options.extra_str("model")?.to_string();
    ///     Ok(Box::new(MyTagger::load(model, options)?) as Box<dyn DynStage>)
    /// }));
    /// ```
    pub fn register(&mut self, kind: impl Into<String>, factory: Box<dyn StageFactory>) {
        self.factories.insert(kind.into(), factory);
    }

    /// Build a stage of the given kind.
    ///
    /// Returns `None` when the kind is not registered; construction errors
    /// are passed through unchanged.
    pub fn create(
        &self,
        kind: &str,
        options: StageOptions,
    ) -> Option<Result<Box<dyn DynStage>, StageError>> {
        self.factories.get(kind).map(|factory| factory.create(options))
    }

    /// Check if a kind is registered
    pub fn has_kind(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    /// Registered kind names, sorted
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.factories.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Constructed stages, keyed by tool name in configuration order.
#[derive(Default)]
pub struct InitedTools {
    tools: IndexMap<String, Box<dyn DynStage>>,
}

impl InitedTools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, stage: Box<dyn DynStage>) {
        self.tools.insert(name.into(), stage);
    }

    pub fn get(&self, name: &str) -> Option<&dyn DynStage> {
        self.tools.get(name).map(|stage| stage.as_ref())
    }

    /// The stored tool name together with its stage.
    pub fn get_key_value(&self, name: &str) -> Option<(&str, &dyn DynStage)> {
        self.tools
            .get_key_value(name)
            .map(|(name, stage)| (name.as_str(), stage.as_ref()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn DynStage)> {
        self.tools
            .iter()
            .map(|(name, stage)| (name.as_str(), stage.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Construct every tool in `config` once.
///
/// Fails on the first tool whose kind is unknown or whose construction fails;
/// the stage's own error is kept as the source.
pub fn init_everything(
    config: &ToolsConfig,
    registry: &ToolRegistry,
) -> Result<InitedTools, ConfigError> {
    let mut inited = InitedTools::new();

    for (name, entry) in &config.tools {
        if !entry.options.class_path.is_empty() {
            tracing::info!(tool = %name, class_path = %entry.options.class_path, "Tool requests extra class path entry");
        }
        if !entry.options.vm_opts.is_empty() {
            tracing::info!(tool = %name, vm_opts = ?entry.options.vm_opts, "Tool requests extra VM options");
        }

        let stage = registry
            .create(&entry.kind, entry.options.clone())
            .ok_or_else(|| ConfigError::UnknownKind {
                tool: name.clone(),
                kind: entry.kind.clone(),
            })?
            .map_err(|source| ConfigError::Stage {
                tool: name.clone(),
                source,
            })?;

        tracing::debug!(tool = %name, kind = %entry.kind, "Initialised tool");
        inited.insert(name.clone(), stage);
    }

    tracing::info!("Initialised {} tools", inited.len());
    Ok(inited)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing_factory() -> Box<dyn StageFactory> {
        Box::new(|options: StageOptions| -> Result<Box<dyn DynStage>, StageError> {
            let model = options.extra_str("model")?;
            Err(StageError::Config(format!("cannot load model {}", model)))
        })
    }

    #[test]
    fn test_builtins_registered() {
        let registry = ToolRegistry::with_builtins();

        assert!(registry.has_kind(DummyTagger::KIND));
        assert!(!registry.has_kind("other"));
        assert_eq!(registry.kinds(), vec![DummyTagger::KIND.to_string()]);
    }

    #[test]
    fn test_create_unknown_kind() {
        let registry = ToolRegistry::new();
        assert!(registry.create("nothing", StageOptions::default()).is_none());
    }

    #[test]
    fn test_create_passes_options_through() {
        let registry = ToolRegistry::with_builtins();
        let stage = registry
            .create(
                DummyTagger::KIND,
                StageOptions::new()
                    .with_source_fields(["form"])
                    .with_pass_header(false),
            )
            .unwrap()
            .unwrap();

        assert!(stage.sources().contains("form"));
        assert!(!stage.passes_header());
    }

    #[test]
    fn test_init_everything_builtin() {
        let inited = init_everything(&ToolsConfig::builtin(), &ToolRegistry::with_builtins()).unwrap();

        assert_eq!(inited.len(), 1);
        assert!(inited.contains(DummyTagger::KIND));
        assert_eq!(inited.names().collect::<Vec<_>>(), vec![DummyTagger::KIND]);
    }

    #[test]
    fn test_inited_lookup_by_name() {
        let inited = init_everything(&ToolsConfig::builtin(), &ToolRegistry::with_builtins()).unwrap();

        let (name, stage) = inited.get_key_value(DummyTagger::KIND).unwrap();
        assert_eq!(name, DummyTagger::KIND);
        assert!(stage.passes_header());
        assert!(inited.get_key_value("nope").is_none());
    }

    #[test]
    fn test_init_everything_unknown_kind() {
        let config = ToolsConfig::from_yaml_str("tools:\n  t:\n    kind: nope\n").unwrap();
        let result = init_everything(&config, &ToolRegistry::with_builtins());

        assert!(matches!(result, Err(ConfigError::UnknownKind { .. })));
    }

    #[test]
    fn test_init_everything_propagates_stage_error() {
        let mut registry = ToolRegistry::new();
        registry.register("model-tagger", failing_factory());

        let config = ToolsConfig::from_yaml_str("tools:\n  t:\n    kind: model-tagger\n").unwrap();
        let err = match init_everything(&config, &registry) {
            Err(ConfigError::Stage { tool, source }) => {
                assert_eq!(tool, "t");
                source
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("expected failure"),
        };

        assert_eq!(err, StageError::Config("missing string option 'model'".to_string()));
    }
}

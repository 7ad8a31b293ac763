//! Reference runner for stage pipelines.
//!
//! Reads the tab-separated token stream, builds tools from configuration and
//! drives every stage through its setup and per-sentence hooks.

pub mod tsv;
pub mod config_loader;
pub mod registry;
pub mod pipeline;

// Re-export key types
pub use tsv::{SentenceBlock, TsvError, TsvReader, TsvWriter};
pub use config_loader::{ConfigError, Presets, ToolEntry, ToolsConfig};
pub use registry::{init_everything, InitedTools, StageFactory, ToolRegistry};
pub use pipeline::{build_pipeline, process, Pipeline, PipelineError, RunStats};

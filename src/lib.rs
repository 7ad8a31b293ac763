//! # dummytagger: template stage for tab-separated NLP pipelines
//!
//! A pipeline passes sentences through a chain of stages. Every stage declares
//! the token fields it reads and the fields it appends, resolves field names to
//! column positions once per run, and then transforms one sentence at a time.
//!
//! ## Features
//!
//! - **Stage contract**: the [`Stage`] trait with its two hooks, `prepare_fields` and `process_sentence`
//! - **Template stage**: [`DummyTagger`], a pass-through stage to copy when writing a new one
//! - **Runner**: tab-separated codec, tool registry, presets and pipeline execution in [`runtime`]
//! - **Debug server**: an HTTP front end for trying tools out ([`server`])
//!
//! ## Example: configuration
//!
//! ```yaml
//! tools:
//!   dummy-tagger:
//!     kind: dummy-tagger
//!     source_fields: [form]
//!     target_fields: []
//!     pass_header: true
//! presets:
//!   dummy: [dummy-tagger]
//! ```
//!
//! ## Example: running a stage
//!
//! ```
//! use dummytagger::{process, DummyTagger, StageOptions};
//!
//! let tagger = DummyTagger::new(StageOptions::new().with_source_fields(["form"]));
//! let input = "id\tform\n1\tHello\n2\tworld\n\n";
//!
//! let mut output = Vec::new();
//! process(input.as_bytes(), &mut output, "dummy-tagger", &tagger).unwrap();
//! assert_eq!(String::from_utf8(output).unwrap(), input);
//! ```

// Core modules
pub mod stage;
pub mod dummy_tagger;

// Stream codec, registry and pipeline execution
pub mod runtime;

// Debug HTTP server
pub mod server;

// Re-export key types
pub use stage::{
    check_contract, DynStage, FieldList, FieldNameIndex, FieldSet, PreparedStage, Sentence, Stage,
    StageError, StageOptions, Token,
};
pub use dummy_tagger::DummyTagger;

// Re-export runtime types
pub use runtime::{
    build_pipeline, init_everything, process, ConfigError, InitedTools, Pipeline, PipelineError,
    Presets, RunStats, ToolRegistry, ToolsConfig,
};

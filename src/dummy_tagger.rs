//! The template stage.
//!
//! `DummyTagger` reads nothing, writes nothing and hands every sentence back
//! unchanged. Copy it as the starting point for a real stage: fill in
//! `prepare_fields` to resolve the columns you need and `process_sentence` to
//! append your target values.

use crate::stage::{FieldList, FieldNameIndex, FieldSet, Sentence, Stage, StageError, StageOptions};

/// Pass-through stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DummyTagger {
    options: StageOptions,
}

impl DummyTagger {
    /// Registry kind name.
    pub const KIND: &'static str = "dummy-tagger";

    pub fn new(options: StageOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &StageOptions {
        &self.options
    }

    /// Extra class path entry requested for a secondary runtime. Empty when unused.
    pub fn class_path(&self) -> &str {
        &self.options.class_path
    }

    /// Extra startup options requested for a secondary runtime.
    pub fn vm_opts(&self) -> &[String] {
        &self.options.vm_opts
    }
}

impl Stage for DummyTagger {
    type Fields = FieldNameIndex;

    fn source_fields(&self) -> &FieldSet {
        &self.options.source_fields
    }

    fn target_fields(&self) -> &FieldList {
        &self.options.target_fields
    }

    fn pass_header(&self) -> bool {
        self.options.pass_header
    }

    // Real stages usually return the columns they read,
    // e.g. `index.columns(&["form", "lemma", "xpostag"])`.
    fn prepare_fields(&self, index: &FieldNameIndex) -> Result<FieldNameIndex, StageError> {
        Ok(index.clone())
    }

    fn process_sentence(
        &self,
        sen: Sentence,
        _fields: &FieldNameIndex,
    ) -> Result<Sentence, StageError> {
        Ok(sen)
    }
}

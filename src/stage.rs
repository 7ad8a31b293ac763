//! Stage contract for tab-separated sentence pipelines.
//!
//! A stage declares which fields it reads from every token and which fields it
//! appends, resolves field names to column positions once per run, and then
//! transforms one sentence at a time. The runner in [`crate::runtime`] drives
//! the lifecycle; a stage never sees the stream itself.

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Names of the fields a stage reads. Unordered, unique.
pub type FieldSet = BTreeSet<String>;

/// Names of the fields a stage produces, in the order they are appended.
pub type FieldList = Vec<String>;

/// One token: its field values in column order.
pub type Token = Vec<String>;

/// One sentence: its tokens in source order.
pub type Sentence = Vec<Token>;

/// Error type for stage construction, setup and processing
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StageError {
    #[error("invalid stage configuration: {0}")]
    Config(String),

    #[error("field '{field}' is not available in the input stream")]
    FieldResolution { field: String },

    #[error("cannot compute field '{field}' for token {token}: {reason}")]
    Computation {
        field: String,
        token: usize,
        reason: String,
    },

    #[error("stage '{stage}' returned {actual} tokens for a sentence of {expected}")]
    TokenCountChanged {
        stage: String,
        expected: usize,
        actual: usize,
    },

    #[error("stage '{stage}' left token {token} with {actual} fields, expected {expected}")]
    ContractViolation {
        stage: String,
        token: usize,
        expected: usize,
        actual: usize,
    },

    #[error("stage '{stage}' changed existing field values of token {token}")]
    FieldsModified { stage: String, token: usize },
}

/// Run-scoped mapping from field name to column position.
///
/// Built once from the header of the stream and shared read-only with every
/// stage for the rest of the run. Cloning is cheap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldNameIndex {
    columns: Arc<IndexMap<String, usize>>,
}

impl FieldNameIndex {
    /// Build an index from header field names, numbering columns from zero.
    ///
    /// When a name repeats, its first column wins.
    pub fn from_header<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut columns = IndexMap::new();
        for (position, name) in names.into_iter().enumerate() {
            columns.entry(name.into()).or_insert(position);
        }
        Self {
            columns: Arc::new(columns),
        }
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Resolve a field that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::FieldResolution`] when the field is absent.
    pub fn require(&self, name: &str) -> Result<usize, StageError> {
        self.get(name).ok_or_else(|| StageError::FieldResolution {
            field: name.to_string(),
        })
    }

    /// Resolve several fields at once, keeping the requested order.
    ///
    /// # Example
    ///
    /// ```
    /// use dummytagger::FieldNameIndex;
    ///
    /// let index = FieldNameIndex::from_header(["id", "form", "lemma"]);
    /// assert_eq!(index.columns(&["lemma", "form"]).unwrap(), vec![2, 1]);
    /// ```
    pub fn columns<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>, StageError> {
        names.iter().map(|name| self.require(name.as_ref())).collect()
    }

    /// Number of distinct fields.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Field names in column order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.columns.iter().map(|(name, column)| (name.as_str(), *column))
    }

    /// A new index with `targets` appended after the existing columns.
    ///
    /// This is the index the next stage of a pipeline sees.
    pub fn extended<S: AsRef<str>>(&self, targets: &[S]) -> Self {
        let mut columns = (*self.columns).clone();
        let mut next = columns.values().max().map_or(0, |last| last + 1);
        for target in targets {
            let name = target.as_ref();
            if !columns.contains_key(name) {
                columns.insert(name.to_string(), next);
                next += 1;
            }
        }
        Self {
            columns: Arc::new(columns),
        }
    }
}

impl<S: Into<String>> FromIterator<(S, usize)> for FieldNameIndex {
    fn from_iter<T: IntoIterator<Item = (S, usize)>>(iter: T) -> Self {
        Self {
            columns: Arc::new(iter.into_iter().map(|(name, column)| (name.into(), column)).collect()),
        }
    }
}

/// Construction options shared by every stage.
///
/// `class_path` and `vm_opts` are hints for loaders that bridge to a secondary
/// runtime; stages in this crate only carry them. Anything else in a tool's
/// configuration lands in `extra` for the concrete stage to interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageOptions {
    pub source_fields: FieldSet,
    pub target_fields: FieldList,
    pub class_path: String,
    pub vm_opts: Vec<String>,
    /// Emit the header line when this stage ends the pipeline.
    pub pass_header: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for StageOptions {
    fn default() -> Self {
        Self {
            source_fields: FieldSet::new(),
            target_fields: FieldList::new(),
            class_path: String::new(),
            vm_opts: Vec::new(),
            pass_header: true,
            extra: serde_json::Map::new(),
        }
    }
}

impl StageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_target_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.target_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pass_header(mut self, pass_header: bool) -> Self {
        self.pass_header = pass_header;
        self
    }

    /// Fetch a required string from `extra`.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::Config`] when the key is missing or not a string.
    pub fn extra_str(&self, key: &str) -> Result<&str, StageError> {
        self.extra
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| StageError::Config(format!("missing string option '{}'", key)))
    }
}

/// A pipeline stage.
///
/// `prepare_fields` runs once per run, before the first sentence, and returns
/// the handle every later `process_sentence` call receives. The handle is
/// owned by that run and dropped when it ends.
///
/// # Example
///
/// ```
/// use dummytagger::{FieldList, FieldNameIndex, FieldSet, Sentence, Stage, StageError};
///
/// struct Upper {
///     source: FieldSet,
///     target: FieldList,
/// }
///
/// impl Stage for Upper {
///     type Fields = usize;
///
///     fn source_fields(&self) -> &FieldSet { &self.source }
///     fn target_fields(&self) -> &FieldList { &self.target }
///
///     fn prepare_fields(&self, index: &FieldNameIndex) -> Result<usize, StageError> {
///         index.require("form")
///     }
///
///     fn process_sentence(&self, mut sen: Sentence, form: &usize) -> Result<Sentence, StageError> {
///         for token in &mut sen {
///             let upper = token[*form].to_uppercase();
///             token.push(upper);
///         }
///         Ok(sen)
///     }
/// }
/// ```
pub trait Stage: Send + Sync {
    /// Whatever `prepare_fields` resolves: column numbers, helper objects, or
    /// the index itself.
    type Fields: Send + Sync + 'static;

    fn source_fields(&self) -> &FieldSet;

    fn target_fields(&self) -> &FieldList;

    fn pass_header(&self) -> bool {
        true
    }

    /// Resolve field names for the current run.
    fn prepare_fields(&self, index: &FieldNameIndex) -> Result<Self::Fields, StageError>;

    /// Transform one sentence.
    ///
    /// Implementations may only append values for `target_fields`, in
    /// declared order, to every token. The default returns the sentence as is.
    fn process_sentence(
        &self,
        sen: Sentence,
        _fields: &Self::Fields,
    ) -> Result<Sentence, StageError> {
        Ok(sen)
    }
}

/// A stage bound to the handle of one run.
pub trait PreparedStage {
    fn process(&self, sentence: Sentence) -> Result<Sentence, StageError>;
}

/// Object-safe view of a [`Stage`], so stages with different handle types can
/// share one pipeline.
pub trait DynStage: Send + Sync {
    fn sources(&self) -> &FieldSet;

    fn targets(&self) -> &FieldList;

    fn passes_header(&self) -> bool;

    fn prepare(&self, index: &FieldNameIndex) -> Result<Box<dyn PreparedStage + '_>, StageError>;
}

struct Bound<'a, S: Stage> {
    stage: &'a S,
    fields: S::Fields,
}

impl<S: Stage> PreparedStage for Bound<'_, S> {
    fn process(&self, sentence: Sentence) -> Result<Sentence, StageError> {
        self.stage.process_sentence(sentence, &self.fields)
    }
}

impl<S: Stage> DynStage for S {
    fn sources(&self) -> &FieldSet {
        Stage::source_fields(self)
    }

    fn targets(&self) -> &FieldList {
        Stage::target_fields(self)
    }

    fn passes_header(&self) -> bool {
        Stage::pass_header(self)
    }

    fn prepare(&self, index: &FieldNameIndex) -> Result<Box<dyn PreparedStage + '_>, StageError> {
        let fields = self.prepare_fields(index)?;
        Ok(Box::new(Bound { stage: self, fields }))
    }
}

/// Check that `output` is `input` with exactly `added` values appended to
/// every token and nothing else changed.
///
/// # Errors
///
/// Returns [`StageError::TokenCountChanged`], [`StageError::ContractViolation`]
/// or [`StageError::FieldsModified`] for the first offending token.
pub fn check_contract(
    stage: &str,
    input: &Sentence,
    output: &Sentence,
    added: usize,
) -> Result<(), StageError> {
    if input.len() != output.len() {
        return Err(StageError::TokenCountChanged {
            stage: stage.to_string(),
            expected: input.len(),
            actual: output.len(),
        });
    }

    for (position, (before, after)) in input.iter().zip(output).enumerate() {
        let expected = before.len() + added;
        if after.len() != expected {
            return Err(StageError::ContractViolation {
                stage: stage.to_string(),
                token: position,
                expected,
                actual: after.len(),
            });
        }
        if after[..before.len()] != before[..] {
            return Err(StageError::FieldsModified {
                stage: stage.to_string(),
                token: position,
            });
        }
    }

    Ok(())
}

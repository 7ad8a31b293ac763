//! Pipeline assembly and execution.
//!
//! A pipeline is an ordered list of tools. Running it reads the header of the
//! input stream, resolves every stage's fields against the columns available at
//! its position, then streams sentences through all stages one at a time.

use std::io::{BufRead, Write};

use serde::Serialize;
use thiserror::Error;

use crate::runtime::config_loader::Presets;
use crate::runtime::registry::InitedTools;
use crate::runtime::tsv::{TsvError, TsvReader, TsvWriter};
use crate::stage::{check_contract, DynStage, FieldNameIndex, PreparedStage, Sentence, StageError};

/// Error type for building and running a pipeline
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Tsv(#[from] TsvError),

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown tool or preset '{0}'")]
    UnknownTool(String),

    #[error("no tools selected")]
    Empty,

    #[error("tool '{tool}': {source}")]
    Stage {
        tool: String,
        #[source]
        source: StageError,
    },
}

impl PipelineError {
    fn stage(tool: &str, source: StageError) -> Self {
        PipelineError::Stage {
            tool: tool.to_string(),
            source,
        }
    }
}

/// Counts from one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub sentences: usize,
    pub tokens: usize,
}

/// An ordered chain of initialised tools.
pub struct Pipeline<'a> {
    stages: Vec<(&'a str, &'a dyn DynStage)>,
}

/// A stage bound to its handle for the current run.
struct Step<'a> {
    tool: &'a str,
    prepared: Box<dyn PreparedStage + 'a>,
    added: usize,
}

impl Step<'_> {
    fn apply(&self, sentence: Sentence) -> Result<Sentence, PipelineError> {
        let before = sentence.clone();
        let after = self
            .prepared
            .process(sentence)
            .map_err(|e| PipelineError::stage(self.tool, e))?;

        check_contract(self.tool, &before, &after, self.added)
            .map_err(|e| PipelineError::stage(self.tool, e))?;

        Ok(after)
    }
}

impl<'a> Pipeline<'a> {
    /// Assemble a pipeline from tool and preset names.
    ///
    /// Preset names expand in place to their tools.
    ///
    /// # Errors
    /// [`PipelineError::UnknownTool`] for a name that is neither an initialised
    /// tool nor a preset, [`PipelineError::Empty`] when nothing is selected.
    pub fn build<S: AsRef<str>>(
        used_tools: &[S],
        inited: &'a InitedTools,
        presets: &'a Presets,
    ) -> Result<Self, PipelineError> {
        let mut stages = Vec::new();

        for name in used_tools {
            let name = name.as_ref();
            if let Some(members) = presets.get(name) {
                for member in members {
                    stages.push(Self::lookup(member, inited)?);
                }
            } else {
                stages.push(Self::lookup(name, inited)?);
            }
        }

        if stages.is_empty() {
            return Err(PipelineError::Empty);
        }

        Ok(Self { stages })
    }

    /// A pipeline of one stage.
    pub fn single(tool: &'a str, stage: &'a dyn DynStage) -> Self {
        Self {
            stages: vec![(tool, stage)],
        }
    }

    fn lookup(name: &str, inited: &'a InitedTools) -> Result<(&'a str, &'a dyn DynStage), PipelineError> {
        inited
            .get_key_value(name)
            .ok_or_else(|| PipelineError::UnknownTool(name.to_string()))
    }

    /// Tool names in execution order.
    pub fn tool_names(&self) -> Vec<&str> {
        self.stages.iter().map(|(tool, _)| *tool).collect()
    }

    /// Whether the output starts with a header line.
    ///
    /// Only the last stage decides.
    pub fn passes_header(&self) -> bool {
        self.stages
            .last()
            .map_or(true, |(_, stage)| stage.passes_header())
    }

    /// Run the pipeline over one input stream.
    ///
    /// Every stage is prepared exactly once, before the first sentence, and its
    /// handle is dropped when the run ends.
    pub fn run<R: BufRead, W: Write>(&self, input: R, output: W) -> Result<RunStats, PipelineError> {
        let reader = TsvReader::new(input)?;
        let mut index = FieldNameIndex::from_header(reader.header());
        let steps = self.prepare(&mut index)?;

        let mut writer = TsvWriter::new(output);
        if self.passes_header() {
            writer.write_header(index.names())?;
        }

        let mut stats = RunStats::default();
        for block in reader {
            let mut block = block?;
            if block.sentence.is_empty() {
                // comments after the last sentence
                writer.write_comments(&block.comments)?;
                continue;
            }
            for step in &steps {
                block.sentence = step.apply(block.sentence)?;
            }
            stats.sentences += 1;
            stats.tokens += block.sentence.len();
            writer.write_block(&block)?;
        }
        writer.flush()?;

        tracing::debug!(
            tools = ?self.tool_names(),
            sentences = stats.sentences,
            tokens = stats.tokens,
            "Pipeline run finished"
        );
        Ok(stats)
    }

    /// Resolve fields for every stage, advancing `index` past each stage's
    /// targets.
    fn prepare(&self, index: &mut FieldNameIndex) -> Result<Vec<Step<'a>>, PipelineError> {
        let mut steps = Vec::with_capacity(self.stages.len());

        for &(tool, stage) in &self.stages {
            if let Some(missing) = stage.sources().iter().find(|f| !index.contains(f)) {
                return Err(PipelineError::stage(
                    tool,
                    StageError::FieldResolution {
                        field: missing.clone(),
                    },
                ));
            }

            if let Some(present) = stage.targets().iter().find(|f| index.contains(f)) {
                return Err(PipelineError::stage(
                    tool,
                    StageError::Config(format!("target field '{}' already exists in the input", present)),
                ));
            }

            let next = index.extended(stage.targets());
            if next.len() != index.len() + stage.targets().len() {
                return Err(PipelineError::stage(
                    tool,
                    StageError::Config("target fields contain duplicates".to_string()),
                ));
            }

            let prepared = stage
                .prepare(index)
                .map_err(|e| PipelineError::stage(tool, e))?;
            tracing::debug!(tool, columns = index.len(), "Prepared stage");

            steps.push(Step {
                tool,
                prepared,
                added: stage.targets().len(),
            });
            *index = next;
        }

        Ok(steps)
    }
}

/// Build a pipeline from tool and preset names and run it over `input`.
pub fn build_pipeline<R, W, S>(
    input: R,
    output: W,
    used_tools: &[S],
    inited: &InitedTools,
    presets: &Presets,
) -> Result<RunStats, PipelineError>
where
    R: BufRead,
    W: Write,
    S: AsRef<str>,
{
    Pipeline::build(used_tools, inited, presets)?.run(input, output)
}

/// Run a single stage over `input`, bypassing tool lookup.
pub fn process<R: BufRead, W: Write>(
    input: R,
    output: W,
    tool: &str,
    stage: &dyn DynStage,
) -> Result<RunStats, PipelineError> {
    Pipeline::single(tool, stage).run(input, output)
}

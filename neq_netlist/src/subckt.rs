//! Subcircuit blocks inside a large netlist file.
//!
//! Blocks open with a `// Cell name: <NAME>` comment. How they close is a
//! per-cell [`TerminationRule`]: an explicit `// End of subcircuit
//! definition` comment, the next blank line, or the next start marker.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use indexmap::IndexMap;
use lazy_static::lazy_static;
use neq_common::{IndexConfig, TerminationRule};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

lazy_static! {
    static ref START_RE: Regex = Regex::new(r"(?i)//\s*Cell name\s*:?\s*(\S+)").unwrap();
    static ref END_RE: Regex = Regex::new(r"(?i)//\s*End of subcircuit definition").unwrap();
}

/// Subcircuit lookup failures.
#[derive(Debug, Error)]
pub enum SubcircuitError {
    /// No block with this name was indexed.
    #[error("Subcircuit '{0}' not found")]
    NotFound(String),

    /// The netlist file could not be read.
    #[error("Failed to read netlist {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl SubcircuitError {
    /// Builds an [`SubcircuitError::Io`] for `path`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Inclusive, 0-based line range of one block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct BlockSpan {
    /// Line of the start marker.
    pub start_line: usize,
    /// Last line of the block.
    pub end_line: usize,
}

impl BlockSpan {
    /// Number of lines covered.
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }
}

/// Name to line-range index over one netlist text.
#[derive(Clone, Debug, Default)]
pub struct SubcircuitIndex {
    lines: Vec<String>,
    blocks: IndexMap<String, BlockSpan>,
}

struct OpenBlock {
    name: String,
    start: usize,
    rule: TerminationRule,
}

impl SubcircuitIndex {
    /// Indexes `text`.
    #[must_use]
    pub fn from_text(text: &str, config: &IndexConfig) -> Self {
        let lines: Vec<String> = text.split_inclusive('\n').map(str::to_string).collect();
        let blocks = Self::build_blocks(&lines, config);
        info!("Indexed {} subcircuit blocks", blocks.len());
        Self { lines, blocks }
    }

    /// Reads and indexes the file at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P, config: &IndexConfig) -> Result<Self, SubcircuitError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| SubcircuitError::io(path, e))?;
        debug!("Read {} bytes from {}", text.len(), path.display());
        Ok(Self::from_text(&text, config))
    }

    fn build_blocks(lines: &[String], config: &IndexConfig) -> IndexMap<String, BlockSpan> {
        let mut blocks: IndexMap<String, BlockSpan> = IndexMap::new();
        let mut open: Option<OpenBlock> = None;

        for (i, line) in lines.iter().enumerate() {
            if let Some(caps) = START_RE.captures(line) {
                if let Some(previous) = open.take() {
                    if previous.rule == TerminationRule::NextStartMarker {
                        Self::close_block(&mut blocks, previous, i - 1);
                    } else {
                        warn!(
                            "Subcircuit '{}' at line {} not closed before line {}; discarded",
                            previous.name, previous.start, i
                        );
                    }
                }
                let name = caps[1].to_string();
                let rule = config.rule_for(&name);
                open = Some(OpenBlock {
                    name,
                    start: i,
                    rule,
                });
                continue;
            }

            let Some(block) = open.as_ref() else {
                continue;
            };
            let end_line = match block.rule {
                TerminationRule::EndMarker if END_RE.is_match(line) => Some(i),
                TerminationRule::BlankLine if line.trim().is_empty() => Some(i - 1),
                _ => None,
            };
            if let Some(end_line) = end_line {
                if let Some(block) = open.take() {
                    Self::close_block(&mut blocks, block, end_line);
                }
            }
        }

        if let Some(block) = open {
            match block.rule {
                TerminationRule::EndMarker => warn!(
                    "Subcircuit '{}' at line {} has no end marker; discarded",
                    block.name, block.start
                ),
                TerminationRule::BlankLine | TerminationRule::NextStartMarker => {
                    Self::close_block(&mut blocks, block, lines.len() - 1);
                }
            }
        }

        blocks
    }

    fn close_block(blocks: &mut IndexMap<String, BlockSpan>, block: OpenBlock, end_line: usize) {
        let span = BlockSpan {
            start_line: block.start,
            end_line,
        };
        if blocks.insert(block.name.clone(), span).is_some() {
            debug!("Subcircuit '{}' redefined at line {}", block.name, block.start);
        }
    }

    /// Line range of `name`, if indexed.
    #[must_use]
    pub fn span(&self, name: &str) -> Option<BlockSpan> {
        self.blocks.get(name).copied()
    }

    /// Text of block `name`, line endings preserved.
    pub fn content(&self, name: &str) -> Result<String, SubcircuitError> {
        let span = self
            .span(name)
            .ok_or_else(|| SubcircuitError::NotFound(name.to_string()))?;
        Ok(self.lines[span.start_line..=span.end_line].concat())
    }

    /// Indexed block names, in order of first definition.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    /// Returns true if `name` was indexed.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.blocks.contains_key(name)
    }

    /// Number of indexed blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if no block was found.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Cell or model that `instance` instantiates inside `block`.
///
/// The first line starting with `instance` (case-insensitive) is used.
/// Parentheses act as delimiters and `key=value` parameters are ignored;
/// the last remaining token is the model.
#[must_use]
pub fn find_model_of_instance(block: &str, instance: &str) -> Option<String> {
    let pattern = Regex::new(&format!(r"(?i)^\s*{}\b\s+(.+)", regex::escape(instance))).ok()?;

    let target = block.lines().find_map(|line| {
        let code = match line.find("//") {
            Some(pos) => &line[..pos],
            None => line.split('*').next().unwrap_or_default(),
        };
        let code = code.trim();
        pattern.is_match(code).then_some(code)
    })?;

    let cleaned = target.replace(['(', ')'], " ");
    let tokens: Vec<&str> = cleaned
        .split_whitespace()
        .filter(|token| !token.contains('='))
        .collect();
    if tokens.len() >= 2 {
        tokens.last().map(|token| token.to_string())
    } else {
        None
    }
}

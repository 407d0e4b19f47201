//! Comparison scoped to one level of a design hierarchy.
//!
//! A hierarchy path such as `X_TOP/X_ADC/X_AMP` is walked segment by
//! segment. A segment naming an indexed block is taken as that block;
//! otherwise it is looked up as an instance in the current scope and
//! replaced by the block of the model it instantiates. The scope starts as
//! the whole file.

use contracts::ensures;
use neq_common::{CheckConfig, IndexConfig};
use neq_netlist::{SubcircuitError, SubcircuitIndex, find_model_of_instance};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::driver::{CheckReport, DriverError, check_equivalence, read_netlist};

/// Block a hierarchy path resolved to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedBlock {
    /// Cell name of the final block.
    pub cell: String,
    /// Cells visited on the way, outermost first.
    pub trail: Vec<String>,
    #[serde(skip)]
    pub content: String,
}

/// Result of [`compare_hierarchy`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HierarchyReport {
    pub path: String,
    pub golden: ResolvedBlock,
    pub target: ResolvedBlock,
    pub check: CheckReport,
}

fn split_path(path: &str) -> Result<Vec<&str>, DriverError> {
    let segments: Vec<&str> = path
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .collect();
    if segments.is_empty() {
        return Err(DriverError::schema(format!(
            "hierarchy path '{path}' has no segments"
        )));
    }
    Ok(segments)
}

/// Walks `path` through `index`, starting from the whole `text`.
pub fn resolve_path(
    index: &SubcircuitIndex,
    text: &str,
    path: &str,
) -> Result<ResolvedBlock, DriverError> {
    let segments = split_path(path)?;

    let mut scope = text.to_string();
    let mut trail = Vec::with_capacity(segments.len());
    for segment in segments {
        let cell = if index.contains(segment) {
            segment.to_string()
        } else {
            find_model_of_instance(&scope, segment)
                .ok_or_else(|| SubcircuitError::NotFound(segment.to_string()))?
        };
        debug!("Hierarchy segment '{}' -> cell '{}'", segment, cell);
        scope = index.content(&cell)?;
        trail.push(cell);
    }

    let cell = trail.last().cloned().unwrap_or_default();
    Ok(ResolvedBlock {
        cell,
        trail,
        content: scope,
    })
}

/// Outcome for one `(target, path)` pair of [`compare_hierarchies_text`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HierarchyEntry {
    /// Key the target netlist was given.
    pub target: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<HierarchyReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HierarchyEntry {
    /// Returns false on an error or a definite "not equivalent" verdict.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.report.as_ref().is_some_and(|report| report.check.passed())
    }
}

fn compare_indexed(
    golden: (&SubcircuitIndex, &str),
    target: (&SubcircuitIndex, &str),
    path: &str,
    config: &CheckConfig,
) -> Result<HierarchyReport, DriverError> {
    let golden_block = resolve_path(golden.0, golden.1, path)?;
    let target_block = resolve_path(target.0, target.1, path)?;
    info!(
        "Comparing '{}': golden cell '{}' against target cell '{}'",
        path, golden_block.cell, target_block.cell
    );

    let check = check_equivalence(&golden_block.content, &target_block.content, config)?;
    Ok(HierarchyReport {
        path: path.to_string(),
        golden: golden_block,
        target: target_block,
        check,
    })
}

/// Compares the block `path` resolves to in each of two netlist texts.
pub fn compare_hierarchy_text(
    golden: &str,
    target: &str,
    path: &str,
    index_config: &IndexConfig,
    config: &CheckConfig,
) -> Result<HierarchyReport, DriverError> {
    let golden_index = SubcircuitIndex::from_text(golden, index_config);
    let target_index = SubcircuitIndex::from_text(target, index_config);
    compare_indexed((&golden_index, golden), (&target_index, target), path, config)
}

/// Reads both files and compares the block `path` resolves to.
pub fn compare_hierarchy<P: AsRef<std::path::Path>, Q: AsRef<std::path::Path>>(
    golden: P,
    target: Q,
    path: &str,
    index_config: &IndexConfig,
    config: &CheckConfig,
) -> Result<HierarchyReport, DriverError> {
    let golden = read_netlist(golden)?;
    let target = read_netlist(target)?;
    compare_hierarchy_text(&golden, &target, path, index_config, config)
}

/// Compares every path against every `(key, text)` target.
///
/// Entries come target by target, paths in the given order. A path that
/// fails to resolve is recorded in its entry and the others still run. No
/// targets or no paths is rejected.
#[ensures(ret.as_ref().map_or(true, |entries| entries.len() == targets.len() * paths.len()))]
pub fn compare_hierarchies_text(
    golden: &str,
    targets: &[(String, String)],
    paths: &[String],
    index_config: &IndexConfig,
    config: &CheckConfig,
) -> Result<Vec<HierarchyEntry>, DriverError> {
    if targets.is_empty() || paths.is_empty() {
        return Err(DriverError::schema(
            "hierarchy comparison needs at least one target and one path",
        ));
    }

    let golden_index = SubcircuitIndex::from_text(golden, index_config);
    let mut entries = Vec::with_capacity(targets.len() * paths.len());
    for (key, text) in targets {
        let target_index = SubcircuitIndex::from_text(text, index_config);
        for path in paths {
            let outcome =
                compare_indexed((&golden_index, golden), (&target_index, text), path, config);
            let (report, error) = match outcome {
                Ok(report) => (Some(report), None),
                Err(e) => {
                    warn!("Target '{}', path '{}': {}", key, path, e);
                    (None, Some(e.to_string()))
                }
            };
            entries.push(HierarchyEntry {
                target: key.clone(),
                path: path.clone(),
                report,
                error,
            });
        }
    }
    debug!(
        "{} hierarchy comparisons, {} failed",
        entries.len(),
        entries.iter().filter(|e| e.error.is_some()).count()
    );
    Ok(entries)
}

/// Reads the golden file and every `(key, file)` target, then runs
/// [`compare_hierarchies_text`].
pub fn compare_hierarchies<P: AsRef<std::path::Path>>(
    golden: P,
    targets: &[(String, std::path::PathBuf)],
    paths: &[String],
    index_config: &IndexConfig,
    config: &CheckConfig,
) -> Result<Vec<HierarchyEntry>, DriverError> {
    let golden = read_netlist(golden)?;
    let targets = targets
        .iter()
        .map(|(key, path)| Ok((key.clone(), read_netlist(path)?)))
        .collect::<Result<Vec<_>, DriverError>>()?;
    compare_hierarchies_text(&golden, &targets, paths, index_config, config)
}

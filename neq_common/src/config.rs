//! Configuration for netlist parsing, canonicalization and comparison.
//!
//! All pipeline stages receive their settings as plain values. The
//! top-level [`CheckConfig`] bundles one value per stage so a front end can
//! build it once (from CLI flags or a JSON file) and pass it down.
//!
//! Quick examples
//!
//! Exact (hash) comparison with the default dummy set:
//! ```
//! use neq_common::{CheckConfig, CheckMode};
//! let cfg = CheckConfig::default();
//! assert_eq!(cfg.mode, CheckMode::Hash);
//! assert!(cfg.clean_dummies);
//! ```
//!
//! Approximate matching with a custom dummy set and an explicit threshold:
//! ```
//! use neq_common::{CheckConfig, CheckMode, CollapseConfig};
//! let cfg = CheckConfig::new(CheckMode::Match)
//!     .with_collapse(CollapseConfig::new(["BUF", "DLY"]))
//!     .with_threshold(0.9);
//! assert!(cfg.collapse.is_dummy("DLY"));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cell types removed by default during canonicalization.
pub const DEFAULT_DUMMY_TYPES: [&str; 3] = ["BUF", "INV", "DUMMY"];

/// Port names treated as drivers in the instance-port dialect.
pub const DEFAULT_OUTPUT_PINS: [&str; 7] = ["Y", "Q", "Z", "O", "OUT", "ZN", "QN"];

/// Refinement rounds used by the canonical hash unless configured otherwise.
pub const DEFAULT_HASH_ROUNDS: usize = 3;

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read config '{path}': {source}")]
    Io {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },
    /// The configuration file is not valid JSON for [`CheckConfig`].
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Settings for the netlist graph builder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseConfig {
    /// Port names whose connection drives the net (instance-port dialect).
    pub output_pins: BTreeSet<String>,
}

impl ParseConfig {
    /// Creates a parse configuration with a custom output-pin vocabulary.
    pub fn new<I, S>(output_pins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            output_pins: output_pins.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if `pin` drives its net.
    #[must_use]
    pub fn is_output_pin(&self, pin: &str) -> bool {
        self.output_pins.contains(pin)
    }
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_PINS)
    }
}

/// Settings for dummy-cell collapsing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollapseConfig {
    /// Instance types eligible for removal.
    pub dummy_types: BTreeSet<String>,
}

impl CollapseConfig {
    /// Creates a collapse configuration for the given dummy types.
    pub fn new<I, S>(dummy_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            dummy_types: dummy_types.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if `type_label` names a dummy cell.
    #[must_use]
    pub fn is_dummy(&self, type_label: &str) -> bool {
        self.dummy_types.contains(type_label)
    }
}

impl Default for CollapseConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DUMMY_TYPES)
    }
}

/// Settings for the canonical hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashConfig {
    /// Number of neighbourhood refinement rounds.
    pub rounds: usize,
}

impl HashConfig {
    /// Creates a hash configuration with `rounds` refinement rounds.
    #[must_use]
    pub const fn new(rounds: usize) -> Self {
        Self { rounds }
    }
}

impl Default for HashConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_ROUNDS)
    }
}

/// Settings for the approximate matcher.
///
/// - max_iterations / tolerance: bound the reweighted random walk.
/// - alpha / beta: weight and inflation of the reweighted jump.
/// - sinkhorn_iterations: inner normalization passes per jump.
/// - max_pairs: refuse to match when `n1 * n2` exceeds this (None disables).
/// - timeout_ms: abort the relaxation after this many milliseconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Upper bound on relaxation iterations.
    pub max_iterations: usize,
    /// Sinkhorn passes used inside each reweighted jump.
    pub sinkhorn_iterations: usize,
    /// Weight of the reweighted jump against the plain walk.
    pub alpha: f64,
    /// Inflation factor applied before the exponential in the jump.
    pub beta: f64,
    /// Convergence threshold on the L2 change between iterations.
    pub tolerance: f64,
    /// Largest accepted candidate-pair count (`n1 * n2`).
    pub max_pairs: Option<usize>,
    /// Wall-clock budget for the relaxation, in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl MatchConfig {
    /// Returns the relaxation time budget, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Sets the candidate-pair guard.
    #[must_use]
    pub const fn with_max_pairs(mut self, max_pairs: Option<usize>) -> Self {
        self.max_pairs = max_pairs;
        self
    }

    /// Sets the relaxation time budget.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout_ms = timeout.map(|t| t.as_millis() as u64);
        self
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            sinkhorn_iterations: 20,
            alpha: 0.2,
            beta: 30.0,
            tolerance: 1e-5,
            max_pairs: Some(4_000_000),
            timeout_ms: None,
        }
    }
}

/// Comparison strategy used by the equivalence check.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckMode {
    /// Exact structural comparison through the canonical hash.
    #[default]
    Hash,
    /// Approximate comparison through graph matching.
    Match,
}

/// Settings for one equivalence check between two netlists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Exact or approximate comparison.
    pub mode: CheckMode,
    /// Whether dummy cells are collapsed before comparing.
    pub clean_dummies: bool,
    /// Graph builder settings.
    pub parse: ParseConfig,
    /// Dummy collapsing settings.
    pub collapse: CollapseConfig,
    /// Canonical hash settings.
    pub hash: HashConfig,
    /// Approximate matcher settings.
    pub matching: MatchConfig,
    /// Minimum normalized match score accepted as equivalent (match mode).
    ///
    /// There is no default: without a threshold a match result carries no
    /// verdict.
    pub threshold: Option<f64>,
}

impl CheckConfig {
    /// Creates a configuration for `mode` with default stage settings.
    #[must_use]
    pub fn new(mode: CheckMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Loads a configuration from a JSON file; missing fields use defaults.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Parses a configuration from JSON text; missing fields use defaults.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        tracing::debug!("Loaded check config: {:?}", config);
        Ok(config)
    }

    /// Enables or disables dummy collapsing.
    #[must_use]
    pub const fn with_clean_dummies(mut self, clean_dummies: bool) -> Self {
        self.clean_dummies = clean_dummies;
        self
    }

    /// Replaces the collapse settings.
    #[must_use]
    pub fn with_collapse(mut self, collapse: CollapseConfig) -> Self {
        self.collapse = collapse;
        self
    }

    /// Replaces the parse settings.
    #[must_use]
    pub fn with_parse(mut self, parse: ParseConfig) -> Self {
        self.parse = parse;
        self
    }

    /// Replaces the hash settings.
    #[must_use]
    pub const fn with_hash(mut self, hash: HashConfig) -> Self {
        self.hash = hash;
        self
    }

    /// Replaces the matcher settings.
    #[must_use]
    pub fn with_matching(mut self, matching: MatchConfig) -> Self {
        self.matching = matching;
        self
    }

    /// Sets the match-mode acceptance threshold.
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            mode: CheckMode::Hash,
            clean_dummies: true,
            parse: ParseConfig::default(),
            collapse: CollapseConfig::default(),
            hash: HashConfig::default(),
            matching: MatchConfig::default(),
            threshold: None,
        }
    }
}

/// How a subcircuit block opened by a `Cell name` marker is closed.
///
/// - EndMarker: closed by an `End of subcircuit definition` comment.
/// - BlankLine: closed on the line before the next blank line (or at end
///   of file).
/// - NextStartMarker: closed on the line before the next `Cell name`
///   marker (or at end of file).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationRule {
    /// Close on an explicit end marker.
    #[default]
    EndMarker,
    /// Close before the next blank line.
    BlankLine,
    /// Close before the next start marker.
    NextStartMarker,
}

/// Settings for the subcircuit index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Rule applied to blocks without an override.
    pub default_rule: TerminationRule,
    /// Per-cell rule overrides, keyed by cell name.
    pub overrides: BTreeMap<String, TerminationRule>,
}

impl IndexConfig {
    /// Creates an index configuration with a default rule and no overrides.
    #[must_use]
    pub const fn new(default_rule: TerminationRule) -> Self {
        Self {
            default_rule,
            overrides: BTreeMap::new(),
        }
    }

    /// Adds a rule override for one cell name.
    #[must_use]
    pub fn with_override(mut self, cell: impl Into<String>, rule: TerminationRule) -> Self {
        self.overrides.insert(cell.into(), rule);
        self
    }

    /// Returns the termination rule for `cell`.
    #[must_use]
    pub fn rule_for(&self, cell: &str) -> TerminationRule {
        self.overrides
            .get(cell)
            .copied()
            .unwrap_or(self.default_rule)
    }
}

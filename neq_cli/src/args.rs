use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use neq_common::{
    CheckConfig, CheckMode, CollapseConfig, ConfigError, HashConfig, IndexConfig, TerminationRule,
};

/// Netlist equivalence checker
#[derive(Parser, Debug)]
#[command(name = "neq")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Print results as JSON
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compare two netlists (exit 0 if equivalent, 1 if not)
    Check {
        /// First netlist
        a: PathBuf,
        /// Second netlist
        b: PathBuf,
        #[command(flatten)]
        options: CheckOptions,
    },
    /// Compare two netlists with the approximate matcher
    Match {
        /// First netlist
        a: PathBuf,
        /// Second netlist
        b: PathBuf,
        #[command(flatten)]
        options: CheckOptions,
    },
    /// Compare several netlist pairs, given as `a_path:b_path`
    Batch {
        /// Netlist pairs
        #[arg(long = "pair", required = true, value_parser = parse_pair)]
        pairs: Vec<(PathBuf, PathBuf)>,
        #[command(flatten)]
        options: CheckOptions,
    },
    /// Print a netlist's graph after dummy collapsing
    Clean {
        /// Netlist to clean
        file: PathBuf,
        #[command(flatten)]
        options: CheckOptions,
    },
    /// List the subcircuit blocks of a netlist
    Blocks {
        /// Netlist to index
        file: PathBuf,
        #[command(flatten)]
        index: IndexOptions,
    },
    /// Compare hierarchy levels of a reference netlist against one or more targets
    Hierarchy {
        /// Reference netlist
        golden: PathBuf,
        /// Netlist under test, as `key:path` (repeatable)
        #[arg(long = "target", required = true, value_parser = parse_target)]
        targets: Vec<(String, PathBuf)>,
        /// Hierarchy path, e.g. `X_TOP/X_ADC/X_AMP` (repeatable)
        #[arg(long = "path", required = true)]
        paths: Vec<String>,
        #[command(flatten)]
        index: IndexOptions,
        #[command(flatten)]
        options: CheckOptions,
    },
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CheckOptions {
    /// Comparison strategy
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Keep dummy cells
    #[arg(long, default_value_t = false)]
    pub no_clean: bool,

    /// Cell types treated as dummies (replaces the default set)
    #[arg(long, value_delimiter = ',')]
    pub dummy_types: Option<Vec<String>>,

    /// Canonical hash refinement rounds
    #[arg(long)]
    pub rounds: Option<usize>,

    /// Minimum normalized match score accepted as equivalent
    #[arg(long)]
    pub threshold: Option<f64>,

    /// JSON configuration file; flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl CheckOptions {
    /// Convert command-line arguments into a check configuration
    pub fn to_config(&self) -> Result<CheckConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => CheckConfig::from_path(path)?,
            None => CheckConfig::default(),
        };

        if let Some(mode) = self.mode.clone() {
            config.mode = mode.into();
        }
        if self.no_clean {
            config.clean_dummies = false;
        }
        if let Some(types) = &self.dummy_types {
            config.collapse = CollapseConfig::new(types.iter().map(|t| t.trim()));
        }
        if let Some(rounds) = self.rounds {
            config.hash = HashConfig::new(rounds);
        }
        if let Some(threshold) = self.threshold {
            config.threshold = Some(threshold);
        }
        Ok(config)
    }
}

#[derive(ClapArgs, Debug, Clone)]
pub struct IndexOptions {
    /// How subcircuit blocks end
    #[arg(long, value_enum, default_value = "end-marker")]
    pub termination: TerminationArg,

    /// Per-cell override, as `CELL=rule`
    #[arg(long = "termination-override", value_parser = parse_override)]
    pub overrides: Vec<(String, TerminationArg)>,
}

impl IndexOptions {
    pub fn to_config(&self) -> IndexConfig {
        self.overrides.iter().fold(
            IndexConfig::new(self.termination.clone().into()),
            |config, (cell, rule)| config.with_override(cell.clone(), rule.clone().into()),
        )
    }
}

/// Command-line argument wrapper for CheckMode
#[derive(Debug, Clone, clap::ValueEnum)]
pub enum ModeArg {
    /// Exact structural comparison
    #[value(name = "hash")]
    Hash,
    /// Approximate graph matching
    #[value(name = "match")]
    Match,
}

impl From<ModeArg> for CheckMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Hash => Self::Hash,
            ModeArg::Match => Self::Match,
        }
    }
}

/// Command-line argument wrapper for TerminationRule
#[derive(Debug, Clone, clap::ValueEnum)]
pub enum TerminationArg {
    /// Explicit end-of-subcircuit comment
    #[value(name = "end-marker")]
    EndMarker,
    /// Next blank line
    #[value(name = "blank-line")]
    BlankLine,
    /// Next cell-name marker
    #[value(name = "next-start")]
    NextStartMarker,
}

impl From<TerminationArg> for TerminationRule {
    fn from(arg: TerminationArg) -> Self {
        match arg {
            TerminationArg::EndMarker => Self::EndMarker,
            TerminationArg::BlankLine => Self::BlankLine,
            TerminationArg::NextStartMarker => Self::NextStartMarker,
        }
    }
}

fn parse_pair(s: &str) -> Result<(PathBuf, PathBuf), String> {
    let (a, b) = s
        .split_once(':')
        .ok_or_else(|| format!("expected 'a_path:b_path', got '{s}'"))?;
    Ok((PathBuf::from(a), PathBuf::from(b)))
}

/// `key:path`, or a bare path keyed by its file stem.
fn parse_target(s: &str) -> Result<(String, PathBuf), String> {
    if let Some((key, path)) = s.split_once(':') {
        if key.is_empty() || path.is_empty() {
            return Err(format!("expected 'key:path', got '{s}'"));
        }
        return Ok((key.to_string(), PathBuf::from(path)));
    }
    let path = PathBuf::from(s);
    let key = path
        .file_stem()
        .map_or_else(|| s.to_string(), |stem| stem.to_string_lossy().into_owned());
    Ok((key, path))
}

fn parse_override(s: &str) -> Result<(String, TerminationArg), String> {
    use clap::ValueEnum;

    let (cell, rule) = s
        .split_once('=')
        .ok_or_else(|| format!("expected 'CELL=rule', got '{s}'"))?;
    let rule = TerminationArg::from_str(rule, true)?;
    Ok((cell.to_string(), rule))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "neq",
            "check",
            "a.v",
            "b.v",
            "--mode",
            "match",
            "--no-clean",
            "--dummy-types",
            "BUF,DLY",
            "--threshold",
            "0.8",
        ]);
        let Command::Check { options, .. } = args.command else {
            panic!("expected check");
        };
        let config = options.to_config().unwrap();
        assert_eq!(config.mode, CheckMode::Match);
        assert!(!config.clean_dummies);
        assert!(config.collapse.is_dummy("DLY"));
        assert!(!config.collapse.is_dummy("INV"));
        assert_eq!(config.threshold, Some(0.8));
    }

    #[test]
    fn test_index_overrides() {
        let args = Args::parse_from([
            "neq",
            "blocks",
            "lib.scs",
            "--termination-override",
            "TX=blank-line",
        ]);
        let Command::Blocks { index, .. } = args.command else {
            panic!("expected blocks");
        };
        let config = index.to_config();
        assert_eq!(config.rule_for("TX"), TerminationRule::BlankLine);
        assert_eq!(config.rule_for("RX"), TerminationRule::EndMarker);
    }

    #[test]
    fn test_pair_parsing() {
        assert_eq!(
            parse_pair("a.v:b.v").unwrap(),
            (PathBuf::from("a.v"), PathBuf::from("b.v"))
        );
        assert!(parse_pair("a.v").is_err());
    }

    #[test]
    fn test_hierarchy_takes_repeated_targets_and_paths() {
        let args = Args::parse_from([
            "neq",
            "hierarchy",
            "golden.scs",
            "--target",
            "rev_a:a.scs",
            "--target",
            "out/b.scs",
            "--path",
            "X_TOP/X_ADC",
            "--path",
            "X_TOP/X_PLL",
        ]);
        let Command::Hierarchy { targets, paths, .. } = args.command else {
            panic!("expected hierarchy");
        };
        assert_eq!(
            targets,
            vec![
                ("rev_a".to_string(), PathBuf::from("a.scs")),
                ("b".to_string(), PathBuf::from("out/b.scs")),
            ]
        );
        assert_eq!(paths, vec!["X_TOP/X_ADC", "X_TOP/X_PLL"]);
        assert!(parse_target(":a.scs").is_err());
    }
}

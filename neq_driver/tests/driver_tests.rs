#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use std::fs;
use std::sync::OnceLock;

use neq_common::{CheckConfig, CheckMode, CollapseConfig, IndexConfig, TerminationRule};
use neq_driver::{
    DriverError, check_equivalence, check_files, compare_batch, compare_hierarchies,
    compare_hierarchies_text, compare_hierarchy, compare_hierarchy_text, prepare_graph,
};
use neq_graph::MatchError;
use rstest::rstest;
use tempfile::tempdir;

fn init_test_logger() {
    static INIT: OnceLock<()> = OnceLock::new();
    let _ = INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

const BUFFERED: &str = "BUF u1(A(in),Y(n1)); AND u2(A(n1),B(in2),Y(out));";
const PLAIN: &str = "AND u2(A(in),B(in2),Y(out));";

#[test]
fn test_buffer_is_invisible_after_cleaning() {
    init_test_logger();
    let report = check_equivalence(BUFFERED, PLAIN, &CheckConfig::default()).unwrap();
    assert_eq!(report.equivalent, Some(true));
    assert_eq!(report.graph_a.removed_dummies, 1);
    assert_eq!(report.graph_b.removed_dummies, 0);

    let hashes = report.hash.unwrap();
    assert_eq!(hashes.hash_a, hashes.hash_b);
}

#[test]
fn test_buffer_matters_without_cleaning() {
    init_test_logger();
    let config = CheckConfig::default().with_clean_dummies(false);
    let report = check_equivalence(BUFFERED, PLAIN, &config).unwrap();
    assert_eq!(report.equivalent, Some(false));
    assert!(!report.passed());
}

#[test]
fn test_custom_dummy_set() {
    let config = CheckConfig::default().with_collapse(CollapseConfig::new(["DLY"]));
    let prepared = prepare_graph(BUFFERED, &config);
    assert_eq!(prepared.stats.removed_dummies, 0);
    assert!(prepared.graph.contains_node("u1"));
}

#[rstest]
#[case(0.5, Some(true))]
#[case(1.0, Some(true))]
#[case(1.5, Some(false))]
fn test_match_threshold_verdict(#[case] threshold: f64, #[case] expected: Option<bool>) {
    init_test_logger();
    let config = CheckConfig::new(CheckMode::Match).with_threshold(threshold);
    let report = check_equivalence(BUFFERED, PLAIN, &config).unwrap();
    assert_eq!(report.equivalent, expected);
    assert!(report.matching.is_some());
    assert!(report.hash.is_none());
}

#[test]
fn test_match_below_threshold() {
    let config = CheckConfig::new(CheckMode::Match).with_threshold(0.9);
    let report = check_equivalence(
        "AND u1(A(a),Y(b)); OR u2(A(b),Y(c)); DFF u3(D(c),Q(d));",
        "AND u1(A(a),Y(b)); OR u2(A(x),Y(c)); DFF u3(D(c),Q(d));",
        &config,
    )
    .unwrap();
    assert_eq!(report.equivalent, Some(false));
}

#[test]
fn test_match_errors_surface() {
    let mut config = CheckConfig::new(CheckMode::Match);
    config.matching.max_pairs = Some(1);
    let err = check_equivalence(BUFFERED, PLAIN, &config).unwrap_err();
    assert!(matches!(
        err,
        DriverError::Match(MatchError::SizeLimitExceeded { .. })
    ));
}

#[test]
fn test_check_files() {
    let tmp = tempdir().unwrap();
    let a = tmp.path().join("a.v");
    let b = tmp.path().join("b.v");
    fs::write(&a, BUFFERED).unwrap();
    fs::write(&b, PLAIN).unwrap();

    let report = check_files(&a, &b, &CheckConfig::default()).unwrap();
    assert_eq!(report.equivalent, Some(true));

    let err = check_files(&a, tmp.path().join("missing.v"), &CheckConfig::default()).unwrap_err();
    assert!(matches!(err, DriverError::Io { .. }));
}

#[test]
fn test_batch_keeps_going() {
    let mut config = CheckConfig::new(CheckMode::Match);
    config.matching.max_pairs = Some(9);
    let pairs = vec![
        (PLAIN.to_string(), PLAIN.to_string()),
        (BUFFERED.to_string(), "AND a(A(x),Y(y)); AND b(A(y),Y(z)); AND c(A(z),Y(w));".to_string()),
        (String::new(), PLAIN.to_string()),
    ];
    let results = compare_batch(&pairs, &config).unwrap();
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(DriverError::Match(MatchError::SizeLimitExceeded { .. }))
    ));
    assert!(results[2].is_ok());
}

#[test]
fn test_empty_batch_is_rejected() {
    let err = compare_batch(&[], &CheckConfig::default()).unwrap_err();
    assert!(matches!(err, DriverError::SchemaInconsistency(_)));
}

const GOLDEN: &str = "\
// Cell name: CORE
subckt CORE a b
i0 (a n1) BUF
i1 (n1 b) nand2
// End of subcircuit definition
// Cell name: TOP
subckt TOP x y
X_CORE (x y) CORE
// End of subcircuit definition
";

const TARGET: &str = "\
// Cell name: CORE_V2
subckt CORE_V2 a b
i7 (a b) nand2
// End of subcircuit definition
// Cell name: TOP
subckt TOP x y
X_CORE (x y) CORE_V2
// End of subcircuit definition
";

#[test]
fn test_hierarchy_resolves_renamed_cells() {
    init_test_logger();
    let report = compare_hierarchy_text(
        GOLDEN,
        TARGET,
        "TOP/X_CORE",
        &IndexConfig::default(),
        &CheckConfig::default(),
    )
    .unwrap();
    assert_eq!(report.golden.cell, "CORE");
    assert_eq!(report.target.cell, "CORE_V2");
    assert_eq!(report.check.equivalent, Some(true));
    assert_eq!(report.check.graph_a.removed_dummies, 1);
}

#[test]
fn test_hierarchy_errors() {
    let err = compare_hierarchy_text(
        GOLDEN,
        TARGET,
        "",
        &IndexConfig::default(),
        &CheckConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, DriverError::SchemaInconsistency(_)));

    let err = compare_hierarchy_text(
        GOLDEN,
        TARGET,
        "TOP/X_NOPE",
        &IndexConfig::default(),
        &CheckConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, DriverError::Subcircuit(_)));
}

#[test]
fn test_hierarchy_from_files_with_blank_line_blocks() {
    let tmp = tempdir().unwrap();
    let golden = tmp.path().join("golden.scs");
    let target = tmp.path().join("target.scs");
    fs::write(&golden, "// Cell name: AMP\nm0 (o i vss) nch\n\nX1 (p q) AMP\n").unwrap();
    fs::write(&target, "// Cell name: AMP\nm9 (o i vss) nch\n\nX1 (p q) AMP\n").unwrap();

    let index_config = IndexConfig::new(TerminationRule::BlankLine);
    let report = compare_hierarchy(
        &golden,
        &target,
        "X1",
        &index_config,
        &CheckConfig::default(),
    )
    .unwrap();
    assert_eq!(report.golden.trail, vec!["AMP"]);
    assert_eq!(report.check.equivalent, Some(true));
}

#[test]
fn test_report_json_omits_unused_sections() {
    let report = check_equivalence(BUFFERED, PLAIN, &CheckConfig::default()).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["mode"], "hash");
    assert_eq!(json["equivalent"], true);
    assert!(json.get("matching").is_none());
    assert!(json.get("threshold").is_none());
    assert_eq!(json["graph_a"]["removed_dummies"], 1);
}

#[test]
fn test_hierarchy_over_several_targets_and_paths() {
    init_test_logger();
    let targets = vec![
        ("v2".to_string(), TARGET.to_string()),
        ("same".to_string(), GOLDEN.to_string()),
    ];
    let paths = vec!["TOP/X_CORE".to_string(), "TOP/X_NOPE".to_string()];
    let entries = compare_hierarchies_text(
        GOLDEN,
        &targets,
        &paths,
        &IndexConfig::default(),
        &CheckConfig::default(),
    )
    .unwrap();

    assert_eq!(entries.len(), 4);
    let keys: Vec<(&str, &str)> = entries
        .iter()
        .map(|e| (e.target.as_str(), e.path.as_str()))
        .collect();
    assert_eq!(
        keys,
        vec![
            ("v2", "TOP/X_CORE"),
            ("v2", "TOP/X_NOPE"),
            ("same", "TOP/X_CORE"),
            ("same", "TOP/X_NOPE"),
        ]
    );
    assert!(entries[0].passed());
    assert_eq!(entries[0].report.as_ref().unwrap().target.cell, "CORE_V2");
    assert!(!entries[1].passed());
    assert!(entries[1].error.as_deref().unwrap().contains("X_NOPE"));
    assert_eq!(entries[2].report.as_ref().unwrap().target.cell, "CORE");

    let json = serde_json::to_value(&entries).unwrap();
    assert!(json[1].get("report").is_none());
    assert_eq!(json[0]["report"]["check"]["equivalent"], true);
}

#[rstest]
#[case(&[], &["TOP"])]
#[case(&[("v2", TARGET)], &[])]
fn test_hierarchy_batch_needs_targets_and_paths(
    #[case] targets: &[(&str, &str)],
    #[case] paths: &[&str],
) {
    let targets: Vec<(String, String)> = targets
        .iter()
        .map(|(k, t)| (k.to_string(), t.to_string()))
        .collect();
    let paths: Vec<String> = paths.iter().map(|p| p.to_string()).collect();
    let err = compare_hierarchies_text(
        GOLDEN,
        &targets,
        &paths,
        &IndexConfig::default(),
        &CheckConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, DriverError::SchemaInconsistency(_)));
}

#[test]
fn test_hierarchy_batch_from_files() {
    let tmp = tempdir().unwrap();
    let golden = tmp.path().join("golden.scs");
    let target = tmp.path().join("target.scs");
    fs::write(&golden, GOLDEN).unwrap();
    fs::write(&target, TARGET).unwrap();

    let entries = compare_hierarchies(
        &golden,
        &[("rev_b".to_string(), target)],
        &["TOP/X_CORE".to_string()],
        &IndexConfig::default(),
        &CheckConfig::default(),
    )
    .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].target, "rev_b");
    assert!(entries[0].passed());

    let missing = compare_hierarchies(
        &golden,
        &[("gone".to_string(), tmp.path().join("gone.scs"))],
        &["TOP".to_string()],
        &IndexConfig::default(),
        &CheckConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(missing, DriverError::Io { .. }));
}

#![allow(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

use neq_common::{HashConfig, ParseConfig};
use neq_graph::{Dialect, NodeCategory, canonical_hash, collapse_dummies, compare_hashes};
use neq_netlist::{build_graph, build_graph_with_report, parse_connectivity, parse_instance_port};
use rstest::rstest;

const BUFFERED: &str = "BUF u1(A(in),Y(n1)); AND u2(A(n1),B(in2),Y(out));";
const PLAIN: &str = "AND u2(A(in),B(in2),Y(out));";

#[test]
fn test_buffered_netlist_is_equivalent_after_collapse() {
    let config = ParseConfig::default();
    let a = collapse_dummies(&build_graph(BUFFERED, &config));
    let b = collapse_dummies(&build_graph(PLAIN, &config));

    let report = compare_hashes(&a, &b, &HashConfig::default());
    assert!(report.equivalent);
    assert_eq!(report.node_count_a, 3);
    assert_eq!(report.edge_count_a, 2);
    assert!(a.has_edge("PIN_in", "u2"));
    assert!(a.has_edge("PIN_in2", "u2"));
}

#[test]
fn test_buffered_netlist_differs_before_collapse() {
    let config = ParseConfig::default();
    let a = build_graph(BUFFERED, &config);
    let b = build_graph(PLAIN, &config);
    assert_ne!(canonical_hash(&a, 3), canonical_hash(&b, 3));
    assert_eq!(a.edge("u1", "u2").unwrap().net_name.as_deref(), Some("n1"));
}

#[rstest]
#[case("")]
#[case("   \n\n")]
#[case("// only a comment\n")]
fn test_empty_input(#[case] text: &str) {
    let report = build_graph_with_report(text, &ParseConfig::default());
    assert!(report.graph.is_empty());
    assert!(report.is_clean());
}

#[test]
fn test_every_undriven_net_has_one_pin() {
    let text = "
module top(a, b, y);
  input a, b;
  output y;
  wire n1;
  NAND2 g1 (.A(a), .B(b), .ZN(n1));
  INV g2 (.A(n1), .ZN(y));
  NOR2 g3 (.A(a), .B(n1), .ZN());
endmodule
";
    let report = build_graph_with_report(text, &ParseConfig::default());
    let g = &report.graph;
    assert_eq!(report.dialect, Dialect::InstancePort);
    assert!(report.is_clean());

    let pins: Vec<&str> = g
        .nodes()
        .filter(|n| n.category == NodeCategory::Pin)
        .map(|n| n.id.as_str())
        .collect();
    assert_eq!(pins, vec!["PIN_a", "PIN_b"]);
    assert!(g.has_edge("PIN_a", "g1"));
    assert!(g.has_edge("PIN_a", "g3"));
    assert!(g.has_edge("g1", "g2"));
    assert!(g.has_edge("g1", "g3"));
    assert_eq!(g.predecessors("g1").len(), 2);
}

#[test]
fn test_unparseable_statement_is_skipped() {
    let text = "AND u1(A(a),Y(b));\nthis is not verilog;\nINV u2(A(b),Y(c));\n";
    let report = build_graph_with_report(text, &ParseConfig::default());
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].line, 2);
    assert!(report.graph.has_edge("u1", "u2"));
}

#[test]
fn test_custom_output_pins() {
    let config = ParseConfig::new(["X"]);
    let g = build_graph("CELL c1(I(a),X(b)); CELL c2(I(b),X(c));", &config);
    assert!(g.has_edge("c1", "c2"));
    assert!(g.contains_node("PIN_a"));
}

#[test]
fn test_connectivity_graph_is_bipartite() {
    let text = "\
simulator lang=spectre
subckt INV_X1 a y vdd vss
M0 (y a vss vss) nch w=1u l=0.1u
M1 (y a vdd vdd) pch \\
    w=2u l=0.1u
ends INV_X1
";
    let report = build_graph_with_report(text, &ParseConfig::default());
    let g = &report.graph;
    assert_eq!(report.dialect, Dialect::Connectivity);
    assert!(report.is_clean());
    assert!(g.is_bipartite());
    assert_eq!(g.node("M1").unwrap().type_label, "pch");
    // M0: y a vss, M1: y a vdd -> four distinct nets.
    assert_eq!(g.nodes().filter(|n| n.is_net()).count(), 4);
    assert!(g.has_edge("M0", "NET_vss"));
    assert!(g.has_edge("NET_vss", "M0"));
    assert_eq!(g.edge_count(), 12);
}

#[test]
fn test_connectivity_malformed_lines() {
    let report = parse_connectivity("X1 (a b inv\n (a b) nand\nX2 (a b)\n");
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(report.graph.node("X2").unwrap().type_label, "Unknown");
}

#[test]
fn test_connectivity_dummy_merges_nets() {
    let text = "m0 (a b) nch\nd0 (b c) DUMMY\nm1 (c d) pch\n";
    let g = collapse_dummies(&build_graph(text, &ParseConfig::default()));
    assert!(!g.contains_node("d0"));
    assert!(!g.contains_node("NET_c"));
    assert!(g.has_edge("m1", "NET_b"));
    assert!(g.is_bipartite());
}

#[test]
fn test_instance_named_like_a_net_keeps_its_type() {
    let report = parse_connectivity("NET_x (x y) nch\nm1 (x y) pch\n");
    let g = &report.graph;
    assert!(report.is_clean());
    assert_eq!(g.node("NET_x").unwrap().category, NodeCategory::Instance);
    assert_eq!(g.node("NET_x").unwrap().type_label, "nch");
    assert!(g.node("NET_x#1").unwrap().is_net());
    assert!(g.has_edge("NET_x", "NET_x#1"));
    assert!(g.has_edge("m1", "NET_x#1"));
    assert!(g.has_edge("m1", "NET_y"));
    assert!(g.is_bipartite());
    assert_eq!(g.edge_count(), 8);
}

#[test]
fn test_instance_named_like_a_pin_keeps_its_type() {
    let report = parse_instance_port(
        "AND PIN_a(A(a),Y(b)); INV u2(A(b),ZN(c));",
        &ParseConfig::default(),
    );
    let g = &report.graph;
    assert_eq!(g.node("PIN_a").unwrap().category, NodeCategory::Instance);
    assert_eq!(g.node("PIN_a").unwrap().type_label, "AND");
    assert_eq!(g.node("PIN_a#1").unwrap().category, NodeCategory::Pin);
    assert!(g.has_edge("PIN_a#1", "PIN_a"));
    assert!(g.has_edge("PIN_a", "u2"));
    assert_eq!(g.edge_count(), 2);
}

#[test]
fn test_connectivity_line_without_connection_list() {
    let text = "M0 y a vss vss nch\nsimulator lang=spectre\nglobal 0 vdd!\nM1 (y a vdd vdd) pch\n";
    let report = parse_connectivity(text);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].line, 1);
    assert_eq!(report.skipped[0].reason, "missing connection list");
    assert!(!report.graph.contains_node("M0"));
    assert!(report.graph.contains_node("M1"));
}

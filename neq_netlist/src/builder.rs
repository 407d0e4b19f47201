//! Netlist text to [`Graph`].
//!
//! Two grammars are supported and chosen once per input by
//! [`Dialect::detect`]:
//!
//! * instance-port: `Type Name ( .port(net), ... ) ;`. Output-pin names
//!   decide the direction of each connection, so the graph is a directed
//!   instance-to-instance graph. Nets without a driver get a synthetic
//!   `PIN_<net>` source.
//! * connectivity: `name ( net1 net2 ... ) celltype [param=value ...]`. Pin
//!   direction is unknown, so every instance is joined to a `NET_<net>` node
//!   by a symmetric edge pair.
//!
//! Building never fails. Statements that cannot be parsed are logged,
//! recorded in the [`BuildReport`] and skipped.

use indexmap::{IndexMap, IndexSet};
use lazy_static::lazy_static;
use neq_common::ParseConfig;
use neq_graph::{Dialect, EdgeAttrs, Graph, NET_TYPE, NodeCategory, PIN_TYPE, Timer};
use regex::Regex;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

lazy_static! {
    static ref INSTANCE_RE: Regex =
        Regex::new(r"(?s)^([A-Za-z0-9_$]+)\s+([A-Za-z0-9_$\\\[\].]+)\s*\((.*)\)$").unwrap();
    static ref CONNECTION_RE: Regex =
        Regex::new(r"(?s)^\.?([A-Za-z0-9_$]+)\s*\((.*)\)$").unwrap();
}

/// Statement keywords that declare signals rather than instantiate cells.
const DECLARATION_KEYWORDS: [&str; 11] = [
    "input",
    "output",
    "inout",
    "wire",
    "reg",
    "assign",
    "supply0",
    "supply1",
    "parameter",
    "localparam",
    "tri",
];

/// First tokens of connectivity lines that only delimit blocks.
const BLOCK_KEYWORDS: [&str; 5] = ["subckt", "ends", "inline", ".subckt", ".ends"];

/// First tokens of connectivity lines that configure the simulator.
const DIRECTIVE_KEYWORDS: [&str; 14] = [
    "simulator",
    "global",
    "include",
    "ahdl_include",
    "parameters",
    "options",
    "save",
    "model",
    "section",
    "endsection",
    "library",
    "endlibrary",
    "statistics",
    "ic",
];

/// A statement the builder skipped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("line {line}: {reason}: '{text}'")]
pub struct FormatError {
    /// 1-based line the statement starts on.
    pub line: usize,
    /// The offending statement, whitespace-normalised.
    pub text: String,
    /// Why it was skipped.
    pub reason: String,
}

impl FormatError {
    fn new(line: usize, text: &str, reason: impl Into<String>) -> Self {
        Self {
            line,
            text: text.split_whitespace().collect::<Vec<_>>().join(" "),
            reason: reason.into(),
        }
    }
}

/// A built graph plus everything that was skipped on the way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildReport {
    /// The (possibly partial) graph.
    pub graph: Graph,
    /// Grammar used.
    pub dialect: Dialect,
    /// Statements that could not be parsed.
    pub skipped: Vec<FormatError>,
}

impl BuildReport {
    fn new(dialect: Dialect) -> Self {
        Self {
            graph: Graph::with_dialect(dialect),
            dialect,
            skipped: Vec::new(),
        }
    }

    fn skip(&mut self, error: FormatError) {
        warn!("Skipping {}", error);
        self.skipped.push(error);
    }

    /// Returns true if nothing was skipped.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Builds a graph from `text`, detecting its dialect.
#[must_use]
pub fn build_graph(text: &str, config: &ParseConfig) -> Graph {
    build_graph_with_report(text, config).graph
}

/// Builds a graph from `text` and reports skipped statements.
#[must_use]
pub fn build_graph_with_report(text: &str, config: &ParseConfig) -> BuildReport {
    let _t = Timer::new("build_graph");
    let dialect = Dialect::detect(text);
    debug!("Detected {:?} netlist", dialect);
    let report = match dialect {
        Dialect::InstancePort => parse_instance_port(text, config),
        Dialect::Connectivity => parse_connectivity(text),
    };
    info!(
        "Built {:?} graph: {} nodes, {} edges, {} statements skipped",
        report.dialect,
        report.graph.node_count(),
        report.graph.edge_count(),
        report.skipped.len()
    );
    report
}

// ##########################################
// Instance-port grammar
// ##########################################

#[derive(Debug, Default)]
struct NetEnds {
    sources: IndexSet<String>,
    sinks: IndexSet<String>,
}

/// Parses `text` with the instance-port grammar.
#[must_use]
pub fn parse_instance_port(text: &str, config: &ParseConfig) -> BuildReport {
    let mut report = BuildReport::new(Dialect::InstancePort);
    let mut nets: IndexMap<String, NetEnds> = IndexMap::new();

    let (statements, trailing) = split_statements(text);
    for (line, statement) in &statements {
        parse_statement(*line, statement, config, &mut report, &mut nets);
    }
    if let Some((line, rest)) = trailing {
        report.skip(FormatError::new(line, &rest, "unterminated statement"));
    }

    for (net, ends) in nets {
        let mut sources: Vec<String> = ends.sources.into_iter().collect();
        if sources.is_empty() {
            let pin = report.graph.fresh_id(&format!("PIN_{net}"));
            report.graph.add_node(pin.clone(), NodeCategory::Pin, PIN_TYPE);
            sources.push(pin);
        }
        for source in &sources {
            for sink in &ends.sinks {
                if source == sink {
                    continue;
                }
                if let Err(e) = report.graph.add_edge(source, sink, EdgeAttrs::on_net(&net)) {
                    warn!("Net {}: {}", net, e);
                }
            }
        }
    }

    report
}

/// Splits comment-free text into `;`-terminated statements.
///
/// Returns `(start_line, statement)` pairs and any unterminated tail.
fn split_statements(text: &str) -> (Vec<(usize, String)>, Option<(usize, String)>) {
    let mut statements = Vec::new();
    let mut buffer = String::new();
    let mut buffer_line = 0;

    for (i, raw) in text.lines().enumerate() {
        let line = raw.find("//").map_or(raw, |pos| &raw[..pos]);
        if line.trim_start().starts_with("endmodule") {
            continue;
        }
        let mut pieces = line.split(';').peekable();
        while let Some(piece) = pieces.next() {
            if buffer.trim().is_empty() {
                buffer.clear();
                buffer_line = i + 1;
            }
            buffer.push_str(piece);
            buffer.push(' ');
            if pieces.peek().is_some() {
                let statement = buffer.trim().to_string();
                if !statement.is_empty() {
                    statements.push((buffer_line, statement));
                }
                buffer.clear();
            }
        }
    }

    let rest = buffer.trim();
    let trailing = (!rest.is_empty()).then(|| (buffer_line, rest.to_string()));
    (statements, trailing)
}

fn parse_statement(
    line: usize,
    statement: &str,
    config: &ParseConfig,
    report: &mut BuildReport,
    nets: &mut IndexMap<String, NetEnds>,
) {
    let keyword = statement.split_whitespace().next().unwrap_or_default();
    if keyword == "module" || keyword == "macromodule" {
        trace!("Line {}: module header", line);
        return;
    }
    if DECLARATION_KEYWORDS.contains(&keyword) {
        trace!("Line {}: declaration '{}'", line, keyword);
        return;
    }

    let Some(caps) = INSTANCE_RE.captures(statement) else {
        report.skip(FormatError::new(line, statement, "not an instance statement"));
        return;
    };
    let cell_type = &caps[1];
    let name = &caps[2];
    let body = &caps[3];

    if !report
        .graph
        .add_node(name, NodeCategory::Instance, cell_type)
    {
        warn!(
            "Line {}: instance '{}' redefined, type is now '{}'",
            line, name, cell_type
        );
    }

    for connection in split_top_level(body) {
        let Some(conn) = CONNECTION_RE.captures(connection) else {
            debug!(
                "Line {}: positional connection '{}' on '{}' skipped",
                line, connection, name
            );
            continue;
        };
        let pin = &conn[1];
        let net = conn[2].trim();
        if net.is_empty() {
            debug!("Line {}: empty connection '{}' on '{}'", line, pin, name);
            continue;
        }

        let ends = nets.entry(net.to_string()).or_default();
        if config.is_output_pin(pin) {
            ends.sources.insert(name.to_string());
        } else {
            ends.sinks.insert(name.to_string());
        }
    }
}

/// Splits on commas outside any bracket pair; empty pieces are dropped.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;
    for (i, c) in body.char_indices() {
        match c {
            '(' | '{' | '[' => depth += 1,
            ')' | '}' | ']' => depth -= 1,
            ',' if depth == 0 => {
                pieces.push(body[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(body[start..].trim());
    pieces.retain(|p| !p.is_empty());
    pieces
}

// ##########################################
// Connectivity grammar
// ##########################################

/// One parsed connectivity line.
struct ConnectivityLine {
    line: usize,
    name: String,
    cell_type: String,
    nets: Vec<String>,
}

/// Parses `text` with the connectivity grammar.
///
/// All instances are placed before any net node, so a net whose
/// `NET_<net>` id is already an instance name gets a `#k` suffix instead.
#[must_use]
pub fn parse_connectivity(text: &str) -> BuildReport {
    let mut report = BuildReport::new(Dialect::Connectivity);
    let mut parsed = Vec::new();

    for (line, logical) in logical_lines(text) {
        if let Some(record) = parse_connectivity_line(line, logical.trim(), &mut report) {
            parsed.push(record);
        }
    }

    for record in &parsed {
        if !report.graph.add_node(
            record.name.clone(),
            NodeCategory::Instance,
            record.cell_type.clone(),
        ) {
            warn!(
                "Line {}: instance '{}' redefined, type is now '{}'",
                record.line, record.name, record.cell_type
            );
        }
    }

    let mut net_ids: IndexMap<String, String> = IndexMap::new();
    for record in &parsed {
        for net in &record.nets {
            let net_id = match net_ids.get(net) {
                Some(id) => id.clone(),
                None => {
                    let base = format!("NET_{net}");
                    let id = report.graph.fresh_id(&base);
                    if id != base {
                        debug!("Net '{}' placed as '{}' to avoid an instance name", net, id);
                    }
                    report.graph.add_node(id.clone(), NodeCategory::Net, NET_TYPE);
                    net_ids.insert(net.clone(), id.clone());
                    id
                }
            };
            let name = record.name.as_str();
            for (from, to) in [(name, net_id.as_str()), (net_id.as_str(), name)] {
                if let Err(e) = report.graph.add_edge(from, to, EdgeAttrs::on_net(net)) {
                    warn!("Line {}: {}", record.line, e);
                }
            }
        }
    }

    report
}

/// Returns true for a line without a connection list that still reads like
/// an instance. Directives and lines made only of `param=value` settings
/// after the first token do not.
fn looks_like_instance(logical: &str, first: &str) -> bool {
    if first.starts_with('.') || DIRECTIVE_KEYWORDS.contains(&first) {
        return false;
    }
    let mut tokens = logical.split_whitespace().skip(1).peekable();
    tokens.peek().is_some() && tokens.any(|token| !token.contains('='))
}

fn parse_connectivity_line(
    line: usize,
    logical: &str,
    report: &mut BuildReport,
) -> Option<ConnectivityLine> {
    if logical.is_empty() || logical.starts_with("//") || logical.starts_with('*') {
        return None;
    }

    let first = logical
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase();
    if BLOCK_KEYWORDS.contains(&first.as_str()) {
        trace!("Line {}: block delimiter '{}'", line, first);
        return None;
    }

    let Some(open) = logical.find('(') else {
        if looks_like_instance(logical, &first) {
            report.skip(FormatError::new(line, logical, "missing connection list"));
        } else {
            debug!("Line {}: directive '{}' ignored", line, first);
        }
        return None;
    };
    let Some(close) = logical[open..].find(')').map(|pos| open + pos) else {
        report.skip(FormatError::new(line, logical, "unclosed connection list"));
        return None;
    };

    let name = logical[..open].trim().replace('\\', "");
    if name.is_empty() || name.contains(char::is_whitespace) {
        report.skip(FormatError::new(line, logical, "malformed instance name"));
        return None;
    }

    let cell_type = logical[close + 1..]
        .split_whitespace()
        .next()
        .filter(|token| !token.contains('='))
        .map_or_else(|| "Unknown".to_string(), |token| token.replace('\\', ""));

    Some(ConnectivityLine {
        line,
        name,
        cell_type,
        nets: logical[open + 1..close]
            .split_whitespace()
            .map(str::to_string)
            .collect(),
    })
}

/// Joins physical lines ending in `\` into `(start_line, logical_line)`.
fn logical_lines(text: &str) -> Vec<(usize, String)> {
    let mut logical = Vec::new();
    let mut buffer = String::new();
    let mut buffer_line = None;

    for (i, raw) in text.lines().enumerate() {
        let start = *buffer_line.get_or_insert(i + 1);
        let piece = if buffer.is_empty() { raw } else { raw.trim_start() };
        if let Some(stripped) = piece.strip_suffix('\\') {
            buffer.push_str(stripped.trim_end());
            buffer.push(' ');
        } else {
            buffer.push_str(piece);
            logical.push((start, std::mem::take(&mut buffer)));
            buffer_line = None;
        }
    }
    if let Some(start) = buffer_line {
        logical.push((start, buffer));
    }
    logical
}

//! Netlist equivalence CLI
//!
//! Entry point for the `neq` command-line tool. Compares netlists exactly or
//! approximately, cleans dummy cells and inspects subcircuit blocks.
//!
//! Exit status: 0 when equivalent (or no verdict was requested), 1 when not
//! equivalent, 2 on any processing error.

#[global_allocator]
/// Global allocator using jemalloc for better performance in parallel workloads.
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

mod args;

use std::error::Error;
use std::process::ExitCode;

use clap::Parser;
use itertools::Itertools;
use neq_common::CheckMode;
use neq_driver::{
    CheckReport, check_files, compare_batch, compare_hierarchies, prepare_graph, read_netlist,
};
use neq_netlist::SubcircuitIndex;
use tracing::{error, info};

use args::{Args, Command};

const EXIT_NOT_EQUIVALENT: u8 = 1;
const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    let outcome = run(&args);
    neq_graph::log_profile();
    match outcome {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {e}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn verdict_code(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_NOT_EQUIVALENT)
    }
}

fn print_report(report: &CheckReport) {
    match (&report.hash, &report.matching) {
        (Some(hash), _) => {
            println!("hash A: {}", hash.hash_a);
            println!("hash B: {}", hash.hash_b);
        }
        (None, Some(matching)) => {
            println!(
                "matched {} pairs, score {} (normalized {:.4}), {} iterations{}",
                matching.matched_pairs.len(),
                matching.score,
                matching.normalized_score,
                matching.iterations,
                if matching.converged { "" } else { ", not converged" }
            );
        }
        (None, None) => {}
    }
    println!(
        "A: {} nodes, {} edges ({} dummies removed) | B: {} nodes, {} edges ({} dummies removed)",
        report.graph_a.node_count,
        report.graph_a.edge_count,
        report.graph_a.removed_dummies,
        report.graph_b.node_count,
        report.graph_b.edge_count,
        report.graph_b.removed_dummies,
    );
    match report.equivalent {
        Some(true) => println!("EQUIVALENT"),
        Some(false) => println!("NOT EQUIVALENT"),
        None => println!("no threshold given, no verdict"),
    }
}

fn run(args: &Args) -> Result<ExitCode, Box<dyn Error>> {
    match &args.command {
        Command::Check { a, b, options } | Command::Match { a, b, options } => {
            let mut config = options.to_config()?;
            if matches!(args.command, Command::Match { .. }) {
                config.mode = CheckMode::Match;
            }
            info!("Comparing {} against {}", a.display(), b.display());
            let report = check_files(a, b, &config)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            Ok(verdict_code(report.passed()))
        }
        Command::Batch { pairs, options } => {
            let config = options.to_config()?;
            let texts: Vec<(String, String)> = pairs
                .iter()
                .map(|(a, b)| Ok((read_netlist(a)?, read_netlist(b)?)))
                .collect::<Result<_, neq_driver::DriverError>>()?;

            let results = compare_batch(&texts, &config)?;
            let mut all_passed = true;
            for ((a, b), result) in pairs.iter().zip(&results) {
                match result {
                    Ok(report) => {
                        all_passed &= report.passed();
                        if args.json {
                            println!("{}", serde_json::to_string(report)?);
                        } else {
                            println!(
                                "{} vs {}: {}",
                                a.display(),
                                b.display(),
                                match report.equivalent {
                                    Some(true) => "equivalent",
                                    Some(false) => "NOT equivalent",
                                    None => "no verdict",
                                }
                            );
                        }
                    }
                    Err(e) => {
                        error!("{} vs {}: {}", a.display(), b.display(), e);
                        println!("{} vs {}: error: {}", a.display(), b.display(), e);
                    }
                }
            }
            if results.iter().any(Result::is_err) {
                return Ok(ExitCode::from(EXIT_ERROR));
            }
            Ok(verdict_code(all_passed))
        }
        Command::Clean { file, options } => {
            let config = options.to_config()?;
            let prepared = prepare_graph(&read_netlist(file)?, &config);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&prepared.graph)?);
            } else {
                println!(
                    "{} nodes, {} edges, {} dummies removed, {} nets merged",
                    prepared.stats.node_count,
                    prepared.stats.edge_count,
                    prepared.stats.removed_dummies,
                    prepared.stats.merged_nets,
                );
                for node in prepared.graph.nodes() {
                    let fanout = prepared.graph.successors(&node.id).into_iter().join(" ");
                    println!("{} [{}] -> {}", node.id, node.type_label, fanout);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Blocks { file, index } => {
            let index = SubcircuitIndex::from_path(file, &index.to_config())?;
            for name in index.names() {
                if let Some(span) = index.span(name) {
                    if args.json {
                        println!("{}", serde_json::json!({ "name": name, "span": span }));
                    } else {
                        println!("{name}: lines {}..={}", span.start_line, span.end_line);
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Hierarchy {
            golden,
            targets,
            paths,
            index,
            options,
        } => {
            let config = options.to_config()?;
            let entries =
                compare_hierarchies(golden, targets, paths, &index.to_config(), &config)?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                for entry in &entries {
                    match (&entry.report, &entry.error) {
                        (Some(report), _) => {
                            println!(
                                "[{}] {}: golden {} vs target {}",
                                entry.target,
                                entry.path,
                                report.golden.trail.join("/"),
                                report.target.trail.join("/")
                            );
                            print_report(&report.check);
                        }
                        (None, error) => println!(
                            "[{}] {}: error: {}",
                            entry.target,
                            entry.path,
                            error.as_deref().unwrap_or("unknown")
                        ),
                    }
                }
            }
            if entries.iter().any(|entry| entry.error.is_some()) {
                return Ok(ExitCode::from(EXIT_ERROR));
            }
            Ok(verdict_code(entries.iter().all(|entry| entry.passed())))
        }
    }
}

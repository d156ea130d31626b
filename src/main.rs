#![forbid(unsafe_code)]

use std::process::exit;

use content_intermediate::budget::BudgetReport;
use content_intermediate::{load_document_with_options, Options, TypeRegistry};
use log::info;

fn report_budget(report: &BudgetReport) {
    match serde_json::to_string_pretty(report) {
        Ok(serialized) => eprintln!("Budget report:\n{serialized}"),
        Err(err) => eprintln!("Failed to serialize budget report: {err}"),
    }
}

/// Read an intermediate content document, print its object graph as JSON and
/// the budget it needed. Single parameter is the file name. Only built-in
/// types are known, so typed content must name them via `Type` attributes.
fn main() {
    env_logger::init();

    let path = match std::env::args()
        .nth(1)
        .ok_or("This program validates an intermediate content document and prints its object graph. \
        Expected a path to an XML document as the first argument") {
        Ok(path) => path,
        Err(err) => {
            eprintln!("{err}");
            exit(1);
        }
    };

    let options = Options {
        budget_report: Some(report_budget),
        ..Options::default()
    };
    let registry = TypeRegistry::new();

    let graph = match load_document_with_options(&path, &registry, options) {
        Ok(graph) => graph,
        Err(err) => {
            eprintln!("{path} invalid:\n{err}");
            exit(3);
        }
    };

    info!(path = path.as_str(), resources = graph.resources().len(); "Document is valid");
    match serde_json::to_string_pretty(&graph) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("Failed to serialize object graph: {err}");
            exit(2);
        }
    }
}

//! Bidirectional translation between a restricted Python-like language
//! ("lite-source") and a flowchart graph.
//!
//! Three pipelines, all pure and deterministic, safe to re-run on every
//! keystroke:
//!
//! - [`source_to_flow`]: parse lite-source and chart it.
//! - [`flow_to_source`]: structure an arbitrary (possibly hand-edited) graph
//!   back into code, inducing `for` loops and degrading to a linear dump with
//!   diagnostics when the graph defeats recovery.
//! - [`cfg_to_flow`]: adapt an authoritative backend CFG onto the same flow
//!   model, with the same join flattening the builder applies.

pub mod cfg;
pub mod codegen;
pub mod error;
pub mod graph;
pub mod induce;
pub mod ir;
pub mod parser;

use std::collections::BTreeMap;

pub use cfg::{AdaptOutcome, ExternalCfg};
pub use codegen::Generated;
pub use error::{Error, Warning, WarningKind};
pub use graph::{Edge, EdgeLabel, FlowGraph, Node, Shape};
pub use parser::ParseOutcome;

/// Result of translating a flow graph back to lite-source.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeOutcome {
    pub text: String,
    /// Flow-node id → 1-based line in `text`, recomputed on every pass.
    pub line_map: BTreeMap<String, usize>,
    pub warnings: Vec<Warning>,
    /// False when structuring failed and `text` is the linear fallback.
    pub structured: bool,
}

/// Lite-source text → flow graph. A parse failure carries the parser's
/// warnings; nothing downstream runs on a partial IR.
pub fn source_to_flow(src: &str) -> Result<FlowGraph, Error> {
    let outcome = parser::parse(src);
    match outcome.ir {
        Some(ir) => Ok(graph::build::build(&ir)),
        None => Err(Error::Parse(outcome.warnings)),
    }
}

/// Flow graph → lite-source text plus the node→line map. Never fails: an
/// unstructurable graph degrades to a linear dump and the warnings say why.
#[must_use]
pub fn flow_to_source(flow: &FlowGraph) -> CodeOutcome {
    let structured = graph::structure::structure(flow);
    let mut warnings = structured.warnings;
    let (ir, mut found) = induce::induce(structured.ir);
    warnings.append(&mut found);
    let generated = codegen::generate(&ir);
    CodeOutcome {
        text: generated.text,
        line_map: generated.line_map,
        warnings,
        structured: structured.structured,
    }
}

/// External authoritative CFG → flow graph, diagnostics passed through.
#[must_use]
pub fn cfg_to_flow(cfg: &ExternalCfg) -> AdaptOutcome {
    cfg::adapt(cfg)
}

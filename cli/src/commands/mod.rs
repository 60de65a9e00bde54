//! CLI command handlers
//!
//! Every handler drives the engine through its public API and returns
//! whether the operation's verdict was positive (the process exit code
//! follows it).

use anyhow::Context;
use serde::Serialize;
use std::fs;
use std::str::FromStr;

use obi_protocol::{Engine, ExportFormat, GovernanceZone, IrStream, Rejection};
use obi_uscn::Normalizer;

use crate::output::OutputFormat;

#[derive(Serialize)]
struct NodeReport {
    kind: String,
    content: String,
    source_state: u32,
    cost: f64,
}

#[derive(Serialize)]
struct ValidationReport {
    verdict: &'static str,
    reason: Option<String>,
    position: Option<usize>,
    final_state: Option<u32>,
    cost: f64,
    zone: Option<GovernanceZone>,
    ir: Vec<NodeReport>,
}

fn node_reports(ir: &IrStream) -> Vec<NodeReport> {
    ir.iter()
        .map(|n| NodeReport {
            kind: n.kind.to_string(),
            content: n.content_lossy().into_owned(),
            source_state: n.source_state,
            cost: n.cost,
        })
        .collect()
}

/// `obibuf validate <file>`
pub fn validate(file: &str, zero_trust: bool, format: OutputFormat) -> anyhow::Result<bool> {
    let input = fs::read(file).with_context(|| format!("reading {file}"))?;
    let mut engine = Engine::new(zero_trust).context("building admission engine")?;

    let (report, passed) = match engine.admit(&input) {
        Ok(admission) => {
            let report = ValidationReport {
                verdict: "passed",
                reason: None,
                position: None,
                final_state: Some(admission.final_state),
                cost: admission.cost,
                zone: Some(admission.zone),
                ir: node_reports(&admission.ir),
            };
            (report, true)
        }
        Err(Rejection { kind, position, cost, partial_ir }) => {
            let report = ValidationReport {
                verdict: "rejected",
                reason: Some(kind.to_string()),
                position,
                final_state: None,
                cost,
                zone: None,
                ir: node_reports(&partial_ir),
            };
            (report, false)
        }
    };

    format.print(&report, || {
        let mut lines = vec![format!("validation: {}", report.verdict.to_uppercase())];
        if let Some(reason) = &report.reason {
            lines.push(format!("reason: {reason}"));
        }
        if let Some(state) = report.final_state {
            lines.push(format!("final state: S{state}"));
        }
        if let Some(zone) = report.zone {
            lines.push(format!("governance cost: {:.4} ({zone} zone)", report.cost));
        }
        for node in &report.ir {
            lines.push(format!("  {} S{} {:?}", node.kind, node.source_state, node.content));
        }
        lines.join("\n")
    });
    Ok(passed)
}

#[derive(Serialize)]
struct NormalizeReport {
    original: String,
    canonical: String,
    origin_hash: String,
}

/// `obibuf normalize <input>`
pub fn normalize(input: &str, format: OutputFormat) -> anyhow::Result<bool> {
    let canonical = Normalizer::default()
        .normalize(input.as_bytes())
        .context("normalizing input")?;

    let report = NormalizeReport {
        original: input.to_string(),
        canonical: String::from_utf8_lossy(canonical.as_bytes()).into_owned(),
        origin_hash: canonical.origin_hash().iter().map(|b| format!("{b:02x}")).collect(),
    };
    format.print(&report, || {
        format!("original:   {}\nnormalized: {}", report.original, report.canonical)
    });
    Ok(true)
}

#[derive(Serialize)]
struct EquivalenceReport {
    equivalent: bool,
}

/// `obibuf equivalent <a> <b>`
pub fn equivalent(a: &str, b: &str, format: OutputFormat) -> anyhow::Result<bool> {
    let verdict = Normalizer::default().equivalent(a.as_bytes(), b.as_bytes());
    let report = EquivalenceReport { equivalent: verdict };
    format.print(&report, || format!("equivalent: {verdict}"));
    Ok(verdict)
}

/// `obibuf export --format <fmt>`
pub fn export(format: &str, zero_trust: bool) -> anyhow::Result<bool> {
    let format = ExportFormat::from_str(format)?;
    let engine = Engine::new(zero_trust).context("building admission engine")?;
    println!("{}", engine.export_spec(format)?);
    Ok(true)
}

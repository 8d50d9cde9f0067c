//! Geometry operations: Merged, Boolean, Sized, Check, Select
//!
//! Every operation stores its output under the requested `output` name (or a
//! generated `$N`) so later requests can use it as an operand.

use std::time::Instant;

use anyhow::Context;
use serde::Deserialize;

use crate::geometry::{CheckOptions, Coord, RelationKind};
use crate::hier::InteractionMode;
use crate::server::protocol::parse_params;
use crate::server::state::{ResultLayer, ServerState};

use super::query::summary;

fn default_mode() -> u32 {
    2
}

fn default_min_count() -> usize {
    1
}

/// Handle Merged request
pub fn handle_merged(state: &mut ServerState, params: Option<serde_json::Value>) -> anyhow::Result<serde_json::Value> {
    #[derive(Deserialize)]
    struct MergedParams {
        layer: String,
        #[serde(default)]
        min_coherence: Option<bool>,
        #[serde(default)]
        min_wc: u32,
        #[serde(default)]
        output: Option<String>,
    }

    let params: MergedParams = parse_params(params, "{layer: string, min_coherence?: bool, min_wc?: number}")?;
    let region = state.region(&params.layer)?;
    let min_coherence = params.min_coherence.unwrap_or(state.config.min_coherence);
    let merged = region
        .merged(min_coherence, params.min_wc)
        .with_context(|| format!("Merged '{}'", params.layer))?;

    let layer = ResultLayer::Region(merged);
    let value = summary(&layer);
    let name = state.store_result(params.output, layer);
    Ok(serde_json::json!({ "output": name, "stats": value }))
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum BooleanKind {
    And,
    Not,
    Or,
    Xor,
    AndNot,
}

/// Handle Boolean request; `andnot` yields two results
pub fn handle_boolean(state: &mut ServerState, params: Option<serde_json::Value>) -> anyhow::Result<serde_json::Value> {
    #[derive(Deserialize)]
    struct BooleanParams {
        a: String,
        b: String,
        op: BooleanKind,
        #[serde(default)]
        output: Option<String>,
        #[serde(default)]
        output_not: Option<String>,
    }

    let params: BooleanParams = parse_params(params, "{a: string, b: string, op: and|not|or|xor|andnot}")?;
    let start = Instant::now();
    let a = state.region(&params.a)?;
    let b = state.region(&params.b)?;
    let context = || format!("Boolean {:?} of '{}' and '{}'", params.op, params.a, params.b);

    let (first, second) = match params.op {
        BooleanKind::And => (a.and_with(&b).with_context(context)?, None),
        BooleanKind::Not => (a.not_with(&b).with_context(context)?, None),
        BooleanKind::Or => (a.or_with(&b).with_context(context)?, None),
        BooleanKind::Xor => (a.xor_with(&b).with_context(context)?, None),
        BooleanKind::AndNot => {
            let (and, not) = a.andnot_with(&b).with_context(context)?;
            (and, Some(not))
        }
    };
    log::info!("[Server] Boolean {:?} done ({:.2?})", params.op, start.elapsed());

    let layer = ResultLayer::Region(first);
    let stats = summary(&layer);
    let name = state.store_result(params.output, layer);
    let mut response = serde_json::json!({ "output": name, "stats": stats });
    if let Some(not) = second {
        let layer = ResultLayer::Region(not);
        let stats = summary(&layer);
        let name = state.store_result(params.output_not, layer);
        response["output_not"] = serde_json::json!(name);
        response["stats_not"] = stats;
    }
    Ok(response)
}

/// Handle Sized request; `dy` defaults to `dx`
pub fn handle_sized(state: &mut ServerState, params: Option<serde_json::Value>) -> anyhow::Result<serde_json::Value> {
    #[derive(Deserialize)]
    struct SizedParams {
        layer: String,
        dx: Coord,
        #[serde(default)]
        dy: Option<Coord>,
        #[serde(default = "default_mode")]
        mode: u32,
        #[serde(default)]
        output: Option<String>,
    }

    let params: SizedParams = parse_params(params, "{layer: string, dx: number, dy?: number, mode?: 0..5}")?;
    let region = state.region(&params.layer)?;
    let dy = params.dy.unwrap_or(params.dx);
    let sized = region
        .sized(params.dx, dy, params.mode)
        .with_context(|| format!("Sized '{}' by ({}, {})", params.layer, params.dx, dy))?;

    let layer = ResultLayer::Region(sized);
    let stats = summary(&layer);
    let name = state.store_result(params.output, layer);
    Ok(serde_json::json!({ "output": name, "stats": stats }))
}

/// Handle Check request - runs one DRC relation and stores the edge pairs
pub fn handle_check(state: &mut ServerState, params: Option<serde_json::Value>) -> anyhow::Result<serde_json::Value> {
    #[derive(Deserialize)]
    struct CheckParams {
        kind: RelationKind,
        layer: String,
        #[serde(default)]
        other: Option<String>,
        distance: f64,
        #[serde(default)]
        options: CheckOptions,
        #[serde(default)]
        return_pairs: bool,
        #[serde(default)]
        output: Option<String>,
    }

    let params: CheckParams = parse_params(params, "{kind: string, layer: string, other?: string, distance: number}")?;
    let region = state.region(&params.layer)?;
    let other = params.other.as_deref().map(|n| state.region(n)).transpose()?;
    let pairs = region
        .run_check(params.kind, other.as_ref(), params.distance, params.options)
        .with_context(|| format!("{} check on '{}'", params.kind.name(), params.layer))?;

    let flat = if params.return_pairs { Some(pairs.to_edge_pairs()) } else { None };
    let layer = ResultLayer::EdgePairs(pairs);
    let stats = summary(&layer);
    let name = state.store_result(params.output, layer);
    let mut response = serde_json::json!({ "output": name, "stats": stats });
    if let Some(flat) = flat {
        response["pairs"] = serde_json::to_value(flat)?;
    }
    Ok(response)
}

/// Handle Select request - splits `layer` into shapes with and without the relation to `other`
pub fn handle_select(state: &mut ServerState, params: Option<serde_json::Value>) -> anyhow::Result<serde_json::Value> {
    #[derive(Deserialize)]
    struct SelectParams {
        layer: String,
        other: String,
        mode: InteractionMode,
        #[serde(default = "default_min_count")]
        min_count: usize,
        #[serde(default)]
        max_count: Option<usize>,
        #[serde(default)]
        output: Option<String>,
        #[serde(default)]
        output_rest: Option<String>,
    }

    let params: SelectParams = parse_params(params, "{layer: string, other: string, mode: string, min_count?, max_count?}")?;
    let region = state.region(&params.layer)?;
    let other = state.region(&params.other)?;
    let (selected, rest) = region
        .selected(&other, params.mode, params.min_count, params.max_count.unwrap_or(usize::MAX))
        .with_context(|| format!("Select {:?} '{}' by '{}'", params.mode, params.layer, params.other))?;

    let selected = ResultLayer::Region(selected);
    let rest = ResultLayer::Region(rest);
    let stats = summary(&selected);
    let stats_rest = summary(&rest);
    let name = state.store_result(params.output, selected);
    let name_rest = state.store_result(params.output_rest, rest);
    Ok(serde_json::json!({
        "output": name,
        "stats": stats,
        "output_rest": name_rest,
        "stats_rest": stats_rest,
    }))
}

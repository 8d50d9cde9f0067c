//! Query handlers: Stats

use serde::Deserialize;

use crate::geometry::Rect;
use crate::server::protocol::parse_params;
use crate::server::state::{ResultLayer, ServerState};

fn bbox_json(r: &Rect) -> serde_json::Value {
    if r.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::json!([r.left, r.bottom, r.right, r.top])
    }
}

/// Counts and extents of one collection
pub fn summary(layer: &ResultLayer) -> serde_json::Value {
    match layer {
        ResultLayer::Region(r) => serde_json::json!({
            "kind": layer.kind(),
            "count": r.count(),
            "hier_count": r.hier_count(),
            "area": r.area(),
            "bbox": bbox_json(&r.bbox()),
            "merged": r.is_merged(),
        }),
        ResultLayer::EdgePairs(p) => serde_json::json!({
            "kind": layer.kind(),
            "count": p.count(),
            "hier_count": p.hier_count(),
        }),
    }
}

/// Handle Stats request - for a result or a layout layer
pub fn handle_stats(state: &ServerState, params: Option<serde_json::Value>) -> anyhow::Result<serde_json::Value> {
    #[derive(Deserialize)]
    struct StatsParams {
        layer: String,
        #[serde(default)]
        polygons: bool,
    }

    let params: StatsParams = parse_params(params, "{layer: string, polygons?: bool}")?;
    let layer = match state.results.get(&params.layer) {
        Some(layer) => layer.clone(),
        None => ResultLayer::Region(state.region(&params.layer)?),
    };

    let mut value = summary(&layer);
    if params.polygons {
        if let ResultLayer::Region(r) = &layer {
            value["polygons"] = serde_json::to_value(r.to_merged_polygons())?;
        }
    }
    Ok(value)
}

//! File operations: Load, Close

use std::time::Instant;

use anyhow::Context;
use serde::Deserialize;

use crate::deep::DeepShapeStore;
use crate::layout::LayoutDocument;
use crate::server::protocol::{parse_params, ServerError};
use crate::server::state::ServerState;

/// Handle Load request - reads a layout document from a file or inline JSON
pub fn handle_load(state: &mut ServerState, params: Option<serde_json::Value>) -> anyhow::Result<serde_json::Value> {
    #[derive(Deserialize)]
    struct LoadParams {
        #[serde(default)]
        file_path: Option<String>,
        #[serde(default)]
        document: Option<LayoutDocument>,
    }

    let params: LoadParams = parse_params(params, "{file_path: string} or {document: object}")?;
    let start_total = Instant::now();

    let document = match (params.document, &params.file_path) {
        (Some(doc), _) => doc,
        (None, Some(path)) => {
            log::info!("[Server] Loading file: {}", path);
            LayoutDocument::from_file(path).with_context(|| format!("Failed to read '{}'", path))?
        }
        (None, None) => return Err(ServerError::InvalidParams("{file_path: string} or {document: object}".into()).into()),
    };

    let start_build = Instant::now();
    let (layout, top) = document.to_layout().context("Failed to build layout")?;
    let num_cells = layout.num_cells();
    let store = DeepShapeStore::from_layout(layout, top, state.config.clone())?;
    log::info!("[Server] Layout build time: {:.2?}", start_build.elapsed());

    state.clear();
    state.file_path = params.file_path;
    let layers = store.layer_names();
    let top_name = store.read().layout.cell_name(top).to_string();
    state.store = Some(store);

    let elapsed = start_total.elapsed();
    log::info!("[Server] Loaded {} cells, {} layers ({:.2?})", num_cells, layers.len(), elapsed);

    Ok(serde_json::json!({
        "status": "ok",
        "top": top_name,
        "cells": num_cells,
        "layers": layers,
        "elapsed_ms": elapsed.as_secs_f64() * 1000.0,
    }))
}

/// Handle Close request - drops the layout and all results
pub fn handle_close(state: &mut ServerState) -> anyhow::Result<serde_json::Value> {
    if let Some(path) = &state.file_path {
        log::info!("[Server] Closing {}", path);
    }
    state.clear();
    Ok(serde_json::json!({ "status": "ok" }))
}

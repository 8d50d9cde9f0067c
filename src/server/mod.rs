//! Geometry server - JSON-RPC over stdin/stdout
//!
//! One request per line, one response per line. A client loads a layout
//! document, then runs operations on its layers; results are kept by name and
//! can be fed into later requests.
//!
//! # Module Structure
//! - `protocol` - JSON-RPC request/response types and error codes
//! - `state` - Loaded layout and named results
//! - `logger` - stderr/file logger for the binary
//! - `handlers` - Request handlers organized by functionality

pub mod handlers;
pub mod logger;
pub mod protocol;
pub mod state;

use std::io::{BufRead, Write};
use std::time::Instant;

use anyhow::Context;

pub use protocol::{error_codes, ErrorResponse, Request, Response, ServerError};
pub use state::{ResultLayer, ServerState};

use handlers::*;

/// Route one request to its handler
pub fn dispatch(state: &mut ServerState, request: Request) -> Response {
    let start = Instant::now();
    let Request { id, method, params } = request;
    log::debug!("[Server] {} request", method);

    let result = match method.as_str() {
        "Load" => handle_load(state, params),
        "GetLayers" => handle_get_layers(state),
        "Merged" => handle_merged(state, params),
        "Boolean" => handle_boolean(state, params),
        "Sized" => handle_sized(state, params),
        "Check" => handle_check(state, params),
        "Select" => handle_select(state, params),
        "Stats" => handle_stats(state, params),
        "Close" => handle_close(state),
        _ => Err(ServerError::MethodNotFound(method.clone()).into()),
    };

    if let Err(e) = &result {
        log::warn!("[Server] {} failed: {:#}", method, e);
    } else {
        log::debug!("[Server] {} done ({:.2?})", method, start.elapsed());
    }
    Response::from_result(id, result)
}

/// Handle one raw request line; `None` for blank lines
pub fn handle_line(state: &mut ServerState, line: &str) -> Option<Response> {
    if line.trim().is_empty() {
        return None;
    }
    match serde_json::from_str::<Request>(line) {
        Ok(request) => Some(dispatch(state, request)),
        Err(e) => {
            log::warn!("[Server] Failed to parse request: {}", e);
            Some(Response::error(None, error_codes::PARSE_ERROR, format!("Parse error: {}", e)))
        }
    }
}

/// Serve requests until the input ends
pub fn serve<R: BufRead, W: Write>(input: R, mut output: W, state: &mut ServerState) -> anyhow::Result<()> {
    for line in input.lines() {
        let line = line.context("Error reading request stream")?;
        if let Some(response) = handle_line(state, &line) {
            let json = serde_json::to_string(&response)?;
            writeln!(output, "{}", json)?;
            output.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "dbu": 0.001,
        "top": "TOP",
        "cells": [
            { "name": "A", "shapes": { "M1": [ { "box": [0, 0, 10, 10] }, { "box": [13, 0, 20, 10] } ] } },
            { "name": "TOP", "instances": [ { "cell": "A" }, { "cell": "A", "disp": [0, 100] } ] }
        ]
    }"#;

    fn request(method: &str, params: serde_json::Value) -> Request {
        Request { id: Some(serde_json::json!(1)), method: method.to_string(), params: Some(params) }
    }

    fn loaded() -> ServerState {
        let mut state = ServerState::default();
        let doc: serde_json::Value = serde_json::from_str(DOC).unwrap();
        let r = dispatch(&mut state, request("Load", serde_json::json!({ "document": doc })));
        assert!(!r.is_error(), "{:?}", r.error);
        state
    }

    #[test]
    fn test_requires_load() {
        let mut state = ServerState::default();
        let r = dispatch(&mut state, Request { id: None, method: "GetLayers".into(), params: None });
        assert_eq!(r.error.unwrap().code, error_codes::NO_LAYOUT_LOADED);
    }

    #[test]
    fn test_unknown_method_and_bad_json() {
        let mut state = ServerState::default();
        let r = dispatch(&mut state, request("Frobnicate", serde_json::json!({})));
        assert_eq!(r.error.unwrap().code, error_codes::METHOD_NOT_FOUND);

        let r = handle_line(&mut state, "{ not json").unwrap();
        assert_eq!(r.error.unwrap().code, error_codes::PARSE_ERROR);
        assert!(handle_line(&mut state, "   ").is_none());
    }

    #[test]
    fn test_check_and_stats() {
        let mut state = loaded();
        let r = dispatch(
            &mut state,
            request("Check", serde_json::json!({ "kind": "space", "layer": "M1", "distance": 5.0, "output": "sp" })),
        );
        let result = r.result.unwrap();
        assert_eq!(result["output"], "sp");
        assert_eq!(result["stats"]["count"], 2);
        assert_eq!(result["stats"]["hier_count"], 1);

        let r = dispatch(&mut state, request("Stats", serde_json::json!({ "layer": "sp" })));
        assert_eq!(r.result.unwrap()["kind"], "edge_pairs");

        let r = dispatch(&mut state, Request { id: None, method: "GetLayers".into(), params: None });
        assert_eq!(r.result.unwrap(), serde_json::json!(["M1", "sp"]));
    }

    #[test]
    fn test_boolean_and_sized_chain() {
        let mut state = loaded();
        let r = dispatch(&mut state, request("Sized", serde_json::json!({ "layer": "M1", "dx": 2 })));
        let grown = r.result.unwrap()["output"].as_str().unwrap().to_string();

        let r = dispatch(
            &mut state,
            request("Boolean", serde_json::json!({ "a": grown, "b": "M1", "op": "andnot" })),
        );
        let result = r.result.unwrap();
        assert!((result["stats"]["area"].as_f64().unwrap() - 340.0).abs() < 1e-6);
        assert!(result["output_not"].is_string());

        let r = dispatch(&mut state, request("Sized", serde_json::json!({ "layer": "M1", "dx": 1, "mode": 9 })));
        assert_eq!(r.error.unwrap().code, error_codes::INVALID_ARGUMENT);
    }

    #[test]
    fn test_select_and_close() {
        let mut state = loaded();
        let r = dispatch(&mut state, request("Merged", serde_json::json!({ "layer": "M1", "output": "m" })));
        assert_eq!(r.result.unwrap()["stats"]["count"], 4);

        let r = dispatch(
            &mut state,
            request("Select", serde_json::json!({ "layer": "M1", "other": "m", "mode": "inside" })),
        );
        let result = r.result.unwrap();
        assert_eq!(result["stats"]["count"], 4);
        assert_eq!(result["stats_rest"]["count"], 0);

        let r = dispatch(&mut state, request("Stats", serde_json::json!({ "layer": "nope" })));
        assert_eq!(r.error.unwrap().code, error_codes::LAYER_NOT_FOUND);

        dispatch(&mut state, Request { id: None, method: "Close".into(), params: None });
        assert!(!state.is_loaded());
        assert!(state.results.is_empty());
    }

    #[test]
    fn test_serve_lines() {
        let mut state = ServerState::default();
        let input = "\n{\"id\": 3, \"method\": \"Close\"}\n";
        let mut out = Vec::new();
        serve(input.as_bytes(), &mut out, &mut state).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.trim(), r#"{"id":3,"result":{"status":"ok"}}"#);
    }
}

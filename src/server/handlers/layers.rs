//! Layer listing: GetLayers

use crate::server::protocol::ServerError;
use crate::server::state::ServerState;

/// Handle GetLayers request - layout layers followed by result names
pub fn handle_get_layers(state: &ServerState) -> anyhow::Result<serde_json::Value> {
    if !state.is_loaded() {
        return Err(ServerError::NoLayoutLoaded.into());
    }
    Ok(serde_json::to_value(state.layer_names())?)
}

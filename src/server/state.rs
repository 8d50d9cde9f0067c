//! Server state management for the geometry server

use indexmap::IndexMap;

use super::protocol::ServerError;
use crate::config::EngineConfig;
use crate::deep::{DeepEdgePairs, DeepRegion, DeepShapeStore};

/// A named collection produced by a request
#[derive(Debug, Clone)]
pub enum ResultLayer {
    Region(DeepRegion),
    EdgePairs(DeepEdgePairs),
}

impl ResultLayer {
    pub fn kind(&self) -> &'static str {
        match self {
            ResultLayer::Region(_) => "region",
            ResultLayer::EdgePairs(_) => "edge_pairs",
        }
    }
}

/// In-memory state: the loaded layout and the collections derived from it
pub struct ServerState {
    pub file_path: Option<String>,
    pub store: Option<DeepShapeStore>,
    pub config: EngineConfig,
    pub results: IndexMap<String, ResultLayer>,
    next_result: usize,
}

impl ServerState {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            file_path: None,
            store: None,
            config,
            results: IndexMap::new(),
            next_result: 0,
        }
    }

    /// Check if a layout is loaded
    pub fn is_loaded(&self) -> bool {
        self.store.is_some()
    }

    pub fn store(&self) -> Result<&DeepShapeStore, ServerError> {
        self.store.as_ref().ok_or(ServerError::NoLayoutLoaded)
    }

    /// Resolve a name to a polygon collection: results first, then layout layers
    pub fn region(&self, name: &str) -> anyhow::Result<DeepRegion> {
        match self.results.get(name) {
            Some(ResultLayer::Region(r)) => Ok(r.clone()),
            Some(ResultLayer::EdgePairs(_)) => {
                Err(ServerError::InvalidParams(format!("'{}' to name a polygon layer, not edge pairs", name)).into())
            }
            None => Ok(self.store()?.region(name)?),
        }
    }

    /// Remember a result under `name`, or under a generated `$N` name
    pub fn store_result(&mut self, name: Option<String>, layer: ResultLayer) -> String {
        let name = name.unwrap_or_else(|| {
            self.next_result += 1;
            format!("${}", self.next_result)
        });
        self.results.insert(name.clone(), layer);
        name
    }

    /// Layout layers followed by result names
    pub fn layer_names(&self) -> Vec<String> {
        let mut names = match &self.store {
            Some(store) => store.layer_names(),
            None => Vec::new(),
        };
        names.extend(self.results.keys().cloned());
        names
    }

    /// Drop the layout and every derived collection
    pub fn clear(&mut self) {
        self.file_path = None;
        self.store = None;
        self.results.clear();
        self.next_result = 0;
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

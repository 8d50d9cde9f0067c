//! Engine configuration
//!
//! Loaded from JSON (all fields optional) and adjusted by environment
//! variables. A `DeepShapeStore` carries one configuration which every
//! operation on its collections uses.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GeoResult;

/// Environment variable overriding the worker thread count
pub const THREADS_ENV: &str = "HIERGEO_THREADS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Worker threads for the hierarchical processor; 0 and 1 run sequentially
    pub threads: usize,
    /// Log one line per hierarchy level and phase
    pub report_progress: bool,
    /// Merge touching corners into one polygon (false) or keep them apart (true)
    pub min_coherence: bool,
    /// Prefix for log lines of the processor; empty uses the operation's own
    pub description: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threads: 1,
            report_progress: false,
            min_coherence: false,
            description: String::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(s: &str) -> GeoResult<Self> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> GeoResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Apply `HIERGEO_THREADS` if it is set to a number
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var(THREADS_ENV) {
            match v.trim().parse::<usize>() {
                Ok(n) => self.threads = n,
                Err(_) => log::warn!("[Config] Ignoring {}='{}': not a thread count", THREADS_ENV, v),
            }
        }
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg = EngineConfig::from_json_str(r#"{ "threads": 4 }"#).unwrap();
        assert_eq!(cfg.threads, 4);
        assert!(!cfg.report_progress);
        assert!(cfg.description.is_empty());
    }

    #[test]
    fn test_bad_json_is_document_error() {
        let err = EngineConfig::from_json_str("{ threads: ").unwrap_err();
        assert!(matches!(err, crate::error::GeoError::Document(_)));
    }
}

//! Hierarchical geometry engine for chip layouts
//!
//! Operations on layer data keep the cell hierarchy: results are stored in
//! the deepest cell where they are the same for every placement, and only
//! context-specific parts move up towards the top cell.
//!
//! # Modules
//! - `geometry` - Flat integer geometry kernel
//! - `layout` - Cells, instances, shapes and layout documents
//! - `hier` - Reducers, variants, clusters and the local processor
//! - `deep` - Region, edge and edge pair collections on a shared layout
//! - `config` - Engine configuration
//! - `server` - JSON-RPC server on top of the collections
//! - `error` - The library error type

pub mod config;
pub mod deep;
pub mod error;
pub mod geometry;
pub mod hier;
pub mod layout;
pub mod server;

pub use config::EngineConfig;
pub use deep::{DeepEdgePairs, DeepEdges, DeepRegion, DeepShapeStore, FlatRegion, Region};
pub use error::{GeoError, GeoResult};
pub use layout::{CellIndex, LayerIndex, Layout};

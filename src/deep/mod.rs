//! Deep (hierarchical) shape collections
//!
//! Polygons, edges and edge pairs stored as layers of one shared layout.
//! Operations run through the hierarchical processor and produce new layers.
//!
//! # Submodules
//! - `store` - The shared `DeepShapeStore` and its layers
//! - `region` - `DeepRegion` (polygons)
//! - `edges` - `DeepEdges`
//! - `edge_pairs` - `DeepEdgePairs` (check results)
//! - `flat` - Flat fallback and the `Region` dispatcher

mod store;
mod region;
mod edges;
mod edge_pairs;
mod flat;

pub use store::{DeepLayer, DeepShapeStore, StoreInner};
pub use region::DeepRegion;
pub use edges::DeepEdges;
pub use edge_pairs::DeepEdgePairs;
pub use flat::{FlatRegion, Region};

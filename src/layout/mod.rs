//! Hierarchical layout database
//!
//! A layout is a DAG of cells. Each cell holds shapes per layer and
//! instances of child cells (single placements or regular arrays).
//!
//! # Submodules
//! - `properties` - Property sets and id remapping between layouts
//! - `shapes` - Per-layer shape containers and the `LayoutShape` trait
//! - `instance` - Cell instances and arrays
//! - `cell` - Cells
//! - `database` - The `Layout` with its hierarchy cache
//! - `io` - JSON layout documents

mod properties;
mod shapes;
mod instance;
mod cell;
mod database;
mod io;

pub use properties::{PropId, PropertySet, PropertiesRepository, PropertyMapper};
pub use shapes::{LayoutShape, ShapeBuffer, Shapes};
pub use instance::{CellInstArray, RegularArray};
pub use cell::{Cell, CellIndex, LayerIndex};
pub use database::Layout;
pub use io::{
    load_layout,
    ArrayDocument,
    CellDocument,
    InstanceDocument,
    LayoutDocument,
    ShapeDocument,
    ShapeEntry,
};

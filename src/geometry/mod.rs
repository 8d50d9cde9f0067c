//! Integer geometry kernel for layout data
//!
//! Everything here works on flat shape sets in one coordinate frame. The
//! hierarchical machinery in `hier` builds on these primitives.
//!
//! # Submodules
//! - `types` - Points, boxes, edges, edge pairs and normalized polygons
//! - `transform` - Orientations, simple and complex transformations
//! - `spatial` - R-tree box scanning for candidate pairs
//! - `repository` - Shared shape repository and polygon handles
//! - `boolean` - Scanline booleans and merge with wrap count
//! - `sizing` - Polygon outset/inset with corner modes
//! - `edges` - Edge merge, edge booleans and clipping against polygons
//! - `relations` - DRC edge relations (width, space, enclosure, ...)

mod types;
mod transform;
mod spatial;
mod repository;
mod boolean;
mod sizing;
mod edges;
mod relations;

pub use types::{
    Coord,
    Point,
    Vector,
    Rect,
    Edge,
    EdgePair,
    Polygon,
    Containment,
    cross3,
    point_segment_distance,
};

pub use transform::{
    Orientation,
    SimpleTrans,
    ComplexTrans,
    Transformation,
};

pub use spatial::{scan_pairs, scan_pairs2};

pub use repository::{ShapeRepository, PolygonRef};

pub use boolean::{
    BooleanOp,
    boolean,
    merge,
    polygons_overlap,
    total_area,
};

pub use sizing::{size_polygons, DEFAULT_SIZING_MODE, MAX_SIZING_MODE};

pub use edges::{
    EdgeBoolOp,
    EdgeClipMode,
    clip_edges,
    edge_boolean,
    merge_edges,
    polygon_edges,
};

pub use relations::{
    CheckOptions,
    EdgeRelationFilter,
    Metric,
    RelationKind,
};

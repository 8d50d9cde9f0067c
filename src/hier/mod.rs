//! Hierarchical processing on top of the layout database
//!
//! The algorithms here never flatten a layout. They work per cell and use
//! reduced transformations, clusters and contexts to decide what has to be
//! computed differently for different placements.
//!
//! # Submodules
//! - `reducer` - Transformation reducers (variant equivalence classes)
//! - `variants` - Variant collection, separation and shape commit
//! - `clusters` - Connected shape clusters across the hierarchy
//! - `cluster_merge` - Merged shapes of root clusters
//! - `jobs` - Worker pool for the processor phases
//! - `local_processor` - Context/result driver for local operations
//! - `local_ops` - Booleans, selections, checks and shape processors

mod reducer;
mod variants;
mod clusters;
mod cluster_merge;
mod jobs;
mod local_processor;
mod local_ops;

pub use reducer::{
    GridReducer,
    MagnificationAndOrientationReducer,
    MagnificationReducer,
    OrientationReducer,
    OrthogonalRotationReducer,
    ReducerKind,
    ScaleAndGridReducer,
    TransformReducer,
    XYAnisotropyAndMagnificationReducer,
};

pub use variants::{VariantShapes, VariantTable, VariantsCollector};

pub use clusters::{
    ClusterInstance,
    ClusterShape,
    ConnectedClusters,
    Connectivity,
    HierClusters,
    LocalCluster,
};

pub use cluster_merge::{merge_root_clusters, ClusterMerger, MergedCluster};

pub use jobs::JobPool;

pub use local_processor::{
    IntruderLayer,
    LocalOperation,
    LocalProcessor,
    LocalResults,
    OnEmptyIntruderHint,
    ResultSet,
    ShapeInteractions,
};

pub use local_ops::{
    combined_grid,
    off_grid_markers,
    BoolAndOrNotLocalOperation,
    BoolMode,
    CheckLocalOperation,
    EdgeBoolLocalOperation,
    EdgeCheckLocalOperation,
    EdgeExtension,
    EdgePairDistanceFilter,
    EdgePairEdges,
    EdgePairSide,
    EdgePairToPolygon,
    EdgeToRegionLocalOperation,
    GridSnap,
    InteractingLocalOperation,
    InteractionMode,
    PolygonExtents,
    PolygonToEdges,
    ProcessorOperation,
    PullLocalOperation,
    SelectRelation,
    SelectionOutput,
    ShapeProcessor,
};

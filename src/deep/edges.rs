//! Hierarchical edge collection

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use super::edge_pairs::DeepEdgePairs;
use super::region::DeepRegion;
use super::store::{DeepLayer, DeepShapeStore, Intruders};
use crate::error::{GeoError, GeoResult};
use crate::geometry::{merge_edges, CheckOptions, Coord, Edge, EdgeBoolOp, EdgeClipMode, EdgeRelationFilter, Polygon, RelationKind};
use crate::hier::{
    merge_root_clusters,
    Connectivity,
    EdgeBoolLocalOperation,
    EdgeCheckLocalOperation,
    EdgeExtension,
    EdgeToRegionLocalOperation,
    HierClusters,
    InteractingLocalOperation,
    InteractionMode,
    ProcessorOperation,
    PullLocalOperation,
    SelectionOutput,
};
use crate::layout::LayerIndex;

#[derive(Debug, Clone)]
pub struct DeepEdges {
    deep: DeepLayer,
    merged_cache: Arc<Mutex<Option<LayerIndex>>>,
    is_merged: bool,
}

impl DeepEdges {
    pub(crate) fn new(deep: DeepLayer) -> Self {
        Self { deep, merged_cache: Arc::new(Mutex::new(None)), is_merged: false }
    }

    fn new_merged(deep: DeepLayer) -> Self {
        Self { deep, merged_cache: Arc::new(Mutex::new(None)), is_merged: true }
    }

    pub fn deep_layer(&self) -> &DeepLayer {
        &self.deep
    }

    pub fn store(&self) -> &DeepShapeStore {
        &self.deep.store
    }

    fn merged_deep(&self) -> GeoResult<DeepLayer> {
        if self.is_merged {
            return Ok(self.deep.clone());
        }
        let mut cache = self.merged_cache.lock();
        if let Some(li) = *cache {
            return Ok(self.deep.derived(li));
        }

        let start = Instant::now();
        log::debug!("[DeepEdges] Merging edge layer {}", self.deep.layer);
        let per_cell = {
            let inner = self.store().read();
            let clusters = HierClusters::<Edge>::build(&inner.layout, inner.top, &Connectivity::single(self.deep.layer));
            merge_root_clusters(&clusters, false, 0)
        };
        let mut inner = self.store().write();
        let out = inner.layout.new_layer("merged_edges");
        for (ci, buf) in &per_cell {
            inner.layout.insert_buffer(*ci, out, buf);
        }
        inner.layout.update()?;
        log::info!("[DeepEdges] Merged edge layer {} into {} ({:.2?})", self.deep.layer, out, start.elapsed());

        *cache = Some(out);
        Ok(self.deep.derived(out))
    }

    /// Collinear touching or overlapping edges joined
    pub fn merged(&self) -> GeoResult<DeepEdges> {
        Ok(DeepEdges::new_merged(self.merged_deep()?))
    }

    fn edge_bool(&self, other: &DeepEdges, op: EdgeBoolOp) -> GeoResult<DeepEdges> {
        let a = self.merged_deep()?;
        let b = other.merged_deep()?;
        let lop = EdgeBoolLocalOperation::new(op);
        let mut out = self.store().run_local(a.layer, Intruders::Layer(&b), &lop, "edge_bool")?;
        Ok(DeepEdges::new(out.remove(0)))
    }

    /// Parts of these edges covered by `other`
    pub fn and_with(&self, other: &DeepEdges) -> GeoResult<DeepEdges> {
        self.edge_bool(other, EdgeBoolOp::And)
    }

    /// Parts of these edges not covered by `other`
    pub fn not_with(&self, other: &DeepEdges) -> GeoResult<DeepEdges> {
        self.edge_bool(other, EdgeBoolOp::Not)
    }

    fn clipped(&self, region: &DeepRegion, mode: EdgeClipMode) -> GeoResult<DeepEdges> {
        let a = self.merged_deep()?;
        let b = region.merged_deep()?;
        let op = EdgeToRegionLocalOperation::new(mode);
        let mut out = self.store().run_local(a.layer, Intruders::Layer(&b), &op, "edge_clip")?;
        Ok(DeepEdges::new(out.remove(0)))
    }

    /// Parts inside the region, boundary included
    pub fn inside_part(&self, region: &DeepRegion) -> GeoResult<DeepEdges> {
        self.clipped(region, EdgeClipMode::Inside)
    }

    /// Parts strictly outside the region
    pub fn outside_part(&self, region: &DeepRegion) -> GeoResult<DeepEdges> {
        self.clipped(region, EdgeClipMode::Outside)
    }

    /// Edges touching the region
    pub fn selected_interacting(&self, region: &DeepRegion) -> GeoResult<DeepEdges> {
        let a = self.merged_deep()?;
        let b = region.merged_deep()?;
        let op = InteractingLocalOperation::new(InteractionMode::Interacting, SelectionOutput::Positive, 1, usize::MAX);
        let mut out = self
            .store()
            .run_local::<Edge, Polygon, Edge>(a.layer, Intruders::Layer(&b), &op, "select_edges")?;
        Ok(DeepEdges::new(out.remove(0)))
    }

    /// Polygons of the region touched by these edges
    pub fn pull_interacting(&self, region: &DeepRegion) -> GeoResult<DeepRegion> {
        self.store().require_same(region.store(), "pull")?;
        let a = self.merged_deep()?;
        let b = region.merged_deep()?;
        let op = PullLocalOperation::new(InteractionMode::Interacting);
        let mut out = self
            .store()
            .run_local::<Edge, Polygon, Polygon>(a.layer, Intruders::Layer(&b), &op, "pull_edges")?;
        Ok(DeepRegion::new(out.remove(0)))
    }

    /// Polygons spanned by the edges: `begin`/`end` along, `outside` to the right, `inside` to the left
    pub fn extended(&self, begin: Coord, end: Coord, outside: Coord, inside: Coord) -> GeoResult<DeepRegion> {
        let op = ProcessorOperation::new(EdgeExtension { begin, end, outside, inside });
        let mut out = self.store().run_local(self.deep.layer, Intruders::None, &op, "extended")?;
        Ok(DeepRegion::new(out.remove(0)))
    }

    /// Width, space or separation check between edges
    pub fn run_check(
        &self,
        kind: RelationKind,
        other: Option<&DeepEdges>,
        distance: f64,
        options: CheckOptions,
    ) -> GeoResult<DeepEdgePairs> {
        if !(distance >= 0.0) || !distance.is_finite() {
            return Err(GeoError::InvalidDistance(format!("check distance {}", distance)));
        }
        if !matches!(kind, RelationKind::Width | RelationKind::Space | RelationKind::Separation) {
            return Err(GeoError::InvalidDistance(format!("'{}' is not an edge check", kind.name())));
        }
        let op = EdgeCheckLocalOperation::new(EdgeRelationFilter::new(kind, distance, options));
        let a = self.merged_deep()?;
        let mut out = if kind == RelationKind::Separation {
            let other = other.ok_or_else(|| GeoError::MissingOperand(kind.name().to_string()))?;
            let b = other.merged_deep()?;
            self.store().run_local(a.layer, Intruders::Layer(&b), &op, kind.name())?
        } else {
            self.store().run_local(a.layer, Intruders::Subject, &op, kind.name())?
        };
        Ok(DeepEdgePairs::new(out.remove(0)))
    }

    /// Number of edges after flattening
    pub fn count(&self) -> usize {
        let inner = self.store().read();
        inner.layout.flat_shapes::<Edge>(inner.top, self.deep.layer).len()
    }

    pub fn is_empty(&self) -> bool {
        self.deep.is_empty()
    }

    pub fn to_edges(&self) -> Vec<Edge> {
        self.deep.flat_shapes::<Edge>()
    }

    /// Flattened edges with collinear pieces joined
    pub fn to_merged_edges(&self) -> Vec<Edge> {
        merge_edges(&self.to_edges())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::geometry::{ComplexTrans, Point, Rect, Vector};
    use crate::layout::{CellInstArray, Layout};

    fn edge(x1: i64, y1: i64, x2: i64, y2: i64) -> Edge {
        Edge::new(Point::new(x1, y1), Point::new(x2, y2))
    }

    #[test]
    fn test_merged_joins_across_cells() {
        let mut layout = Layout::new(0.001);
        let top = layout.add_cell("TOP");
        let a = layout.add_cell("A");
        let l = layout.insert_layer("E");
        layout.insert_edge(a, l, edge(0, 0, 10, 0), 0);
        layout.insert_edge(top, l, edge(10, 0, 20, 0), 0);
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::identity()));
        let store = DeepShapeStore::from_layout(layout, top, EngineConfig::default()).unwrap();

        let merged = store.edges("E").unwrap().merged().unwrap();
        assert_eq!(merged.to_edges(), vec![edge(0, 0, 20, 0)]);
    }

    #[test]
    fn test_inside_and_outside_parts() {
        let mut layout = Layout::new(0.001);
        let top = layout.add_cell("TOP");
        let a = layout.add_cell("A");
        let le = layout.insert_layer("E");
        let lr = layout.insert_layer("R");
        layout.insert_edge(a, le, edge(0, 5, 20, 5), 0);
        layout.insert_polygon(top, lr, &Rect::new(10, 0, 30, 10).to_polygon(), 0);
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::identity()));
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::translation(Vector::new(0, 100))));
        let store = DeepShapeStore::from_layout(layout, top, EngineConfig::default()).unwrap();

        let e = store.edges("E").unwrap();
        let r = store.region("R").unwrap();
        assert_eq!(e.inside_part(&r).unwrap().to_merged_edges(), vec![edge(10, 5, 20, 5)]);
        let mut outside = e.outside_part(&r).unwrap().to_merged_edges();
        outside.sort();
        assert_eq!(outside, vec![edge(0, 5, 10, 5), edge(0, 105, 20, 105)]);
    }

    #[test]
    fn test_extended_edges() {
        let store = DeepShapeStore::new(0.001, EngineConfig::default());
        let e = store.insert_edges("E", vec![edge(0, 0, 10, 0)]).unwrap();
        let r = e.extended(1, 1, 2, 0).unwrap();
        assert_eq!(r.to_polygons(), vec![Rect::new(-1, -2, 11, 0).to_polygon()]);
    }

    #[test]
    fn test_edge_space_check() {
        let store = DeepShapeStore::new(0.001, EngineConfig::default());
        // facing edges with outside sides towards each other
        let e = store.insert_edges("E", vec![edge(0, 0, 0, 10), edge(3, 10, 3, 0)]).unwrap();
        let v = e.run_check(RelationKind::Space, None, 5.0, CheckOptions::default()).unwrap();
        assert_eq!(v.count(), 1);
        assert!(matches!(
            e.run_check(RelationKind::Enclosing, None, 5.0, CheckOptions::default()),
            Err(GeoError::InvalidDistance(_))
        ));
    }
}

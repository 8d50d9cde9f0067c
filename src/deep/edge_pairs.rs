//! Hierarchical edge pair collection (check results)

use std::collections::BTreeSet;

use super::edges::DeepEdges;
use super::region::DeepRegion;
use super::store::{DeepLayer, DeepShapeStore, Intruders};
use crate::error::GeoResult;
use crate::geometry::{Coord, EdgePair};
use crate::hier::{EdgePairDistanceFilter, EdgePairEdges, EdgePairSide, EdgePairToPolygon, ProcessorOperation};

#[derive(Debug, Clone)]
pub struct DeepEdgePairs {
    deep: DeepLayer,
}

impl DeepEdgePairs {
    pub(crate) fn new(deep: DeepLayer) -> Self {
        Self { deep }
    }

    pub fn deep_layer(&self) -> &DeepLayer {
        &self.deep
    }

    pub fn store(&self) -> &DeepShapeStore {
        &self.deep.store
    }

    fn edges_of(&self, side: EdgePairSide) -> GeoResult<DeepEdges> {
        let op = ProcessorOperation::new(EdgePairEdges { side });
        let mut out = self.store().run_local(self.deep.layer, Intruders::None, &op, "ep_edges")?;
        Ok(DeepEdges::new(out.remove(0)))
    }

    pub fn first_edges(&self) -> GeoResult<DeepEdges> {
        self.edges_of(EdgePairSide::First)
    }

    pub fn second_edges(&self) -> GeoResult<DeepEdges> {
        self.edges_of(EdgePairSide::Second)
    }

    pub fn edges(&self) -> GeoResult<DeepEdges> {
        self.edges_of(EdgePairSide::Both)
    }

    /// Marker polygons, degenerate pairs enlarged by `enlarge`
    pub fn polygons(&self, enlarge: Coord) -> GeoResult<DeepRegion> {
        let op = ProcessorOperation::new(EdgePairToPolygon { enlarge });
        let mut out = self.store().run_local(self.deep.layer, Intruders::None, &op, "ep_polygons")?;
        Ok(DeepRegion::new(out.remove(0)))
    }

    /// Pairs with `min <= distance < max`
    pub fn with_distance(&self, min: f64, max: f64) -> GeoResult<DeepEdgePairs> {
        let op = ProcessorOperation::new(EdgePairDistanceFilter { min, max });
        let mut out = self.store().run_local(self.deep.layer, Intruders::None, &op, "ep_distance")?;
        Ok(DeepEdgePairs::new(out.remove(0)))
    }

    /// Flattened edge pairs without duplicates
    pub fn to_edge_pairs(&self) -> Vec<EdgePair> {
        let set: BTreeSet<EdgePair> = self.deep.flat_shapes::<EdgePair>().into_iter().collect();
        set.into_iter().collect()
    }

    /// Number of distinct edge pairs after flattening
    pub fn count(&self) -> usize {
        self.to_edge_pairs().len()
    }

    /// Edge pairs counted once per cell
    pub fn hier_count(&self) -> usize {
        self.deep.hier_count()
    }

    pub fn is_empty(&self) -> bool {
        self.deep.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::geometry::{CheckOptions, ComplexTrans, Rect, Vector};
    use crate::layout::{CellInstArray, Layout};

    fn violations() -> DeepEdgePairs {
        let mut layout = Layout::new(0.001);
        let top = layout.add_cell("TOP");
        let a = layout.add_cell("A");
        let l = layout.insert_layer("L");
        layout.insert_polygon(a, l, &Rect::new(0, 0, 10, 10).to_polygon(), 0);
        layout.insert_polygon(a, l, &Rect::new(13, 0, 20, 10).to_polygon(), 0);
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::identity()));
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::translation(Vector::new(0, 100))));
        let store = DeepShapeStore::from_layout(layout, top, EngineConfig::default()).unwrap();
        store.region("L").unwrap().space_check(5.0, CheckOptions::default()).unwrap()
    }

    #[test]
    fn test_violations_stay_in_child() {
        let v = violations();
        assert_eq!(v.hier_count(), 1);
        assert_eq!(v.count(), 2);
    }

    #[test]
    fn test_edges_and_polygons() {
        let v = violations();
        assert_eq!(v.first_edges().unwrap().count(), 2);
        assert_eq!(v.edges().unwrap().count(), 4);
        let markers = v.polygons(0).unwrap();
        assert!((markers.area() - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_distance_filter() {
        let v = violations();
        assert_eq!(v.with_distance(0.0, 3.0).unwrap().count(), 0);
        assert_eq!(v.with_distance(3.0, 4.0).unwrap().count(), 2);
    }
}

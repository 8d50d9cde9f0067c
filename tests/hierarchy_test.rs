// Hierarchical results against flat references
use std::sync::Arc;

use hiergeo::geometry::{merge, ComplexTrans, Orientation, Polygon, Rect, Vector};
use hiergeo::hier::{
    merge_root_clusters,
    Connectivity,
    GridReducer,
    HierClusters,
    MagnificationAndOrientationReducer,
    OrientationReducer,
    TransformReducer,
    VariantsCollector,
};
use hiergeo::layout::{CellIndex, CellInstArray, LayerIndex, Layout};
use hiergeo::{DeepShapeStore, EngineConfig};

fn rect(l: i64, b: i64, r: i64, t: i64) -> Polygon {
    Rect::new(l, b, r, t).to_polygon()
}

fn sorted(mut v: Vec<Polygon>) -> Vec<Polygon> {
    v.sort();
    v
}

/// Two layers over a two-level hierarchy with rotated, arrayed and magnified placements
fn two_layer_layout() -> (Layout, CellIndex, LayerIndex, LayerIndex) {
    let mut layout = Layout::new(0.001);
    let top = layout.add_cell("TOP");
    let a = layout.add_cell("A");
    let b = layout.add_cell("B");
    let la = layout.insert_layer("A");
    let lb = layout.insert_layer("B");

    layout.insert_polygon(b, la, &rect(0, 0, 10, 10), 0);
    layout.insert_polygon(b, lb, &rect(5, 5, 20, 8), 0);
    layout.insert_polygon(a, la, &rect(30, 0, 40, 30), 0);
    layout.add_instance(a, CellInstArray::new(b, ComplexTrans::identity()));
    layout.add_instance(a, CellInstArray::new(b, ComplexTrans::new(Orientation::R90, 1.0, 60.0, 0.0)));
    layout.insert_polygon(top, lb, &rect(35, -5, 150, 5), 0);
    layout.add_instance(
        top,
        CellInstArray::new_array(a, ComplexTrans::identity(), Vector::new(100, 0), Vector::new(0, 100), 2, 2),
    );
    layout.add_instance(top, CellInstArray::new(b, ComplexTrans::new(Orientation::M0, 2.0, 0.0, -50.0)));
    (layout, top, la, lb)
}

fn flat(layout: &Layout, top: CellIndex, li: LayerIndex) -> Vec<Polygon> {
    layout.flat_shapes::<Polygon>(top, li).into_iter().map(|(p, _)| p).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_identities() {
        let (layout, top, _, _) = two_layer_layout();
        let store = DeepShapeStore::from_layout(layout, top, EngineConfig::default()).unwrap();
        let a = store.region("A").unwrap();
        let b = store.region("B").unwrap();

        let and = a.and_with(&b).unwrap();
        let not = a.not_with(&b).unwrap();
        let rebuilt = and.or_with(&not).unwrap();
        assert_eq!(rebuilt.to_merged_polygons(), a.to_merged_polygons());

        let xor = a.xor_with(&b).unwrap();
        let b_not_a = b.not_with(&a).unwrap();
        let both_sides = not.or_with(&b_not_a).unwrap();
        assert_eq!(xor.to_merged_polygons(), both_sides.to_merged_polygons());

        let self_and = a.and_with(&a).unwrap();
        assert_eq!(self_and.to_merged_polygons(), a.merged(false, 0).unwrap().to_merged_polygons());
    }

    #[test]
    fn test_andnot_matches_separate_passes() {
        let (layout, top, _, _) = two_layer_layout();
        let store = DeepShapeStore::from_layout(layout, top, EngineConfig::default()).unwrap();
        let a = store.region("A").unwrap();
        let b = store.region("B").unwrap();

        let (and, not) = a.andnot_with(&b).unwrap();
        assert_eq!(and.to_merged_polygons(), a.and_with(&b).unwrap().to_merged_polygons());
        assert_eq!(not.to_merged_polygons(), a.not_with(&b).unwrap().to_merged_polygons());
    }

    #[test]
    fn test_boolean_matches_flat_reference() {
        let (layout, top, la, lb) = two_layer_layout();
        let flat_a = flat(&layout, top, la);
        let flat_b = flat(&layout, top, lb);
        let store = DeepShapeStore::from_layout(layout, top, EngineConfig::default()).unwrap();

        let and = store.region("A").unwrap().and_with(&store.region("B").unwrap()).unwrap();
        let reference = hiergeo::FlatRegion::new(flat_a).and_with(&hiergeo::FlatRegion::new(flat_b));
        assert_eq!(and.to_merged_polygons(), reference.merged(false, 0).into_polygons());
    }

    #[test]
    fn test_cluster_merge_equals_flat_merge() {
        let mut layout = Layout::new(0.001);
        let top = layout.add_cell("TOP");
        let a = layout.add_cell("A");
        let l = layout.insert_layer("L");
        layout.insert_polygon(a, l, &rect(0, 0, 10, 10), 0);
        // three abutting placements and one isolated
        layout.add_instance(
            top,
            CellInstArray::new_array(a, ComplexTrans::identity(), Vector::new(10, 0), Vector::new(0, 0), 3, 1),
        );
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::translation(Vector::new(0, 50))));
        layout.insert_polygon(top, l, &rect(30, 0, 40, 5), 0);
        layout.update().unwrap();

        let reference = sorted(merge(&flat(&layout, top, l), false, 0));
        assert_eq!(reference.len(), 2);

        let clusters = HierClusters::<Polygon>::build(&layout, top, &Connectivity::single(l));
        let per_cell = merge_root_clusters(&clusters, false, 0);
        let out = layout.new_layer("merged");
        for (ci, buf) in &per_cell {
            layout.insert_buffer(*ci, out, buf);
        }
        layout.update().unwrap();
        assert_eq!(sorted(flat(&layout, top, out)), reference);

        // the same through the facade
        let store = DeepShapeStore::from_layout(layout, top, EngineConfig::default()).unwrap();
        let merged = store.region("L").unwrap().merged(false, 0).unwrap();
        assert_eq!(sorted(merged.to_polygons()), reference);
    }

    #[test]
    fn test_variant_separation_is_complete() {
        let reducers: Vec<Arc<dyn TransformReducer>> = vec![
            Arc::new(OrientationReducer),
            Arc::new(MagnificationAndOrientationReducer),
            Arc::new(GridReducer::new(7)),
        ];
        for reducer in reducers {
            let (mut layout, top, la, lb) = two_layer_layout();
            layout.update().unwrap();
            let before_a = sorted(flat(&layout, top, la));
            let before_b = sorted(flat(&layout, top, lb));

            let mut vc = VariantsCollector::new(reducer.clone());
            vc.collect(&layout, top);
            vc.separate_variants(&mut layout, None).unwrap();
            layout.update().unwrap();

            let mut again = VariantsCollector::new(reducer.clone());
            again.collect(&layout, top);
            for ci in again.called_cells().iter().copied().chain(std::iter::once(top)) {
                assert!(again.variants(ci).len() <= 1, "{:?}: cell {} still has variants", reducer.kind(), ci);
            }
            assert_eq!(sorted(flat(&layout, top, la)), before_a);
            assert_eq!(sorted(flat(&layout, top, lb)), before_b);
        }
    }
}

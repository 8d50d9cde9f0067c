// End-to-end scenarios on small hierarchies
use hiergeo::geometry::{CheckOptions, ComplexTrans, Orientation, Polygon, Rect, Vector};
use hiergeo::hier::InteractionMode;
use hiergeo::layout::{CellInstArray, Layout};
use hiergeo::{DeepShapeStore, EngineConfig};

fn rect(l: i64, b: i64, r: i64, t: i64) -> Polygon {
    Rect::new(l, b, r, t).to_polygon()
}

fn sorted(mut v: Vec<Polygon>) -> Vec<Polygon> {
    v.sort();
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merged_touching_rects_in_rotated_instances() {
        let mut layout = Layout::new(0.001);
        let top = layout.add_cell("TOP");
        let a = layout.add_cell("A");
        let l = layout.insert_layer("L");
        layout.insert_polygon(a, l, &rect(0, 0, 10, 10), 0);
        layout.insert_polygon(a, l, &rect(10, 0, 20, 10), 0);
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::identity()));
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::new(Orientation::R90, 1.0, 100.0, 0.0)));
        let store = DeepShapeStore::from_layout(layout, top, EngineConfig::default()).unwrap();

        let merged = store.region("L").unwrap().merged(false, 0).unwrap();
        assert_eq!(merged.count(), 2, "expected two merged rectangles, not four pieces");
        assert_eq!(merged.hier_count(), 1);
        assert_eq!(sorted(merged.to_polygons()), vec![rect(0, 0, 20, 10), rect(90, 0, 100, 20)]);
    }

    #[test]
    fn test_space_violations_one_per_instance() {
        let mut layout = Layout::new(0.001);
        let top = layout.add_cell("TOP");
        let a = layout.add_cell("A");
        let l = layout.insert_layer("L");
        layout.insert_polygon(a, l, &rect(0, 0, 10, 10), 0);
        layout.insert_polygon(a, l, &rect(13, 0, 23, 10), 0);
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::identity()));
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::translation(Vector::new(0, 1000))));
        let store = DeepShapeStore::from_layout(layout, top, EngineConfig::default()).unwrap();

        let violations = store.region("L").unwrap().space_check(5.0, CheckOptions::default()).unwrap();
        let pairs = violations.to_edge_pairs();
        assert_eq!(pairs.len(), 2);
        for ep in &pairs {
            assert!((ep.distance() - 3.0).abs() < 1e-9, "{:?}", ep);
        }
    }

    #[test]
    fn test_selected_with_exact_interaction_count() {
        let mut layout = Layout::new(0.001);
        let top = layout.add_cell("TOP");
        let a = layout.add_cell("A");
        let s = layout.insert_layer("S");
        let i = layout.insert_layer("I");
        layout.insert_polygon(a, s, &rect(0, 0, 10, 10), 0);
        layout.insert_polygon(a, s, &rect(100, 0, 110, 10), 0);
        layout.insert_polygon(a, s, &rect(200, 0, 210, 10), 0);
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::identity()));
        // one, two and three separate intruders
        for r in [
            rect(5, 5, 15, 15),
            rect(95, 2, 102, 4),
            rect(108, 2, 115, 4),
            rect(195, 2, 202, 4),
            rect(204, 8, 206, 12),
            rect(208, 2, 215, 4),
        ] {
            layout.insert_polygon(top, i, &r, 0);
        }
        let store = DeepShapeStore::from_layout(layout, top, EngineConfig::default()).unwrap();

        let subjects = store.region("S").unwrap();
        let intruders = store.region("I").unwrap();
        let (pos, neg) = subjects.selected(&intruders, InteractionMode::Interacting, 2, 2).unwrap();
        assert_eq!(pos.to_polygons(), vec![rect(100, 0, 110, 10)]);
        assert_eq!(sorted(neg.to_polygons()), vec![rect(0, 0, 10, 10), rect(200, 0, 210, 10)]);
    }

    #[test]
    fn test_threads_do_not_change_results() {
        let build = |threads: usize| {
            let mut layout = Layout::new(0.001);
            let top = layout.add_cell("TOP");
            let a = layout.add_cell("A");
            let l = layout.insert_layer("L");
            layout.insert_polygon(a, l, &rect(0, 0, 10, 10), 0);
            layout.insert_polygon(top, l, &rect(8, 8, 30, 12), 0);
            layout.add_instance(
                top,
                CellInstArray::new_array(a, ComplexTrans::identity(), Vector::new(20, 0), Vector::new(0, 20), 3, 3),
            );
            let store = DeepShapeStore::from_layout(layout, top, EngineConfig::default().with_threads(threads)).unwrap();
            let r = store.region("L").unwrap();
            let sized = r.sized(1, 1, 2).unwrap();
            let space = r.space_check(12.0, CheckOptions::default()).unwrap();
            (sized.to_merged_polygons(), space.to_edge_pairs())
        };
        assert_eq!(build(1), build(4));
    }
}

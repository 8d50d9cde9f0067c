// Property tests: reducer composition law and merge idempotence
use hiergeo::geometry::{merge, total_area, ComplexTrans, Orientation, Polygon, Rect, SimpleTrans, Vector};
use hiergeo::hier::{
    GridReducer,
    MagnificationAndOrientationReducer,
    MagnificationReducer,
    OrientationReducer,
    OrthogonalRotationReducer,
    ScaleAndGridReducer,
    TransformReducer,
    XYAnisotropyAndMagnificationReducer,
};
use proptest::prelude::*;

fn reducers(grid: i64, mult: i64, div: i64) -> Vec<Box<dyn TransformReducer>> {
    vec![
        Box::new(OrientationReducer),
        Box::new(OrthogonalRotationReducer),
        Box::new(MagnificationReducer),
        Box::new(MagnificationAndOrientationReducer),
        Box::new(XYAnisotropyAndMagnificationReducer),
        Box::new(GridReducer::new(grid)),
        Box::new(ScaleAndGridReducer::new(grid, mult, div)),
    ]
}

fn simple_trans() -> impl Strategy<Value = SimpleTrans> {
    (0u8..8, -500i64..500, -500i64..500)
        .prop_map(|(code, x, y)| SimpleTrans::new(Orientation::from_code(code), Vector::new(x, y)))
}

fn complex_trans() -> impl Strategy<Value = ComplexTrans> {
    (0u8..8, 1u32..4, -500i64..500, -500i64..500).prop_map(|(code, mag, x, y)| {
        ComplexTrans::new(Orientation::from_code(code), mag as f64, x as f64, y as f64)
    })
}

fn rects() -> impl Strategy<Value = Vec<Polygon>> {
    prop::collection::vec((0i64..50, 0i64..50, 1i64..20, 1i64..20), 1..8).prop_map(|v| {
        v.into_iter()
            .map(|(x, y, w, h)| Rect::new(x, y, x + w, y + h).to_polygon())
            .collect()
    })
}

fn sorted_boxes(polys: &[Polygon]) -> Vec<Rect> {
    let mut boxes: Vec<Rect> = polys.iter().map(|p| p.bbox()).collect();
    boxes.sort();
    boxes
}

proptest! {
    #[test]
    fn test_modulo_law_simple(a in simple_trans(), b in simple_trans(), grid in 1i64..20, mult in 1i64..5, div in 1i64..5) {
        for r in reducers(grid, mult, div) {
            let lhs = r.reduce_simple(&(a * b));
            let rhs = r.reduce_simple(&(r.reduce_simple(&a) * r.reduce_simple(&b)));
            prop_assert_eq!(lhs, rhs, "{:?}", r.kind());
        }
    }

    #[test]
    fn test_modulo_law_integer_magnification(a in complex_trans(), b in complex_trans(), grid in 1i64..20) {
        for r in reducers(grid, 1, 1) {
            let lhs = r.reduce(&(a * b));
            let rhs = r.reduce(&(r.reduce(&a) * r.reduce(&b)));
            prop_assert_eq!(lhs, rhs, "{:?}", r.kind());
        }
    }

    #[test]
    fn test_merge_idempotent(polys in rects(), min_coherence in any::<bool>()) {
        let once = merge(&polys, min_coherence, 0);
        let twice = merge(&once, min_coherence, 0);
        prop_assert_eq!(once.len(), twice.len());
        prop_assert!((total_area(&once) - total_area(&twice)).abs() < 1e-9);
        prop_assert_eq!(sorted_boxes(&once), sorted_boxes(&twice));
    }
}

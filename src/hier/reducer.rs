//! Transformation reducers
//!
//! A reducer maps a transformation to the canonical representative of its
//! equivalence class with respect to one geometric property (for example
//! "orientation matters, displacement doesn't"). Every reducer satisfies
//! `reduce(a * b) == reduce(reduce(a) * reduce(b))`, so the variants of a
//! cell can be computed level by level from the variants of its parents.

use std::fmt::Debug;

use crate::geometry::{ComplexTrans, Coord, Orientation, SimpleTrans, Vector};

/// Identifies a reducer kind together with its parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReducerKind {
    Orientation,
    OrthogonalRotation,
    Magnification,
    MagnificationAndOrientation,
    XYAnisotropyAndMagnification,
    Grid(Coord),
    ScaleAndGrid { grid: Coord, mult: i64, div: i64 },
}

pub trait TransformReducer: Send + Sync + Debug {
    fn reduce_simple(&self, t: &SimpleTrans) -> SimpleTrans;

    fn reduce(&self, t: &ComplexTrans) -> ComplexTrans;

    /// False if the displacement takes part in the reduction
    fn is_translation_invariant(&self) -> bool {
        true
    }

    fn kind(&self) -> ReducerKind;

    fn equals(&self, other: &dyn TransformReducer) -> bool {
        self.kind() == other.kind()
    }
}

/// Keeps the orientation only
#[derive(Debug, Clone, Copy, Default)]
pub struct OrientationReducer;

impl TransformReducer for OrientationReducer {
    fn reduce_simple(&self, t: &SimpleTrans) -> SimpleTrans {
        SimpleTrans::new(t.rot, Vector::default())
    }

    fn reduce(&self, t: &ComplexTrans) -> ComplexTrans {
        ComplexTrans::rotation(t.rot)
    }

    fn kind(&self) -> ReducerKind {
        ReducerKind::Orientation
    }
}

/// Orientation modulo 180° rotation: what matters for operations that are
/// symmetric under point reflection (e.g. x/y-aligned distances)
#[derive(Debug, Clone, Copy, Default)]
pub struct OrthogonalRotationReducer;

fn modulo_half_turn(rot: Orientation) -> Orientation {
    Orientation::from_code(rot.code() & !2)
}

impl TransformReducer for OrthogonalRotationReducer {
    fn reduce_simple(&self, t: &SimpleTrans) -> SimpleTrans {
        SimpleTrans::new(modulo_half_turn(t.rot), Vector::default())
    }

    fn reduce(&self, t: &ComplexTrans) -> ComplexTrans {
        ComplexTrans::rotation(modulo_half_turn(t.rot))
    }

    fn kind(&self) -> ReducerKind {
        ReducerKind::OrthogonalRotation
    }
}

/// Keeps the magnification only
#[derive(Debug, Clone, Copy, Default)]
pub struct MagnificationReducer;

impl TransformReducer for MagnificationReducer {
    fn reduce_simple(&self, _t: &SimpleTrans) -> SimpleTrans {
        SimpleTrans::identity()
    }

    fn reduce(&self, t: &ComplexTrans) -> ComplexTrans {
        ComplexTrans::magnification(t.mag)
    }

    fn kind(&self) -> ReducerKind {
        ReducerKind::Magnification
    }
}

/// Keeps orientation and magnification
#[derive(Debug, Clone, Copy, Default)]
pub struct MagnificationAndOrientationReducer;

impl TransformReducer for MagnificationAndOrientationReducer {
    fn reduce_simple(&self, t: &SimpleTrans) -> SimpleTrans {
        SimpleTrans::new(t.rot, Vector::default())
    }

    fn reduce(&self, t: &ComplexTrans) -> ComplexTrans {
        ComplexTrans::new(t.rot, t.mag, 0.0, 0.0)
    }

    fn kind(&self) -> ReducerKind {
        ReducerKind::MagnificationAndOrientation
    }
}

/// Keeps magnification and whether x and y are swapped.
/// Used for anisotropic operations like sizing with different x and y values.
#[derive(Debug, Clone, Copy, Default)]
pub struct XYAnisotropyAndMagnificationReducer;

fn axis_swap(rot: Orientation) -> Orientation {
    if rot.swaps_axes() { Orientation::R90 } else { Orientation::R0 }
}

impl TransformReducer for XYAnisotropyAndMagnificationReducer {
    fn reduce_simple(&self, t: &SimpleTrans) -> SimpleTrans {
        SimpleTrans::new(axis_swap(t.rot), Vector::default())
    }

    fn reduce(&self, t: &ComplexTrans) -> ComplexTrans {
        ComplexTrans::new(axis_swap(t.rot), t.mag, 0.0, 0.0)
    }

    fn kind(&self) -> ReducerKind {
        ReducerKind::XYAnisotropyAndMagnification
    }
}

/// Keeps orientation, magnification and the displacement modulo a grid.
///
/// The composition law holds for integer magnifications; cells placed with
/// fractional magnification are reduced by their rounded displacement.
#[derive(Debug, Clone, Copy)]
pub struct GridReducer {
    grid: Coord,
}

impl GridReducer {
    pub fn new(grid: Coord) -> Self {
        assert!(grid > 0, "grid reducer needs a positive grid");
        Self { grid }
    }

    pub fn grid(&self) -> Coord {
        self.grid
    }
}

fn mod_grid(v: Coord, g: Coord) -> Coord {
    v.rem_euclid(g)
}

fn reduce_disp(t: &ComplexTrans, g: Coord) -> ComplexTrans {
    let d = t.disp();
    ComplexTrans::new(t.rot, t.mag, mod_grid(d.x, g) as f64, mod_grid(d.y, g) as f64)
}

impl TransformReducer for GridReducer {
    fn reduce_simple(&self, t: &SimpleTrans) -> SimpleTrans {
        SimpleTrans::new(
            t.rot,
            Vector::new(mod_grid(t.disp.x, self.grid), mod_grid(t.disp.y, self.grid)),
        )
    }

    fn reduce(&self, t: &ComplexTrans) -> ComplexTrans {
        reduce_disp(t, self.grid)
    }

    fn is_translation_invariant(&self) -> bool {
        false
    }

    fn kind(&self) -> ReducerKind {
        ReducerKind::Grid(self.grid)
    }
}

/// Grid reduction after scaling by `mult / div`.
///
/// Two displacements are equivalent if their difference, scaled, is a grid
/// multiple. That is a plain grid reduction with the effective grid
/// `grid * div / gcd(mult, grid * div)` in unscaled units.
#[derive(Debug, Clone, Copy)]
pub struct ScaleAndGridReducer {
    grid: Coord,
    mult: i64,
    div: i64,
    effective: Coord,
}

fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl ScaleAndGridReducer {
    pub fn new(grid: Coord, mult: i64, div: i64) -> Self {
        assert!(grid > 0 && mult > 0 && div > 0, "scale-and-grid reducer needs positive parameters");
        let scaled = grid * div;
        let effective = scaled / gcd(mult, scaled);
        Self { grid, mult, div, effective }
    }

    pub fn effective_grid(&self) -> Coord {
        self.effective
    }
}

impl TransformReducer for ScaleAndGridReducer {
    fn reduce_simple(&self, t: &SimpleTrans) -> SimpleTrans {
        SimpleTrans::new(
            t.rot,
            Vector::new(mod_grid(t.disp.x, self.effective), mod_grid(t.disp.y, self.effective)),
        )
    }

    fn reduce(&self, t: &ComplexTrans) -> ComplexTrans {
        reduce_disp(t, self.effective)
    }

    fn is_translation_invariant(&self) -> bool {
        false
    }

    fn kind(&self) -> ReducerKind {
        ReducerKind::ScaleAndGrid { grid: self.grid, mult: self.mult, div: self.div }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple(rot: Orientation, x: Coord, y: Coord) -> SimpleTrans {
        SimpleTrans::new(rot, Vector::new(x, y))
    }

    fn check_law(r: &dyn TransformReducer, a: SimpleTrans, b: SimpleTrans) {
        let lhs = r.reduce_simple(&(a * b));
        let rhs = r.reduce_simple(&(r.reduce_simple(&a) * r.reduce_simple(&b)));
        assert_eq!(lhs, rhs, "{:?}: {:?} * {:?}", r.kind(), a, b);
    }

    #[test]
    fn test_modulo_law_all_orientations() {
        let reducers: Vec<Box<dyn TransformReducer>> = vec![
            Box::new(OrientationReducer),
            Box::new(OrthogonalRotationReducer),
            Box::new(MagnificationReducer),
            Box::new(MagnificationAndOrientationReducer),
            Box::new(XYAnisotropyAndMagnificationReducer),
            Box::new(GridReducer::new(10)),
            Box::new(ScaleAndGridReducer::new(10, 3, 2)),
        ];
        for r in &reducers {
            for ra in Orientation::ALL {
                for rb in Orientation::ALL {
                    check_law(r.as_ref(), simple(ra, 13, -7), simple(rb, 4, 25));
                }
            }
        }
    }

    #[test]
    fn test_orthogonal_rotation_classes() {
        let r = OrthogonalRotationReducer;
        assert_eq!(r.reduce_simple(&simple(Orientation::R180, 5, 5)).rot, Orientation::R0);
        assert_eq!(r.reduce_simple(&simple(Orientation::R270, 0, 0)).rot, Orientation::R90);
        assert_eq!(r.reduce_simple(&simple(Orientation::M90, 0, 0)).rot, Orientation::M0);
    }

    #[test]
    fn test_grid_reducer_keeps_residue() {
        let r = GridReducer::new(10);
        let t = r.reduce(&ComplexTrans::new(Orientation::R90, 1.0, 23.0, -4.0));
        assert_eq!(t, ComplexTrans::new(Orientation::R90, 1.0, 3.0, 6.0));
        assert!(!r.is_translation_invariant());
        assert!(r.equals(&GridReducer::new(10)));
        assert!(!r.equals(&GridReducer::new(5)));
    }

    #[test]
    fn test_scale_and_grid_effective_grid() {
        assert_eq!(ScaleAndGridReducer::new(10, 1, 1).effective_grid(), 10);
        assert_eq!(ScaleAndGridReducer::new(10, 5, 1).effective_grid(), 2);
        assert_eq!(ScaleAndGridReducer::new(10, 3, 2).effective_grid(), 20);
    }
}

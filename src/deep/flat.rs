//! Flat polygon collections and the region dispatcher
//!
//! `FlatRegion` runs the same operations as `DeepRegion` on a plain polygon
//! list. `Region` picks the flat path when both operands are flat and lifts
//! a flat operand into the deep store's top cell otherwise.

use super::region::DeepRegion;
use crate::error::{GeoError, GeoResult};
use crate::geometry::{boolean, merge, size_polygons, total_area, BooleanOp, Coord, Polygon, Rect, MAX_SIZING_MODE};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatRegion {
    polygons: Vec<Polygon>,
    min_coherence: bool,
}

impl FlatRegion {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self { polygons, min_coherence: false }
    }

    pub fn with_min_coherence(mut self, on: bool) -> Self {
        self.min_coherence = on;
        self
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn into_polygons(self) -> Vec<Polygon> {
        self.polygons
    }

    pub fn count(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn bbox(&self) -> Rect {
        self.polygons.iter().fold(Rect::empty(), |r, p| r.union(&p.bbox()))
    }

    fn derived(&self, polygons: Vec<Polygon>) -> FlatRegion {
        FlatRegion { polygons, min_coherence: self.min_coherence }
    }

    pub fn merged(&self, min_coherence: bool, min_wc: u32) -> FlatRegion {
        let mut polys = merge(&self.polygons, min_coherence, min_wc);
        polys.sort();
        self.derived(polys)
    }

    fn bool_op(&self, other: &FlatRegion, op: BooleanOp) -> FlatRegion {
        self.derived(boolean(&self.polygons, &other.polygons, op, self.min_coherence))
    }

    pub fn and_with(&self, other: &FlatRegion) -> FlatRegion {
        self.bool_op(other, BooleanOp::And)
    }

    pub fn not_with(&self, other: &FlatRegion) -> FlatRegion {
        self.bool_op(other, BooleanOp::ANotB)
    }

    pub fn or_with(&self, other: &FlatRegion) -> FlatRegion {
        let mut polys = self.polygons.clone();
        polys.extend(other.polygons.iter().cloned());
        self.derived(polys)
    }

    pub fn xor_with(&self, other: &FlatRegion) -> FlatRegion {
        self.bool_op(other, BooleanOp::Xor)
    }

    pub fn sized(&self, dx: Coord, dy: Coord, mode: u32) -> GeoResult<FlatRegion> {
        if mode > MAX_SIZING_MODE {
            return Err(GeoError::InvalidDistance(format!(
                "sizing mode {} is out of range (0..={})",
                mode, MAX_SIZING_MODE
            )));
        }
        Ok(self.derived(size_polygons(&self.polygons, dx, dy, mode)))
    }

    pub fn area(&self) -> f64 {
        total_area(&merge(&self.polygons, self.min_coherence, 0))
    }
}

/// A polygon collection that is either hierarchical or flat
#[derive(Debug, Clone)]
pub enum Region {
    Deep(DeepRegion),
    Flat(FlatRegion),
}

impl From<DeepRegion> for Region {
    fn from(r: DeepRegion) -> Self {
        Region::Deep(r)
    }
}

impl From<FlatRegion> for Region {
    fn from(r: FlatRegion) -> Self {
        Region::Flat(r)
    }
}

/// Operand pairs after lifting flat operands into a deep store
enum Operands<'a> {
    Flat(&'a FlatRegion, &'a FlatRegion),
    Deep(DeepRegion, DeepRegion),
}

impl Region {
    pub fn is_deep(&self) -> bool {
        matches!(self, Region::Deep(_))
    }

    fn lift(flat: &FlatRegion, like: &DeepRegion) -> GeoResult<DeepRegion> {
        log::debug!("[Region] Lifting {} flat polygons into the deep store", flat.count());
        like.store().insert_polygons("flat", flat.polygons.clone())
    }

    fn operands<'a>(&'a self, other: &'a Region) -> GeoResult<Operands<'a>> {
        Ok(match (self, other) {
            (Region::Flat(a), Region::Flat(b)) => Operands::Flat(a, b),
            (Region::Deep(a), Region::Deep(b)) => Operands::Deep(a.clone(), b.clone()),
            (Region::Deep(a), Region::Flat(b)) => Operands::Deep(a.clone(), Self::lift(b, a)?),
            (Region::Flat(a), Region::Deep(b)) => Operands::Deep(Self::lift(a, b)?, b.clone()),
        })
    }

    pub fn and_with(&self, other: &Region) -> GeoResult<Region> {
        Ok(match self.operands(other)? {
            Operands::Flat(a, b) => a.and_with(b).into(),
            Operands::Deep(a, b) => a.and_with(&b)?.into(),
        })
    }

    pub fn not_with(&self, other: &Region) -> GeoResult<Region> {
        Ok(match self.operands(other)? {
            Operands::Flat(a, b) => a.not_with(b).into(),
            Operands::Deep(a, b) => a.not_with(&b)?.into(),
        })
    }

    pub fn or_with(&self, other: &Region) -> GeoResult<Region> {
        Ok(match self.operands(other)? {
            Operands::Flat(a, b) => a.or_with(b).into(),
            Operands::Deep(a, b) => a.or_with(&b)?.into(),
        })
    }

    pub fn xor_with(&self, other: &Region) -> GeoResult<Region> {
        Ok(match self.operands(other)? {
            Operands::Flat(a, b) => a.xor_with(b).into(),
            Operands::Deep(a, b) => a.xor_with(&b)?.into(),
        })
    }

    pub fn merged(&self, min_coherence: bool, min_wc: u32) -> GeoResult<Region> {
        Ok(match self {
            Region::Flat(r) => r.merged(min_coherence, min_wc).into(),
            Region::Deep(r) => r.merged(min_coherence, min_wc)?.into(),
        })
    }

    pub fn sized(&self, dx: Coord, dy: Coord, mode: u32) -> GeoResult<Region> {
        Ok(match self {
            Region::Flat(r) => r.sized(dx, dy, mode)?.into(),
            Region::Deep(r) => r.sized(dx, dy, mode)?.into(),
        })
    }

    pub fn to_polygons(&self) -> Vec<Polygon> {
        match self {
            Region::Flat(r) => r.polygons().to_vec(),
            Region::Deep(r) => r.to_polygons(),
        }
    }

    /// Flattened, merged and sorted polygons
    pub fn to_merged_polygons(&self) -> Vec<Polygon> {
        match self {
            Region::Flat(r) => r.merged(r.min_coherence, 0).into_polygons(),
            Region::Deep(r) => r.to_merged_polygons(),
        }
    }

    pub fn area(&self) -> f64 {
        match self {
            Region::Flat(r) => r.area(),
            Region::Deep(r) => r.area(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::deep::DeepShapeStore;

    fn rect(l: i64, b: i64, r: i64, t: i64) -> Polygon {
        Rect::new(l, b, r, t).to_polygon()
    }

    #[test]
    fn test_flat_booleans() {
        let a = FlatRegion::new(vec![rect(0, 0, 10, 10)]);
        let b = FlatRegion::new(vec![rect(5, 0, 15, 10)]);
        assert!((a.and_with(&b).area() - 50.0).abs() < 1e-9);
        assert!((a.xor_with(&b).area() - 100.0).abs() < 1e-9);
        assert_eq!(a.or_with(&b).merged(false, 0).polygons(), &[rect(0, 0, 15, 10)]);
    }

    #[test]
    fn test_flat_and_deep_mixed() {
        let store = DeepShapeStore::new(0.001, EngineConfig::default());
        let deep: Region = store.insert_polygons("A", vec![rect(0, 0, 10, 10)]).unwrap().into();
        let flat: Region = FlatRegion::new(vec![rect(5, 0, 15, 10)]).into();

        let and = deep.and_with(&flat).unwrap();
        assert!(and.is_deep());
        assert_eq!(and.to_merged_polygons(), vec![rect(5, 0, 10, 10)]);

        let flat_and = flat.and_with(&flat).unwrap();
        assert!(!flat_and.is_deep());
    }
}

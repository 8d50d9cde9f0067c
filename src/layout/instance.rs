//! Cell instances and regular arrays

use serde::{Deserialize, Serialize};

use super::cell::CellIndex;
use super::properties::PropId;
use crate::geometry::{ComplexTrans, Rect, Vector};

/// Regular array: element (ia, ib) is displaced by `ia * a + ib * b`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegularArray {
    pub a: Vector,
    pub b: Vector,
    pub na: u32,
    pub nb: u32,
}

/// A placement of a child cell: one transformation or a regular array of them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellInstArray {
    pub cell: CellIndex,
    pub trans: ComplexTrans,
    pub array: Option<RegularArray>,
    pub prop_id: PropId,
}

impl CellInstArray {
    pub fn new(cell: CellIndex, trans: ComplexTrans) -> Self {
        Self { cell, trans, array: None, prop_id: 0 }
    }

    pub fn new_array(cell: CellIndex, trans: ComplexTrans, a: Vector, b: Vector, na: u32, nb: u32) -> Self {
        Self {
            cell,
            trans,
            array: Some(RegularArray { a, b, na: na.max(1), nb: nb.max(1) }),
            prop_id: 0,
        }
    }

    pub fn with_prop_id(mut self, prop_id: PropId) -> Self {
        self.prop_id = prop_id;
        self
    }

    pub fn is_array(&self) -> bool {
        self.array.is_some()
    }

    /// Number of placements
    pub fn size(&self) -> usize {
        self.array.map_or(1, |a| a.na as usize * a.nb as usize)
    }

    fn offset(&self, ia: u32, ib: u32) -> Vector {
        match self.array {
            Some(arr) => arr.a * ia as i64 + arr.b * ib as i64,
            None => Vector::default(),
        }
    }

    /// Transformation of element (ia, ib)
    pub fn element(&self, ia: u32, ib: u32) -> ComplexTrans {
        let off = self.offset(ia, ib);
        ComplexTrans::new(
            self.trans.rot,
            self.trans.mag,
            self.trans.dx + off.x as f64,
            self.trans.dy + off.y as f64,
        )
    }

    /// All element transformations, row-major (`a` index outer)
    pub fn element_transforms(&self) -> impl Iterator<Item = ComplexTrans> + '_ {
        let (na, nb) = self.array.map_or((1, 1), |a| (a.na, a.nb));
        (0..na).flat_map(move |ia| (0..nb).map(move |ib| self.element(ia, ib)))
    }

    /// Bounding box of all placements of a child box
    pub fn bbox(&self, child: &Rect) -> Rect {
        if child.is_empty() {
            return Rect::empty();
        }
        let base = child.transformed(&self.trans);
        match self.array {
            None => base,
            Some(arr) => {
                let last_a = arr.a * (arr.na as i64 - 1);
                let last_b = arr.b * (arr.nb as i64 - 1);
                base.union(&base.moved(last_a))
                    .union(&base.moved(last_b))
                    .union(&base.moved(last_a + last_b))
            }
        }
    }

    /// Split an array into single instances
    pub fn exploded(&self) -> Vec<CellInstArray> {
        self.element_transforms()
            .map(|t| CellInstArray::new(self.cell, t).with_prop_id(self.prop_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Orientation, Point, Transformation};

    #[test]
    fn test_array_elements_row_major() {
        let inst = CellInstArray::new_array(
            0,
            ComplexTrans::identity(),
            Vector::new(100, 0),
            Vector::new(0, 50),
            2,
            3,
        );
        assert_eq!(inst.size(), 6);
        let disps: Vec<Vector> = inst.element_transforms().map(|t| t.disp()).collect();
        assert_eq!(disps[0], Vector::new(0, 0));
        assert_eq!(disps[1], Vector::new(0, 50));
        assert_eq!(disps[3], Vector::new(100, 0));
        assert_eq!(inst.bbox(&Rect::new(0, 0, 10, 10)), Rect::new(0, 0, 110, 110));
    }

    #[test]
    fn test_rotated_instance_bbox() {
        let inst = CellInstArray::new(0, ComplexTrans::new(Orientation::R90, 2.0, 0.0, 0.0));
        assert_eq!(inst.bbox(&Rect::new(0, 0, 10, 5)), Rect::new(-10, 0, 0, 20));
        assert_eq!(inst.trans.apply(Point::new(10, 0)), Point::new(0, 20));
    }
}

//! Per-layer shape containers
//!
//! `Shapes` is what a cell stores on one layer: polygons as repository
//! handles, edges and edge pairs by value, each with a property id.
//! `ShapeBuffer` is the plain, transformable staging container used while
//! shapes travel between cells before they are committed.

use std::fmt::Debug;
use std::hash::Hash;

use super::properties::PropId;
use crate::geometry::{ComplexTrans, Edge, EdgePair, Polygon, PolygonRef, Rect, ShapeRepository};

#[derive(Debug, Clone, Default)]
pub struct Shapes {
    polygons: Vec<(PolygonRef, PropId)>,
    edges: Vec<(Edge, PropId)>,
    edge_pairs: Vec<(EdgePair, PropId)>,
}

impl Shapes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_polygon(&mut self, poly: &Polygon, prop: PropId, repo: &ShapeRepository<Polygon>) {
        if !poly.is_empty() {
            self.polygons.push((PolygonRef::new(poly, repo), prop));
        }
    }

    pub fn insert_polygon_ref(&mut self, r: PolygonRef, prop: PropId) {
        self.polygons.push((r, prop));
    }

    pub fn insert_edge(&mut self, e: Edge, prop: PropId) {
        self.edges.push((e, prop));
    }

    pub fn insert_edge_pair(&mut self, ep: EdgePair, prop: PropId) {
        self.edge_pairs.push((ep, prop));
    }

    pub fn polygon_refs(&self) -> &[(PolygonRef, PropId)] {
        &self.polygons
    }

    pub fn polygons(&self) -> impl Iterator<Item = (Polygon, PropId)> + '_ {
        self.polygons.iter().map(|(r, p)| (r.instantiate(), *p))
    }

    pub fn edges(&self) -> &[(Edge, PropId)] {
        &self.edges
    }

    pub fn edge_pairs(&self) -> &[(EdgePair, PropId)] {
        &self.edge_pairs
    }

    pub fn len(&self) -> usize {
        self.polygons.len() + self.edges.len() + self.edge_pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bbox(&self) -> Rect {
        let mut r = Rect::empty();
        for (p, _) in &self.polygons {
            r = r.union(&p.bbox());
        }
        for (e, _) in &self.edges {
            r = r.union(&e.bbox());
        }
        for (ep, _) in &self.edge_pairs {
            r = r.union(&ep.bbox());
        }
        r
    }

    pub fn clear(&mut self) {
        self.polygons.clear();
        self.edges.clear();
        self.edge_pairs.clear();
    }
}

/// Plain shape container for shapes that are not stored in a cell yet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShapeBuffer {
    pub polygons: Vec<(Polygon, PropId)>,
    pub edges: Vec<(Edge, PropId)>,
    pub edge_pairs: Vec<(EdgePair, PropId)>,
}

impl ShapeBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_shapes(shapes: &Shapes) -> Self {
        Self {
            polygons: shapes.polygons().collect(),
            edges: shapes.edges().to_vec(),
            edge_pairs: shapes.edge_pairs().to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.polygons.len() + self.edges.len() + self.edge_pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append all shapes of `other` transformed by `t`
    pub fn insert_transformed(&mut self, other: &ShapeBuffer, t: &ComplexTrans) {
        self.polygons.extend(other.polygons.iter().map(|(p, id)| (p.transformed(t), *id)));
        self.edges.extend(other.edges.iter().map(|(e, id)| (e.transformed(t), *id)));
        self.edge_pairs.extend(other.edge_pairs.iter().map(|(ep, id)| (ep.transformed(t), *id)));
    }

    /// Sorted, duplicate-free copy for set comparison
    pub fn normalized(&self) -> ShapeBuffer {
        let mut b = self.clone();
        b.polygons.sort();
        b.polygons.dedup();
        b.edges.sort();
        b.edges.dedup();
        b.edge_pairs.sort();
        b.edge_pairs.dedup();
        b
    }
}

/// Shape kinds the hierarchical engine can process
pub trait LayoutShape: Clone + Eq + Ord + Hash + Send + Sync + Debug + 'static {
    fn bbox(&self) -> Rect;

    fn transform(&self, t: &ComplexTrans) -> Self;

    /// Read all shapes of this kind from a container
    fn read_from(shapes: &Shapes) -> Vec<(Self, PropId)>;

    fn push_into(self, prop: PropId, buf: &mut ShapeBuffer);
}

impl LayoutShape for Polygon {
    fn bbox(&self) -> Rect {
        Polygon::bbox(self)
    }

    fn transform(&self, t: &ComplexTrans) -> Self {
        self.transformed(t)
    }

    fn read_from(shapes: &Shapes) -> Vec<(Self, PropId)> {
        shapes.polygons().collect()
    }

    fn push_into(self, prop: PropId, buf: &mut ShapeBuffer) {
        if !self.is_empty() {
            buf.polygons.push((self, prop));
        }
    }
}

impl LayoutShape for Edge {
    fn bbox(&self) -> Rect {
        Edge::bbox(self)
    }

    fn transform(&self, t: &ComplexTrans) -> Self {
        self.transformed(t)
    }

    fn read_from(shapes: &Shapes) -> Vec<(Self, PropId)> {
        shapes.edges().to_vec()
    }

    fn push_into(self, prop: PropId, buf: &mut ShapeBuffer) {
        buf.edges.push((self, prop));
    }
}

impl LayoutShape for EdgePair {
    fn bbox(&self) -> Rect {
        EdgePair::bbox(self)
    }

    fn transform(&self, t: &ComplexTrans) -> Self {
        self.transformed(t)
    }

    fn read_from(shapes: &Shapes) -> Vec<(Self, PropId)> {
        shapes.edge_pairs().to_vec()
    }

    fn push_into(self, prop: PropId, buf: &mut ShapeBuffer) {
        buf.edge_pairs.push((self, prop));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Orientation, Rect};

    #[test]
    fn test_shapes_bbox_and_count() {
        let repo = ShapeRepository::new();
        let mut s = Shapes::new();
        s.insert_polygon(&Rect::new(0, 0, 10, 10).to_polygon(), 0, &repo);
        s.insert_edge(Edge::from_coords(20, 0, 20, 5), 3);
        assert_eq!(s.len(), 2);
        assert_eq!(s.bbox(), Rect::new(0, 0, 20, 10));
        s.insert_polygon(&Polygon::default(), 0, &repo);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_buffer_transform() {
        let mut src = ShapeBuffer::new();
        src.polygons.push((Rect::new(0, 0, 10, 5).to_polygon(), 1));
        let mut dst = ShapeBuffer::new();
        dst.insert_transformed(&src, &ComplexTrans::new(Orientation::R90, 1.0, 100.0, 0.0));
        assert_eq!(dst.polygons, vec![(Rect::new(95, 0, 100, 10).to_polygon(), 1)]);
    }
}

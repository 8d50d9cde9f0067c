//! The layout database: cells, layers, shared repositories and the cached
//! hierarchy state (top-down order, parent links, per-layer boxes).
//!
//! Mutations invalidate the hierarchy state; `update()` recomputes it. Code
//! that walks the hierarchy calls `update()` first and then works on a
//! shared reference.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

use super::cell::{Cell, CellIndex, LayerIndex};
use super::instance::CellInstArray;
use super::properties::{PropId, PropertiesRepository, PropertyMapper};
use super::shapes::{LayoutShape, ShapeBuffer};
use crate::error::{GeoError, GeoResult};
use crate::geometry::{ComplexTrans, Edge, EdgePair, Polygon, Rect, ShapeRepository};

#[derive(Debug, Clone, Default)]
struct Hierarchy {
    valid: bool,
    top_down: Vec<CellIndex>,
    parents: Vec<Vec<(CellIndex, usize)>>,
    bbox: Vec<Rect>,
    layer_bbox: Vec<BTreeMap<LayerIndex, Rect>>,
}

#[derive(Debug, Clone)]
pub struct Layout {
    dbu: f64,
    cells: Vec<Cell>,
    cell_names: HashMap<String, CellIndex>,
    layers: Vec<String>,
    layer_names: HashMap<String, LayerIndex>,
    repo: Arc<ShapeRepository<Polygon>>,
    properties: PropertiesRepository,
    hier: Hierarchy,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(0.001)
    }
}

impl Layout {
    pub fn new(dbu: f64) -> Self {
        Self {
            dbu,
            cells: Vec::new(),
            cell_names: HashMap::new(),
            layers: Vec::new(),
            layer_names: HashMap::new(),
            repo: Arc::new(ShapeRepository::new()),
            properties: PropertiesRepository::new(),
            hier: Hierarchy::default(),
        }
    }

    pub fn dbu(&self) -> f64 {
        self.dbu
    }

    pub fn set_dbu(&mut self, dbu: f64) {
        self.dbu = dbu;
    }

    fn invalidate(&mut self) {
        self.hier.valid = false;
    }

    // ---- cells

    fn unique_cell_name(&self, base: &str) -> String {
        if !self.cell_names.contains_key(base) {
            return base.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}${}", base, n);
            if !self.cell_names.contains_key(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Add a cell; the name is made unique if taken
    pub fn add_cell(&mut self, name: &str) -> CellIndex {
        let name = self.unique_cell_name(name);
        let index = self.cells.len();
        self.cell_names.insert(name.clone(), index);
        self.cells.push(Cell::new(index, name));
        self.invalidate();
        index
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn cell(&self, ci: CellIndex) -> &Cell {
        &self.cells[ci]
    }

    pub fn try_cell(&self, ci: CellIndex) -> GeoResult<&Cell> {
        self.cells.get(ci).ok_or(GeoError::InvalidCellIndex(ci))
    }

    pub fn is_valid_cell_index(&self, ci: CellIndex) -> bool {
        ci < self.cells.len()
    }

    pub fn cell_by_name(&self, name: &str) -> Option<CellIndex> {
        self.cell_names.get(name).copied()
    }

    pub fn cell_name(&self, ci: CellIndex) -> &str {
        self.cells[ci].name()
    }

    /// Duplicate a cell with its shapes and instances
    pub fn clone_cell(&mut self, ci: CellIndex) -> CellIndex {
        let name = self.unique_cell_name(&format!("{}$1", self.cells[ci].name()));
        let index = self.cells.len();
        let copy = self.cells[ci].duplicate(index, name.clone());
        self.cell_names.insert(name, index);
        self.cells.push(copy);
        self.invalidate();
        index
    }

    pub fn add_instance(&mut self, ci: CellIndex, inst: CellInstArray) {
        self.cells[ci].instances_mut().push(inst);
        self.invalidate();
    }

    pub fn replace_instances(&mut self, ci: CellIndex, insts: Vec<CellInstArray>) {
        *self.cells[ci].instances_mut() = insts;
        self.invalidate();
    }

    // ---- layers

    /// Layer index for a name, creating the layer if needed
    pub fn insert_layer(&mut self, name: &str) -> LayerIndex {
        if let Some(li) = self.layer_names.get(name) {
            return *li;
        }
        let li = self.layers.len();
        self.layers.push(name.to_string());
        self.layer_names.insert(name.to_string(), li);
        li
    }

    /// Fresh anonymous layer
    pub fn new_layer(&mut self, prefix: &str) -> LayerIndex {
        let name = format!("${}${}", prefix, self.layers.len());
        self.insert_layer(&name)
    }

    pub fn layer_index(&self, name: &str) -> Option<LayerIndex> {
        self.layer_names.get(name).copied()
    }

    pub fn layer_name(&self, li: LayerIndex) -> &str {
        self.layers.get(li).map(|s| s.as_str()).unwrap_or("")
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layers(&self) -> impl Iterator<Item = (LayerIndex, &str)> {
        self.layers.iter().enumerate().map(|(i, n)| (i, n.as_str()))
    }

    // ---- shapes

    pub fn repository(&self) -> &ShapeRepository<Polygon> {
        &self.repo
    }

    pub fn properties(&self) -> &PropertiesRepository {
        &self.properties
    }

    pub fn properties_mut(&mut self) -> &mut PropertiesRepository {
        &mut self.properties
    }

    pub fn insert_polygon(&mut self, ci: CellIndex, li: LayerIndex, poly: &Polygon, prop: PropId) {
        let repo = self.repo.clone();
        self.cells[ci].shapes_mut(li).insert_polygon(poly, prop, &repo);
        self.invalidate();
    }

    pub fn insert_edge(&mut self, ci: CellIndex, li: LayerIndex, edge: Edge, prop: PropId) {
        self.cells[ci].shapes_mut(li).insert_edge(edge, prop);
        self.invalidate();
    }

    pub fn insert_edge_pair(&mut self, ci: CellIndex, li: LayerIndex, ep: EdgePair, prop: PropId) {
        self.cells[ci].shapes_mut(li).insert_edge_pair(ep, prop);
        self.invalidate();
    }

    pub fn insert_buffer(&mut self, ci: CellIndex, li: LayerIndex, buf: &ShapeBuffer) {
        if buf.is_empty() {
            return;
        }
        let repo = self.repo.clone();
        let shapes = self.cells[ci].shapes_mut(li);
        for (p, id) in &buf.polygons {
            shapes.insert_polygon(p, *id, &repo);
        }
        for (e, id) in &buf.edges {
            shapes.insert_edge(*e, *id);
        }
        for (ep, id) in &buf.edge_pairs {
            shapes.insert_edge_pair(*ep, *id);
        }
        self.invalidate();
    }

    /// Remove a layer's shapes from all cells
    pub fn clear_layer(&mut self, li: LayerIndex) {
        for c in &mut self.cells {
            c.clear_layer(li);
        }
        self.invalidate();
    }

    /// Copy the shapes of one layer into another, cell by cell
    pub fn copy_layer(&mut self, src: LayerIndex, dst: LayerIndex) {
        for c in &mut self.cells {
            if let Some(s) = c.shapes(src).cloned() {
                let target = c.shapes_mut(dst);
                for (r, id) in s.polygon_refs() {
                    target.insert_polygon_ref(r.clone(), *id);
                }
                for (e, id) in s.edges() {
                    target.insert_edge(*e, *id);
                }
                for (ep, id) in s.edge_pairs() {
                    target.insert_edge_pair(*ep, *id);
                }
            }
        }
        self.invalidate();
    }

    /// All shapes below `ci` on a layer, flattened into `ci`'s frame
    pub fn flat_buffer(&self, ci: CellIndex, li: LayerIndex) -> ShapeBuffer {
        ShapeBuffer {
            polygons: self.flat_shapes::<Polygon>(ci, li),
            edges: self.flat_shapes::<Edge>(ci, li),
            edge_pairs: self.flat_shapes::<EdgePair>(ci, li),
        }
    }

    /// Insert shapes of another layout, mapping their property ids from `src_props`
    pub fn insert_mapped(
        &mut self,
        ci: CellIndex,
        li: LayerIndex,
        mut buf: ShapeBuffer,
        src_props: &PropertiesRepository,
    ) {
        let mut mapper = PropertyMapper::new();
        for (_, id) in buf.polygons.iter_mut() {
            *id = mapper.map(*id, src_props, &mut self.properties);
        }
        for (_, id) in buf.edges.iter_mut() {
            *id = mapper.map(*id, src_props, &mut self.properties);
        }
        for (_, id) in buf.edge_pairs.iter_mut() {
            *id = mapper.map(*id, src_props, &mut self.properties);
        }
        self.insert_buffer(ci, li, &buf);
    }

    /// All shapes of one kind below `ci` on a layer, in `ci`'s frame
    pub fn flat_shapes<T: LayoutShape>(&self, ci: CellIndex, li: LayerIndex) -> Vec<(T, PropId)> {
        let mut out = Vec::new();
        self.collect_flat(ci, li, &ComplexTrans::identity(), &mut out);
        out
    }

    fn collect_flat<T: LayoutShape>(&self, ci: CellIndex, li: LayerIndex, t: &ComplexTrans, out: &mut Vec<(T, PropId)>) {
        let cell = &self.cells[ci];
        if let Some(s) = cell.shapes(li) {
            let identity = t.is_identity();
            for (shape, id) in T::read_from(s) {
                out.push((if identity { shape } else { shape.transform(t) }, id));
            }
        }
        for inst in cell.instances() {
            for et in inst.element_transforms() {
                self.collect_flat(inst.cell, li, &(*t * et), out);
            }
        }
    }

    /// Number of shapes on a layer counted hierarchically (each cell once)
    pub fn hier_shape_count(&self, top: CellIndex, li: LayerIndex) -> usize {
        let mut cells = self.called_cells(top);
        cells.insert(top);
        cells
            .iter()
            .map(|ci| self.cells[*ci].shapes(li).map_or(0, |s| s.len()))
            .sum()
    }

    // ---- hierarchy

    /// Recompute top-down order, parent links and bounding boxes
    pub fn update(&mut self) -> GeoResult<()> {
        if self.hier.valid {
            return Ok(());
        }
        let n = self.cells.len();
        let mut parents: Vec<Vec<(CellIndex, usize)>> = vec![Vec::new(); n];
        let mut in_degree = vec![0usize; n];
        for (ci, cell) in self.cells.iter().enumerate() {
            for (k, inst) in cell.instances().iter().enumerate() {
                if inst.cell >= n {
                    return Err(GeoError::InvalidCellIndex(inst.cell));
                }
                parents[inst.cell].push((ci, k));
                in_degree[inst.cell] += 1;
            }
        }

        let mut queue: VecDeque<CellIndex> = (0..n).filter(|ci| in_degree[*ci] == 0).collect();
        let mut top_down = Vec::with_capacity(n);
        while let Some(ci) = queue.pop_front() {
            top_down.push(ci);
            for inst in self.cells[ci].instances() {
                in_degree[inst.cell] -= 1;
                if in_degree[inst.cell] == 0 {
                    queue.push_back(inst.cell);
                }
            }
        }
        if top_down.len() < n {
            let culprit = (0..n).find(|ci| in_degree[*ci] > 0).unwrap_or(0);
            return Err(GeoError::CycleDetected(self.cells[culprit].name().to_string()));
        }

        let mut layer_bbox: Vec<BTreeMap<LayerIndex, Rect>> = vec![BTreeMap::new(); n];
        let mut bbox = vec![Rect::empty(); n];
        for &ci in top_down.iter().rev() {
            let cell = &self.cells[ci];
            let mut boxes: BTreeMap<LayerIndex, Rect> = BTreeMap::new();
            for (li, s) in cell.layers() {
                let b = s.bbox();
                if !b.is_empty() {
                    boxes.insert(li, b);
                }
            }
            for inst in cell.instances() {
                for (li, cb) in &layer_bbox[inst.cell] {
                    let ib = inst.bbox(cb);
                    let e = boxes.entry(*li).or_insert(Rect::empty());
                    *e = e.union(&ib);
                }
            }
            bbox[ci] = boxes.values().fold(Rect::empty(), |r, b| r.union(b));
            layer_bbox[ci] = boxes;
        }

        self.hier = Hierarchy { valid: true, top_down, parents, bbox, layer_bbox };
        Ok(())
    }

    pub fn is_updated(&self) -> bool {
        self.hier.valid
    }

    fn assert_updated(&self) {
        assert!(self.hier.valid, "layout hierarchy accessed before update()");
    }

    /// Cells ordered parents before children
    pub fn top_down_order(&self) -> &[CellIndex] {
        self.assert_updated();
        &self.hier.top_down
    }

    /// Cells ordered children before parents
    pub fn bottom_up_order(&self) -> Vec<CellIndex> {
        self.top_down_order().iter().rev().copied().collect()
    }

    /// `(parent cell, instance index in parent)` for every instance of `ci`
    pub fn parent_instances(&self, ci: CellIndex) -> &[(CellIndex, usize)] {
        self.assert_updated();
        &self.hier.parents[ci]
    }

    pub fn bbox(&self, ci: CellIndex) -> Rect {
        self.assert_updated();
        self.hier.bbox[ci]
    }

    /// Box of everything on layer `li` in and below `ci`
    pub fn bbox_on_layer(&self, ci: CellIndex, li: LayerIndex) -> Rect {
        self.assert_updated();
        self.hier.layer_bbox[ci].get(&li).copied().unwrap_or(Rect::empty())
    }

    /// All cells reachable from `ci` through instances (excluding `ci`)
    pub fn called_cells(&self, ci: CellIndex) -> BTreeSet<CellIndex> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![ci];
        while let Some(c) = stack.pop() {
            for inst in self.cells[c].instances() {
                if seen.insert(inst.cell) {
                    stack.push(inst.cell);
                }
            }
        }
        seen.remove(&ci);
        seen
    }

    /// Cells without parents
    pub fn top_cells(&self) -> Vec<CellIndex> {
        let mut has_parent = vec![false; self.cells.len()];
        for c in &self.cells {
            for inst in c.instances() {
                has_parent[inst.cell] = true;
            }
        }
        (0..self.cells.len()).filter(|ci| !has_parent[*ci]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Orientation, Vector};

    fn two_level() -> (Layout, CellIndex, CellIndex, LayerIndex) {
        let mut layout = Layout::new(0.001);
        let top = layout.add_cell("TOP");
        let a = layout.add_cell("A");
        let l1 = layout.insert_layer("L1");
        layout.insert_polygon(a, l1, &Rect::new(0, 0, 10, 10).to_polygon(), 0);
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::translation(Vector::new(100, 0))));
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::rotation(Orientation::R90)));
        (layout, top, a, l1)
    }

    #[test]
    fn test_update_order_and_boxes() {
        let (mut layout, top, a, l1) = two_level();
        layout.update().unwrap();
        assert_eq!(layout.top_down_order(), &[top, a]);
        assert_eq!(layout.parent_instances(a).len(), 2);
        assert_eq!(layout.bbox_on_layer(top, l1), Rect::new(-10, 0, 110, 10));
        assert_eq!(layout.top_cells(), vec![top]);
    }

    #[test]
    fn test_cycle_detected() {
        let mut layout = Layout::new(0.001);
        let a = layout.add_cell("A");
        let b = layout.add_cell("B");
        layout.add_instance(a, CellInstArray::new(b, ComplexTrans::identity()));
        layout.add_instance(b, CellInstArray::new(a, ComplexTrans::identity()));
        assert!(matches!(layout.update(), Err(GeoError::CycleDetected(_))));
    }

    #[test]
    fn test_flat_shapes_and_clone() {
        let (mut layout, top, a, l1) = two_level();
        let flat = layout.flat_shapes::<Polygon>(top, l1);
        assert_eq!(flat.len(), 2);
        assert!(flat.iter().any(|(p, _)| p.bbox() == Rect::new(-10, 0, 0, 10)));

        let copy = layout.clone_cell(a);
        assert_eq!(layout.cell_name(copy), "A$1");
        assert_eq!(layout.cell(copy).shapes(l1).map(|s| s.len()), Some(1));
        assert_eq!(layout.hier_shape_count(top, l1), 1);
    }
}

//! Hierarchical polygon collection
//!
//! Most operations work on the merged view of a region, which is computed
//! once through the cluster engine and cached per region.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use super::edge_pairs::DeepEdgePairs;
use super::edges::DeepEdges;
use super::store::{DeepLayer, DeepShapeStore, Intruders};
use crate::error::{GeoError, GeoResult};
use crate::geometry::{
    merge,
    size_polygons,
    total_area,
    CheckOptions,
    Coord,
    EdgeRelationFilter,
    Polygon,
    Rect,
    RelationKind,
    MAX_SIZING_MODE,
};
use crate::hier::{
    combined_grid,
    merge_root_clusters,
    off_grid_markers,
    BoolAndOrNotLocalOperation,
    BoolMode,
    CheckLocalOperation,
    Connectivity,
    GridReducer,
    GridSnap,
    HierClusters,
    InteractingLocalOperation,
    InteractionMode,
    MagnificationReducer,
    PolygonExtents,
    PolygonToEdges,
    ProcessorOperation,
    PullLocalOperation,
    SelectionOutput,
    ShapeProcessor,
    TransformReducer,
    VariantShapes,
    VariantsCollector,
    XYAnisotropyAndMagnificationReducer,
};
use crate::layout::{LayerIndex, ShapeBuffer};

/// Divide a top cell distance by a magnification
fn unscaled(d: Coord, mag: f64) -> Coord {
    (d as f64 / mag).round() as Coord
}

#[derive(Debug, Clone)]
pub struct DeepRegion {
    deep: DeepLayer,
    /// Merged layer computed with the store's coherence setting
    merged_cache: Arc<Mutex<Option<LayerIndex>>>,
    is_merged: bool,
}

impl DeepRegion {
    pub(crate) fn new(deep: DeepLayer) -> Self {
        Self { deep, merged_cache: Arc::new(Mutex::new(None)), is_merged: false }
    }

    fn new_merged(deep: DeepLayer) -> Self {
        Self { deep, merged_cache: Arc::new(Mutex::new(None)), is_merged: true }
    }

    fn empty_like(&self) -> DeepRegion {
        DeepRegion::new_merged(self.store().new_layer("empty"))
    }

    pub fn deep_layer(&self) -> &DeepLayer {
        &self.deep
    }

    pub fn store(&self) -> &DeepShapeStore {
        &self.deep.store
    }

    /// True if the region is known to consist of merged polygons
    pub fn is_merged(&self) -> bool {
        self.is_merged
    }

    fn min_coherence(&self) -> bool {
        self.store().config().min_coherence
    }

    fn same_layer(&self, other: &DeepRegion) -> bool {
        self.store().is_same(other.store()) && self.deep.layer == other.deep.layer
    }

    /// Add polygons to the top cell. Drops the merged view.
    pub fn insert(&mut self, polygons: &[Polygon]) -> GeoResult<()> {
        let mut buf = ShapeBuffer::new();
        buf.polygons.extend(polygons.iter().map(|p| (p.clone(), 0)));
        {
            let mut inner = self.store().write();
            let top = inner.top;
            inner.layout.insert_buffer(top, self.deep.layer, &buf);
            inner.layout.update()?;
        }
        self.merged_cache = Arc::new(Mutex::new(None));
        self.is_merged = false;
        Ok(())
    }

    // ---- merge

    fn compute_merged(&self, min_coherence: bool, min_wc: u32) -> GeoResult<LayerIndex> {
        let start = Instant::now();
        log::debug!(
            "[DeepRegion] Merging layer {} (min_coherence={}, min_wc={})",
            self.deep.layer,
            min_coherence,
            min_wc
        );
        let per_cell = {
            let inner = self.store().read();
            let clusters = HierClusters::<Polygon>::build(&inner.layout, inner.top, &Connectivity::single(self.deep.layer));
            merge_root_clusters(&clusters, min_coherence, min_wc)
        };
        let mut inner = self.store().write();
        let out = inner.layout.new_layer("merged");
        for (ci, buf) in &per_cell {
            inner.layout.insert_buffer(*ci, out, buf);
        }
        inner.layout.update()?;
        log::info!(
            "[DeepRegion] Merged layer {} into {} ({} cells, {:.2?})",
            self.deep.layer,
            out,
            per_cell.len(),
            start.elapsed()
        );
        Ok(out)
    }

    /// The merged view with the store's settings
    pub(crate) fn merged_deep(&self) -> GeoResult<DeepLayer> {
        if self.is_merged {
            return Ok(self.deep.clone());
        }
        let mut cache = self.merged_cache.lock();
        if let Some(li) = *cache {
            return Ok(self.deep.derived(li));
        }
        let li = self.compute_merged(self.min_coherence(), 0)?;
        *cache = Some(li);
        Ok(self.deep.derived(li))
    }

    /// Merged polygons; with `min_wc > 0` only areas covered more than `min_wc` times remain
    pub fn merged(&self, min_coherence: bool, min_wc: u32) -> GeoResult<DeepRegion> {
        if min_wc == 0 && min_coherence == self.min_coherence() {
            return Ok(DeepRegion::new_merged(self.merged_deep()?));
        }
        let li = self.compute_merged(min_coherence, min_wc)?;
        Ok(DeepRegion::new_merged(self.deep.derived(li)))
    }

    // ---- booleans

    fn bool_op(&self, other: &DeepRegion, mode: BoolMode) -> GeoResult<Vec<DeepLayer>> {
        let a = self.merged_deep()?;
        let b = other.merged_deep()?;
        let op = BoolAndOrNotLocalOperation::new(mode, self.min_coherence());
        self.store().run_local(a.layer, Intruders::Layer(&b), &op, "bool")
    }

    pub fn and_with(&self, other: &DeepRegion) -> GeoResult<DeepRegion> {
        if self.is_empty() || other.is_empty() {
            return Ok(self.empty_like());
        }
        if self.same_layer(other) {
            return self.merged(self.min_coherence(), 0);
        }
        let mut out = self.bool_op(other, BoolMode::And)?;
        Ok(DeepRegion::new(out.remove(0)))
    }

    pub fn not_with(&self, other: &DeepRegion) -> GeoResult<DeepRegion> {
        if self.is_empty() || self.same_layer(other) {
            return Ok(self.empty_like());
        }
        if other.is_empty() {
            return Ok(self.clone());
        }
        let mut out = self.bool_op(other, BoolMode::Not)?;
        Ok(DeepRegion::new(out.remove(0)))
    }

    /// AND and NOT in one pass
    pub fn andnot_with(&self, other: &DeepRegion) -> GeoResult<(DeepRegion, DeepRegion)> {
        if self.is_empty() {
            return Ok((self.empty_like(), self.empty_like()));
        }
        if other.is_empty() {
            return Ok((self.empty_like(), self.clone()));
        }
        if self.same_layer(other) {
            return Ok((self.merged(self.min_coherence(), 0)?, self.empty_like()));
        }
        let mut out = self.bool_op(other, BoolMode::AndNot)?.into_iter().map(DeepRegion::new);
        match (out.next(), out.next()) {
            (Some(and), Some(not)) => Ok((and, not)),
            _ => Ok((self.empty_like(), self.empty_like())),
        }
    }

    /// Union of both regions (not merged)
    pub fn or_with(&self, other: &DeepRegion) -> GeoResult<DeepRegion> {
        let store = self.store();
        if store.is_same(other.store()) {
            let mut inner = store.write();
            let out = inner.layout.new_layer("or");
            inner.layout.copy_layer(self.deep.layer, out);
            inner.layout.copy_layer(other.deep.layer, out);
            inner.layout.update()?;
            return Ok(DeepRegion::new(self.deep.derived(out)));
        }
        let (own_dbu, other_dbu) = (store.dbu(), other.store().dbu());
        if (own_dbu - other_dbu).abs() > 1e-12 {
            return Err(GeoError::DbuMismatch(own_dbu, other_dbu));
        }
        let (buf, props) = {
            let foreign = other.store().read();
            (foreign.layout.flat_buffer(foreign.top, other.deep.layer), foreign.layout.properties().clone())
        };
        let mut inner = store.write();
        let out = inner.layout.new_layer("or");
        let top = inner.top;
        inner.layout.copy_layer(self.deep.layer, out);
        inner.layout.insert_mapped(top, out, buf, &props);
        inner.layout.update()?;
        Ok(DeepRegion::new(self.deep.derived(out)))
    }

    /// Symmetric difference as `(A - B) | (B - A)`
    pub fn xor_with(&self, other: &DeepRegion) -> GeoResult<DeepRegion> {
        if self.same_layer(other) {
            return Ok(self.empty_like());
        }
        let a_not_b = self.not_with(other)?;
        if !self.store().is_same(other.store()) {
            // bring B into this store first so that the union stays here
            let b_here = self.or_lift(other)?;
            let b_not_a = b_here.not_with(self)?;
            return a_not_b.or_with(&b_not_a);
        }
        let b_not_a = other.not_with(self)?;
        a_not_b.or_with(&b_not_a)
    }

    /// `other` flattened into a new layer of this store
    fn or_lift(&self, other: &DeepRegion) -> GeoResult<DeepRegion> {
        let empty = self.empty_like();
        empty.or_with(other)
    }

    // ---- sizing and grids

    /// Size by `dx`/`dy`. Mode selects the corner handling (0..=5).
    pub fn sized(&self, dx: Coord, dy: Coord, mode: u32) -> GeoResult<DeepRegion> {
        if mode > MAX_SIZING_MODE {
            return Err(GeoError::InvalidDistance(format!(
                "sizing mode {} is out of range (0..={})",
                mode, MAX_SIZING_MODE
            )));
        }
        if dx == 0 && dy == 0 {
            return self.merged(self.min_coherence(), 0);
        }
        let start = Instant::now();
        log::debug!("[DeepRegion] Sizing layer {} by ({}, {}) mode {}", self.deep.layer, dx, dy, mode);
        let src = self.merged_deep()?;
        let reducer: Arc<dyn TransformReducer> = if dx == dy {
            Arc::new(MagnificationReducer)
        } else {
            Arc::new(XYAnisotropyAndMagnificationReducer)
        };

        let mut guard = self.store().write();
        let inner = &mut *guard;
        let mut vc = VariantsCollector::new(reducer);
        vc.collect(&inner.layout, inner.top);

        let mut to_commit = VariantShapes::new();
        for &ci in vc.called_cells() {
            let Some(shapes) = inner.layout.cell(ci).shapes(src.layer) else {
                continue;
            };
            let polys: Vec<_> = shapes.polygons().collect();
            if polys.is_empty() {
                continue;
            }
            let mut per_variant = BTreeMap::new();
            for v in vc.variants(ci) {
                let (sx, sy) = if v.rot.swaps_axes() { (dy, dx) } else { (dx, dy) };
                let (lx, ly) = (unscaled(sx, v.mag), unscaled(sy, v.mag));
                let mut buf = ShapeBuffer::new();
                for (p, id) in &polys {
                    for r in size_polygons(std::slice::from_ref(p), lx, ly, mode) {
                        buf.polygons.push((r, *id));
                    }
                }
                per_variant.insert(v, buf);
            }
            to_commit.insert(ci, per_variant);
        }

        let out = inner.layout.new_layer("sized");
        vc.commit_shapes(&mut inner.layout, out, to_commit)?;
        log::info!("[DeepRegion] Sized layer {} into {} ({:.2?})", self.deep.layer, out, start.elapsed());
        Ok(DeepRegion::new(self.deep.derived(out)))
    }

    /// Snap vertices to a grid in top cell coordinates. Separates cell variants.
    pub fn snapped(&self, grid: Coord) -> GeoResult<DeepRegion> {
        if grid < 0 {
            return Err(GeoError::NegativeGrid(grid));
        }
        if grid == 0 {
            return self.merged(self.min_coherence(), 0);
        }
        let src = self.merged_deep()?;
        let op = ProcessorOperation::new(GridSnap { grid });
        Ok(DeepRegion::new(self.store().run_separated(src.layer, &op, "snapped")?))
    }

    /// Markers on vertices that are off-grid in top cell coordinates
    pub fn grid_check(&self, gx: Coord, gy: Coord) -> GeoResult<DeepEdgePairs> {
        if gx < 0 || gy < 0 {
            return Err(GeoError::NegativeGrid(gx.min(gy)));
        }
        let grid = combined_grid(gx, gy);
        if grid == 0 {
            return Ok(DeepEdgePairs::new(self.store().new_layer("grid_check")));
        }
        let start = Instant::now();
        let mut guard = self.store().write();
        let inner = &mut *guard;
        let mut vc = VariantsCollector::new(Arc::new(GridReducer::new(grid)));
        vc.collect(&inner.layout, inner.top);

        let mut to_commit = VariantShapes::new();
        let mut markers = 0usize;
        for &ci in vc.called_cells() {
            let Some(shapes) = inner.layout.cell(ci).shapes(self.deep.layer) else {
                continue;
            };
            let polys: Vec<_> = shapes.polygons().collect();
            if polys.is_empty() {
                continue;
            }
            let mut per_variant = BTreeMap::new();
            for v in vc.variants(ci) {
                let mut buf = ShapeBuffer::new();
                for (p, id) in &polys {
                    buf.edge_pairs.extend(off_grid_markers(p, &v, gx, gy).into_iter().map(|ep| (ep, *id)));
                }
                markers += buf.len();
                per_variant.insert(v, buf);
            }
            to_commit.insert(ci, per_variant);
        }

        let out = inner.layout.new_layer("grid_check");
        vc.commit_shapes(&mut inner.layout, out, to_commit)?;
        log::info!("[DeepRegion] Grid check ({}, {}): {} markers ({:.2?})", gx, gy, markers, start.elapsed());
        Ok(DeepEdgePairs::new(self.deep.derived(out)))
    }

    // ---- DRC

    /// Edge relation check. Two-layer relations need `other`.
    pub fn run_check(
        &self,
        kind: RelationKind,
        other: Option<&DeepRegion>,
        distance: f64,
        options: CheckOptions,
    ) -> GeoResult<DeepEdgePairs> {
        if !(distance >= 0.0) || !distance.is_finite() {
            return Err(GeoError::InvalidDistance(format!("check distance {}", distance)));
        }
        let start = Instant::now();
        let op = CheckLocalOperation::new(EdgeRelationFilter::new(kind, distance, options));
        let a = self.merged_deep()?;
        let mut out = if kind.is_single_layer() {
            self.store().run_local(a.layer, Intruders::Subject, &op, kind.name())?
        } else {
            let other = other.ok_or_else(|| GeoError::MissingOperand(kind.name().to_string()))?;
            let b = other.merged_deep()?;
            self.store().run_local(a.layer, Intruders::Layer(&b), &op, kind.name())?
        };
        let result = DeepEdgePairs::new(out.remove(0));
        log::info!("[DeepRegion] {} check ({}) done ({:.2?})", kind.name(), distance, start.elapsed());
        Ok(result)
    }

    pub fn width_check(&self, d: f64, options: CheckOptions) -> GeoResult<DeepEdgePairs> {
        self.run_check(RelationKind::Width, None, d, options)
    }

    pub fn space_check(&self, d: f64, options: CheckOptions) -> GeoResult<DeepEdgePairs> {
        self.run_check(RelationKind::Space, None, d, options)
    }

    pub fn notch_check(&self, d: f64, options: CheckOptions) -> GeoResult<DeepEdgePairs> {
        self.run_check(RelationKind::Notch, None, d, options)
    }

    pub fn isolated_check(&self, d: f64, options: CheckOptions) -> GeoResult<DeepEdgePairs> {
        self.run_check(RelationKind::Isolated, None, d, options)
    }

    pub fn separation_check(&self, other: &DeepRegion, d: f64, options: CheckOptions) -> GeoResult<DeepEdgePairs> {
        self.run_check(RelationKind::Separation, Some(other), d, options)
    }

    pub fn overlap_check(&self, other: &DeepRegion, d: f64, options: CheckOptions) -> GeoResult<DeepEdgePairs> {
        self.run_check(RelationKind::Overlap, Some(other), d, options)
    }

    pub fn enclosing_check(&self, other: &DeepRegion, d: f64, options: CheckOptions) -> GeoResult<DeepEdgePairs> {
        self.run_check(RelationKind::Enclosing, Some(other), d, options)
    }

    pub fn inside_check(&self, other: &DeepRegion, d: f64, options: CheckOptions) -> GeoResult<DeepEdgePairs> {
        self.run_check(RelationKind::Inside, Some(other), d, options)
    }

    // ---- selection

    /// Subjects with `min_count..=max_count` related shapes of `other` and the rest
    pub fn selected(
        &self,
        other: &DeepRegion,
        mode: InteractionMode,
        min_count: usize,
        max_count: usize,
    ) -> GeoResult<(DeepRegion, DeepRegion)> {
        let a = self.merged_deep()?;
        let b = other.merged_deep()?;
        let op = InteractingLocalOperation::new(mode, SelectionOutput::Both, min_count, max_count);
        let mut out = self
            .store()
            .run_local::<Polygon, Polygon, Polygon>(a.layer, Intruders::Layer(&b), &op, "select")?
            .into_iter()
            .map(DeepRegion::new_merged);
        match (out.next(), out.next()) {
            (Some(pos), Some(neg)) => Ok((pos, neg)),
            _ => Ok((self.empty_like(), self.empty_like())),
        }
    }

    fn selected_one(&self, other: &DeepRegion, mode: InteractionMode, output: SelectionOutput) -> GeoResult<DeepRegion> {
        let a = self.merged_deep()?;
        let b = other.merged_deep()?;
        let op = InteractingLocalOperation::new(mode, output, 1, usize::MAX);
        let mut out = self
            .store()
            .run_local::<Polygon, Polygon, Polygon>(a.layer, Intruders::Layer(&b), &op, "select")?;
        Ok(DeepRegion::new_merged(out.remove(0)))
    }

    pub fn selected_interacting(&self, other: &DeepRegion) -> GeoResult<DeepRegion> {
        self.selected_one(other, InteractionMode::Interacting, SelectionOutput::Positive)
    }

    pub fn selected_not_interacting(&self, other: &DeepRegion) -> GeoResult<DeepRegion> {
        self.selected_one(other, InteractionMode::Interacting, SelectionOutput::Negative)
    }

    pub fn selected_overlapping(&self, other: &DeepRegion) -> GeoResult<DeepRegion> {
        self.selected_one(other, InteractionMode::Overlapping, SelectionOutput::Positive)
    }

    pub fn selected_inside(&self, other: &DeepRegion) -> GeoResult<DeepRegion> {
        self.selected_one(other, InteractionMode::Inside, SelectionOutput::Positive)
    }

    pub fn selected_not_inside(&self, other: &DeepRegion) -> GeoResult<DeepRegion> {
        self.selected_one(other, InteractionMode::Inside, SelectionOutput::Negative)
    }

    pub fn selected_outside(&self, other: &DeepRegion) -> GeoResult<DeepRegion> {
        self.selected_one(other, InteractionMode::Outside, SelectionOutput::Positive)
    }

    pub fn selected_enclosing(&self, other: &DeepRegion) -> GeoResult<DeepRegion> {
        self.selected_one(other, InteractionMode::Enclosing, SelectionOutput::Positive)
    }

    /// Subjects interacting with edges
    pub fn selected_interacting_edges(&self, edges: &DeepEdges) -> GeoResult<DeepRegion> {
        let a = self.merged_deep()?;
        let op = InteractingLocalOperation::new(InteractionMode::Interacting, SelectionOutput::Positive, 1, usize::MAX);
        let mut out = self
            .store()
            .run_local::<Polygon, crate::geometry::Edge, Polygon>(a.layer, Intruders::Layer(edges.deep_layer()), &op, "select")?;
        Ok(DeepRegion::new_merged(out.remove(0)))
    }

    fn pull(&self, other: &DeepRegion, mode: InteractionMode) -> GeoResult<DeepRegion> {
        // pulled shapes keep the intruder's hierarchy and property ids
        self.store().require_same(other.store(), "pull")?;
        let a = self.merged_deep()?;
        let b = other.merged_deep()?;
        let op = PullLocalOperation::new(mode);
        let mut out = self
            .store()
            .run_local::<Polygon, Polygon, Polygon>(a.layer, Intruders::Layer(&b), &op, "pull")?;
        Ok(DeepRegion::new(out.remove(0)))
    }

    /// Shapes of `other` touching this region
    pub fn pull_interacting(&self, other: &DeepRegion) -> GeoResult<DeepRegion> {
        self.pull(other, InteractionMode::Interacting)
    }

    pub fn pull_overlapping(&self, other: &DeepRegion) -> GeoResult<DeepRegion> {
        self.pull(other, InteractionMode::Overlapping)
    }

    /// Shapes of `other` inside this region
    pub fn pull_inside(&self, other: &DeepRegion) -> GeoResult<DeepRegion> {
        self.pull(other, InteractionMode::Enclosing)
    }

    pub fn pull_interacting_edges(&self, edges: &DeepEdges) -> GeoResult<DeepEdges> {
        self.store().require_same(edges.store(), "pull")?;
        let a = self.merged_deep()?;
        let op = PullLocalOperation::new(InteractionMode::Interacting);
        let mut out = self.store().run_local::<Polygon, crate::geometry::Edge, crate::geometry::Edge>(
            a.layer,
            Intruders::Layer(edges.deep_layer()),
            &op,
            "pull",
        )?;
        Ok(DeepEdges::new(out.remove(0)))
    }

    // ---- processors

    /// Outline edges of the merged polygons
    pub fn edges(&self) -> GeoResult<DeepEdges> {
        let a = self.merged_deep()?;
        let op = ProcessorOperation::new(PolygonToEdges);
        let mut out = self.store().run_local(a.layer, Intruders::None, &op, "edges")?;
        Ok(DeepEdges::new(out.remove(0)))
    }

    /// Apply a polygon processor to the merged polygons
    pub fn processed<P: ShapeProcessor<Polygon, Polygon>>(&self, processor: P) -> GeoResult<DeepRegion> {
        let a = self.merged_deep()?;
        let separated = processor.requires_separated_variants();
        let op = ProcessorOperation::new(processor);
        let layer = if separated {
            self.store().run_separated(a.layer, &op, "processed")?
        } else {
            self.store().run_local(a.layer, Intruders::None, &op, "processed")?.remove(0)
        };
        Ok(DeepRegion::new(layer))
    }

    /// Bounding boxes of the polygons, enlarged by `dx`/`dy`
    pub fn extents(&self, dx: Coord, dy: Coord) -> GeoResult<DeepRegion> {
        self.processed(PolygonExtents { dx, dy })
    }

    // ---- flat access

    /// Number of polygons after flattening
    pub fn count(&self) -> usize {
        let inner = self.store().read();
        inner.layout.flat_shapes::<Polygon>(inner.top, self.deep.layer).len()
    }

    /// Number of polygons counted once per cell
    pub fn hier_count(&self) -> usize {
        self.deep.hier_count()
    }

    pub fn is_empty(&self) -> bool {
        self.deep.is_empty()
    }

    pub fn bbox(&self) -> Rect {
        let inner = self.store().read();
        inner.layout.bbox_on_layer(inner.top, self.deep.layer)
    }

    /// All polygons in top cell coordinates
    pub fn to_polygons(&self) -> Vec<Polygon> {
        self.deep.flat_shapes::<Polygon>()
    }

    /// Flattened and merged polygons, sorted
    pub fn to_merged_polygons(&self) -> Vec<Polygon> {
        let mut polys = merge(&self.to_polygons(), self.min_coherence(), 0);
        polys.sort();
        polys
    }

    /// Area of the merged region
    pub fn area(&self) -> f64 {
        total_area(&self.to_merged_polygons())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::geometry::{ComplexTrans, Vector};
    use crate::layout::{CellInstArray, Layout};

    fn rect(l: i64, b: i64, r: i64, t: i64) -> Polygon {
        Rect::new(l, b, r, t).to_polygon()
    }

    /// TOP with two placements of A; A holds a 10x10 box on L1, TOP a bar on L2
    fn store() -> DeepShapeStore {
        let mut layout = Layout::new(0.001);
        let top = layout.add_cell("TOP");
        let a = layout.add_cell("A");
        let l1 = layout.insert_layer("L1");
        let l2 = layout.insert_layer("L2");
        layout.insert_polygon(a, l1, &rect(0, 0, 10, 10), 0);
        layout.insert_polygon(top, l2, &rect(5, 0, 105, 5), 0);
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::identity()));
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::translation(Vector::new(100, 0))));
        DeepShapeStore::from_layout(layout, top, EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_and_across_hierarchy() {
        let s = store();
        let a = s.region("L1").unwrap();
        let b = s.region("L2").unwrap();
        let and = a.and_with(&b).unwrap();
        assert_eq!(and.to_merged_polygons(), vec![rect(5, 0, 10, 5), rect(100, 0, 105, 5)]);
    }

    #[test]
    fn test_not_keeps_untouched_parts() {
        let s = store();
        let a = s.region("L1").unwrap();
        let b = s.region("L2").unwrap();
        let not = a.not_with(&b).unwrap();
        assert!((not.area() - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_same_layer_shortcuts() {
        let s = store();
        let a = s.region("L1").unwrap();
        assert!(a.not_with(&a).unwrap().is_empty());
        assert_eq!(a.and_with(&a).unwrap().to_merged_polygons(), a.to_merged_polygons());
    }

    #[test]
    fn test_sized_keeps_hierarchy() {
        let s = store();
        let a = s.region("L1").unwrap();
        let sized = a.sized(1, 1, 2).unwrap();
        assert_eq!(sized.hier_count(), 1);
        assert_eq!(sized.to_merged_polygons(), vec![rect(-1, -1, 11, 11), rect(99, -1, 111, 11)]);
        assert!(matches!(a.sized(1, 1, 9), Err(GeoError::InvalidDistance(_))));
    }

    #[test]
    fn test_negative_grid_is_rejected() {
        let s = store();
        let a = s.region("L1").unwrap();
        assert!(matches!(a.snapped(-1), Err(GeoError::NegativeGrid(-1))));
        assert!(matches!(a.grid_check(5, -2), Err(GeoError::NegativeGrid(-2))));
    }

    #[test]
    fn test_grid_check_per_placement() {
        let mut layout = Layout::new(0.001);
        let top = layout.add_cell("TOP");
        let a = layout.add_cell("A");
        let l = layout.insert_layer("L");
        layout.insert_polygon(a, l, &rect(0, 0, 10, 10), 0);
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::identity()));
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::translation(Vector::new(101, 0))));
        let s = DeepShapeStore::from_layout(layout, top, EngineConfig::default()).unwrap();
        let markers = s.region("L").unwrap().grid_check(5, 5).unwrap();
        assert_eq!(markers.count(), 4);
    }

    #[test]
    fn test_two_layer_check_needs_operand() {
        let s = store();
        let a = s.region("L1").unwrap();
        let err = a.run_check(RelationKind::Separation, None, 5.0, CheckOptions::default()).unwrap_err();
        assert!(matches!(err, GeoError::MissingOperand(_)));
        assert!(matches!(
            a.space_check(-1.0, CheckOptions::default()),
            Err(GeoError::InvalidDistance(_))
        ));
    }

    #[test]
    fn test_pull_interacting_delivers_other_shapes() {
        let s = store();
        let a = s.region("L1").unwrap();
        let b = s.region("L2").unwrap();
        let pulled = a.pull_interacting(&b).unwrap();
        assert_eq!(pulled.to_merged_polygons(), vec![rect(5, 0, 105, 5)]);
    }

    #[test]
    fn test_pull_across_stores_is_rejected() {
        let a = store().region("L1").unwrap();
        let b = store().region("L2").unwrap();
        assert!(matches!(a.pull_interacting(&b), Err(GeoError::LayoutMismatch(_))));
        assert!(matches!(a.pull_inside(&b), Err(GeoError::LayoutMismatch(_))));
        let edges = b.edges().unwrap();
        assert!(matches!(a.pull_interacting_edges(&edges), Err(GeoError::LayoutMismatch(_))));
        assert!(matches!(edges.pull_interacting(&a), Err(GeoError::LayoutMismatch(_))));
    }

    #[test]
    fn test_or_across_stores_maps_properties() {
        let own = store();
        let mut layout = Layout::new(0.001);
        let top = layout.add_cell("OTHER");
        let l = layout.insert_layer("L");
        let vdd = crate::layout::PropertySet::from([("net".to_string(), "VDD".to_string())]);
        let id = layout.properties_mut().prop_id(vdd.clone());
        layout.insert_polygon(top, l, &rect(200, 0, 210, 10), id);
        let other = DeepShapeStore::from_layout(layout, top, EngineConfig::default()).unwrap();

        // register a different set first so that the ids of both stores differ
        let gnd = crate::layout::PropertySet::from([("net".to_string(), "GND".to_string())]);
        let gnd_id = own.write().layout.properties_mut().prop_id(gnd);

        let or = own.region("L1").unwrap().or_with(&other.region("L").unwrap()).unwrap();
        assert!(or.store().is_same(&own));
        assert_eq!(or.to_polygons().len(), 3);

        let inner = own.read();
        let shapes = inner.layout.flat_shapes::<Polygon>(inner.top, or.deep.layer);
        let (_, mapped) = shapes.iter().find(|(p, _)| *p == rect(200, 0, 210, 10)).unwrap();
        assert_ne!(*mapped, gnd_id);
        assert_eq!(inner.layout.properties().properties(*mapped), Some(&vdd));
    }

    #[test]
    fn test_or_across_stores_from_both_sides_concurrently() {
        let a = store().region("L1").unwrap();
        let b = store().region("L2").unwrap();
        std::thread::scope(|scope| {
            let ab = scope.spawn(|| (0..20).all(|_| a.or_with(&b).is_ok()));
            let ba = scope.spawn(|| (0..20).all(|_| b.or_with(&a).is_ok()));
            assert!(ab.join().unwrap());
            assert!(ba.join().unwrap());
        });
        assert_eq!(a.or_with(&b).unwrap().to_polygons().len(), 3);
    }

    #[test]
    fn test_edges_of_region() {
        let s = store();
        let edges = s.region("L1").unwrap().edges().unwrap();
        assert_eq!(edges.count(), 8);
    }
}

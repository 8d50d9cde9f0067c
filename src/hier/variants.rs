//! Variant collection, separation and per-variant shape commit

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use super::reducer::TransformReducer;
use crate::error::GeoResult;
use crate::geometry::ComplexTrans;
use crate::layout::{CellIndex, CellInstArray, LayerIndex, Layout, ShapeBuffer};

/// Original cell -> (variant -> cell carrying that variant after separation)
pub type VariantTable = BTreeMap<CellIndex, BTreeMap<ComplexTrans, CellIndex>>;

/// Per-cell, per-variant shapes waiting to be committed
pub type VariantShapes = BTreeMap<CellIndex, BTreeMap<ComplexTrans, ShapeBuffer>>;

/// Collects the reduced transformations under which each cell is placed
#[derive(Debug)]
pub struct VariantsCollector {
    reducer: Arc<dyn TransformReducer>,
    /// Explicit variants with placement counts. Cells that only ever see the
    /// identity are absent.
    variants: BTreeMap<CellIndex, BTreeMap<ComplexTrans, usize>>,
    called: BTreeSet<CellIndex>,
}

impl VariantsCollector {
    pub fn new(reducer: Arc<dyn TransformReducer>) -> Self {
        Self { reducer, variants: BTreeMap::new(), called: BTreeSet::new() }
    }

    pub fn reducer(&self) -> &Arc<dyn TransformReducer> {
        &self.reducer
    }

    /// Reduced transformations of one placement element subset.
    ///
    /// Translation-invariant reducers see all array elements alike; the
    /// others need every element because each one may land on a different
    /// residue.
    fn reduced_element_transforms(&self, inst: &CellInstArray) -> Vec<ComplexTrans> {
        if self.reducer.is_translation_invariant() {
            vec![self.reducer.reduce(&inst.trans)]
        } else {
            inst.element_transforms().map(|t| self.reducer.reduce(&t)).collect()
        }
    }

    /// Compute the variants of all cells called from `top`. The layout must be updated.
    pub fn collect(&mut self, layout: &Layout, top: CellIndex) {
        let start = Instant::now();
        log::debug!("[Variants] Collecting variants below '{}' ({:?})", layout.cell_name(top), self.reducer.kind());

        self.called = layout.called_cells(top);
        self.called.insert(top);

        let mut all: BTreeMap<CellIndex, BTreeMap<ComplexTrans, usize>> = BTreeMap::new();
        all.entry(top).or_default().insert(ComplexTrans::identity(), 1);

        for &ci in layout.top_down_order() {
            if ci == top || !self.called.contains(&ci) {
                continue;
            }
            // reduced instance transformations grouped by parent
            let mut by_parent: BTreeMap<CellIndex, BTreeMap<ComplexTrans, usize>> = BTreeMap::new();
            for &(parent, k) in layout.parent_instances(ci) {
                if !self.called.contains(&parent) {
                    continue;
                }
                let inst = &layout.cell(parent).instances()[k];
                let per_element = if self.reducer.is_translation_invariant() { inst.size() } else { 1 };
                let bucket = by_parent.entry(parent).or_default();
                for rt in self.reduced_element_transforms(inst) {
                    *bucket.entry(rt).or_default() += per_element;
                }
            }

            let mut vars: BTreeMap<ComplexTrans, usize> = BTreeMap::new();
            for (parent, insts) in &by_parent {
                let Some(parent_vars) = all.get(parent) else {
                    continue;
                };
                for (pv, pc) in parent_vars {
                    for (it, ic) in insts {
                        let v = self.reducer.reduce(&(*pv * *it));
                        *vars.entry(v).or_default() += pc * ic;
                    }
                }
            }
            all.insert(ci, vars);
        }

        all.retain(|_, vars| vars.len() > 1 || vars.keys().any(|v| !v.is_identity()));
        self.variants = all;

        log::info!(
            "[Variants] {} of {} cells carry explicit variants ({:.2?})",
            self.variants.len(),
            self.called.len(),
            start.elapsed()
        );
    }

    /// Cells reachable from the collection start (including it)
    pub fn called_cells(&self) -> &BTreeSet<CellIndex> {
        &self.called
    }

    /// All variants of a cell; the identity for cells without explicit variants
    pub fn variants(&self, ci: CellIndex) -> Vec<ComplexTrans> {
        match self.variants.get(&ci) {
            Some(vars) => vars.keys().copied().collect(),
            None => vec![ComplexTrans::identity()],
        }
    }

    /// Placement counts per variant
    pub fn variant_counts(&self, ci: CellIndex) -> Option<&BTreeMap<ComplexTrans, usize>> {
        self.variants.get(&ci)
    }

    pub fn has_variants(&self, ci: CellIndex) -> bool {
        self.variants.get(&ci).is_some_and(|v| v.len() > 1)
    }

    pub fn variant_cells(&self) -> impl Iterator<Item = CellIndex> + '_ {
        self.variants.iter().filter(|(_, v)| v.len() > 1).map(|(ci, _)| *ci)
    }

    /// The one variant of a cell. Panics if the cell still has several.
    pub fn single_variant_transformation(&self, ci: CellIndex) -> ComplexTrans {
        match self.variants.get(&ci) {
            None => ComplexTrans::identity(),
            Some(vars) => {
                assert!(
                    vars.len() == 1,
                    "cell {} has {} variants, separate variants before asking for a single one",
                    ci,
                    vars.len()
                );
                vars.keys().next().copied().unwrap_or_default()
            }
        }
    }

    fn child_variant(&self, parent_var: &ComplexTrans, element: &ComplexTrans) -> ComplexTrans {
        self.reducer.reduce(&(*parent_var * self.reducer.reduce(element)))
    }

    /// Turn every multi-variant cell into one physical cell per variant and
    /// rewire the instances. The layout is updated afterwards.
    pub fn separate_variants(&mut self, layout: &mut Layout, table: Option<&mut VariantTable>) -> GeoResult<()> {
        let start = Instant::now();
        log::debug!("[Variants] Separating variants");

        let order = layout.bottom_up_order();
        let mut mapping: VariantTable = BTreeMap::new();
        let mut own_variant: BTreeMap<CellIndex, ComplexTrans> = BTreeMap::new();
        let mut clones = 0usize;

        for &ci in &order {
            let Some(vars) = self.variants.get(&ci) else {
                continue;
            };
            let mut targets = BTreeMap::new();
            for (i, v) in vars.keys().enumerate() {
                let target = if i == 0 {
                    ci
                } else {
                    clones += 1;
                    layout.clone_cell(ci)
                };
                targets.insert(*v, target);
                own_variant.insert(target, *v);
            }
            mapping.insert(ci, targets);
        }

        // instance lists of all originals and clones, resolved per own variant
        let mut rewired: Vec<(CellIndex, Vec<CellInstArray>)> = Vec::new();
        for ci in 0..layout.num_cells() {
            let is_clone = own_variant.contains_key(&ci) && !self.called.contains(&ci);
            if !self.called.contains(&ci) && !is_clone {
                continue;
            }
            let pv = own_variant.get(&ci).copied().unwrap_or_default();
            let cell = layout.cell(ci);
            let mut changed = false;
            let mut insts = Vec::with_capacity(cell.instances().len());
            for inst in cell.instances() {
                let Some(targets) = mapping.get(&inst.cell) else {
                    insts.push(inst.clone());
                    continue;
                };
                let resolve = |t: &ComplexTrans| {
                    let cv = self.child_variant(&pv, t);
                    targets.get(&cv).copied().unwrap_or(inst.cell)
                };
                let resolved: Vec<CellIndex> = if self.reducer.is_translation_invariant() {
                    vec![resolve(&inst.trans)]
                } else {
                    inst.element_transforms().map(|t| resolve(&t)).collect()
                };
                let first = resolved[0];
                if resolved.iter().all(|c| *c == first) {
                    let mut redirected = inst.clone();
                    redirected.cell = first;
                    changed |= first != inst.cell;
                    insts.push(redirected);
                } else {
                    for (single, target) in inst.exploded().into_iter().zip(resolved) {
                        insts.push(CellInstArray { cell: target, ..single });
                    }
                    changed = true;
                }
            }
            if changed {
                rewired.push((ci, insts));
            }
        }
        for (ci, insts) in rewired {
            layout.replace_instances(ci, insts);
        }
        layout.update()?;

        // every cell now has exactly one variant
        for (target, v) in &own_variant {
            self.called.insert(*target);
            let mut single = BTreeMap::new();
            single.insert(*v, 1);
            self.variants.insert(*target, single);
        }
        self.variants.retain(|_, vars| vars.keys().any(|v| !v.is_identity()));

        log::info!(
            "[Variants] Separated {} cells into {} new cells ({:.2?})",
            mapping.values().filter(|m| m.len() > 1).count(),
            clones,
            start.elapsed()
        );

        if let Some(table) = table {
            table.extend(mapping);
        }
        Ok(())
    }

    /// Insert per-variant shapes into `layer` without separating cells.
    ///
    /// Shapes of a cell with a single variant (or identical shapes for all of
    /// its variants) go into the cell itself. Anything else is transformed
    /// into the parents' variant buckets and committed there.
    pub fn commit_shapes(&self, layout: &mut Layout, layer: LayerIndex, to_commit: VariantShapes) -> GeoResult<()> {
        let start = Instant::now();
        let mut pending = to_commit;
        let mut inserts: Vec<(CellIndex, ShapeBuffer)> = Vec::new();
        let mut propagated = 0usize;

        for ci in layout.bottom_up_order() {
            let Some(buckets) = pending.remove(&ci) else {
                continue;
            };
            let vars = self.variants(ci);

            let uniform = if vars.len() <= 1 {
                true
            } else {
                let mut normalized = vars.iter().map(|v| buckets.get(v).map(|b| b.normalized()).unwrap_or_default());
                let first = normalized.next().unwrap_or_default();
                normalized.all(|b| b == first)
            };

            if uniform {
                let buf = match vars.len() {
                    1 => buckets.into_values().fold(ShapeBuffer::new(), |mut acc, b| {
                        acc.insert_transformed(&b, &ComplexTrans::identity());
                        acc
                    }),
                    _ => vars.first().and_then(|v| buckets.get(v)).cloned().unwrap_or_default(),
                };
                if !buf.is_empty() {
                    inserts.push((ci, buf));
                }
                continue;
            }

            for &(parent, k) in layout.parent_instances(ci) {
                if !self.called.contains(&parent) {
                    continue;
                }
                let inst = &layout.cell(parent).instances()[k];
                for pv in self.variants(parent) {
                    for t in inst.element_transforms() {
                        let cv = self.child_variant(&pv, &t);
                        if let Some(buf) = buckets.get(&cv) {
                            if buf.is_empty() {
                                continue;
                            }
                            pending
                                .entry(parent)
                                .or_default()
                                .entry(pv)
                                .or_default()
                                .insert_transformed(buf, &t);
                            propagated += buf.len();
                        }
                    }
                }
            }
        }

        let cells = inserts.len();
        for (ci, buf) in inserts {
            layout.insert_buffer(ci, layer, &buf);
        }
        layout.update()?;

        log::info!(
            "[Variants] Committed shapes into {} cells, {} shapes propagated to parents ({:.2?})",
            cells,
            propagated,
            start.elapsed()
        );
        Ok(())
    }
}

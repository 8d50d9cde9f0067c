//! The hierarchical local processor
//!
//! Runs a `LocalOperation` over a subject layer and any number of intruder
//! layers without flattening the hierarchy:
//!
//! 1. Context phase (top-down): every subject cell collects the distinct
//!    combinations of variant, intruder instances and intruder shapes it
//!    sees from its parents. Identical combinations reached over different
//!    paths share one context.
//! 2. Result phase (bottom-up): the operation runs once per context. Results
//!    shared by all contexts of a cell stay in the cell; the rest drops into
//!    the parent contexts that created them.
//!
//! Intruders may come from the subject layout itself or from a foreign
//! layout whose top cell is aligned with the subject top.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::jobs::JobPool;
use super::reducer::TransformReducer;
use super::variants::VariantsCollector;
use crate::config::EngineConfig;
use crate::error::GeoResult;
use crate::geometry::{scan_pairs2, ComplexTrans, Coord, Rect};
use crate::layout::{CellIndex, LayerIndex, Layout, LayoutShape, PropId, ShapeBuffer};

/// Output container of local operations
pub type ResultSet<T> = BTreeSet<(T, PropId)>;

/// What happens to a context without any intruders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnEmptyIntruderHint {
    /// Run the operation anyway
    Ignore,
    /// Copy the subjects to the first output
    Copy,
    /// Copy the subjects to the second output
    CopyToSecond,
    /// Produce nothing
    Drop,
}

/// Source of an intruder slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IntruderLayer {
    /// The subject layer itself (self interactions)
    Subject,
    /// A layer of the intruder layout
    Layer(LayerIndex),
}

/// Subjects of one cell, their intruders and which intruders touch which subject
#[derive(Debug, Clone)]
pub struct ShapeInteractions<TS, TI> {
    subjects: Vec<(TS, PropId)>,
    intruders: Vec<(usize, TI, PropId)>,
    interactions: Vec<Vec<usize>>,
}

impl<TS: LayoutShape, TI: LayoutShape> ShapeInteractions<TS, TI> {
    /// Pair subjects and intruders whose boxes come within `dist`.
    ///
    /// `same[j] == Some(i)` marks intruder `j` as the subject `i` itself;
    /// such pairs are not reported.
    pub fn new(
        subjects: Vec<(TS, PropId)>,
        intruders: Vec<(usize, TI, PropId)>,
        dist: Coord,
        same: &[Option<usize>],
    ) -> Self {
        let sb: Vec<Rect> = subjects.iter().map(|(s, _)| s.bbox()).collect();
        let ib: Vec<Rect> = intruders.iter().map(|(_, s, _)| s.bbox()).collect();
        let mut interactions = vec![Vec::new(); subjects.len()];
        for (i, j) in scan_pairs2(&sb, &ib, dist) {
            if same.get(j).copied().flatten() == Some(i) {
                continue;
            }
            interactions[i].push(j);
        }
        Self { subjects, intruders, interactions }
    }

    pub fn num_subjects(&self) -> usize {
        self.subjects.len()
    }

    pub fn subjects(&self) -> &[(TS, PropId)] {
        &self.subjects
    }

    pub fn subject(&self, i: usize) -> &(TS, PropId) {
        &self.subjects[i]
    }

    pub fn num_intruders(&self) -> usize {
        self.intruders.len()
    }

    /// `(slot, shape, property id)` of an intruder
    pub fn intruder(&self, j: usize) -> &(usize, TI, PropId) {
        &self.intruders[j]
    }

    pub fn intruder_ids(&self, i: usize) -> &[usize] {
        &self.interactions[i]
    }

    pub fn intruders_of(&self, i: usize) -> impl Iterator<Item = &(usize, TI, PropId)> + '_ {
        self.interactions[i].iter().map(move |j| &self.intruders[*j])
    }

    pub fn has_intruders(&self) -> bool {
        !self.intruders.is_empty()
    }
}

/// A local operation: the strategy evaluated per cell context
pub trait LocalOperation<TS, TI, TR>: Send + Sync {
    fn description(&self) -> String;

    /// Interaction radius in top cell units. Must be an upper bound.
    fn dist(&self) -> Coord;

    fn on_empty_intruder_hint(&self) -> OnEmptyIntruderHint {
        OnEmptyIntruderHint::Ignore
    }

    fn num_outputs(&self) -> usize {
        1
    }

    /// Reducer for variant-dependent operations
    fn vars(&self) -> Option<Arc<dyn TransformReducer>> {
        None
    }

    /// True if variants must be separated into physical cells before running
    fn requires_separated_variants(&self) -> bool {
        false
    }

    /// Result form of a subject, used by the copy hints
    fn copy_subject(&self, _subject: &TS, _prop: PropId, _out: &mut ResultSet<TR>) {}

    fn compute_local(&self, interactions: &ShapeInteractions<TS, TI>, variant: &ComplexTrans, results: &mut [ResultSet<TR>]);
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ContextKey<TI> {
    variant: ComplexTrans,
    insts: BTreeSet<(CellIndex, ComplexTrans)>,
    shapes: BTreeSet<(usize, TI, PropId)>,
}

struct ContextData<TR> {
    /// (parent cell, parent context, element transformation)
    drops: BTreeSet<(CellIndex, usize, ComplexTrans)>,
    propagated: Mutex<Vec<ResultSet<TR>>>,
}

impl<TR: LayoutShape> ContextData<TR> {
    fn new(outputs: usize) -> Self {
        Self { drops: BTreeSet::new(), propagated: Mutex::new(vec![ResultSet::new(); outputs]) }
    }
}

type ChildContext<TI> = (CellIndex, ContextKey<TI>, (CellIndex, usize, ComplexTrans));

/// Results per output and cell
#[derive(Debug, Clone)]
pub struct LocalResults<TR> {
    outputs: Vec<BTreeMap<CellIndex, ResultSet<TR>>>,
}

impl<TR: LayoutShape> LocalResults<TR> {
    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn output(&self, o: usize) -> &BTreeMap<CellIndex, ResultSet<TR>> {
        &self.outputs[o]
    }

    /// Number of result shapes over all outputs and cells
    pub fn len(&self) -> usize {
        self.outputs.iter().flat_map(|m| m.values()).map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert output `o` into `layers[o]`
    pub fn insert_into(self, layout: &mut Layout, layers: &[LayerIndex]) -> GeoResult<()> {
        for (o, per_cell) in self.outputs.into_iter().enumerate() {
            let Some(&li) = layers.get(o) else {
                continue;
            };
            for (ci, set) in per_cell {
                let mut buf = ShapeBuffer::new();
                for (r, p) in set {
                    r.push_into(p, &mut buf);
                }
                layout.insert_buffer(ci, li, &buf);
            }
        }
        layout.update()
    }
}

struct Run<'a, TS, TI, TR> {
    subject: &'a Layout,
    subject_layer: LayerIndex,
    intruder: &'a Layout,
    foreign: bool,
    slots: Vec<LayerIndex>,
    self_slot: Option<usize>,
    op: &'a dyn LocalOperation<TS, TI, TR>,
    reducer: Option<Arc<dyn TransformReducer>>,
    scale: BTreeMap<CellIndex, f64>,
    called: BTreeSet<CellIndex>,
    subject_breakouts: &'a BTreeSet<CellIndex>,
    intruder_breakouts: &'a BTreeSet<CellIndex>,
    contexts: BTreeMap<CellIndex, IndexMap<ContextKey<TI>, ContextData<TR>>>,
}

impl<TS: LayoutShape, TI: LayoutShape, TR: LayoutShape> Run<'_, TS, TI, TR> {
    /// Interaction radius in the frame of a cell
    fn local_dist(&self, ci: CellIndex) -> Coord {
        let s = self.scale.get(&ci).copied().unwrap_or(1.0);
        (self.op.dist() as f64 * s).ceil() as Coord
    }

    fn intruder_bbox(&self, ci: CellIndex) -> Rect {
        self.slots.iter().fold(Rect::empty(), |r, l| r.union(&self.intruder.bbox_on_layer(ci, *l)))
    }

    fn local_intruders(&self, ci: CellIndex, skip_self: bool) -> Vec<(usize, TI, PropId)> {
        let cell = self.intruder.cell(ci);
        let mut out = Vec::new();
        for (slot, l) in self.slots.iter().enumerate() {
            if skip_self && Some(slot) == self.self_slot {
                continue;
            }
            if let Some(shapes) = cell.shapes(*l) {
                out.extend(TI::read_from(shapes).into_iter().map(|(s, p)| (slot, s, p)));
            }
        }
        out
    }

    /// Intruder shapes below `cell` placed with `trans`, touching `region`
    fn collect_subtree(
        &self,
        cell: CellIndex,
        trans: &ComplexTrans,
        region: &Rect,
        skip_self: bool,
        out: &mut Vec<(usize, TI, PropId)>,
    ) {
        if self.intruder_breakouts.contains(&cell) {
            return;
        }
        let b = self.intruder_bbox(cell);
        if b.is_empty() || !b.transformed(trans).touches(region) {
            return;
        }
        for (slot, s, p) in self.local_intruders(cell, skip_self) {
            let st = s.transform(trans);
            if st.bbox().touches(region) {
                out.push((slot, st, p));
            }
        }
        for inst in self.intruder.cell(cell).instances() {
            for et in inst.element_transforms() {
                self.collect_subtree(inst.cell, &(*trans * et), region, skip_self, out);
            }
        }
    }

    /// Add the intruder content of `cell` (placed into the parent frame with
    /// `trans`) that touches `region` to a child context. Instances fully
    /// inside the region stay instances; others are opened up one level.
    fn refine_into(
        &self,
        cell: CellIndex,
        trans: &ComplexTrans,
        region: &Rect,
        to_child: &ComplexTrans,
        shapes: &mut BTreeSet<(usize, TI, PropId)>,
        insts: &mut BTreeSet<(CellIndex, ComplexTrans)>,
    ) {
        if self.intruder_breakouts.contains(&cell) {
            return;
        }
        let b = self.intruder_bbox(cell);
        if b.is_empty() {
            return;
        }
        let b = b.transformed(trans);
        if !b.touches(region) {
            return;
        }
        let into_child = *to_child * *trans;
        if region.contains_rect(&b) {
            insts.insert((cell, into_child));
            return;
        }
        for (slot, s, p) in self.local_intruders(cell, false) {
            if s.transform(trans).bbox().touches(region) {
                shapes.insert((slot, s.transform(&into_child), p));
            }
        }
        for inst in self.intruder.cell(cell).instances() {
            for et in inst.element_transforms() {
                self.refine_into(inst.cell, &(*trans * et), region, to_child, shapes, insts);
            }
        }
    }

    fn child_contexts(&self, cell: CellIndex, ctx: usize) -> Vec<ChildContext<TI>> {
        let Some((key, _)) = self.contexts.get(&cell).and_then(|m| m.get_index(ctx)) else {
            return Vec::new();
        };
        let dist = self.local_dist(cell);

        let mut elements = Vec::new();
        for (k, inst) in self.subject.cell(cell).instances().iter().enumerate() {
            if !self.called.contains(&inst.cell) || self.subject_breakouts.contains(&inst.cell) {
                continue;
            }
            let cb = self.subject.bbox_on_layer(inst.cell, self.subject_layer);
            if cb.is_empty() {
                continue;
            }
            for (e, et) in inst.element_transforms().enumerate() {
                elements.push((k, e, inst.cell, et, cb.transformed(&et).enlarged(dist, dist)));
            }
        }
        if elements.is_empty() {
            return Vec::new();
        }

        // sibling placements seen by each element (same layout only)
        let mut siblings = Vec::new();
        if !self.foreign {
            for (k, inst) in self.intruder.cell(cell).instances().iter().enumerate() {
                let ib = self.intruder_bbox(inst.cell);
                if ib.is_empty() {
                    continue;
                }
                for (e, et) in inst.element_transforms().enumerate() {
                    siblings.push((k, e, inst.cell, et, ib.transformed(&et)));
                }
            }
        }
        let regions: Vec<Rect> = elements.iter().map(|e| e.4).collect();
        let sibling_boxes: Vec<Rect> = siblings.iter().map(|s| s.4).collect();
        let mut siblings_of: Vec<Vec<usize>> = vec![Vec::new(); elements.len()];
        for (i, j) in scan_pairs2(&regions, &sibling_boxes, 0) {
            let (k, e, ..) = elements[i];
            if siblings[j].0 == k && siblings[j].1 == e {
                continue;
            }
            siblings_of[i].push(j);
        }
        let local = if self.foreign { Vec::new() } else { self.local_intruders(cell, false) };

        elements
            .iter()
            .enumerate()
            .map(|(i, &(_, _, child, et, region))| {
                let to_child = et.inverted();
                let variant = match &self.reducer {
                    Some(r) => r.reduce(&(key.variant * r.reduce(&et))),
                    None => ComplexTrans::identity(),
                };
                let mut shapes = BTreeSet::new();
                let mut insts = BTreeSet::new();
                for (slot, s, p) in key.shapes.iter().chain(local.iter()) {
                    if s.bbox().touches(&region) {
                        shapes.insert((*slot, s.transform(&to_child), *p));
                    }
                }
                for (c, t) in &key.insts {
                    self.refine_into(*c, t, &region, &to_child, &mut shapes, &mut insts);
                }
                for &j in &siblings_of[i] {
                    let (_, _, c, st, _) = siblings[j];
                    self.refine_into(c, &st, &region, &to_child, &mut shapes, &mut insts);
                }
                (child, ContextKey { variant, insts, shapes }, (cell, ctx, et))
            })
            .collect()
    }

    fn compute_context(&self, cell: CellIndex, key: &ContextKey<TI>, data: &ContextData<TR>) -> Vec<ResultSet<TR>> {
        let n = self.op.num_outputs();
        let mut results = vec![ResultSet::new(); n];
        let subjects: Vec<(TS, PropId)> = self
            .subject
            .cell(cell)
            .shapes(self.subject_layer)
            .map(TS::read_from)
            .unwrap_or_default();

        if !subjects.is_empty() {
            let dist = self.local_dist(cell);
            let region = subjects
                .iter()
                .fold(Rect::empty(), |r, (s, _)| r.union(&s.bbox()))
                .enlarged(dist, dist);

            let mut intruders: Vec<(usize, TI, PropId)> = Vec::new();
            let mut same: Vec<Option<usize>> = Vec::new();
            for (slot, s, p) in &key.shapes {
                if s.bbox().touches(&region) {
                    intruders.push((*slot, s.clone(), *p));
                }
            }
            for (c, t) in &key.insts {
                self.collect_subtree(*c, t, &region, false, &mut intruders);
            }
            if !self.foreign {
                let cell_ref = self.intruder.cell(cell);
                for (slot, l) in self.slots.iter().enumerate() {
                    let Some(shapes) = cell_ref.shapes(*l) else {
                        continue;
                    };
                    let local = TI::read_from(shapes);
                    let is_self = Some(slot) == self.self_slot && local.len() == subjects.len();
                    for (k, (s, p)) in local.into_iter().enumerate() {
                        if is_self {
                            same.resize(intruders.len(), None);
                            same.push(Some(k));
                        }
                        intruders.push((slot, s, p));
                    }
                }
                // self interactions with child content are found from the child side
                for inst in cell_ref.instances() {
                    for et in inst.element_transforms() {
                        self.collect_subtree(inst.cell, &et, &region, true, &mut intruders);
                    }
                }
            }
            same.resize(intruders.len(), None);

            let hint = self.op.on_empty_intruder_hint();
            if intruders.is_empty() && hint != OnEmptyIntruderHint::Ignore {
                let target = match hint {
                    OnEmptyIntruderHint::Copy => results.get_mut(0),
                    OnEmptyIntruderHint::CopyToSecond => results.get_mut(1),
                    _ => None,
                };
                if let Some(out) = target {
                    for (s, p) in &subjects {
                        self.op.copy_subject(s, *p, out);
                    }
                }
            } else {
                let interactions = ShapeInteractions::new(subjects, intruders, dist, &same);
                self.op.compute_local(&interactions, &key.variant, &mut results);
            }
        }

        let propagated = std::mem::take(&mut *data.propagated.lock());
        for (o, set) in propagated.into_iter().enumerate() {
            if let Some(r) = results.get_mut(o) {
                r.extend(set);
            }
        }
        results
    }

    /// Results of all contexts of a cell; returns those common to all of them
    fn compute_cell(&self, cell: CellIndex) -> Vec<ResultSet<TR>> {
        let Some(ctxs) = self.contexts.get(&cell) else {
            return Vec::new();
        };
        let per_ctx: Vec<Vec<ResultSet<TR>>> =
            ctxs.iter().map(|(key, data)| self.compute_context(cell, key, data)).collect();

        let n = self.op.num_outputs();
        let common: Vec<ResultSet<TR>> = (0..n)
            .map(|o| {
                let mut it = per_ctx.iter();
                let first = it.next().map(|r| r[o].clone()).unwrap_or_default();
                it.fold(first, |acc, r| acc.intersection(&r[o]).cloned().collect())
            })
            .collect();

        for ((_, data), results) in ctxs.iter().zip(per_ctx) {
            if data.drops.is_empty() {
                continue;
            }
            let leftovers: Vec<Vec<(TR, PropId)>> = results
                .into_iter()
                .enumerate()
                .map(|(o, set)| set.into_iter().filter(|r| !common[o].contains(r)).collect())
                .collect();
            if leftovers.iter().all(|l| l.is_empty()) {
                continue;
            }
            for (parent, pctx, t) in &data.drops {
                let Some((_, target)) = self.contexts.get(parent).and_then(|m| m.get_index(*pctx)) else {
                    continue;
                };
                let mut propagated = target.propagated.lock();
                for (o, items) in leftovers.iter().enumerate() {
                    for (r, p) in items {
                        propagated[o].insert((r.transform(t), *p));
                    }
                }
            }
        }
        common
    }

    /// Called cells grouped by their distance from the top
    fn levels_top_down(&self) -> Vec<Vec<CellIndex>> {
        let mut depth: BTreeMap<CellIndex, usize> = BTreeMap::new();
        for &ci in self.subject.top_down_order() {
            if !self.called.contains(&ci) {
                continue;
            }
            let d = self
                .subject
                .parent_instances(ci)
                .iter()
                .filter_map(|(p, _)| depth.get(p))
                .map(|d| d + 1)
                .max()
                .unwrap_or(0);
            depth.insert(ci, d);
        }
        group_levels(depth)
    }

    /// Called cells grouped by their distance from the leaves
    fn levels_bottom_up(&self) -> Vec<Vec<CellIndex>> {
        let mut height: BTreeMap<CellIndex, usize> = BTreeMap::new();
        for ci in self.subject.bottom_up_order() {
            if !self.called.contains(&ci) {
                continue;
            }
            let h = self
                .subject
                .cell(ci)
                .instances()
                .iter()
                .filter_map(|inst| height.get(&inst.cell))
                .map(|h| h + 1)
                .max()
                .unwrap_or(0);
            height.insert(ci, h);
        }
        group_levels(height)
    }
}

fn group_levels(levels: BTreeMap<CellIndex, usize>) -> Vec<Vec<CellIndex>> {
    let mut groups: Vec<Vec<CellIndex>> = Vec::new();
    for (ci, l) in levels {
        if groups.len() <= l {
            groups.resize(l + 1, Vec::new());
        }
        groups[l].push(ci);
    }
    groups
}

/// Drives local operations over a hierarchy
#[derive(Debug, Clone, Default)]
pub struct LocalProcessor<'a> {
    foreign: Option<(&'a Layout, CellIndex)>,
    threads: usize,
    report_progress: bool,
    description: String,
    subject_breakouts: BTreeSet<CellIndex>,
    intruder_breakouts: BTreeSet<CellIndex>,
}

impl<'a> LocalProcessor<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take intruders from another layout whose top is `top`
    pub fn with_foreign_intruders(layout: &'a Layout, top: CellIndex) -> Self {
        Self { foreign: Some((layout, top)), ..Self::default() }
    }

    pub fn set_threads(&mut self, threads: usize) {
        self.threads = threads;
    }

    pub fn set_report_progress(&mut self, on: bool) {
        self.report_progress = on;
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn set_subject_breakouts(&mut self, cells: BTreeSet<CellIndex>) {
        self.subject_breakouts = cells;
    }

    pub fn set_intruder_breakouts(&mut self, cells: BTreeSet<CellIndex>) {
        self.intruder_breakouts = cells;
    }

    pub fn apply_config(&mut self, config: &EngineConfig) {
        self.threads = config.threads;
        self.report_progress = config.report_progress;
        if !config.description.is_empty() {
            self.description = config.description.clone();
        }
    }

    /// Run the operation and insert output `o` into `outputs[o]`.
    ///
    /// Operations that need physically separated variants get them here,
    /// which may add cells to `subject`.
    pub fn run<TS, TI, TR>(
        &self,
        subject: &mut Layout,
        top: CellIndex,
        subject_layer: LayerIndex,
        intruders: &[IntruderLayer],
        op: &dyn LocalOperation<TS, TI, TR>,
        outputs: &[LayerIndex],
    ) -> GeoResult<()>
    where
        TS: LayoutShape,
        TI: LayoutShape,
        TR: LayoutShape,
    {
        subject.update()?;
        if op.requires_separated_variants() {
            if let Some(reducer) = op.vars() {
                let mut vc = VariantsCollector::new(reducer);
                vc.collect(subject, top);
                vc.separate_variants(subject, None)?;
            }
        }
        let results = self.compute(subject, top, subject_layer, intruders, op);
        results.insert_into(subject, outputs)
    }

    /// Run the operation and return the results per output and cell.
    /// The subject (and foreign intruder) layout must be updated.
    pub fn compute<TS, TI, TR>(
        &self,
        subject: &Layout,
        top: CellIndex,
        subject_layer: LayerIndex,
        intruders: &[IntruderLayer],
        op: &dyn LocalOperation<TS, TI, TR>,
    ) -> LocalResults<TR>
    where
        TS: LayoutShape,
        TI: LayoutShape,
        TR: LayoutShape,
    {
        let start = Instant::now();
        let description = if self.description.is_empty() { op.description() } else { self.description.clone() };
        log::debug!("[HierProc] {}: start (threads={})", description, self.threads);

        let (intruder, intruder_top, foreign) = match self.foreign {
            Some((layout, itop)) => (layout, itop, true),
            None => (subject, top, false),
        };

        let mut slots = Vec::with_capacity(intruders.len());
        let mut self_slot = None;
        for (i, il) in intruders.iter().enumerate() {
            match il {
                IntruderLayer::Subject => {
                    assert!(!foreign, "self intruders are not available with a foreign intruder layout");
                    slots.push(subject_layer);
                    self_slot.get_or_insert(i);
                }
                IntruderLayer::Layer(l) => {
                    if !foreign && *l == subject_layer {
                        self_slot.get_or_insert(i);
                    }
                    slots.push(*l);
                }
            }
        }

        let mut called = subject.called_cells(top);
        called.insert(top);

        // 1/mag accumulated down the hierarchy widens the radius in small-scaled cells
        let mut scale: BTreeMap<CellIndex, f64> = BTreeMap::new();
        scale.insert(top, 1.0);
        for &ci in subject.top_down_order() {
            if ci == top || !called.contains(&ci) {
                continue;
            }
            let s = subject
                .parent_instances(ci)
                .iter()
                .filter_map(|(p, k)| {
                    let ps = scale.get(p)?;
                    Some(ps / subject.cell(*p).instances()[*k].trans.mag)
                })
                .fold(1.0_f64, f64::max);
            scale.insert(ci, s);
        }

        let n = op.num_outputs();
        let mut run = Run {
            subject,
            subject_layer,
            intruder,
            foreign,
            slots,
            self_slot,
            op,
            reducer: op.vars(),
            scale,
            called,
            subject_breakouts: &self.subject_breakouts,
            intruder_breakouts: &self.intruder_breakouts,
            contexts: BTreeMap::new(),
        };

        let mut top_insts = BTreeSet::new();
        if foreign {
            top_insts.insert((intruder_top, ComplexTrans::identity()));
        }
        let top_key = ContextKey { variant: ComplexTrans::identity(), insts: top_insts, shapes: BTreeSet::new() };
        run.contexts.entry(top).or_default().insert(top_key, ContextData::new(n));

        let pool = JobPool::new(self.threads);

        // context phase
        let phase = Instant::now();
        for (level, cells) in run.levels_top_down().iter().enumerate() {
            let tasks: Vec<(CellIndex, usize)> = cells
                .iter()
                .flat_map(|c| (0..run.contexts.get(c).map_or(0, |m| m.len())).map(move |k| (*c, k)))
                .collect();
            if tasks.is_empty() {
                continue;
            }
            let ntasks = tasks.len();
            let run_ref = &run;
            let contributions = pool.map(tasks, |(c, k)| run_ref.child_contexts(c, k));
            for list in contributions {
                for (child, key, drop) in list {
                    run.contexts
                        .entry(child)
                        .or_default()
                        .entry(key)
                        .or_insert_with(|| ContextData::new(n))
                        .drops
                        .insert(drop);
                }
            }
            if self.report_progress {
                log::info!("[HierProc] {}: contexts of level {} ({} cells, {} contexts)", description, level, cells.len(), ntasks);
            }
        }
        let num_contexts: usize = run.contexts.values().map(|m| m.len()).sum();
        log::debug!(
            "[HierProc] {}: {} contexts in {} cells ({:.2?})",
            description,
            num_contexts,
            run.contexts.len(),
            phase.elapsed()
        );

        // result phase
        let phase = Instant::now();
        let mut outputs: Vec<BTreeMap<CellIndex, ResultSet<TR>>> = vec![BTreeMap::new(); n];
        for (level, cells) in run.levels_bottom_up().into_iter().enumerate() {
            let ncells = cells.len();
            let run_ref = &run;
            let commons = pool.map(cells, |c| (c, run_ref.compute_cell(c)));
            for (c, common) in commons {
                for (o, set) in common.into_iter().enumerate() {
                    if !set.is_empty() {
                        outputs[o].insert(c, set);
                    }
                }
            }
            if self.report_progress {
                log::info!("[HierProc] {}: results of level {} ({} cells)", description, level, ncells);
            }
        }

        let results = LocalResults { outputs };
        log::info!(
            "[HierProc] {}: {} results from {} contexts (context {:.2?}, total {:.2?})",
            description,
            results.len(),
            num_contexts,
            phase.elapsed(),
            start.elapsed()
        );
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Polygon, Vector};
    use crate::layout::CellInstArray;

    /// Copies subjects that touch an intruder
    struct TouchCopy;

    impl LocalOperation<Polygon, Polygon, Polygon> for TouchCopy {
        fn description(&self) -> String {
            "touch copy".to_string()
        }

        fn dist(&self) -> Coord {
            0
        }

        fn compute_local(
            &self,
            interactions: &ShapeInteractions<Polygon, Polygon>,
            _variant: &ComplexTrans,
            results: &mut [ResultSet<Polygon>],
        ) {
            for i in 0..interactions.num_subjects() {
                let (s, p) = interactions.subject(i);
                if interactions.intruders_of(i).any(|(_, o, _)| s.touches(o)) {
                    results[0].insert((s.clone(), *p));
                }
            }
        }
    }

    fn rect(l: i64, b: i64, r: i64, t: i64) -> Polygon {
        Rect::new(l, b, r, t).to_polygon()
    }

    /// TOP holds A twice; only the first placement touches the TOP-level intruder
    fn setup() -> (Layout, CellIndex, CellIndex, LayerIndex, LayerIndex) {
        let mut layout = Layout::new(0.001);
        let top = layout.add_cell("TOP");
        let a = layout.add_cell("A");
        let s = layout.insert_layer("S");
        let i = layout.insert_layer("I");
        layout.insert_polygon(a, s, &rect(0, 0, 10, 10), 0);
        layout.insert_polygon(top, i, &rect(10, 0, 20, 10), 0);
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::identity()));
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::translation(Vector::new(100, 0))));
        layout.update().unwrap();
        (layout, top, a, s, i)
    }

    #[test]
    fn test_context_specific_results_drop_to_parent() {
        let (layout, top, a, s, i) = setup();
        let results = LocalProcessor::new().compute(&layout, top, s, &[IntruderLayer::Layer(i)], &TouchCopy);
        let out = results.output(0);
        assert!(!out.contains_key(&a));
        assert_eq!(out[&top].len(), 1);
        assert!(out[&top].contains(&(rect(0, 0, 10, 10), 0)));
    }

    #[test]
    fn test_common_results_stay_in_cell() {
        let (mut layout, top, a, s, i) = setup();
        // an intruder inside A is seen by every placement
        layout.insert_polygon(a, i, &rect(-5, 0, 0, 10), 0);
        layout.update().unwrap();
        let results = LocalProcessor::new().compute(&layout, top, s, &[IntruderLayer::Layer(i)], &TouchCopy);
        assert_eq!(results.output(0)[&a].len(), 1);
        assert!(!results.output(0).contains_key(&top));
    }

    #[test]
    fn test_foreign_intruders_and_threads() {
        let (layout, top, _, s, _) = setup();
        let mut other = Layout::new(0.001);
        let otop = other.add_cell("OTHER");
        let oi = other.insert_layer("I");
        other.insert_polygon(otop, oi, &rect(110, 0, 120, 10), 0);
        other.update().unwrap();

        let mut proc = LocalProcessor::with_foreign_intruders(&other, otop);
        proc.set_threads(2);
        let results = proc.compute(&layout, top, s, &[IntruderLayer::Layer(oi)], &TouchCopy);
        assert_eq!(results.output(0)[&top].iter().next().map(|(p, _)| p.bbox()), Some(Rect::new(100, 0, 110, 10)));
    }

    #[test]
    fn test_run_inserts_outputs() {
        let (mut layout, top, _, s, i) = setup();
        let out = layout.insert_layer("OUT");
        LocalProcessor::new()
            .run(&mut layout, top, s, &[IntruderLayer::Layer(i)], &TouchCopy, &[out])
            .unwrap();
        assert_eq!(layout.flat_shapes::<Polygon>(top, out).len(), 1);
    }
}

//! Local operations run by the hierarchical processor
//!
//! Each operation sees the subjects of one cell context together with the
//! intruders within its interaction radius and writes per-output result
//! sets. Shape processors are operations without intruders.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::local_processor::{LocalOperation, OnEmptyIntruderHint, ResultSet, ShapeInteractions};
use super::reducer::{GridReducer, MagnificationReducer, TransformReducer, XYAnisotropyAndMagnificationReducer};
use crate::geometry::{
    boolean,
    clip_edges,
    edge_boolean,
    polygons_overlap,
    scan_pairs,
    BooleanOp,
    ComplexTrans,
    Coord,
    Edge,
    EdgeBoolOp,
    EdgeClipMode,
    EdgePair,
    EdgeRelationFilter,
    Point,
    Polygon,
    Rect,
    Transformation,
};
use crate::layout::{LayoutShape, PropId};

fn others<TS: LayoutShape, TI: LayoutShape>(interactions: &ShapeInteractions<TS, TI>, i: usize) -> Vec<TI> {
    interactions.intruders_of(i).map(|(_, s, _)| s.clone()).collect()
}

// ---------------------------------------------------------------------------
// Polygon booleans

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoolMode {
    And,
    Not,
    /// AND into the first output, NOT into the second
    AndNot,
}

/// AND / NOT of subjects against intruder polygons
#[derive(Debug, Clone)]
pub struct BoolAndOrNotLocalOperation {
    mode: BoolMode,
    min_coherence: bool,
}

impl BoolAndOrNotLocalOperation {
    pub fn new(mode: BoolMode, min_coherence: bool) -> Self {
        Self { mode, min_coherence }
    }
}

impl LocalOperation<Polygon, Polygon, Polygon> for BoolAndOrNotLocalOperation {
    fn description(&self) -> String {
        match self.mode {
            BoolMode::And => "AND".to_string(),
            BoolMode::Not => "NOT".to_string(),
            BoolMode::AndNot => "AND/NOT".to_string(),
        }
    }

    fn dist(&self) -> Coord {
        // touching shapes don't change the result
        0
    }

    fn on_empty_intruder_hint(&self) -> OnEmptyIntruderHint {
        match self.mode {
            BoolMode::And => OnEmptyIntruderHint::Drop,
            BoolMode::Not => OnEmptyIntruderHint::Copy,
            BoolMode::AndNot => OnEmptyIntruderHint::CopyToSecond,
        }
    }

    fn num_outputs(&self) -> usize {
        if self.mode == BoolMode::AndNot { 2 } else { 1 }
    }

    fn copy_subject(&self, subject: &Polygon, prop: PropId, out: &mut ResultSet<Polygon>) {
        out.insert((subject.clone(), prop));
    }

    fn compute_local(
        &self,
        interactions: &ShapeInteractions<Polygon, Polygon>,
        _variant: &ComplexTrans,
        results: &mut [ResultSet<Polygon>],
    ) {
        let (and_out, not_out) = match self.mode {
            BoolMode::And => (Some(0), None),
            BoolMode::Not => (None, Some(0)),
            BoolMode::AndNot => (Some(0), Some(1)),
        };
        for i in 0..interactions.num_subjects() {
            let (s, p) = interactions.subject(i);
            let b = others(interactions, i);
            if b.is_empty() {
                if let Some(o) = not_out {
                    results[o].insert((s.clone(), *p));
                }
                continue;
            }
            let a = std::slice::from_ref(s);
            if let Some(o) = and_out {
                for r in boolean(a, &b, BooleanOp::And, self.min_coherence) {
                    results[o].insert((r, *p));
                }
            }
            if let Some(o) = not_out {
                for r in boolean(a, &b, BooleanOp::ANotB, self.min_coherence) {
                    results[o].insert((r, *p));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Interaction selection and pull

/// How a subject relates to an intruder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionMode {
    /// Closed point sets intersect
    Interacting,
    /// Interiors intersect
    Overlapping,
    /// The subject lies inside the intruder
    Inside,
    /// The subject does not overlap any intruder
    Outside,
    /// The intruder lies inside the subject
    Enclosing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionOutput {
    Positive,
    Negative,
    /// Selected subjects into the first output, the others into the second
    Both,
}

/// Geometric relations between subject and intruder shape kinds
pub trait SelectRelation<TI> {
    fn relates(&self, other: &TI, mode: InteractionMode) -> bool;
}

impl SelectRelation<Polygon> for Polygon {
    fn relates(&self, other: &Polygon, mode: InteractionMode) -> bool {
        match mode {
            InteractionMode::Interacting => self.touches(other),
            InteractionMode::Overlapping | InteractionMode::Outside => polygons_overlap(self, other),
            InteractionMode::Inside => {
                polygons_overlap(self, other)
                    && boolean(std::slice::from_ref(self), std::slice::from_ref(other), BooleanOp::ANotB, false)
                        .is_empty()
            }
            InteractionMode::Enclosing => {
                polygons_overlap(self, other)
                    && boolean(std::slice::from_ref(other), std::slice::from_ref(self), BooleanOp::ANotB, false)
                        .is_empty()
            }
        }
    }
}

impl SelectRelation<Edge> for Polygon {
    fn relates(&self, other: &Edge, mode: InteractionMode) -> bool {
        match mode {
            InteractionMode::Interacting | InteractionMode::Overlapping | InteractionMode::Outside => {
                self.touches_edge(other)
            }
            // a polygon never fits inside an edge
            InteractionMode::Inside => false,
            InteractionMode::Enclosing => {
                self.touches_edge(other)
                    && clip_edges(std::slice::from_ref(other), std::slice::from_ref(self), EdgeClipMode::Outside)
                        .is_empty()
            }
        }
    }
}

impl SelectRelation<Polygon> for Edge {
    fn relates(&self, other: &Polygon, mode: InteractionMode) -> bool {
        match mode {
            InteractionMode::Interacting => other.touches_edge(self),
            InteractionMode::Overlapping | InteractionMode::Outside => {
                !clip_edges(std::slice::from_ref(self), std::slice::from_ref(other), EdgeClipMode::Inside).is_empty()
            }
            InteractionMode::Inside => {
                other.touches_edge(self)
                    && clip_edges(std::slice::from_ref(self), std::slice::from_ref(other), EdgeClipMode::Outside)
                        .is_empty()
            }
            InteractionMode::Enclosing => false,
        }
    }
}

/// Selects subjects by the number of related intruders
#[derive(Debug, Clone)]
pub struct InteractingLocalOperation {
    mode: InteractionMode,
    output: SelectionOutput,
    min_count: usize,
    max_count: usize,
}

impl InteractingLocalOperation {
    pub fn new(mode: InteractionMode, output: SelectionOutput, min_count: usize, max_count: usize) -> Self {
        Self { mode, output, min_count, max_count }
    }

    fn selects(&self, count: usize) -> bool {
        if self.mode == InteractionMode::Outside {
            count == 0
        } else {
            count >= self.min_count.max(1) && count <= self.max_count
        }
    }

    /// True if a subject without any intruder is selected
    pub fn selects_isolated(&self) -> bool {
        self.selects(0)
    }

    fn outputs_for(&self, selected: bool) -> Option<usize> {
        match (self.output, selected) {
            (SelectionOutput::Positive, true) | (SelectionOutput::Negative, false) => Some(0),
            (SelectionOutput::Both, true) => Some(0),
            (SelectionOutput::Both, false) => Some(1),
            _ => None,
        }
    }
}

impl<TS, TI> LocalOperation<TS, TI, TS> for InteractingLocalOperation
where
    TS: LayoutShape + SelectRelation<TI>,
    TI: LayoutShape,
{
    fn description(&self) -> String {
        format!("select {:?} ({}..{})", self.mode, self.min_count, self.max_count)
    }

    fn dist(&self) -> Coord {
        0
    }

    fn on_empty_intruder_hint(&self) -> OnEmptyIntruderHint {
        match self.outputs_for(self.selects_isolated()) {
            Some(0) => OnEmptyIntruderHint::Copy,
            Some(_) => OnEmptyIntruderHint::CopyToSecond,
            None => OnEmptyIntruderHint::Drop,
        }
    }

    fn num_outputs(&self) -> usize {
        if self.output == SelectionOutput::Both { 2 } else { 1 }
    }

    fn copy_subject(&self, subject: &TS, prop: PropId, out: &mut ResultSet<TS>) {
        out.insert((subject.clone(), prop));
    }

    fn compute_local(&self, interactions: &ShapeInteractions<TS, TI>, _variant: &ComplexTrans, results: &mut [ResultSet<TS>]) {
        for i in 0..interactions.num_subjects() {
            let (s, p) = interactions.subject(i);
            let count = interactions.intruders_of(i).filter(|(_, o, _)| s.relates(o, self.mode)).count();
            if let Some(o) = self.outputs_for(self.selects(count)) {
                results[o].insert((s.clone(), *p));
            }
        }
    }
}

/// Delivers the intruders related to any subject
#[derive(Debug, Clone)]
pub struct PullLocalOperation {
    mode: InteractionMode,
}

impl PullLocalOperation {
    /// `mode` is the relation of the subject to the pulled shape
    pub fn new(mode: InteractionMode) -> Self {
        Self { mode }
    }
}

impl<TS, TI> LocalOperation<TS, TI, TI> for PullLocalOperation
where
    TS: LayoutShape + SelectRelation<TI>,
    TI: LayoutShape,
{
    fn description(&self) -> String {
        format!("pull {:?}", self.mode)
    }

    fn dist(&self) -> Coord {
        0
    }

    fn on_empty_intruder_hint(&self) -> OnEmptyIntruderHint {
        OnEmptyIntruderHint::Drop
    }

    fn compute_local(&self, interactions: &ShapeInteractions<TS, TI>, _variant: &ComplexTrans, results: &mut [ResultSet<TI>]) {
        for i in 0..interactions.num_subjects() {
            let (s, _) = interactions.subject(i);
            for (_, o, op) in interactions.intruders_of(i) {
                if s.relates(o, self.mode) {
                    results[0].insert((o.clone(), *op));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Edge operations

/// Parts of edges inside or outside of polygons
#[derive(Debug, Clone)]
pub struct EdgeToRegionLocalOperation {
    mode: EdgeClipMode,
}

impl EdgeToRegionLocalOperation {
    pub fn new(mode: EdgeClipMode) -> Self {
        Self { mode }
    }
}

impl LocalOperation<Edge, Polygon, Edge> for EdgeToRegionLocalOperation {
    fn description(&self) -> String {
        format!("edges {:?} of region", self.mode)
    }

    fn dist(&self) -> Coord {
        0
    }

    fn on_empty_intruder_hint(&self) -> OnEmptyIntruderHint {
        match self.mode {
            EdgeClipMode::Inside => OnEmptyIntruderHint::Drop,
            EdgeClipMode::Outside => OnEmptyIntruderHint::Copy,
        }
    }

    fn copy_subject(&self, subject: &Edge, prop: PropId, out: &mut ResultSet<Edge>) {
        out.insert((*subject, prop));
    }

    fn compute_local(&self, interactions: &ShapeInteractions<Edge, Polygon>, _variant: &ComplexTrans, results: &mut [ResultSet<Edge>]) {
        for i in 0..interactions.num_subjects() {
            let (e, p) = interactions.subject(i);
            let polys = others(interactions, i);
            for r in clip_edges(std::slice::from_ref(e), &polys, self.mode) {
                results[0].insert((r, *p));
            }
        }
    }
}

/// Collinear AND / NOT of edges against edges
#[derive(Debug, Clone)]
pub struct EdgeBoolLocalOperation {
    op: EdgeBoolOp,
}

impl EdgeBoolLocalOperation {
    pub fn new(op: EdgeBoolOp) -> Self {
        Self { op }
    }
}

impl LocalOperation<Edge, Edge, Edge> for EdgeBoolLocalOperation {
    fn description(&self) -> String {
        format!("edge {:?}", self.op)
    }

    fn dist(&self) -> Coord {
        0
    }

    fn on_empty_intruder_hint(&self) -> OnEmptyIntruderHint {
        match self.op {
            EdgeBoolOp::And => OnEmptyIntruderHint::Drop,
            EdgeBoolOp::Not => OnEmptyIntruderHint::Copy,
        }
    }

    fn copy_subject(&self, subject: &Edge, prop: PropId, out: &mut ResultSet<Edge>) {
        out.insert((*subject, prop));
    }

    fn compute_local(&self, interactions: &ShapeInteractions<Edge, Edge>, _variant: &ComplexTrans, results: &mut [ResultSet<Edge>]) {
        for i in 0..interactions.num_subjects() {
            let (e, p) = interactions.subject(i);
            let b = others(interactions, i);
            for r in edge_boolean(std::slice::from_ref(e), &b, self.op) {
                results[0].insert((r, *p));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// DRC checks

/// The filter with distance and projection limits divided by the variant's magnification
fn scaled_filter(filter: &EdgeRelationFilter, variant: &ComplexTrans) -> EdgeRelationFilter {
    if !variant.is_mag() {
        return filter.clone();
    }
    let mag = variant.mag;
    let mut options = *filter.options();
    options.min_projection = (options.min_projection as f64 / mag).floor() as Coord;
    options.max_projection = options.max_projection.map(|m| (m as f64 / mag).ceil() as Coord);
    EdgeRelationFilter::new(filter.kind(), filter.distance() / mag, options)
}

/// Edge relation check on polygons. Single-layer relations use the subject
/// layer as intruder, two-layer relations the other layer.
#[derive(Debug, Clone)]
pub struct CheckLocalOperation {
    filter: EdgeRelationFilter,
    two_layer: bool,
}

impl CheckLocalOperation {
    pub fn new(filter: EdgeRelationFilter) -> Self {
        let two_layer = !filter.kind().is_single_layer();
        Self { filter, two_layer }
    }
}

impl LocalOperation<Polygon, Polygon, EdgePair> for CheckLocalOperation {
    fn description(&self) -> String {
        format!("{} check ({})", self.filter.kind().name(), self.filter.distance())
    }

    fn dist(&self) -> Coord {
        self.filter.search_distance()
    }

    fn on_empty_intruder_hint(&self) -> OnEmptyIntruderHint {
        if self.two_layer {
            OnEmptyIntruderHint::Drop
        } else {
            OnEmptyIntruderHint::Ignore
        }
    }

    fn vars(&self) -> Option<Arc<dyn TransformReducer>> {
        Some(Arc::new(MagnificationReducer))
    }

    fn compute_local(
        &self,
        interactions: &ShapeInteractions<Polygon, Polygon>,
        variant: &ComplexTrans,
        results: &mut [ResultSet<EdgePair>],
    ) {
        let filter = scaled_filter(&self.filter, variant);
        let kind = filter.kind();
        let reach = filter.search_distance();
        for i in 0..interactions.num_subjects() {
            let (s, p) = interactions.subject(i);
            let edges: Vec<Edge> = s.edges().collect();

            if !self.two_layer && kind.checks_intra_polygon() {
                let boxes: Vec<Rect> = edges.iter().map(|e| e.bbox()).collect();
                for (a, b) in scan_pairs(&boxes, reach) {
                    for (ea, eb) in [(&edges[a], &edges[b]), (&edges[b], &edges[a])] {
                        if let Some(ep) = filter.check(ea, eb) {
                            results[0].insert((ep, *p));
                        }
                    }
                }
            }

            if self.two_layer || kind.checks_inter_polygon() {
                for (_, o, _) in interactions.intruders_of(i) {
                    let obox = o.bbox().enlarged(reach, reach);
                    for eb in o.edges().filter(|e| e.bbox().touches(&s.bbox().enlarged(reach, reach))) {
                        for ea in edges.iter().filter(|e| e.bbox().touches(&obox)) {
                            if let Some(ep) = filter.check(ea, &eb) {
                                results[0].insert((ep, *p));
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Edge relation check on edge collections
#[derive(Debug, Clone)]
pub struct EdgeCheckLocalOperation {
    filter: EdgeRelationFilter,
}

impl EdgeCheckLocalOperation {
    pub fn new(filter: EdgeRelationFilter) -> Self {
        Self { filter }
    }
}

impl LocalOperation<Edge, Edge, EdgePair> for EdgeCheckLocalOperation {
    fn description(&self) -> String {
        format!("edge {} check ({})", self.filter.kind().name(), self.filter.distance())
    }

    fn dist(&self) -> Coord {
        self.filter.search_distance()
    }

    fn on_empty_intruder_hint(&self) -> OnEmptyIntruderHint {
        OnEmptyIntruderHint::Drop
    }

    fn vars(&self) -> Option<Arc<dyn TransformReducer>> {
        Some(Arc::new(MagnificationReducer))
    }

    fn compute_local(&self, interactions: &ShapeInteractions<Edge, Edge>, variant: &ComplexTrans, results: &mut [ResultSet<EdgePair>]) {
        let filter = scaled_filter(&self.filter, variant);
        for i in 0..interactions.num_subjects() {
            let (a, p) = interactions.subject(i);
            for (_, b, _) in interactions.intruders_of(i) {
                if let Some(ep) = filter.check(a, b) {
                    results[0].insert((ep, *p));
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Shape processors

/// Per-shape transformation into another shape kind
pub trait ShapeProcessor<TS, TR>: Send + Sync {
    fn description(&self) -> String;

    /// Reducer for processors whose result depends on the placement
    fn vars(&self) -> Option<Arc<dyn TransformReducer>> {
        None
    }

    fn requires_separated_variants(&self) -> bool {
        false
    }

    fn process(&self, shape: &TS, variant: &ComplexTrans, out: &mut Vec<TR>);
}

/// Runs a shape processor as a local operation without intruders
pub struct ProcessorOperation<P> {
    processor: P,
}

impl<P> ProcessorOperation<P> {
    pub fn new(processor: P) -> Self {
        Self { processor }
    }
}

impl<TS, TR, P> LocalOperation<TS, TS, TR> for ProcessorOperation<P>
where
    TS: LayoutShape,
    TR: LayoutShape,
    P: ShapeProcessor<TS, TR>,
{
    fn description(&self) -> String {
        self.processor.description()
    }

    fn dist(&self) -> Coord {
        0
    }

    fn vars(&self) -> Option<Arc<dyn TransformReducer>> {
        self.processor.vars()
    }

    fn requires_separated_variants(&self) -> bool {
        self.processor.requires_separated_variants()
    }

    fn compute_local(&self, interactions: &ShapeInteractions<TS, TS>, variant: &ComplexTrans, results: &mut [ResultSet<TR>]) {
        let mut out = Vec::new();
        for (s, p) in interactions.subjects() {
            out.clear();
            self.processor.process(s, variant, &mut out);
            results[0].extend(out.drain(..).map(|r| (r, *p)));
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PolygonToEdges;

impl ShapeProcessor<Polygon, Edge> for PolygonToEdges {
    fn description(&self) -> String {
        "polygon edges".to_string()
    }

    fn process(&self, shape: &Polygon, _variant: &ComplexTrans, out: &mut Vec<Edge>) {
        out.extend(shape.edges());
    }
}

/// Bounding boxes enlarged by `dx`/`dy` in top cell axes
#[derive(Debug, Clone, Copy)]
pub struct PolygonExtents {
    pub dx: Coord,
    pub dy: Coord,
}

impl ShapeProcessor<Polygon, Polygon> for PolygonExtents {
    fn description(&self) -> String {
        format!("extents ({}, {})", self.dx, self.dy)
    }

    fn vars(&self) -> Option<Arc<dyn TransformReducer>> {
        if self.dx == self.dy && self.dx == 0 {
            None
        } else {
            Some(Arc::new(XYAnisotropyAndMagnificationReducer))
        }
    }

    fn process(&self, shape: &Polygon, variant: &ComplexTrans, out: &mut Vec<Polygon>) {
        let (dx, dy) = if variant.rot.swaps_axes() { (self.dy, self.dx) } else { (self.dx, self.dy) };
        let (dx, dy) = ((dx as f64 / variant.mag).round() as Coord, (dy as f64 / variant.mag).round() as Coord);
        let r = shape.bbox().enlarged(dx, dy);
        if !r.is_empty() && r.width() > 0 && r.height() > 0 {
            out.push(Polygon::from_rect(&r));
        }
    }
}

/// Turns edges into polygons: extended by `begin`/`end` along the edge,
/// `outside` to the right of the edge direction and `inside` to the left
#[derive(Debug, Clone, Copy)]
pub struct EdgeExtension {
    pub begin: Coord,
    pub end: Coord,
    pub outside: Coord,
    pub inside: Coord,
}

impl ShapeProcessor<Edge, Polygon> for EdgeExtension {
    fn description(&self) -> String {
        format!("extended ({}, {}, {}, {})", self.begin, self.end, self.outside, self.inside)
    }

    fn vars(&self) -> Option<Arc<dyn TransformReducer>> {
        Some(Arc::new(MagnificationReducer))
    }

    fn process(&self, e: &Edge, variant: &ComplexTrans, out: &mut Vec<Polygon>) {
        if e.is_degenerate() || self.outside + self.inside <= 0 {
            return;
        }
        let m = variant.mag;
        let (b, en, o, i) = (
            self.begin as f64 / m,
            self.end as f64 / m,
            self.outside as f64 / m,
            self.inside as f64 / m,
        );
        let len = e.length();
        let (ux, uy) = ((e.p2.x - e.p1.x) as f64 / len, (e.p2.y - e.p1.y) as f64 / len);
        // left normal
        let (nx, ny) = (-uy, ux);
        let (x1, y1) = (e.p1.x as f64 - ux * b, e.p1.y as f64 - uy * b);
        let (x2, y2) = (e.p2.x as f64 + ux * en, e.p2.y as f64 + uy * en);
        let pt = |x: f64, y: f64| Point::new(x.round() as Coord, y.round() as Coord);
        let poly = Polygon::new(vec![
            pt(x1 - nx * o, y1 - ny * o),
            pt(x2 - nx * o, y2 - ny * o),
            pt(x2 + nx * i, y2 + ny * i),
            pt(x1 + nx * i, y1 + ny * i),
        ]);
        if !poly.is_empty() {
            out.push(poly);
        }
    }
}

/// Marker polygons of edge pairs
#[derive(Debug, Clone, Copy)]
pub struct EdgePairToPolygon {
    pub enlarge: Coord,
}

impl ShapeProcessor<EdgePair, Polygon> for EdgePairToPolygon {
    fn description(&self) -> String {
        format!("edge pair polygons ({})", self.enlarge)
    }

    fn vars(&self) -> Option<Arc<dyn TransformReducer>> {
        if self.enlarge == 0 { None } else { Some(Arc::new(MagnificationReducer)) }
    }

    fn process(&self, ep: &EdgePair, variant: &ComplexTrans, out: &mut Vec<Polygon>) {
        let enlarge = (self.enlarge as f64 / variant.mag).round() as Coord;
        let poly = ep.to_polygon(enlarge);
        if !poly.is_empty() {
            out.push(poly);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgePairSide {
    First,
    Second,
    Both,
}

/// The edges of edge pairs
#[derive(Debug, Clone, Copy)]
pub struct EdgePairEdges {
    pub side: EdgePairSide,
}

impl ShapeProcessor<EdgePair, Edge> for EdgePairEdges {
    fn description(&self) -> String {
        format!("edge pair edges ({:?})", self.side)
    }

    fn process(&self, ep: &EdgePair, _variant: &ComplexTrans, out: &mut Vec<Edge>) {
        if self.side != EdgePairSide::Second {
            out.push(ep.first);
        }
        if self.side != EdgePairSide::First {
            out.push(ep.second);
        }
    }
}

/// Keeps edge pairs with `min <= distance < max` (top cell units)
#[derive(Debug, Clone, Copy)]
pub struct EdgePairDistanceFilter {
    pub min: f64,
    pub max: f64,
}

impl ShapeProcessor<EdgePair, EdgePair> for EdgePairDistanceFilter {
    fn description(&self) -> String {
        format!("edge pair distance [{}, {})", self.min, self.max)
    }

    fn vars(&self) -> Option<Arc<dyn TransformReducer>> {
        Some(Arc::new(MagnificationReducer))
    }

    fn process(&self, ep: &EdgePair, variant: &ComplexTrans, out: &mut Vec<EdgePair>) {
        let d = ep.distance() * variant.mag;
        if d + 1e-9 >= self.min && d < self.max - 1e-9 {
            out.push(*ep);
        }
    }
}

fn snap(v: f64, g: Coord) -> f64 {
    (v / g as f64).round() * g as f64
}

/// Snaps polygon vertices to a grid in top cell coordinates
#[derive(Debug, Clone, Copy)]
pub struct GridSnap {
    pub grid: Coord,
}

impl ShapeProcessor<Polygon, Polygon> for GridSnap {
    fn description(&self) -> String {
        format!("snapped ({})", self.grid)
    }

    fn vars(&self) -> Option<Arc<dyn TransformReducer>> {
        Some(Arc::new(GridReducer::new(self.grid)))
    }

    fn requires_separated_variants(&self) -> bool {
        true
    }

    fn process(&self, shape: &Polygon, variant: &ComplexTrans, out: &mut Vec<Polygon>) {
        let back = variant.inverted();
        let snap_pt = |p: &Point| {
            let (x, y) = variant.apply_f64(p.x as f64, p.y as f64);
            back.apply(Point::new(snap(x, self.grid) as Coord, snap(y, self.grid) as Coord))
        };
        let hull = shape.hull().iter().map(snap_pt).collect();
        let holes = shape.holes().iter().map(|h| h.iter().map(snap_pt).collect()).collect();
        let poly = Polygon::with_holes(hull, holes);
        if !poly.is_empty() {
            out.push(poly);
        }
    }
}

/// Markers for vertices which are off-grid in top cell coordinates.
/// A grid of 0 disables the check along that axis.
pub fn off_grid_markers(shape: &Polygon, variant: &ComplexTrans, gx: Coord, gy: Coord) -> Vec<EdgePair> {
    let mut out = Vec::new();
    for p in shape.hull().iter().chain(shape.holes().iter().flatten()) {
        let q = variant.apply(*p);
        let off_x = gx > 0 && q.x.rem_euclid(gx) != 0;
        let off_y = gy > 0 && q.y.rem_euclid(gy) != 0;
        if off_x || off_y {
            let e = Edge::new(*p, *p);
            out.push(EdgePair::new_symmetric(e, e));
        }
    }
    out
}

/// The grid whose residues determine both axis residues
pub fn combined_grid(gx: Coord, gy: Coord) -> Coord {
    fn gcd(a: Coord, b: Coord) -> Coord {
        if b == 0 { a } else { gcd(b, a % b) }
    }
    match (gx > 0, gy > 0) {
        (true, true) => gx / gcd(gx, gy) * gy,
        (true, false) => gx,
        (false, true) => gy,
        (false, false) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{CheckOptions, Orientation, RelationKind, Vector};

    fn rect(l: i64, b: i64, r: i64, t: i64) -> Polygon {
        Rect::new(l, b, r, t).to_polygon()
    }

    fn interactions(subjects: Vec<Polygon>, intruders: Vec<Polygon>) -> ShapeInteractions<Polygon, Polygon> {
        ShapeInteractions::new(
            subjects.into_iter().map(|p| (p, 0)).collect(),
            intruders.into_iter().map(|p| (0, p, 0)).collect(),
            5,
            &[],
        )
    }

    #[test]
    fn test_and_not_two_outputs() {
        let op = BoolAndOrNotLocalOperation::new(BoolMode::AndNot, false);
        let si = interactions(vec![rect(0, 0, 10, 10)], vec![rect(5, 0, 15, 10)]);
        let mut results = vec![ResultSet::new(), ResultSet::new()];
        op.compute_local(&si, &ComplexTrans::identity(), &mut results);
        assert!(results[0].contains(&(rect(5, 0, 10, 10), 0)));
        assert!(results[1].contains(&(rect(0, 0, 5, 10), 0)));
    }

    #[test]
    fn test_not_copies_isolated_subjects() {
        let op = BoolAndOrNotLocalOperation::new(BoolMode::Not, false);
        assert_eq!(op.on_empty_intruder_hint(), OnEmptyIntruderHint::Copy);
        let si = interactions(vec![rect(0, 0, 10, 10), rect(100, 0, 110, 10)], vec![rect(0, 0, 10, 10)]);
        let mut results = vec![ResultSet::new()];
        op.compute_local(&si, &ComplexTrans::identity(), &mut results);
        assert_eq!(results[0].len(), 1);
        assert!(results[0].contains(&(rect(100, 0, 110, 10), 0)));
    }

    #[test]
    fn test_interacting_count_range() {
        let op = InteractingLocalOperation::new(InteractionMode::Interacting, SelectionOutput::Both, 2, 2);
        let si = interactions(
            vec![rect(0, 0, 10, 10), rect(100, 0, 110, 10)],
            vec![rect(10, 0, 12, 2), rect(-2, 0, 0, 2), rect(110, 0, 112, 2)],
        );
        let mut results = vec![ResultSet::new(), ResultSet::new()];
        op.compute_local(&si, &ComplexTrans::identity(), &mut results);
        assert!(results[0].contains(&(rect(0, 0, 10, 10), 0)));
        assert!(results[1].contains(&(rect(100, 0, 110, 10), 0)));
        assert_eq!(
            <InteractingLocalOperation as LocalOperation<Polygon, Polygon, Polygon>>::on_empty_intruder_hint(&op),
            OnEmptyIntruderHint::CopyToSecond
        );
    }

    #[test]
    fn test_inside_and_outside_relations() {
        let big = rect(0, 0, 100, 100);
        let small = rect(10, 10, 20, 20);
        assert!(small.relates(&big, InteractionMode::Inside));
        assert!(!big.relates(&small, InteractionMode::Inside));
        assert!(big.relates(&small, InteractionMode::Enclosing));
        // touching is not overlapping
        assert!(!rect(100, 0, 110, 10).relates(&big, InteractionMode::Overlapping));
        assert!(rect(100, 0, 110, 10).relates(&big, InteractionMode::Interacting));
    }

    #[test]
    fn test_space_check_scaled_by_variant() {
        let filter = EdgeRelationFilter::new(RelationKind::Space, 5.0, CheckOptions::default());
        let op = CheckLocalOperation::new(filter);
        let s = vec![(rect(0, 0, 10, 10), 0)];
        let i = vec![(0, rect(13, 0, 20, 10), 0)];
        let si = ShapeInteractions::new(s, i, op.dist(), &[]);

        let mut results = vec![ResultSet::new()];
        op.compute_local(&si, &ComplexTrans::identity(), &mut results);
        assert_eq!(results[0].len(), 1);

        // at magnification 2 the gap of 3 is 6 in the top cell
        let mut results = vec![ResultSet::new()];
        op.compute_local(&si, &ComplexTrans::magnification(2.0), &mut results);
        assert!(results[0].is_empty());
    }

    #[test]
    fn test_width_check_intra_polygon() {
        let filter = EdgeRelationFilter::new(RelationKind::Width, 5.0, CheckOptions::default());
        let op = CheckLocalOperation::new(filter);
        let si = interactions(vec![rect(0, 0, 3, 20)], vec![]);
        let mut results = vec![ResultSet::new()];
        op.compute_local(&si, &ComplexTrans::identity(), &mut results);
        assert_eq!(results[0].len(), 1);
        let (ep, _) = results[0].iter().next().unwrap();
        assert!((ep.distance() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_edge_extension_outside_is_right() {
        let e = Edge::new(Point::new(0, 0), Point::new(10, 0));
        let mut out = Vec::new();
        EdgeExtension { begin: 0, end: 0, outside: 2, inside: 0 }.process(&e, &ComplexTrans::identity(), &mut out);
        assert_eq!(out, vec![rect(0, -2, 10, 0)]);
    }

    #[test]
    fn test_extents_swap_axes() {
        let p = rect(0, 0, 10, 10);
        let mut out = Vec::new();
        let ext = PolygonExtents { dx: 1, dy: 0 };
        ext.process(&p, &ComplexTrans::rotation(Orientation::R90), &mut out);
        assert_eq!(out, vec![rect(0, -1, 10, 11)]);
    }

    #[test]
    fn test_off_grid_markers() {
        let p = rect(0, 0, 10, 10);
        let on = ComplexTrans::translation(Vector::new(5, 5));
        assert!(off_grid_markers(&p, &on, 5, 5).is_empty());
        let off = ComplexTrans::translation(Vector::new(1, 0));
        assert_eq!(off_grid_markers(&p, &off, 5, 0).len(), 4);
        assert_eq!(combined_grid(4, 6), 12);
        assert_eq!(combined_grid(0, 6), 6);
    }

    #[test]
    fn test_grid_snap_in_top_frame() {
        let p = rect(0, 0, 9, 9);
        let mut out = Vec::new();
        GridSnap { grid: 5 }.process(&p, &ComplexTrans::translation(Vector::new(2, 0)), &mut out);
        // top frame box is (2,0)..(11,9) which snaps to (0,0)..(10,10)
        assert_eq!(out, vec![rect(-2, 0, 8, 10)]);
    }
}

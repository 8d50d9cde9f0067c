//! Hierarchical connectivity clusters
//!
//! Per cell, shapes that touch under a connectivity rule form local
//! clusters. Clusters link to clusters of child cells through
//! `ClusterInstance` connections. Groups made only of child content get a
//! shape-less "dummy" cluster in the parent so that every connected group is
//! anchored in exactly one cell: the root cluster.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::geometry::{merge, merge_edges, scan_pairs, scan_pairs2, ComplexTrans, Edge, Polygon, Rect};
use crate::layout::{CellIndex, LayerIndex, Layout, LayoutShape, PropId};

/// Shapes that can be clustered and merged
pub trait ClusterShape: LayoutShape {
    /// Closed touch test
    fn interacts(&self, other: &Self) -> bool;

    fn merge_all(shapes: &[Self], min_coherence: bool, min_wc: u32) -> Vec<Self>;
}

impl ClusterShape for Polygon {
    fn interacts(&self, other: &Self) -> bool {
        self.touches(other)
    }

    fn merge_all(shapes: &[Self], min_coherence: bool, min_wc: u32) -> Vec<Self> {
        merge(shapes, min_coherence, min_wc)
    }
}

impl ClusterShape for Edge {
    fn interacts(&self, other: &Self) -> bool {
        self.intersects(other)
    }

    fn merge_all(shapes: &[Self], _min_coherence: bool, _min_wc: u32) -> Vec<Self> {
        merge_edges(shapes)
    }
}

/// Which layers connect to which
#[derive(Debug, Clone, Default)]
pub struct Connectivity {
    connected: BTreeMap<LayerIndex, BTreeSet<LayerIndex>>,
}

impl Connectivity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shapes of one layer connect to each other
    pub fn single(layer: LayerIndex) -> Self {
        let mut c = Self::new();
        c.connect(layer, layer);
        c
    }

    pub fn connect(&mut self, a: LayerIndex, b: LayerIndex) -> &mut Self {
        self.connected.entry(a).or_default().insert(b);
        self.connected.entry(b).or_default().insert(a);
        self
    }

    pub fn layers(&self) -> Vec<LayerIndex> {
        self.connected.keys().copied().collect()
    }

    pub fn interacts(&self, a: LayerIndex, b: LayerIndex) -> bool {
        self.connected.get(&a).is_some_and(|s| s.contains(&b))
    }
}

/// A connection target: cluster `id` of `cell`, placed with `trans`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClusterInstance {
    pub id: usize,
    pub cell: CellIndex,
    pub trans: ComplexTrans,
}

#[derive(Debug, Clone)]
pub struct LocalCluster<T> {
    id: usize,
    shapes: Vec<(LayerIndex, T, PropId)>,
    bbox: Rect,
    attrs: BTreeSet<PropId>,
}

impl<T: ClusterShape> LocalCluster<T> {
    fn new(id: usize, shapes: Vec<(LayerIndex, T, PropId)>) -> Self {
        let bbox = shapes.iter().fold(Rect::empty(), |r, (_, s, _)| r.union(&s.bbox()));
        let attrs = shapes.iter().map(|(_, _, p)| *p).filter(|p| *p != 0).collect();
        Self { id, shapes, bbox, attrs }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn shapes(&self) -> &[(LayerIndex, T, PropId)] {
        &self.shapes
    }

    pub fn bbox(&self) -> Rect {
        self.bbox
    }

    /// Property ids carried by the cluster's own shapes
    pub fn attrs(&self) -> &BTreeSet<PropId> {
        &self.attrs
    }

    pub fn is_dummy(&self) -> bool {
        self.shapes.is_empty()
    }
}

/// The clusters of one cell with their connections into child cells
#[derive(Debug, Clone)]
pub struct ConnectedClusters<T> {
    clusters: Vec<LocalCluster<T>>,
    connections: Vec<Vec<ClusterInstance>>,
    rev: BTreeMap<ClusterInstance, usize>,
}

impl<T> Default for ConnectedClusters<T> {
    fn default() -> Self {
        Self { clusters: Vec::new(), connections: Vec::new(), rev: BTreeMap::new() }
    }
}

impl<T: ClusterShape> ConnectedClusters<T> {
    fn push(&mut self, shapes: Vec<(LayerIndex, T, PropId)>, mut conns: Vec<ClusterInstance>) -> usize {
        let id = self.clusters.len() + 1;
        conns.sort();
        conns.dedup();
        for ci in &conns {
            self.rev.insert(*ci, id);
        }
        self.clusters.push(LocalCluster::new(id, shapes));
        self.connections.push(conns);
        id
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn clusters(&self) -> &[LocalCluster<T>] {
        &self.clusters
    }

    /// Cluster by 1-based id
    pub fn cluster(&self, id: usize) -> &LocalCluster<T> {
        &self.clusters[id - 1]
    }

    pub fn connections(&self, id: usize) -> &[ClusterInstance] {
        &self.connections[id - 1]
    }

    /// The cluster connecting to `target`, if any
    pub fn find_connection(&self, target: &ClusterInstance) -> Option<usize> {
        self.rev.get(target).copied()
    }

    fn find_or_make_dummy(&mut self, target: ClusterInstance) -> usize {
        match self.find_connection(&target) {
            Some(id) => id,
            None => self.push(Vec::new(), vec![target]),
        }
    }
}

/// A child shape found below an instance, with the instance path down to it
#[derive(Clone)]
struct Hit<T> {
    path: Vec<(CellIndex, ComplexTrans)>,
    cluster: usize,
    layer: LayerIndex,
    shape: T,
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self { parent: (0..n).collect() }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            // the smaller index survives so components are named by their first member
            let (lo, hi) = if ra < rb { (ra, rb) } else { (rb, ra) };
            self.parent[hi] = lo;
        }
    }

    /// Components as member lists, ordered by their smallest member
    fn groups(&mut self) -> Vec<Vec<usize>> {
        let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for i in 0..self.parent.len() {
            let r = self.find(i);
            by_root.entry(r).or_default().push(i);
        }
        by_root.into_values().collect()
    }
}

/// Connected clusters for a whole hierarchy
#[derive(Debug, Clone)]
pub struct HierClusters<T> {
    top: CellIndex,
    per_cell: BTreeMap<CellIndex, ConnectedClusters<T>>,
    referenced: BTreeMap<CellIndex, BTreeSet<usize>>,
}

struct Builder<'a, T> {
    layout: &'a Layout,
    conn: &'a Connectivity,
    layers: Vec<LayerIndex>,
    conn_bbox: BTreeMap<CellIndex, Rect>,
    per_cell: BTreeMap<CellIndex, ConnectedClusters<T>>,
}

impl<T: ClusterShape> Builder<'_, T> {
    fn subtree_bbox(&self, ci: CellIndex) -> Rect {
        self.conn_bbox.get(&ci).copied().unwrap_or(Rect::empty())
    }

    /// Child shapes of `cell` (placed with `trans` into the frame being built)
    /// touching `region`
    fn collect_hits(
        &self,
        cell: CellIndex,
        trans: &ComplexTrans,
        region: &Rect,
        path: &mut Vec<(CellIndex, ComplexTrans)>,
        out: &mut Vec<Hit<T>>,
    ) {
        if let Some(cc) = self.per_cell.get(&cell) {
            for cluster in cc.clusters() {
                if cluster.is_dummy() || !cluster.bbox().transformed(trans).touches(region) {
                    continue;
                }
                for (layer, shape, _) in cluster.shapes() {
                    let s = shape.transform(trans);
                    if s.bbox().touches(region) {
                        out.push(Hit { path: path.clone(), cluster: cluster.id(), layer: *layer, shape: s });
                    }
                }
            }
        }
        for inst in self.layout.cell(cell).instances() {
            let child_box = self.subtree_bbox(inst.cell);
            if child_box.is_empty() {
                continue;
            }
            for et in inst.element_transforms() {
                let t = *trans * et;
                if child_box.transformed(&t).touches(region) {
                    path.push((inst.cell, et));
                    self.collect_hits(inst.cell, &t, region, path, out);
                    path.pop();
                }
            }
        }
    }

    /// Resolve a hit to the cluster of the first path cell, creating dummies
    /// along the way where the path is not connected yet
    fn make_path(&mut self, hit: &Hit<T>) -> ClusterInstance {
        let mut id = hit.cluster;
        for i in (1..hit.path.len()).rev() {
            let (child, trans) = hit.path[i];
            let parent = hit.path[i - 1].0;
            let target = ClusterInstance { id, cell: child, trans };
            id = self.per_cell.entry(parent).or_default().find_or_make_dummy(target);
        }
        let (cell, trans) = hit.path[0];
        ClusterInstance { id, cell, trans }
    }

    fn hits_below(&self, cell: CellIndex, trans: ComplexTrans, region: &Rect) -> Vec<Hit<T>> {
        let mut out = Vec::new();
        let mut path = vec![(cell, trans)];
        self.collect_hits(cell, &trans, region, &mut path, &mut out);
        out
    }

    fn build_cell(&mut self, ci: CellIndex) {
        let cell = self.layout.cell(ci);

        let mut shapes: Vec<(LayerIndex, T, PropId)> = Vec::new();
        for &l in &self.layers {
            if let Some(s) = cell.shapes(l) {
                shapes.extend(T::read_from(s).into_iter().map(|(t, p)| (l, t, p)));
            }
        }
        let boxes: Vec<Rect> = shapes.iter().map(|(_, s, _)| s.bbox()).collect();

        let mut local = UnionFind::new(shapes.len());
        for (i, j) in scan_pairs(&boxes, 0) {
            let (li, si, _) = &shapes[i];
            let (lj, sj, _) = &shapes[j];
            if self.conn.interacts(*li, *lj) && si.interacts(sj) {
                local.union(i, j);
            }
        }
        let groups = local.groups();
        let mut group_of = vec![0usize; shapes.len()];
        for (g, members) in groups.iter().enumerate() {
            for &m in members {
                group_of[m] = g;
            }
        }

        let mut elements: Vec<(CellIndex, ComplexTrans, Rect)> = Vec::new();
        for inst in cell.instances() {
            let child_box = self.subtree_bbox(inst.cell);
            if child_box.is_empty() {
                continue;
            }
            for et in inst.element_transforms() {
                elements.push((inst.cell, et, child_box.transformed(&et)));
            }
        }
        let elem_boxes: Vec<Rect> = elements.iter().map(|e| e.2).collect();

        // local shape vs. child content
        let mut local_links: Vec<(usize, Hit<T>)> = Vec::new();
        let mut by_element: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (s, e) in scan_pairs2(&boxes, &elem_boxes, 0) {
            by_element.entry(e).or_default().push(s);
        }
        for (e, candidates) in &by_element {
            let (child, et, ebox) = elements[*e];
            let region = candidates.iter().fold(Rect::empty(), |r, s| r.union(&boxes[*s])).intersection(&ebox);
            let hits = self.hits_below(child, et, &region);
            let hit_boxes: Vec<Rect> = hits.iter().map(|h| h.shape.bbox()).collect();
            let cand_boxes: Vec<Rect> = candidates.iter().map(|s| boxes[*s]).collect();
            let mut linked: BTreeSet<(usize, usize)> = BTreeSet::new();
            for (k, hi) in scan_pairs2(&cand_boxes, &hit_boxes, 0) {
                let s = candidates[k];
                let g = group_of[s];
                if linked.contains(&(g, hi)) {
                    continue;
                }
                let (ls, ss, _) = &shapes[s];
                let hit = &hits[hi];
                if self.conn.interacts(*ls, hit.layer) && ss.interacts(&hit.shape) {
                    linked.insert((g, hi));
                }
            }
            for (g, hi) in linked {
                local_links.push((g, hits[hi].clone()));
            }
        }

        // child content vs. child content
        let mut inst_links: Vec<(Hit<T>, Hit<T>)> = Vec::new();
        for (e1, e2) in scan_pairs(&elem_boxes, 0) {
            let region = elem_boxes[e1].intersection(&elem_boxes[e2]);
            let (c1, t1, _) = elements[e1];
            let (c2, t2, _) = elements[e2];
            let h1 = self.hits_below(c1, t1, &region);
            if h1.is_empty() {
                continue;
            }
            let h2 = self.hits_below(c2, t2, &region);
            let b1: Vec<Rect> = h1.iter().map(|h| h.shape.bbox()).collect();
            let b2: Vec<Rect> = h2.iter().map(|h| h.shape.bbox()).collect();
            let mut seen = BTreeSet::new();
            for (i, j) in scan_pairs2(&b1, &b2, 0) {
                let (a, b) = (&h1[i], &h2[j]);
                if !self.conn.interacts(a.layer, b.layer) || !a.shape.interacts(&b.shape) {
                    continue;
                }
                if seen.insert((a.path.clone(), a.cluster, b.path.clone(), b.cluster)) {
                    inst_links.push((a.clone(), b.clone()));
                }
            }
        }

        // resolve paths (this may add dummies to child cells) and join
        let mut inst_nodes: BTreeMap<ClusterInstance, usize> = BTreeMap::new();
        let mut links: Vec<(usize, usize)> = Vec::new();
        let ng = groups.len();
        let node_of = |target: ClusterInstance, nodes: &mut BTreeMap<ClusterInstance, usize>| {
            let next = ng + nodes.len();
            *nodes.entry(target).or_insert(next)
        };
        for (g, hit) in &local_links {
            let target = self.make_path(hit);
            let n = node_of(target, &mut inst_nodes);
            links.push((*g, n));
        }
        for (a, b) in &inst_links {
            let ta = self.make_path(a);
            let tb = self.make_path(b);
            let na = node_of(ta, &mut inst_nodes);
            let nb = node_of(tb, &mut inst_nodes);
            links.push((na, nb));
        }

        let mut nodes = UnionFind::new(ng + inst_nodes.len());
        for (a, b) in links {
            nodes.union(a, b);
        }
        let mut targets: Vec<Option<ClusterInstance>> = vec![None; ng + inst_nodes.len()];
        for (t, n) in &inst_nodes {
            targets[*n] = Some(*t);
        }

        let mut shape_slots: Vec<Option<(LayerIndex, T, PropId)>> = shapes.into_iter().map(Some).collect();
        let mut cc = self.per_cell.remove(&ci).unwrap_or_default();
        for members in nodes.groups() {
            let mut own = Vec::new();
            let mut conns = Vec::new();
            for m in &members {
                if *m < ng {
                    for s in &groups[*m] {
                        if let Some(shape) = shape_slots[*s].take() {
                            own.push(shape);
                        }
                    }
                } else if let Some(t) = targets[*m] {
                    conns.push(t);
                }
            }
            if own.is_empty() && conns.len() < 2 {
                continue;
            }
            cc.push(own, conns);
        }
        self.per_cell.insert(ci, cc);
    }
}

impl<T: ClusterShape> HierClusters<T> {
    /// Build clusters for all cells called from `top`. The layout must be updated.
    pub fn build(layout: &Layout, top: CellIndex, conn: &Connectivity) -> Self {
        let start = Instant::now();
        log::debug!("[Clusters] Building clusters below '{}'", layout.cell_name(top));

        let layers = conn.layers();
        let mut called = layout.called_cells(top);
        called.insert(top);

        let mut conn_bbox = BTreeMap::new();
        for &ci in &called {
            let b = layers.iter().fold(Rect::empty(), |r, l| r.union(&layout.bbox_on_layer(ci, *l)));
            conn_bbox.insert(ci, b);
        }

        let mut builder = Builder { layout, conn, layers, conn_bbox, per_cell: BTreeMap::new() };
        for ci in layout.bottom_up_order() {
            if called.contains(&ci) && !builder.subtree_bbox(ci).is_empty() {
                builder.build_cell(ci);
            }
        }

        let mut per_cell = builder.per_cell;
        let referenced = Self::referenced_clusters(&per_cell);

        // every placement of a connected cluster must be covered by a parent cluster
        let mut dummies = 0usize;
        for &ci in &called {
            let mut missing = Vec::new();
            for inst in layout.cell(ci).instances() {
                let Some(refs) = referenced.get(&inst.cell) else {
                    continue;
                };
                for et in inst.element_transforms() {
                    for &id in refs {
                        let target = ClusterInstance { id, cell: inst.cell, trans: et };
                        let known = per_cell.get(&ci).and_then(|cc| cc.find_connection(&target));
                        if known.is_none() {
                            missing.push(target);
                        }
                    }
                }
            }
            if !missing.is_empty() {
                let cc = per_cell.entry(ci).or_default();
                for target in missing {
                    cc.find_or_make_dummy(target);
                    dummies += 1;
                }
            }
        }

        let referenced = Self::referenced_clusters(&per_cell);
        let total: usize = per_cell.values().map(|c| c.len()).sum();
        log::info!(
            "[Clusters] {} clusters in {} cells ({} fill-up dummies) ({:.2?})",
            total,
            per_cell.len(),
            dummies,
            start.elapsed()
        );

        Self { top, per_cell, referenced }
    }

    fn referenced_clusters(per_cell: &BTreeMap<CellIndex, ConnectedClusters<T>>) -> BTreeMap<CellIndex, BTreeSet<usize>> {
        let mut referenced: BTreeMap<CellIndex, BTreeSet<usize>> = BTreeMap::new();
        for cc in per_cell.values() {
            for conns in &cc.connections {
                for c in conns {
                    referenced.entry(c.cell).or_default().insert(c.id);
                }
            }
        }
        referenced
    }

    pub fn top(&self) -> CellIndex {
        self.top
    }

    pub fn clusters_per_cell(&self, ci: CellIndex) -> Option<&ConnectedClusters<T>> {
        self.per_cell.get(&ci)
    }

    pub fn cells(&self) -> impl Iterator<Item = CellIndex> + '_ {
        self.per_cell.keys().copied()
    }

    pub fn is_root(&self, ci: CellIndex, id: usize) -> bool {
        !self.referenced.get(&ci).is_some_and(|r| r.contains(&id))
    }

    /// Root cluster ids of a cell in ascending order
    pub fn root_clusters(&self, ci: CellIndex) -> Vec<usize> {
        match self.per_cell.get(&ci) {
            Some(cc) => cc.clusters().iter().map(|c| c.id()).filter(|id| self.is_root(ci, *id)).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Orientation, Vector};
    use crate::layout::CellInstArray;

    fn rect(l: i64, b: i64, r: i64, t: i64) -> Polygon {
        Rect::new(l, b, r, t).to_polygon()
    }

    #[test]
    fn test_local_clusters_touching() {
        let mut layout = Layout::new(0.001);
        let top = layout.add_cell("TOP");
        let l = layout.insert_layer("L");
        layout.insert_polygon(top, l, &rect(0, 0, 10, 10), 0);
        layout.insert_polygon(top, l, &rect(10, 0, 20, 10), 0);
        layout.insert_polygon(top, l, &rect(50, 0, 60, 10), 0);
        layout.update().unwrap();

        let hc = HierClusters::<Polygon>::build(&layout, top, &Connectivity::single(l));
        let cc = hc.clusters_per_cell(top).unwrap();
        assert_eq!(cc.len(), 2);
        assert_eq!(cc.cluster(1).shapes().len(), 2);
        assert_eq!(hc.root_clusters(top), vec![1, 2]);
    }

    #[test]
    fn test_parent_shape_connects_child_cluster() {
        let mut layout = Layout::new(0.001);
        let top = layout.add_cell("TOP");
        let a = layout.add_cell("A");
        let l = layout.insert_layer("L");
        layout.insert_polygon(a, l, &rect(0, 0, 10, 10), 0);
        layout.insert_polygon(top, l, &rect(10, 0, 30, 10), 0);
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::identity()));
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::translation(Vector::new(100, 0))));
        layout.update().unwrap();

        let hc = HierClusters::<Polygon>::build(&layout, top, &Connectivity::single(l));
        let top_cc = hc.clusters_per_cell(top).unwrap();
        // the connected shape plus a fill-up dummy for the second placement
        assert_eq!(top_cc.len(), 2);
        assert_eq!(top_cc.connections(1).len(), 1);
        assert!(top_cc.cluster(2).is_dummy());
        assert!(!hc.is_root(a, 1));
        assert_eq!(hc.root_clusters(a), Vec::<usize>::new());
    }

    #[test]
    fn test_sibling_instances_join_through_dummy() {
        let mut layout = Layout::new(0.001);
        let top = layout.add_cell("TOP");
        let a = layout.add_cell("A");
        let l = layout.insert_layer("L");
        layout.insert_polygon(a, l, &rect(0, 0, 10, 10), 0);
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::identity()));
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::new(Orientation::R0, 1.0, 10.0, 0.0)));
        layout.update().unwrap();

        let hc = HierClusters::<Polygon>::build(&layout, top, &Connectivity::single(l));
        let top_cc = hc.clusters_per_cell(top).unwrap();
        assert_eq!(top_cc.len(), 1);
        assert!(top_cc.cluster(1).is_dummy());
        assert_eq!(top_cc.connections(1).len(), 2);
    }
}

//! Bottom-up merge of hierarchical clusters
//!
//! For a root cluster the merged result is the union of its own shapes and
//! the merged results of all connected child clusters, transformed into the
//! root's frame. Child results are memoized per `(cell, cluster)`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use super::clusters::{ClusterShape, HierClusters};
use crate::layout::{CellIndex, PropId, ShapeBuffer};

/// The merged shapes of one cluster and the property id they inherit
#[derive(Debug, Clone)]
pub struct MergedCluster<T> {
    pub shapes: Vec<T>,
    pub prop_id: PropId,
}

pub struct ClusterMerger<'a, T: ClusterShape> {
    clusters: &'a HierClusters<T>,
    min_coherence: bool,
    min_wc: u32,
    memo: HashMap<(CellIndex, usize), Arc<MergedCluster<T>>>,
    in_progress: HashSet<(CellIndex, usize)>,
    initial: HashSet<(CellIndex, usize)>,
}

impl<'a, T: ClusterShape> ClusterMerger<'a, T> {
    pub fn new(clusters: &'a HierClusters<T>, min_coherence: bool, min_wc: u32) -> Self {
        Self {
            clusters,
            min_coherence,
            min_wc,
            memo: HashMap::new(),
            in_progress: HashSet::new(),
            initial: HashSet::new(),
        }
    }

    /// Merged shapes of a root cluster
    pub fn compute_merged(&mut self, cell: CellIndex, id: usize) -> Arc<MergedCluster<T>> {
        self.compute(cell, id, true)
    }

    fn compute(&mut self, cell: CellIndex, id: usize, initial: bool) -> Arc<MergedCluster<T>> {
        let key = (cell, id);
        assert!(
            !self.in_progress.contains(&key),
            "cluster {} of cell {} re-entered while being merged",
            id,
            cell
        );
        if !initial {
            assert!(
                !self.initial.contains(&key),
                "cluster {} of cell {} is merged as a root and reached as a connection",
                id,
                cell
            );
        }
        if let Some(m) = self.memo.get(&key) {
            return m.clone();
        }
        if initial {
            self.initial.insert(key);
        }
        self.in_progress.insert(key);

        let Some(cc) = self.clusters.clusters_per_cell(cell) else {
            self.in_progress.remove(&key);
            return Arc::new(MergedCluster { shapes: Vec::new(), prop_id: 0 });
        };
        let cluster = cc.cluster(id);
        let mut shapes: Vec<T> = cluster.shapes().iter().map(|(_, s, _)| s.clone()).collect();
        // the lowest own attribute wins; otherwise the first connection carrying one
        let mut prop_id = cluster.attrs().iter().next().copied();

        for conn in cc.connections(id) {
            let child = self.compute(conn.cell, conn.id, false);
            shapes.extend(child.shapes.iter().map(|s| s.transform(&conn.trans)));
            if prop_id.is_none() && child.prop_id != 0 {
                prop_id = Some(child.prop_id);
            }
        }

        // With a wrap count threshold, overlaps must survive until the root
        let shapes = if initial {
            T::merge_all(&shapes, self.min_coherence, self.min_wc)
        } else if self.min_wc == 0 {
            T::merge_all(&shapes, self.min_coherence, 0)
        } else {
            shapes
        };

        let merged = Arc::new(MergedCluster { shapes, prop_id: prop_id.unwrap_or(0) });
        self.in_progress.remove(&key);
        self.memo.insert(key, merged.clone());
        merged
    }
}

/// Merge every root cluster and return the results per cell
pub fn merge_root_clusters<T: ClusterShape>(
    clusters: &HierClusters<T>,
    min_coherence: bool,
    min_wc: u32,
) -> Vec<(CellIndex, ShapeBuffer)> {
    let start = Instant::now();
    log::debug!("[ClusterMerge] Merging root clusters (min_coherence={}, min_wc={})", min_coherence, min_wc);

    let mut merger = ClusterMerger::new(clusters, min_coherence, min_wc);
    let mut out = Vec::new();
    let mut roots = 0usize;
    let cells: Vec<CellIndex> = clusters.cells().collect();
    for ci in cells {
        let mut buf = ShapeBuffer::new();
        for id in clusters.root_clusters(ci) {
            let merged = merger.compute_merged(ci, id);
            for s in merged.shapes.iter().cloned() {
                s.push_into(merged.prop_id, &mut buf);
            }
            roots += 1;
        }
        if !buf.is_empty() {
            out.push((ci, buf));
        }
    }

    log::info!(
        "[ClusterMerge] Merged {} root clusters into {} cells ({:.2?})",
        roots,
        out.len(),
        start.elapsed()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ComplexTrans, Orientation, Polygon, Rect, Vector};
    use crate::hier::clusters::Connectivity;
    use crate::layout::{CellInstArray, LayerIndex, Layout};

    #[test]
    fn test_merge_through_hierarchy() {
        let mut layout = Layout::new(0.001);
        let top = layout.add_cell("TOP");
        let a = layout.add_cell("A");
        let l = layout.insert_layer("L");
        layout.insert_polygon(a, l, &Rect::new(0, 0, 10, 10).to_polygon(), 0);
        layout.insert_polygon(top, l, &Rect::new(10, 0, 30, 10).to_polygon(), 0);
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::identity()));
        layout.update().unwrap();

        let hc = HierClusters::<Polygon>::build(&layout, top, &Connectivity::single(l));
        let results = merge_root_clusters(&hc, false, 0);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, top);
        assert_eq!(results[0].1.polygons, vec![(Rect::new(0, 0, 30, 10).to_polygon(), 0)]);
    }

    /// TOP bridges two child cells carrying property ids 7 and 9
    fn bridged_children(bridge_prop: PropId) -> (Layout, CellIndex, LayerIndex) {
        let mut layout = Layout::new(0.001);
        let top = layout.add_cell("TOP");
        let a = layout.add_cell("A");
        let b = layout.add_cell("B");
        let l = layout.insert_layer("L");
        layout.insert_polygon(a, l, &Rect::new(0, 0, 10, 10).to_polygon(), 7);
        layout.insert_polygon(b, l, &Rect::new(0, 0, 10, 10).to_polygon(), 9);
        layout.insert_polygon(top, l, &Rect::new(10, 0, 20, 10).to_polygon(), bridge_prop);
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::rotation(Orientation::R0)));
        layout.add_instance(top, CellInstArray::new(b, ComplexTrans::translation(Vector::new(20, 0))));
        layout.update().unwrap();
        (layout, top, l)
    }

    #[test]
    fn test_prop_id_from_first_connected_cluster() {
        let (layout, top, l) = bridged_children(0);
        let hc = HierClusters::<Polygon>::build(&layout, top, &Connectivity::single(l));
        let roots = hc.root_clusters(top);
        assert_eq!(roots.len(), 1);
        let id = roots[0];

        let conns = hc.clusters_per_cell(top).unwrap().connections(id);
        let child_props: Vec<PropId> = conns
            .iter()
            .map(|c| *hc.clusters_per_cell(c.cell).unwrap().cluster(c.id).attrs().iter().next().unwrap())
            .collect();
        let mut sorted = child_props.clone();
        sorted.sort();
        assert_eq!(sorted, vec![7, 9]);

        let mut merger = ClusterMerger::new(&hc, false, 0);
        let merged = merger.compute_merged(top, id);
        assert_eq!(merged.prop_id, child_props[0]);
        assert_eq!(merged.shapes, vec![Rect::new(0, 0, 30, 10).to_polygon()]);
    }

    #[test]
    fn test_own_prop_id_overrides_connections() {
        let (layout, top, l) = bridged_children(11);
        let hc = HierClusters::<Polygon>::build(&layout, top, &Connectivity::single(l));
        let roots = hc.root_clusters(top);
        assert_eq!(roots.len(), 1);

        let mut merger = ClusterMerger::new(&hc, false, 0);
        assert_eq!(merger.compute_merged(top, roots[0]).prop_id, 11);
    }

    #[test]
    fn test_min_wc_merges_at_root_only() {
        let mut layout = Layout::new(0.001);
        let top = layout.add_cell("TOP");
        let a = layout.add_cell("A");
        let l = layout.insert_layer("L");
        layout.insert_polygon(a, l, &Rect::new(0, 0, 10, 10).to_polygon(), 0);
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::identity()));
        layout.add_instance(top, CellInstArray::new(a, ComplexTrans::translation(Vector::new(5, 0))));
        layout.update().unwrap();

        let hc = HierClusters::<Polygon>::build(&layout, top, &Connectivity::single(l));
        let results = merge_root_clusters(&hc, false, 1);
        let polys: Vec<Polygon> = results.iter().flat_map(|(_, b)| b.polygons.iter().map(|(p, _)| p.clone())).collect();
        assert_eq!(polys, vec![Rect::new(5, 0, 10, 10).to_polygon()]);
    }
}

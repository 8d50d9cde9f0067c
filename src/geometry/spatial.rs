//! Box scanning for candidate interactions
//!
//! R-tree based pair search: every item is indexed by its bounding box and
//! queried with the same box enlarged by the interaction distance. Boxes that
//! merely touch are reported as candidates.

use rstar::{RTree, RTreeObject, AABB};

use super::types::{Coord, Rect};

/// Index entry with the position of the item in the input slice
#[derive(Clone, Debug)]
struct BoxEntry {
    index: usize,
    bounds: AABB<[Coord; 2]>,
}

impl RTreeObject for BoxEntry {
    type Envelope = AABB<[Coord; 2]>;
    fn envelope(&self) -> Self::Envelope {
        self.bounds
    }
}

fn build_tree(boxes: &[Rect]) -> RTree<BoxEntry> {
    let entries: Vec<BoxEntry> = boxes
        .iter()
        .enumerate()
        .filter(|(_, b)| !b.is_empty())
        .map(|(index, b)| BoxEntry { index, bounds: b.to_aabb() })
        .collect();
    RTree::bulk_load(entries)
}

/// Unordered pairs `(i, j)` with `i < j` whose boxes touch after enlarging by `dist`
pub fn scan_pairs(boxes: &[Rect], dist: Coord) -> Vec<(usize, usize)> {
    let tree = build_tree(boxes);
    let mut pairs = Vec::new();
    for (i, b) in boxes.iter().enumerate() {
        if b.is_empty() {
            continue;
        }
        let query = b.enlarged(dist, dist).to_aabb();
        for hit in tree.locate_in_envelope_intersecting(&query) {
            if hit.index > i {
                pairs.push((i, hit.index));
            }
        }
    }
    pairs.sort_unstable();
    pairs
}

/// Pairs `(i, j)` between two sets whose boxes touch after enlarging the first by `dist`
pub fn scan_pairs2(a: &[Rect], b: &[Rect], dist: Coord) -> Vec<(usize, usize)> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let tree = build_tree(b);
    let mut pairs = Vec::new();
    for (i, ab) in a.iter().enumerate() {
        if ab.is_empty() {
            continue;
        }
        let query = ab.enlarged(dist, dist).to_aabb();
        for hit in tree.locate_in_envelope_intersecting(&query) {
            pairs.push((i, hit.index));
        }
    }
    pairs.sort_unstable();
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_pairs_touching() {
        let boxes = vec![
            Rect::new(0, 0, 10, 10),
            Rect::new(10, 0, 20, 10),
            Rect::new(30, 0, 40, 10),
        ];
        assert_eq!(scan_pairs(&boxes, 0), vec![(0, 1)]);
        assert_eq!(scan_pairs(&boxes, 10), vec![(0, 1), (1, 2)]);
        assert_eq!(scan_pairs(&boxes, 20), vec![(0, 1), (0, 2), (1, 2)]);
    }

    #[test]
    fn test_scan_pairs2() {
        let a = vec![Rect::new(0, 0, 10, 10)];
        let b = vec![Rect::new(12, 0, 20, 10), Rect::empty(), Rect::new(5, 5, 6, 6)];
        assert_eq!(scan_pairs2(&a, &b, 0), vec![(0, 2)]);
        assert_eq!(scan_pairs2(&a, &b, 2), vec![(0, 0), (0, 2)]);
    }
}

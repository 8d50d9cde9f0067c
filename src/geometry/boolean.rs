//! Scanline polygon booleans and merge
//!
//! Contour edges are split at their mutual crossings (snapped to the grid),
//! then swept in vertical slabs between consecutive vertex x coordinates.
//! Inside each slab the edges are ordered by their height at the slab center
//! and the winding numbers of both operands are accumulated bottom to top.
//! Where the boolean predicate flips, a trapezoid boundary is emitted; the
//! boundary pieces are finally stitched into hull and hole contours.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use super::spatial::scan_pairs;
use super::types::{Containment, Coord, Edge, Point, Polygon, Rect};

/// Boolean operation between two polygon sets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BooleanOp {
    Or,
    And,
    ANotB,
    BNotA,
    Xor,
}

impl BooleanOp {
    fn test(self, wa: i32, wb: i32) -> bool {
        let (a, b) = (wa != 0, wb != 0);
        match self {
            BooleanOp::Or => a || b,
            BooleanOp::And => a && b,
            BooleanOp::ANotB => a && !b,
            BooleanOp::BNotA => b && !a,
            BooleanOp::Xor => a != b,
        }
    }
}

const MAX_SPLIT_PASSES: usize = 8;

/// Non-vertical input edge, oriented so that `p1.x < p2.x`
#[derive(Debug, Clone, Copy)]
struct SweepEdge {
    p1: Point,
    p2: Point,
    wa: i32,
    wb: i32,
}

impl SweepEdge {
    fn bbox(&self) -> Rect {
        Rect::from_points(self.p1, self.p2)
    }

    fn dx(&self) -> i128 {
        (self.p2.x - self.p1.x) as i128
    }

    fn dy(&self) -> i128 {
        (self.p2.y - self.p1.y) as i128
    }

    /// y at x, rounded
    fn y_at(&self, x: Coord) -> Coord {
        if x == self.p1.x {
            return self.p1.y;
        }
        if x == self.p2.x {
            return self.p2.y;
        }
        let n = self.p1.y as i128 * self.dx() + self.dy() * (x - self.p1.x) as i128;
        round_div(n, self.dx()) as Coord
    }

    /// Height at x = xm2 / 2 as the fraction (numerator, denominator)
    fn y_at_doubled(&self, xm2: i128) -> (i128, i128) {
        let dx = self.dx();
        (
            2 * self.p1.y as i128 * dx + self.dy() * (xm2 - 2 * self.p1.x as i128),
            2 * dx,
        )
    }
}

/// Rounded integer division, `d > 0`
fn round_div(n: i128, d: i128) -> i128 {
    (2 * n + d).div_euclid(2 * d)
}

fn cmp_at(a: &SweepEdge, b: &SweepEdge, xm2: i128) -> Ordering {
    let (na, da) = a.y_at_doubled(xm2);
    let (nb, db) = b.y_at_doubled(xm2);
    (na * db).cmp(&(nb * da))
}

fn push_polygon_edges(out: &mut Vec<SweepEdge>, poly: &Polygon, is_b: bool) {
    for e in poly.edges() {
        push_edge(out, e.p1, e.p2, if is_b { (0, 1) } else { (1, 0) });
    }
}

/// Orient the edge left to right; a right-to-left edge carries negative winding
fn push_edge(out: &mut Vec<SweepEdge>, p1: Point, p2: Point, w: (i32, i32)) {
    match p1.x.cmp(&p2.x) {
        Ordering::Equal => {}
        Ordering::Less => out.push(SweepEdge { p1, p2, wa: w.0, wb: w.1 }),
        Ordering::Greater => out.push(SweepEdge { p1: p2, p2: p1, wa: -w.0, wb: -w.1 }),
    }
}

/// Whether `p` lies on the segment strictly between its end points (p collinear)
fn strictly_between(e: &SweepEdge, p: &Point) -> bool {
    *p != e.p1 && *p != e.p2 && e.bbox().contains_point(p)
}

fn crossing_points(a: &SweepEdge, b: &SweepEdge, cuts_a: &mut Vec<Point>, cuts_b: &mut Vec<Point>) {
    let r = a.p2 - a.p1;
    let s = b.p2 - b.p1;
    let qp = b.p1 - a.p1;
    let mut den = r.cross(&s);
    if den == 0 {
        if qp.cross(&r) != 0 {
            return;
        }
        for p in [b.p1, b.p2] {
            if strictly_between(a, &p) {
                cuts_a.push(p);
            }
        }
        for p in [a.p1, a.p2] {
            if strictly_between(b, &p) {
                cuts_b.push(p);
            }
        }
        return;
    }
    let mut t_num = qp.cross(&s);
    let mut u_num = qp.cross(&r);
    if den < 0 {
        den = -den;
        t_num = -t_num;
        u_num = -u_num;
    }
    if t_num < 0 || t_num > den || u_num < 0 || u_num > den {
        return;
    }
    let p = Point::new(
        a.p1.x + round_div(r.x as i128 * t_num, den) as Coord,
        a.p1.y + round_div(r.y as i128 * t_num, den) as Coord,
    );
    if t_num > 0 && t_num < den && p != a.p1 && p != a.p2 {
        cuts_a.push(p);
    }
    if u_num > 0 && u_num < den && p != b.p1 && p != b.p2 {
        cuts_b.push(p);
    }
}

/// Split edges at crossings until no interior crossing is left (or the pass limit is hit)
fn split_intersections(mut edges: Vec<SweepEdge>) -> Vec<SweepEdge> {
    for _ in 0..MAX_SPLIT_PASSES {
        let boxes: Vec<Rect> = edges.iter().map(|e| e.bbox()).collect();
        let mut cuts: Vec<Vec<Point>> = vec![Vec::new(); edges.len()];
        for (i, j) in scan_pairs(&boxes, 0) {
            let (a, b) = (edges[i], edges[j]);
            let (mut ca, mut cb) = (Vec::new(), Vec::new());
            crossing_points(&a, &b, &mut ca, &mut cb);
            cuts[i].extend(ca);
            cuts[j].extend(cb);
        }
        if cuts.iter().all(|c| c.is_empty()) {
            break;
        }
        let mut next = Vec::with_capacity(edges.len() * 2);
        for (e, mut c) in edges.into_iter().zip(cuts) {
            if c.is_empty() {
                next.push(e);
                continue;
            }
            let d = e.p2 - e.p1;
            c.sort_by_key(|p| (*p - e.p1).dot(&d));
            c.dedup();
            let mut prev = e.p1;
            for p in c.into_iter().chain(std::iter::once(e.p2)) {
                if p != prev {
                    push_edge(&mut next, prev, p, (e.wa, e.wb));
                }
                prev = p;
            }
        }
        edges = next;
    }
    edges
}

/// Sweep the slabs and return the directed boundary of the region where `pred` holds
fn sweep<F: Fn(i32, i32) -> bool>(edges: &[SweepEdge], pred: F) -> Vec<Edge> {
    let mut xs: Vec<Coord> = edges.iter().flat_map(|e| [e.p1.x, e.p2.x]).collect();
    xs.sort_unstable();
    xs.dedup();

    let mut order: Vec<usize> = (0..edges.len()).collect();
    order.sort_by_key(|&i| edges[i].p1.x);

    let mut next = 0;
    let mut active: Vec<usize> = Vec::new();
    let mut slanted: Vec<Edge> = Vec::new();
    let mut verticals: BTreeMap<Coord, Vec<(Coord, Coord, i32)>> = BTreeMap::new();

    for w in xs.windows(2) {
        let (x0, x1) = (w[0], w[1]);
        active.retain(|&i| edges[i].p2.x > x0);
        while next < order.len() && edges[order[next]].p1.x <= x0 {
            let i = order[next];
            if edges[i].p2.x > x0 {
                active.push(i);
            }
            next += 1;
        }
        if active.is_empty() {
            continue;
        }

        let xm2 = x0 as i128 + x1 as i128;
        active.sort_by(|&a, &b| cmp_at(&edges[a], &edges[b], xm2));

        let (mut wa, mut wb) = (0, 0);
        let mut inside = false;
        let mut bottom: Option<usize> = None;
        let mut k = 0;
        while k < active.len() {
            let mut m = k;
            while m < active.len() && cmp_at(&edges[active[k]], &edges[active[m]], xm2) == Ordering::Equal {
                wa += edges[active[m]].wa;
                wb += edges[active[m]].wb;
                m += 1;
            }
            let now = pred(wa, wb);
            if now != inside {
                if now {
                    bottom = Some(active[k]);
                } else if let Some(bi) = bottom.take() {
                    let (b, t) = (&edges[bi], &edges[active[k]]);
                    let (yb0, yb1, yt0, yt1) = (b.y_at(x0), b.y_at(x1), t.y_at(x0), t.y_at(x1));
                    slanted.push(Edge::new(Point::new(x0, yb0), Point::new(x1, yb1)));
                    slanted.push(Edge::new(Point::new(x1, yt1), Point::new(x0, yt0)));
                    verticals.entry(x1).or_default().push((yb1, yt1, 1));
                    verticals.entry(x0).or_default().push((yb0, yt0, -1));
                }
                inside = now;
            }
            k = m;
        }
    }

    let mut result = cancel_reverse_pairs(slanted);
    for (x, intervals) in verticals {
        result.extend(vertical_edges(x, &intervals));
    }
    result
}

/// Drop pairs of identical edges with opposite direction
fn cancel_reverse_pairs(edges: Vec<Edge>) -> Vec<Edge> {
    let mut counts: HashMap<(Point, Point), usize> = HashMap::new();
    let mut order: Vec<(Point, Point)> = Vec::new();
    for e in edges {
        if e.is_degenerate() {
            continue;
        }
        if let Some(c) = counts.get_mut(&(e.p2, e.p1)).filter(|c| **c > 0) {
            *c -= 1;
            continue;
        }
        let c = counts.entry((e.p1, e.p2)).or_insert(0);
        if *c == 0 {
            order.push((e.p1, e.p2));
        }
        *c += 1;
    }
    let mut out = Vec::new();
    for key in order {
        let c = counts.get(&key).copied().unwrap_or(0);
        for _ in 0..c {
            out.push(Edge::new(key.0, key.1));
        }
    }
    out
}

/// Net vertical boundary at one x: upward intervals come from trapezoids on the left
fn vertical_edges(x: Coord, intervals: &[(Coord, Coord, i32)]) -> Vec<Edge> {
    let mut events: Vec<(Coord, i32)> = Vec::new();
    for &(lo, hi, s) in intervals {
        if lo < hi {
            events.push((lo, s));
            events.push((hi, -s));
        }
    }
    events.sort_unstable();

    let mut segments: Vec<(Coord, Coord, i32)> = Vec::new();
    let mut cur: i32 = 0;
    let mut prev_y = 0;
    let mut i = 0;
    while i < events.len() {
        let y = events[i].0;
        if cur != 0 && prev_y < y {
            let s = cur.signum();
            match segments.last_mut() {
                Some(last) if last.1 == prev_y && last.2 == s => last.1 = y,
                _ => segments.push((prev_y, y, s)),
            }
        }
        while i < events.len() && events[i].0 == y {
            cur += events[i].1;
            i += 1;
        }
        prev_y = y;
    }

    segments
        .into_iter()
        .map(|(lo, hi, s)| {
            if s > 0 {
                Edge::new(Point::new(x, lo), Point::new(x, hi))
            } else {
                Edge::new(Point::new(x, hi), Point::new(x, lo))
            }
        })
        .collect()
}

fn turn_angle(d_in: (i128, i128), d_out: (i128, i128)) -> f64 {
    let cross = (d_in.0 * d_out.1 - d_in.1 * d_out.0) as f64;
    let dot = (d_in.0 * d_out.0 + d_in.1 * d_out.1) as f64;
    cross.atan2(dot)
}

/// Join boundary edges into closed contours.
///
/// At vertices with several continuations, `min_coherence` takes the
/// leftmost turn (corner-touching pieces become separate contours), otherwise
/// the rightmost one.
fn stitch(edges: &[Edge], min_coherence: bool) -> Vec<Vec<Point>> {
    let mut outgoing: HashMap<Point, Vec<usize>> = HashMap::new();
    for (i, e) in edges.iter().enumerate() {
        outgoing.entry(e.p1).or_default().push(i);
    }
    let degree = |p: &Point| outgoing.get(p).map(|v| v.len()).unwrap_or(0);

    let mut starts: Vec<usize> = (0..edges.len()).collect();
    starts.sort_by_key(|&i| (degree(&edges[i].p1) > 1, edges[i].p1, edges[i].p2));

    let mut used = vec![false; edges.len()];
    let mut contours = Vec::new();
    for s in starts {
        if used[s] {
            continue;
        }
        let start = edges[s].p1;
        let mut contour = Vec::new();
        let mut cur = s;
        loop {
            used[cur] = true;
            contour.push(edges[cur].p1);
            let end = edges[cur].p2;
            if end == start {
                break;
            }
            let d_in = edges[cur].d();
            let d_in = (d_in.x as i128, d_in.y as i128);
            let candidates: Vec<usize> = outgoing
                .get(&end)
                .map(|v| v.iter().copied().filter(|&i| !used[i]).collect())
                .unwrap_or_default();
            let pick = candidates.into_iter().max_by(|&a, &b| {
                let da = edges[a].d();
                let db = edges[b].d();
                let ta = turn_angle(d_in, (da.x as i128, da.y as i128));
                let tb = turn_angle(d_in, (db.x as i128, db.y as i128));
                let o = ta.partial_cmp(&tb).unwrap_or(Ordering::Equal);
                if min_coherence { o } else { o.reverse() }
            });
            match pick {
                Some(n) => cur = n,
                None => break,
            }
        }
        if contour.len() >= 3 {
            contours.push(contour);
        }
    }
    contours
}

fn area2(c: &[Point]) -> i128 {
    let n = c.len();
    (0..n)
        .map(|i| {
            let (p, q) = (c[i], c[(i + 1) % n]);
            p.x as i128 * q.y as i128 - q.x as i128 * p.y as i128
        })
        .sum()
}

/// Attach every hole to the smallest hull containing it
fn assemble(contours: Vec<Vec<Point>>) -> Vec<Polygon> {
    let mut hulls: Vec<(Vec<Point>, i128, Rect, Vec<Vec<Point>>)> = Vec::new();
    let mut holes: Vec<Vec<Point>> = Vec::new();
    for c in contours {
        let a = area2(&c);
        if a > 0 {
            let mut bbox = Rect::empty();
            for p in &c {
                bbox.extend_point(*p);
            }
            hulls.push((c, a, bbox, Vec::new()));
        } else if a < 0 {
            holes.push(c);
        }
    }

    let hull_polys: Vec<Polygon> = hulls.iter().map(|h| Polygon::new(h.0.clone())).collect();
    for hole in holes {
        let mut hbox = Rect::empty();
        for p in &hole {
            hbox.extend_point(*p);
        }
        let mut best: Option<usize> = None;
        for (i, h) in hulls.iter().enumerate() {
            if !h.2.contains_rect(&hbox) {
                continue;
            }
            let inside = hole
                .iter()
                .map(|p| hull_polys[i].inside(p))
                .find(|c| *c != Containment::Boundary)
                .unwrap_or(Containment::Inside);
            if inside == Containment::Inside && best.map_or(true, |b| h.1 < hulls[b].1) {
                best = Some(i);
            }
        }
        if let Some(b) = best {
            hulls[b].3.push(hole);
        }
    }

    let mut result: Vec<Polygon> = hulls
        .into_iter()
        .map(|(hull, _, _, holes)| Polygon::with_holes(hull, holes))
        .filter(|p| !p.is_empty())
        .collect();
    result.sort();
    result
}

fn run<F: Fn(i32, i32) -> bool>(edges: Vec<SweepEdge>, pred: F, min_coherence: bool) -> Vec<Polygon> {
    if edges.is_empty() {
        return Vec::new();
    }
    let edges = split_intersections(edges);
    let boundary = sweep(&edges, pred);
    assemble(stitch(&boundary, min_coherence))
}

/// Boolean operation between two polygon sets
pub fn boolean(a: &[Polygon], b: &[Polygon], op: BooleanOp, min_coherence: bool) -> Vec<Polygon> {
    let mut edges = Vec::new();
    for p in a {
        push_polygon_edges(&mut edges, p, false);
    }
    for p in b {
        push_polygon_edges(&mut edges, p, true);
    }
    run(edges, |wa, wb| op.test(wa, wb), min_coherence)
}

/// Merge a polygon set. Only areas covered more than `min_wc` times are kept.
pub fn merge(polys: &[Polygon], min_coherence: bool, min_wc: u32) -> Vec<Polygon> {
    let mut edges = Vec::new();
    for p in polys {
        push_polygon_edges(&mut edges, p, false);
    }
    let min_wc = min_wc as i32;
    run(edges, move |wa, _| wa.abs() > min_wc, min_coherence)
}

/// True if the interiors of two polygons share area
pub fn polygons_overlap(a: &Polygon, b: &Polygon) -> bool {
    if !a.bbox().overlaps(&b.bbox()) {
        return false;
    }
    !boolean(std::slice::from_ref(a), std::slice::from_ref(b), BooleanOp::And, false).is_empty()
}

/// Total area of a polygon set (overlaps counted multiple times)
pub fn total_area(polys: &[Polygon]) -> f64 {
    polys.iter().map(|p| p.area()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(l: Coord, b: Coord, r: Coord, t: Coord) -> Polygon {
        Rect::new(l, b, r, t).to_polygon()
    }

    #[test]
    fn test_merge_overlapping_boxes() {
        let merged = merge(&[rect(0, 0, 10, 10), rect(5, 5, 15, 15)], false, 0);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].area2(), 2 * (100 + 100 - 25));
        assert_eq!(merged[0].hull().len(), 8);
    }

    #[test]
    fn test_merge_abutting_boxes() {
        let merged = merge(&[rect(0, 0, 10, 10), rect(10, 0, 20, 10)], false, 0);
        assert_eq!(merged, vec![rect(0, 0, 20, 10)]);
    }

    #[test]
    fn test_boolean_not_creates_hole() {
        let r = boolean(&[rect(0, 0, 10, 10)], &[rect(2, 2, 4, 4)], BooleanOp::ANotB, false);
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].holes().len(), 1);
        assert_eq!(r[0].area2(), 2 * 96);
    }

    #[test]
    fn test_boolean_and_xor() {
        let a = [rect(0, 0, 10, 10)];
        let b = [rect(5, 0, 15, 10)];
        assert_eq!(boolean(&a, &b, BooleanOp::And, false), vec![rect(5, 0, 10, 10)]);
        let x = boolean(&a, &b, BooleanOp::Xor, false);
        assert_eq!(x, vec![rect(0, 0, 5, 10), rect(10, 0, 15, 10)]);
        assert_eq!(boolean(&a, &b, BooleanOp::BNotA, false), vec![rect(10, 0, 15, 10)]);
    }

    #[test]
    fn test_min_wrap_count() {
        let polys = [rect(0, 0, 10, 10), rect(5, 0, 15, 10)];
        assert_eq!(merge(&polys, false, 1), vec![rect(5, 0, 10, 10)]);
    }

    #[test]
    fn test_corner_touching_coherence() {
        let polys = [rect(0, 0, 10, 10), rect(10, 10, 20, 20)];
        assert_eq!(merge(&polys, true, 0).len(), 2);
        let coherent = merge(&polys, false, 0);
        assert_eq!(coherent.len(), 1);
        assert_eq!(coherent[0].area2(), 400);
    }

    #[test]
    fn test_slanted_crossing() {
        let tri_a = Polygon::new(vec![Point::new(0, 0), Point::new(10, 0), Point::new(0, 10)]);
        let tri_b = Polygon::new(vec![Point::new(0, 0), Point::new(10, 10), Point::new(0, 10)]);
        let and = boolean(&[tri_a.clone()], &[tri_b.clone()], BooleanOp::And, false);
        assert_eq!(and.len(), 1);
        assert_eq!(and[0].area2(), 50);
        let or = boolean(&[tri_a], &[tri_b], BooleanOp::Or, false);
        assert_eq!(or.len(), 1);
        assert_eq!(or[0].area2(), 150);
    }

    #[test]
    fn test_overlap_predicate() {
        assert!(polygons_overlap(&rect(0, 0, 10, 10), &rect(9, 9, 20, 20)));
        assert!(!polygons_overlap(&rect(0, 0, 10, 10), &rect(10, 0, 20, 10)));
    }
}

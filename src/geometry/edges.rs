//! Edge set operations
//!
//! Collinear edges are grouped by their supporting line (primitive direction
//! plus offset) and handled as integer intervals along that line.

use std::collections::BTreeMap;

use super::types::{Containment, Coord, Edge, Point, Polygon};

/// Boolean mode for edge/edge operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeBoolOp {
    And,
    Not,
}

/// Which part of an edge to keep when clipping against polygons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeClipMode {
    /// Parts inside the polygons or on their boundary
    Inside,
    /// Parts strictly outside the polygons
    Outside,
}

fn gcd(a: Coord, b: Coord) -> Coord {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Supporting line of an edge: primitive direction and offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct LineKey {
    ux: Coord,
    uy: Coord,
    offset: i128,
}

impl LineKey {
    fn of(e: &Edge, directed: bool) -> Option<LineKey> {
        let d = e.d();
        if d.is_zero() {
            return None;
        }
        let g = gcd(d.x, d.y);
        let (mut ux, mut uy) = (d.x / g, d.y / g);
        if !directed && (ux < 0 || (ux == 0 && uy < 0)) {
            ux = -ux;
            uy = -uy;
        }
        let offset = ux as i128 * e.p1.y as i128 - uy as i128 * e.p1.x as i128;
        Some(LineKey { ux, uy, offset })
    }

    fn param(&self, p: &Point) -> i128 {
        self.ux as i128 * p.x as i128 + self.uy as i128 * p.y as i128
    }

    fn step(&self) -> i128 {
        self.ux as i128 * self.ux as i128 + self.uy as i128 * self.uy as i128
    }

    /// Grid point at parameter `t` given a reference point on the line
    fn point_at(&self, base: &Point, t: i128) -> Point {
        let k = (t - self.param(base)) / self.step();
        Point::new(base.x + (k * self.ux as i128) as Coord, base.y + (k * self.uy as i128) as Coord)
    }
}

/// Union of sorted-or-not closed intervals; touching intervals are joined
fn union_intervals(mut iv: Vec<(i128, i128)>) -> Vec<(i128, i128)> {
    iv.sort_unstable();
    let mut out: Vec<(i128, i128)> = Vec::new();
    for (lo, hi) in iv {
        match out.last_mut() {
            Some(last) if lo <= last.1 => last.1 = last.1.max(hi),
            _ => out.push((lo, hi)),
        }
    }
    out
}

/// All contour edges of a polygon set
pub fn polygon_edges(polys: &[Polygon]) -> Vec<Edge> {
    polys.iter().flat_map(|p| p.edges()).collect()
}

/// Join overlapping or touching collinear edges of the same direction
pub fn merge_edges(edges: &[Edge]) -> Vec<Edge> {
    let mut groups: BTreeMap<LineKey, (Point, Vec<(i128, i128)>)> = BTreeMap::new();
    for e in edges {
        let Some(key) = LineKey::of(e, true) else { continue };
        let entry = groups.entry(key).or_insert_with(|| (e.p1, Vec::new()));
        entry.1.push((key.param(&e.p1), key.param(&e.p2)));
    }
    let mut out = Vec::new();
    for (key, (base, iv)) in groups {
        for (lo, hi) in union_intervals(iv) {
            out.push(Edge::new(key.point_at(&base, lo), key.point_at(&base, hi)));
        }
    }
    out.sort();
    out
}

/// Collinear AND/NOT between edge sets; direction of `b` edges is irrelevant
pub fn edge_boolean(a: &[Edge], b: &[Edge], op: EdgeBoolOp) -> Vec<Edge> {
    let mut cover: BTreeMap<LineKey, Vec<(i128, i128)>> = BTreeMap::new();
    for e in b {
        let Some(key) = LineKey::of(e, false) else { continue };
        let (t1, t2) = (key.param(&e.p1), key.param(&e.p2));
        cover.entry(key).or_default().push((t1.min(t2), t1.max(t2)));
    }
    let cover: BTreeMap<LineKey, Vec<(i128, i128)>> =
        cover.into_iter().map(|(k, v)| (k, union_intervals(v))).collect();

    let mut out = Vec::new();
    for e in merge_edges(a) {
        let Some(key) = LineKey::of(&e, false) else { continue };
        let (t1, t2) = (key.param(&e.p1), key.param(&e.p2));
        let forward = t1 < t2;
        let (lo, hi) = (t1.min(t2), t1.max(t2));
        let covered: Vec<(i128, i128)> = cover
            .get(&key)
            .map(|iv| {
                iv.iter()
                    .filter(|(c0, c1)| *c1 > lo && *c0 < hi)
                    .map(|(c0, c1)| ((*c0).max(lo), (*c1).min(hi)))
                    .collect()
            })
            .unwrap_or_default();

        let pieces: Vec<(i128, i128)> = match op {
            EdgeBoolOp::And => covered,
            EdgeBoolOp::Not => {
                let mut p = Vec::new();
                let mut cur = lo;
                for (c0, c1) in covered {
                    if c0 > cur {
                        p.push((cur, c0));
                    }
                    cur = cur.max(c1);
                }
                if cur < hi {
                    p.push((cur, hi));
                }
                p
            }
        };
        for (p0, p1) in pieces {
            let (a0, a1) = (key.point_at(&e.p1, p0), key.point_at(&e.p1, p1));
            out.push(if forward { Edge::new(a0, a1) } else { Edge::new(a1, a0) });
        }
    }
    out.sort();
    out
}

fn cut_points(e: &Edge, pe: &Edge, cuts: &mut Vec<Point>) {
    let r = e.d();
    let s = pe.d();
    let qp = pe.p1 - e.p1;
    let mut den = r.cross(&s);
    if den == 0 {
        if qp.cross(&r) == 0 {
            for p in [pe.p1, pe.p2] {
                if e.contains_point(&p) {
                    cuts.push(p);
                }
            }
        }
        return;
    }
    let mut t = qp.cross(&s);
    let mut u = qp.cross(&r);
    if den < 0 {
        den = -den;
        t = -t;
        u = -u;
    }
    if t < 0 || t > den || u < 0 || u > den {
        return;
    }
    let x = e.p1.x as f64 + r.x as f64 * t as f64 / den as f64;
    let y = e.p1.y as f64 + r.y as f64 * t as f64 / den as f64;
    cuts.push(Point::new(x.round() as Coord, y.round() as Coord));
}

fn classify(mid2: (i128, i128), polys: &[Polygon]) -> Containment {
    let mut result = Containment::Outside;
    for p in polys {
        match p.inside_scaled(mid2.0, mid2.1, 2) {
            Containment::Inside => return Containment::Inside,
            Containment::Boundary => result = Containment::Boundary,
            Containment::Outside => {}
        }
    }
    result
}

/// Keep the parts of `edges` inside (including boundary) or strictly outside `polys`
pub fn clip_edges(edges: &[Edge], polys: &[Polygon], mode: EdgeClipMode) -> Vec<Edge> {
    let mut out = Vec::new();
    for e in edges {
        if e.is_degenerate() {
            continue;
        }
        let ebox = e.bbox();
        let near: Vec<&Polygon> = polys.iter().filter(|p| p.bbox().touches(&ebox)).collect();
        if near.is_empty() {
            if mode == EdgeClipMode::Outside {
                out.push(*e);
            }
            continue;
        }
        let mut cuts = vec![e.p1, e.p2];
        for p in &near {
            for pe in p.edges() {
                if pe.bbox().touches(&ebox) {
                    cut_points(e, &pe, &mut cuts);
                }
            }
        }
        let d = e.d();
        cuts.sort_by_key(|p| (*p - e.p1).dot(&d));
        cuts.dedup();

        let near_polys: Vec<Polygon> = near.into_iter().cloned().collect();
        for w in cuts.windows(2) {
            let (a, b) = (w[0], w[1]);
            if a == b {
                continue;
            }
            let mid2 = (a.x as i128 + b.x as i128, a.y as i128 + b.y as i128);
            let keep = match classify(mid2, &near_polys) {
                Containment::Inside | Containment::Boundary => mode == EdgeClipMode::Inside,
                Containment::Outside => mode == EdgeClipMode::Outside,
            };
            if keep {
                out.push(Edge::new(a, b));
            }
        }
    }
    merge_edges(&out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::types::Rect;

    #[test]
    fn test_merge_collinear_edges() {
        let edges = vec![
            Edge::from_coords(0, 0, 10, 0),
            Edge::from_coords(5, 0, 20, 0),
            Edge::from_coords(20, 0, 30, 0),
            Edge::from_coords(10, 0, 0, 0),
        ];
        let merged = merge_edges(&edges);
        assert_eq!(merged.len(), 2);
        assert!(merged.contains(&Edge::from_coords(0, 0, 30, 0)));
        assert!(merged.contains(&Edge::from_coords(10, 0, 0, 0)));
    }

    #[test]
    fn test_edge_and_not() {
        let a = vec![Edge::from_coords(0, 0, 30, 0)];
        let b = vec![Edge::from_coords(20, 0, 10, 0)];
        assert_eq!(edge_boolean(&a, &b, EdgeBoolOp::And), vec![Edge::from_coords(10, 0, 20, 0)]);
        assert_eq!(
            edge_boolean(&a, &b, EdgeBoolOp::Not),
            vec![Edge::from_coords(0, 0, 10, 0), Edge::from_coords(20, 0, 30, 0)]
        );
    }

    #[test]
    fn test_clip_edges_against_box() {
        let polys = vec![Rect::new(10, -5, 20, 5).to_polygon()];
        let edges = vec![Edge::from_coords(0, 0, 30, 0)];
        assert_eq!(
            clip_edges(&edges, &polys, EdgeClipMode::Inside),
            vec![Edge::from_coords(10, 0, 20, 0)]
        );
        assert_eq!(clip_edges(&edges, &polys, EdgeClipMode::Outside).len(), 2);

        // boundary counts as inside
        let on_border = vec![Edge::from_coords(10, 5, 20, 5)];
        assert_eq!(clip_edges(&on_border, &polys, EdgeClipMode::Inside), on_border);
        assert!(clip_edges(&on_border, &polys, EdgeClipMode::Outside).is_empty());
    }
}

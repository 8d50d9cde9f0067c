//! Polygon sizing (outset/inset)
//!
//! Positive sizing is the union of the polygons with one quad per edge swept
//! along its outward normal and one corner piece per convex vertex. The corner
//! piece depends on the mode:
//!
//! * 0: bevel (straight connection of the offset edges)
//! * 1: miter limited at the sizing distance
//! * 2: miter limited at √2 times the distance (square corners for 90° angles)
//! * 3: miter limited at 2 times the distance
//! * 4: miter limited at 4 times the distance
//! * 5: unlimited miter
//!
//! Negative sizing grows the complement inside a frame and subtracts it.

use super::boolean::{boolean, merge, BooleanOp};
use super::types::{Coord, Edge, Point, Polygon, Rect};

pub const DEFAULT_SIZING_MODE: u32 = 2;
pub const MAX_SIZING_MODE: u32 = 5;

fn miter_limit(mode: u32) -> Option<f64> {
    match mode {
        0 => Some(0.0),
        1 => Some(1.0),
        2 => Some(std::f64::consts::SQRT_2),
        3 => Some(2.0),
        4 => Some(4.0),
        _ => None,
    }
}

fn round_point(x: f64, y: f64) -> Point {
    Point::new(x.round() as Coord, y.round() as Coord)
}

/// Outward offset of an edge (interior on the left)
fn edge_offset(e: &Edge, dx: Coord, dy: Coord) -> (f64, f64) {
    let len = e.length();
    if len < 1e-12 {
        return (0.0, 0.0);
    }
    let d = e.d();
    let (nx, ny) = (d.y as f64 / len, -(d.x as f64) / len);
    (nx * dx as f64, ny * dy as f64)
}

/// Corner fill between two consecutive offset edges at vertex `v`
fn corner_piece(u: Point, v: Point, w: Point, dx: Coord, dy: Coord, mode: u32) -> Option<Polygon> {
    let e1 = Edge::new(u, v);
    let e2 = Edge::new(v, w);
    if e1.d().cross(&e2.d()) <= 0 {
        return None;
    }
    let o1 = edge_offset(&e1, dx, dy);
    let o2 = edge_offset(&e2, dx, dy);
    let (vx, vy) = (v.x as f64, v.y as f64);
    let a = (vx + o1.0, vy + o1.1);
    let b = (vx + o2.0, vy + o2.1);

    let limit = miter_limit(mode);
    if limit == Some(0.0) {
        return Some(Polygon::new(vec![v, round_point(a.0, a.1), round_point(b.0, b.1)]));
    }

    // miter point: intersection of the two offset lines
    let d1 = (e1.d().x as f64, e1.d().y as f64);
    let d2 = (e2.d().x as f64, e2.d().y as f64);
    let den = d1.0 * d2.1 - d1.1 * d2.0;
    let t = ((b.0 - a.0) * d2.1 - (b.1 - a.1) * d2.0) / den;
    let m = (a.0 + d1.0 * t, a.1 + d1.1 * t);
    let mlen = ((m.0 - vx).powi(2) + (m.1 - vy).powi(2)).sqrt();
    let dist = dx.max(dy) as f64;

    match limit {
        Some(l) if mlen > l * dist + 1e-9 => {
            // cut the miter perpendicular to the bisector at distance l * dist
            let bis = ((m.0 - vx) / mlen, (m.1 - vy) / mlen);
            let cut = l * dist;
            let along = |p: (f64, f64)| {
                let pa = (p.0 - vx) * bis.0 + (p.1 - vy) * bis.1;
                let pm = mlen;
                let q = if (pm - pa).abs() < 1e-12 { 0.0 } else { ((cut - pa) / (pm - pa)).clamp(0.0, 1.0) };
                (p.0 + (m.0 - p.0) * q, p.1 + (m.1 - p.1) * q)
            };
            let c1 = along(a);
            let c2 = along(b);
            Some(Polygon::new(vec![
                v,
                round_point(a.0, a.1),
                round_point(c1.0, c1.1),
                round_point(c2.0, c2.1),
                round_point(b.0, b.1),
            ]))
        }
        _ => Some(Polygon::new(vec![
            v,
            round_point(a.0, a.1),
            round_point(m.0, m.1),
            round_point(b.0, b.1),
        ])),
    }
}

fn grow(polys: &[Polygon], dx: Coord, dy: Coord, mode: u32) -> Vec<Polygon> {
    let mut pieces: Vec<Polygon> = polys.to_vec();
    for p in polys {
        for contour in std::iter::once(p.hull()).chain(p.holes().iter().map(|h| h.as_slice())) {
            let n = contour.len();
            for i in 0..n {
                let (u, v, w) = (contour[(i + n - 1) % n], contour[i], contour[(i + 1) % n]);
                let e = Edge::new(v, w);
                let o = edge_offset(&e, dx, dy);
                let quad = Polygon::new(vec![
                    v,
                    w,
                    round_point(w.x as f64 + o.0, w.y as f64 + o.1),
                    round_point(v.x as f64 + o.0, v.y as f64 + o.1),
                ]);
                if !quad.is_empty() {
                    pieces.push(quad);
                }
                if let Some(c) = corner_piece(u, v, w, dx, dy, mode) {
                    if !c.is_empty() {
                        pieces.push(c);
                    }
                }
            }
        }
    }
    merge(&pieces, false, 0)
}

fn bounding_box(polys: &[Polygon]) -> Rect {
    polys.iter().fold(Rect::empty(), |r, p| r.union(&p.bbox()))
}

/// Size a polygon set by `dx`/`dy`; the result is merged
pub fn size_polygons(polys: &[Polygon], dx: Coord, dy: Coord, mode: u32) -> Vec<Polygon> {
    if polys.is_empty() {
        return Vec::new();
    }
    if dx == 0 && dy == 0 {
        return merge(polys, false, 0);
    }
    if dx >= 0 && dy >= 0 {
        return grow(polys, dx, dy, mode);
    }
    if dx <= 0 && dy <= 0 {
        let (gx, gy) = (-dx, -dy);
        let frame = bounding_box(polys).enlarged(2 * gx + 2, 2 * gy + 2);
        let outside = boolean(&[frame.to_polygon()], polys, BooleanOp::ANotB, false);
        let grown = grow(&outside, gx, gy, mode);
        return boolean(polys, &grown, BooleanOp::ANotB, false);
    }
    // mixed signs: one axis at a time
    let first = size_polygons(polys, dx, 0, mode);
    size_polygons(&first, 0, dy, mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(l: Coord, b: Coord, r: Coord, t: Coord) -> Polygon {
        Rect::new(l, b, r, t).to_polygon()
    }

    #[test]
    fn test_grow_box_square_corners() {
        let r = size_polygons(&[rect(0, 0, 10, 10)], 2, 2, DEFAULT_SIZING_MODE);
        assert_eq!(r, vec![rect(-2, -2, 12, 12)]);
    }

    #[test]
    fn test_grow_box_bevel() {
        let r = size_polygons(&[rect(0, 0, 10, 10)], 2, 2, 0);
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].hull().len(), 8);
        assert_eq!(r[0].area2(), 2 * (14 * 14 - 4 * 2));
    }

    #[test]
    fn test_shrink_box() {
        let r = size_polygons(&[rect(0, 0, 10, 10)], -2, -2, DEFAULT_SIZING_MODE);
        assert_eq!(r, vec![rect(2, 2, 8, 8)]);
        assert!(size_polygons(&[rect(0, 0, 10, 10)], -5, -5, 2).is_empty());
    }

    #[test]
    fn test_anisotropic_sizing() {
        let r = size_polygons(&[rect(0, 0, 10, 10)], 3, 1, DEFAULT_SIZING_MODE);
        assert_eq!(r, vec![rect(-3, -1, 13, 11)]);
        let m = size_polygons(&[rect(0, 0, 10, 10)], 2, -1, DEFAULT_SIZING_MODE);
        assert_eq!(m, vec![rect(-2, 1, 12, 9)]);
    }

    #[test]
    fn test_grow_merges_neighbors() {
        let r = size_polygons(&[rect(0, 0, 10, 10), rect(12, 0, 20, 10)], 1, 1, 2);
        assert_eq!(r, vec![rect(-1, -1, 21, 11)]);
    }
}

//! Core integer geometry types
//!
//! All coordinates live on the database-unit grid. Polygons are kept in a
//! normalized form (hull counter-clockwise, holes clockwise, canonical start
//! vertex) so that value equality means geometric equality.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use super::transform::Transformation;

/// Integer coordinate on the database-unit grid
pub type Coord = i64;

/// A 2D point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: Coord,
    pub y: Coord,
}

/// A 2D displacement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Vector {
    pub x: Coord,
    pub y: Coord,
}

impl Point {
    pub const fn new(x: Coord, y: Coord) -> Self {
        Self { x, y }
    }

    pub fn to_vector(self) -> Vector {
        Vector::new(self.x, self.y)
    }

    pub fn sq_distance(&self, other: &Point) -> i128 {
        (*other - *self).sq_length()
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.sq_distance(other) as f64).sqrt()
    }
}

impl Vector {
    pub const fn new(x: Coord, y: Coord) -> Self {
        Self { x, y }
    }

    pub fn cross(&self, other: &Vector) -> i128 {
        self.x as i128 * other.y as i128 - self.y as i128 * other.x as i128
    }

    pub fn dot(&self, other: &Vector) -> i128 {
        self.x as i128 * other.x as i128 + self.y as i128 * other.y as i128
    }

    pub fn sq_length(&self) -> i128 {
        self.dot(self)
    }

    pub fn length(&self) -> f64 {
        (self.sq_length() as f64).sqrt()
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0
    }
}

impl Add<Vector> for Point {
    type Output = Point;
    fn add(self, v: Vector) -> Point {
        Point::new(self.x + v.x, self.y + v.y)
    }
}

impl Sub<Vector> for Point {
    type Output = Point;
    fn sub(self, v: Vector) -> Point {
        Point::new(self.x - v.x, self.y - v.y)
    }
}

impl Sub<Point> for Point {
    type Output = Vector;
    fn sub(self, p: Point) -> Vector {
        Vector::new(self.x - p.x, self.y - p.y)
    }
}

impl Add for Vector {
    type Output = Vector;
    fn add(self, v: Vector) -> Vector {
        Vector::new(self.x + v.x, self.y + v.y)
    }
}

impl AddAssign for Vector {
    fn add_assign(&mut self, v: Vector) {
        self.x += v.x;
        self.y += v.y;
    }
}

impl Sub for Vector {
    type Output = Vector;
    fn sub(self, v: Vector) -> Vector {
        Vector::new(self.x - v.x, self.y - v.y)
    }
}

impl Neg for Vector {
    type Output = Vector;
    fn neg(self) -> Vector {
        Vector::new(-self.x, -self.y)
    }
}

impl Mul<Coord> for Vector {
    type Output = Vector;
    fn mul(self, f: Coord) -> Vector {
        Vector::new(self.x * f, self.y * f)
    }
}

/// Twice the signed area of the triangle (a, b, c); positive for a left turn
pub fn cross3(a: Point, b: Point, c: Point) -> i128 {
    (b - a).cross(&(c - a))
}

/// Axis-aligned box. A box with `left > right` or `bottom > top` is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Rect {
    pub left: Coord,
    pub bottom: Coord,
    pub right: Coord,
    pub top: Coord,
}

impl Default for Rect {
    fn default() -> Self {
        Rect::empty()
    }
}

impl Rect {
    /// Create a box from two corner coordinates (any order)
    pub fn new(x1: Coord, y1: Coord, x2: Coord, y2: Coord) -> Self {
        Self {
            left: x1.min(x2),
            bottom: y1.min(y2),
            right: x1.max(x2),
            top: y1.max(y2),
        }
    }

    pub fn from_points(p1: Point, p2: Point) -> Self {
        Self::new(p1.x, p1.y, p2.x, p2.y)
    }

    pub const fn empty() -> Self {
        Self { left: 1, bottom: 1, right: -1, top: -1 }
    }

    pub fn is_empty(&self) -> bool {
        self.left > self.right || self.bottom > self.top
    }

    pub fn width(&self) -> Coord {
        if self.is_empty() { 0 } else { self.right - self.left }
    }

    pub fn height(&self) -> Coord {
        if self.is_empty() { 0 } else { self.top - self.bottom }
    }

    pub fn p1(&self) -> Point {
        Point::new(self.left, self.bottom)
    }

    pub fn p2(&self) -> Point {
        Point::new(self.right, self.top)
    }

    pub fn center(&self) -> Point {
        Point::new((self.left + self.right) / 2, (self.bottom + self.top) / 2)
    }

    pub fn area(&self) -> i128 {
        self.width() as i128 * self.height() as i128
    }

    /// Grow by `dx` horizontally and `dy` vertically on each side
    pub fn enlarged(&self, dx: Coord, dy: Coord) -> Rect {
        if self.is_empty() {
            return *self;
        }
        let r = Rect {
            left: self.left - dx,
            bottom: self.bottom - dy,
            right: self.right + dx,
            top: self.top + dy,
        };
        if r.is_empty() { Rect::empty() } else { r }
    }

    pub fn moved(&self, v: Vector) -> Rect {
        if self.is_empty() {
            return *self;
        }
        Rect {
            left: self.left + v.x,
            bottom: self.bottom + v.y,
            right: self.right + v.x,
            top: self.top + v.y,
        }
    }

    /// Closed intersection test: boxes sharing only an edge or corner touch
    pub fn touches(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.left <= other.right
            && other.left <= self.right
            && self.bottom <= other.top
            && other.bottom <= self.top
    }

    /// Open intersection test: the interiors must share area
    pub fn overlaps(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.left < other.right
            && other.left < self.right
            && self.bottom < other.top
            && other.bottom < self.top
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        !self.is_empty()
            && p.x >= self.left
            && p.x <= self.right
            && p.y >= self.bottom
            && p.y <= self.top
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.is_empty()
            || (!self.is_empty()
                && other.left >= self.left
                && other.right <= self.right
                && other.bottom >= self.bottom
                && other.top <= self.top)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect {
            left: self.left.min(other.left),
            bottom: self.bottom.min(other.bottom),
            right: self.right.max(other.right),
            top: self.top.max(other.top),
        }
    }

    pub fn intersection(&self, other: &Rect) -> Rect {
        if !self.touches(other) {
            return Rect::empty();
        }
        Rect {
            left: self.left.max(other.left),
            bottom: self.bottom.max(other.bottom),
            right: self.right.min(other.right),
            top: self.top.min(other.top),
        }
    }

    pub fn extend_point(&mut self, p: Point) {
        if self.is_empty() {
            *self = Rect::from_points(p, p);
        } else {
            self.left = self.left.min(p.x);
            self.bottom = self.bottom.min(p.y);
            self.right = self.right.max(p.x);
            self.top = self.top.max(p.y);
        }
    }

    pub fn to_polygon(&self) -> Polygon {
        Polygon::from_rect(self)
    }

    /// Envelope for the R-tree index
    pub fn to_aabb(&self) -> rstar::AABB<[Coord; 2]> {
        rstar::AABB::from_corners([self.left, self.bottom], [self.right, self.top])
    }

    pub fn transformed<T: Transformation>(&self, t: &T) -> Rect {
        if self.is_empty() {
            return *self;
        }
        let mut r = Rect::empty();
        for p in [
            self.p1(),
            self.p2(),
            Point::new(self.left, self.top),
            Point::new(self.right, self.bottom),
        ] {
            r.extend_point(t.apply(p));
        }
        r
    }
}

/// A directed edge. For edges derived from polygons the interior is on the left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Edge {
    pub p1: Point,
    pub p2: Point,
}

impl Edge {
    pub const fn new(p1: Point, p2: Point) -> Self {
        Self { p1, p2 }
    }

    pub fn from_coords(x1: Coord, y1: Coord, x2: Coord, y2: Coord) -> Self {
        Self::new(Point::new(x1, y1), Point::new(x2, y2))
    }

    pub fn d(&self) -> Vector {
        self.p2 - self.p1
    }

    pub fn is_degenerate(&self) -> bool {
        self.p1 == self.p2
    }

    pub fn reversed(&self) -> Edge {
        Edge::new(self.p2, self.p1)
    }

    pub fn bbox(&self) -> Rect {
        Rect::from_points(self.p1, self.p2)
    }

    pub fn length(&self) -> f64 {
        self.d().length()
    }

    pub fn sq_length(&self) -> i128 {
        self.d().sq_length()
    }

    pub fn is_ortho(&self) -> bool {
        self.p1.x == self.p2.x || self.p1.y == self.p2.y
    }

    pub fn moved(&self, v: Vector) -> Edge {
        Edge::new(self.p1 + v, self.p2 + v)
    }

    /// Sign of the side `p` is on: 1 = left, -1 = right, 0 = on the line
    pub fn side_of(&self, p: &Point) -> i32 {
        match cross3(self.p1, self.p2, *p).cmp(&0) {
            Ordering::Greater => 1,
            Ordering::Less => -1,
            Ordering::Equal => 0,
        }
    }

    pub fn is_parallel(&self, other: &Edge) -> bool {
        self.d().cross(&other.d()) == 0
    }

    /// Whether `p` lies on the closed segment
    pub fn contains_point(&self, p: &Point) -> bool {
        if cross3(self.p1, self.p2, *p) != 0 {
            return false;
        }
        self.bbox().contains_point(p)
    }

    /// Closed segment intersection test (touching and collinear overlap count)
    pub fn intersects(&self, other: &Edge) -> bool {
        if !self.bbox().touches(&other.bbox()) {
            return false;
        }
        let d1 = cross3(self.p1, self.p2, other.p1).signum();
        let d2 = cross3(self.p1, self.p2, other.p2).signum();
        let d3 = cross3(other.p1, other.p2, self.p1).signum();
        let d4 = cross3(other.p1, other.p2, self.p2).signum();
        if d1 * d2 < 0 && d3 * d4 < 0 {
            return true;
        }
        self.contains_point(&other.p1)
            || self.contains_point(&other.p2)
            || other.contains_point(&self.p1)
            || other.contains_point(&self.p2)
    }

    /// Euclidean distance from `p` to the closed segment
    pub fn distance_to_point(&self, p: &Point) -> f64 {
        point_segment_distance(p.x as f64, p.y as f64, self)
    }

    /// Minimum Euclidean distance between two segments
    pub fn distance_to_edge(&self, other: &Edge) -> f64 {
        if self.intersects(other) {
            return 0.0;
        }
        self.distance_to_point(&other.p1)
            .min(self.distance_to_point(&other.p2))
            .min(other.distance_to_point(&self.p1))
            .min(other.distance_to_point(&self.p2))
    }

    /// Point at parameter `t` (0 = p1, 1 = p2), rounded to the grid
    pub fn point_at(&self, t: f64) -> Point {
        let d = self.d();
        Point::new(
            self.p1.x + (d.x as f64 * t).round() as Coord,
            self.p1.y + (d.y as f64 * t).round() as Coord,
        )
    }

    /// Mirroring transformations swap the end points so the interior stays on the left
    pub fn transformed<T: Transformation>(&self, t: &T) -> Edge {
        let (a, b) = (t.apply(self.p1), t.apply(self.p2));
        if t.is_mirror() { Edge::new(b, a) } else { Edge::new(a, b) }
    }
}

/// Euclidean distance from a real-valued point to a segment
pub fn point_segment_distance(px: f64, py: f64, e: &Edge) -> f64 {
    let (ax, ay) = (e.p1.x as f64, e.p1.y as f64);
    let (dx, dy) = ((e.p2.x - e.p1.x) as f64, (e.p2.y - e.p1.y) as f64);
    let len2 = dx * dx + dy * dy;
    if len2 < 1e-12 {
        return ((px - ax).powi(2) + (py - ay).powi(2)).sqrt();
    }
    let t = (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0);
    let (cx, cy) = (ax + t * dx, ay + t * dy);
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

/// A pair of edges, usually the two sides of a DRC violation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct EdgePair {
    pub first: Edge,
    pub second: Edge,
    /// Symmetric pairs compare equal regardless of edge order
    pub symmetric: bool,
}

impl EdgePair {
    pub fn new(first: Edge, second: Edge) -> Self {
        Self { first, second, symmetric: false }
    }

    pub fn new_symmetric(first: Edge, second: Edge) -> Self {
        Self { first, second, symmetric: true }
    }

    fn key(&self) -> (Edge, Edge, bool) {
        if self.symmetric && self.second < self.first {
            (self.second, self.first, true)
        } else {
            (self.first, self.second, self.symmetric)
        }
    }

    pub fn bbox(&self) -> Rect {
        self.first.bbox().union(&self.second.bbox())
    }

    pub fn distance(&self) -> f64 {
        self.first.distance_to_edge(&self.second)
    }

    pub fn swapped(&self) -> EdgePair {
        EdgePair { first: self.second, second: self.first, symmetric: self.symmetric }
    }

    pub fn transformed<T: Transformation>(&self, t: &T) -> EdgePair {
        EdgePair {
            first: self.first.transformed(t),
            second: self.second.transformed(t),
            symmetric: self.symmetric,
        }
    }

    /// The marker polygon spanned by both edges, or the enlarged box when degenerate
    pub fn to_polygon(&self, enlarge: Coord) -> Polygon {
        let pts = [self.first.p1, self.first.p2, self.second.p1, self.second.p2];
        let hull = convex_hull(&pts);
        let poly = Polygon::new(hull);
        if poly.is_empty() {
            let r = self.bbox().enlarged(enlarge, enlarge);
            if r.width() > 0 && r.height() > 0 {
                return Polygon::from_rect(&r);
            }
            return Polygon::default();
        }
        poly
    }
}

impl PartialEq for EdgePair {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for EdgePair {}

impl Hash for EdgePair {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for EdgePair {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgePair {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Monotone chain convex hull, counter-clockwise
fn convex_hull(points: &[Point]) -> Vec<Point> {
    let mut pts: Vec<Point> = points.to_vec();
    pts.sort();
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }
    let mut lower: Vec<Point> = Vec::new();
    for p in &pts {
        while lower.len() >= 2 && cross3(lower[lower.len() - 2], lower[lower.len() - 1], *p) <= 0 {
            lower.pop();
        }
        lower.push(*p);
    }
    let mut upper: Vec<Point> = Vec::new();
    for p in pts.iter().rev() {
        while upper.len() >= 2 && cross3(upper[upper.len() - 2], upper[upper.len() - 1], *p) <= 0 {
            upper.pop();
        }
        upper.push(*p);
    }
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Result of a point containment test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    Inside,
    Boundary,
    Outside,
}

/// A polygon with holes.
///
/// The hull is counter-clockwise, holes are clockwise, so every contour edge
/// has the polygon interior on its left side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Polygon {
    hull: Vec<Point>,
    holes: Vec<Vec<Point>>,
}

impl Polygon {
    /// Create a polygon from a hull contour (any orientation)
    pub fn new(hull: Vec<Point>) -> Self {
        Self::with_holes(hull, Vec::new())
    }

    /// Create a polygon from a hull and hole contours (any orientation)
    pub fn with_holes(hull: Vec<Point>, holes: Vec<Vec<Point>>) -> Self {
        let hull = normalize_contour(hull, true);
        if hull.is_empty() {
            return Polygon::default();
        }
        let mut holes: Vec<Vec<Point>> = holes
            .into_iter()
            .map(|h| normalize_contour(h, false))
            .filter(|h| !h.is_empty())
            .collect();
        holes.sort();
        Self { hull, holes }
    }

    pub fn from_rect(r: &Rect) -> Self {
        if r.is_empty() {
            return Polygon::default();
        }
        Self::new(vec![
            Point::new(r.left, r.bottom),
            Point::new(r.right, r.bottom),
            Point::new(r.right, r.top),
            Point::new(r.left, r.top),
        ])
    }

    pub fn hull(&self) -> &[Point] {
        &self.hull
    }

    pub fn holes(&self) -> &[Vec<Point>] {
        &self.holes
    }

    pub fn is_empty(&self) -> bool {
        self.hull.len() < 3
    }

    pub fn num_points(&self) -> usize {
        self.hull.len() + self.holes.iter().map(|h| h.len()).sum::<usize>()
    }

    pub fn bbox(&self) -> Rect {
        let mut r = Rect::empty();
        for p in &self.hull {
            r.extend_point(*p);
        }
        r
    }

    pub fn is_box(&self) -> bool {
        self.holes.is_empty()
            && self.hull.len() == 4
            && self.edges().all(|e| e.is_ortho())
    }

    /// Twice the enclosed area (holes subtracted)
    pub fn area2(&self) -> i128 {
        contour_area2(&self.hull) + self.holes.iter().map(|h| contour_area2(h)).sum::<i128>()
    }

    pub fn area(&self) -> f64 {
        self.area2() as f64 / 2.0
    }

    pub fn perimeter(&self) -> f64 {
        self.edges().map(|e| e.length()).sum()
    }

    /// All contour edges, hull first, interior on the left
    pub fn edges(&self) -> impl Iterator<Item = Edge> + '_ {
        std::iter::once(&self.hull)
            .chain(self.holes.iter())
            .flat_map(|c| contour_edges(c))
    }

    pub fn moved(&self, v: Vector) -> Polygon {
        Polygon {
            hull: self.hull.iter().map(|p| *p + v).collect(),
            holes: self
                .holes
                .iter()
                .map(|h| h.iter().map(|p| *p + v).collect())
                .collect(),
        }
    }

    pub fn transformed<T: Transformation>(&self, t: &T) -> Polygon {
        Polygon::with_holes(
            self.hull.iter().map(|p| t.apply(*p)).collect(),
            self.holes
                .iter()
                .map(|h| h.iter().map(|p| t.apply(*p)).collect())
                .collect(),
        )
    }

    /// Point containment with boundary detection
    pub fn inside(&self, p: &Point) -> Containment {
        self.inside_scaled(p.x as i128, p.y as i128, 1)
    }

    /// Containment of the point (px/scale, py/scale); used for exact midpoint tests
    pub fn inside_scaled(&self, px: i128, py: i128, scale: i128) -> Containment {
        let mut wn = 0;
        for c in std::iter::once(&self.hull).chain(self.holes.iter()) {
            match contour_winding(c, px, py, scale) {
                None => return Containment::Boundary,
                Some(w) => wn += w,
            }
        }
        if wn != 0 { Containment::Inside } else { Containment::Outside }
    }

    /// True if the closed point sets of both polygons intersect
    pub fn touches(&self, other: &Polygon) -> bool {
        if self.is_empty() || other.is_empty() || !self.bbox().touches(&other.bbox()) {
            return false;
        }
        let obox = other.bbox();
        for ea in self.edges() {
            if !ea.bbox().touches(&obox) {
                continue;
            }
            for eb in other.edges() {
                if ea.intersects(&eb) {
                    return true;
                }
            }
        }
        self.inside(&other.hull[0]) != Containment::Outside
            || other.inside(&self.hull[0]) != Containment::Outside
    }

    /// True if the edge touches the closed polygon
    pub fn touches_edge(&self, e: &Edge) -> bool {
        if self.is_empty() || !self.bbox().touches(&e.bbox()) {
            return false;
        }
        if self.edges().any(|pe| pe.intersects(e)) {
            return true;
        }
        self.inside(&e.p1) != Containment::Outside
    }
}

fn contour_edges(c: &[Point]) -> impl Iterator<Item = Edge> + '_ {
    let n = c.len();
    (0..n).map(move |i| Edge::new(c[i], c[(i + 1) % n]))
}

fn contour_area2(c: &[Point]) -> i128 {
    let n = c.len();
    let mut a: i128 = 0;
    for i in 0..n {
        let p = c[i];
        let q = c[(i + 1) % n];
        a += p.x as i128 * q.y as i128 - q.x as i128 * p.y as i128;
    }
    a
}

/// Winding number of a contour around (px/scale, py/scale); `None` if on the boundary
fn contour_winding(c: &[Point], px: i128, py: i128, scale: i128) -> Option<i32> {
    let n = c.len();
    let mut wn = 0;
    for i in 0..n {
        let (ax, ay) = (c[i].x as i128 * scale, c[i].y as i128 * scale);
        let (bx, by) = (c[(i + 1) % n].x as i128 * scale, c[(i + 1) % n].y as i128 * scale);
        let cr = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
        if cr == 0
            && px >= ax.min(bx)
            && px <= ax.max(bx)
            && py >= ay.min(by)
            && py <= ay.max(by)
        {
            return None;
        }
        if ay <= py {
            if by > py && cr > 0 {
                wn += 1;
            }
        } else if by <= py && cr < 0 {
            wn -= 1;
        }
    }
    Some(wn)
}

/// Remove duplicate and collinear points, orient and rotate to the canonical start
pub(crate) fn normalize_contour(pts: Vec<Point>, ccw: bool) -> Vec<Point> {
    let mut out: Vec<Point> = Vec::with_capacity(pts.len());
    for p in pts {
        if out.last() == Some(&p) {
            continue;
        }
        out.push(p);
        while out.len() >= 3 {
            let n = out.len();
            if cross3(out[n - 3], out[n - 2], out[n - 1]) == 0 {
                out.remove(n - 2);
            } else {
                break;
            }
        }
    }
    // close the ring
    loop {
        let mut changed = false;
        if out.len() >= 2 && out.first() == out.last() {
            out.pop();
            changed = true;
        }
        if out.len() >= 3 {
            let n = out.len();
            if cross3(out[n - 2], out[n - 1], out[0]) == 0 {
                out.pop();
                changed = true;
            } else if cross3(out[n - 1], out[0], out[1]) == 0 {
                out.remove(0);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    if out.len() < 3 {
        return Vec::new();
    }
    let a = contour_area2(&out);
    if a == 0 {
        return Vec::new();
    }
    if (a > 0) != ccw {
        out.reverse();
    }
    let start = out
        .iter()
        .enumerate()
        .min_by_key(|(_, p)| **p)
        .map(|(i, _)| i)
        .unwrap_or(0);
    out.rotate_left(start);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_normalization() {
        let a = Polygon::new(vec![
            Point::new(10, 10),
            Point::new(0, 10),
            Point::new(0, 0),
            Point::new(5, 0),
            Point::new(10, 0),
        ]);
        let b = Polygon::from_rect(&Rect::new(0, 0, 10, 10));
        assert_eq!(a, b);
        assert_eq!(a.hull().len(), 4);
        assert_eq!(a.area2(), 200);
        assert!(a.is_box());
    }

    #[test]
    fn test_polygon_with_hole_area() {
        let p = Polygon::with_holes(
            Rect::new(0, 0, 10, 10).to_polygon().hull().to_vec(),
            vec![Rect::new(2, 2, 4, 4).to_polygon().hull().to_vec()],
        );
        assert_eq!(p.area2(), 2 * (100 - 4));
        assert_eq!(p.inside(&Point::new(3, 3)), Containment::Outside);
        assert_eq!(p.inside(&Point::new(1, 1)), Containment::Inside);
        assert_eq!(p.inside(&Point::new(2, 3)), Containment::Boundary);
    }

    #[test]
    fn test_touching_polygons() {
        let a = Rect::new(0, 0, 10, 10).to_polygon();
        let b = Rect::new(10, 0, 20, 10).to_polygon();
        let c = Rect::new(11, 0, 20, 10).to_polygon();
        let inner = Rect::new(2, 2, 3, 3).to_polygon();
        assert!(a.touches(&b));
        assert!(!a.touches(&c));
        assert!(a.touches(&inner));
    }

    #[test]
    fn test_symmetric_edge_pair_equality() {
        let e1 = Edge::from_coords(0, 0, 0, 10);
        let e2 = Edge::from_coords(5, 10, 5, 0);
        assert_eq!(EdgePair::new_symmetric(e1, e2), EdgePair::new_symmetric(e2, e1));
        assert_ne!(EdgePair::new(e1, e2), EdgePair::new(e2, e1));
        assert!((EdgePair::new(e1, e2).distance() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_edge_intersection() {
        let a = Edge::from_coords(0, 0, 10, 10);
        let b = Edge::from_coords(0, 10, 10, 0);
        let c = Edge::from_coords(20, 0, 30, 0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert_eq!(a.side_of(&Point::new(0, 5)), 1);
    }
}

//! Edge relations for design-rule checks
//!
//! A relation check looks at one edge pair at a time and reports the parts of
//! both edges that violate the distance. Which side of each edge the other one
//! must be on follows from the relation kind: width-like checks look inside
//! the shapes, space-like checks look outside, enclosure checks look from an
//! inner edge to an outer one.

use serde::{Deserialize, Serialize};

use super::types::{point_segment_distance, EdgePair, Coord, Edge, Point};

/// Distance measure between two edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Euclidean,
    /// Distance region is a box around the edge extended by `d` at the ends
    Square,
    /// Only the area perpendicular to the edge counts
    Projection,
}

/// DRC relation between edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Width,
    Space,
    Notch,
    Isolated,
    Separation,
    Overlap,
    Enclosing,
    Inside,
}

impl RelationKind {
    pub const ALL: [RelationKind; 8] = [
        RelationKind::Width,
        RelationKind::Space,
        RelationKind::Notch,
        RelationKind::Isolated,
        RelationKind::Separation,
        RelationKind::Overlap,
        RelationKind::Enclosing,
        RelationKind::Inside,
    ];

    pub fn name(self) -> &'static str {
        match self {
            RelationKind::Width => "width",
            RelationKind::Space => "space",
            RelationKind::Notch => "notch",
            RelationKind::Isolated => "isolated",
            RelationKind::Separation => "separation",
            RelationKind::Overlap => "overlap",
            RelationKind::Enclosing => "enclosing",
            RelationKind::Inside => "inside",
        }
    }

    pub fn from_name(name: &str) -> Option<RelationKind> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Checks that compare a layer with itself
    pub fn is_single_layer(self) -> bool {
        matches!(
            self,
            RelationKind::Width | RelationKind::Space | RelationKind::Notch | RelationKind::Isolated
        )
    }

    /// Single-layer checks report symmetric edge pairs
    pub fn is_symmetric(self) -> bool {
        self.is_single_layer()
    }

    /// Pairs of edges from the same polygon are checked
    pub fn checks_intra_polygon(self) -> bool {
        matches!(self, RelationKind::Width | RelationKind::Notch | RelationKind::Space)
    }

    /// Pairs of edges from different polygons are checked
    pub fn checks_inter_polygon(self) -> bool {
        !matches!(self, RelationKind::Width | RelationKind::Notch)
    }

    /// Required side of the second edge relative to the first and vice versa (+1 = left)
    fn sides(self) -> (i32, i32) {
        match self {
            RelationKind::Width | RelationKind::Overlap => (1, 1),
            RelationKind::Space
            | RelationKind::Notch
            | RelationKind::Isolated
            | RelationKind::Separation => (-1, -1),
            RelationKind::Enclosing => (1, -1),
            RelationKind::Inside => (-1, 1),
        }
    }

    /// Facing relations expect anti-parallel edges, enclosures parallel ones
    fn expects_parallel(self) -> bool {
        matches!(self, RelationKind::Enclosing | RelationKind::Inside)
    }
}

/// Options shared by all relation checks
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckOptions {
    pub metric: Metric,
    /// Report the full edges instead of the violating parts
    pub whole_edges: bool,
    /// Edge pairs enclosing this angle (degrees) or more are ignored
    pub ignore_angle: f64,
    pub min_projection: Coord,
    pub max_projection: Option<Coord>,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            metric: Metric::Euclidean,
            whole_edges: false,
            ignore_angle: 90.0,
            min_projection: 0,
            max_projection: None,
        }
    }
}

/// Tests edge pairs against one relation and distance
#[derive(Debug, Clone)]
pub struct EdgeRelationFilter {
    kind: RelationKind,
    distance: f64,
    options: CheckOptions,
}

const SEARCH_STEPS: usize = 80;

/// Real-valued edge with a parameter along it
#[derive(Clone, Copy)]
struct FEdge {
    x1: f64,
    y1: f64,
    dx: f64,
    dy: f64,
}

impl FEdge {
    fn of(e: &Edge) -> Self {
        Self {
            x1: e.p1.x as f64,
            y1: e.p1.y as f64,
            dx: (e.p2.x - e.p1.x) as f64,
            dy: (e.p2.y - e.p1.y) as f64,
        }
    }

    fn at(&self, s: f64) -> (f64, f64) {
        (self.x1 + self.dx * s, self.y1 + self.dy * s)
    }

    fn len(&self) -> f64 {
        (self.dx * self.dx + self.dy * self.dy).sqrt()
    }

    /// Signed distance-like cross product of a point relative to the line
    fn side(&self, x: f64, y: f64) -> f64 {
        self.dx * (y - self.y1) - self.dy * (x - self.x1)
    }

    /// (along, across) coordinates of a point in the edge frame
    fn local(&self, x: f64, y: f64) -> (f64, f64) {
        let l = self.len();
        let (ux, uy) = (self.dx / l, self.dy / l);
        let (px, py) = (x - self.x1, y - self.y1);
        (px * ux + py * uy, (px * uy - py * ux).abs())
    }
}

impl EdgeRelationFilter {
    pub fn new(kind: RelationKind, distance: f64, options: CheckOptions) -> Self {
        Self { kind, distance, options }
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn options(&self) -> &CheckOptions {
        &self.options
    }

    /// Search distance for candidate boxes
    pub fn search_distance(&self) -> Coord {
        self.distance.ceil() as Coord
    }

    fn angle_ok(&self, a: &Edge, b: &Edge) -> bool {
        let (da, db) = (a.d(), b.d());
        let mut dot = da.dot(&db) as f64;
        if !self.kind.expects_parallel() {
            dot = -dot;
        }
        let cos = (dot / (da.length() * db.length())).clamp(-1.0, 1.0);
        cos.acos().to_degrees() < self.options.ignore_angle - 1e-9
    }

    fn metric_distance(&self, x: f64, y: f64, other: &Edge, of: &FEdge) -> f64 {
        match self.options.metric {
            Metric::Euclidean => point_segment_distance(x, y, other),
            Metric::Square => {
                let (along, across) = of.local(x, y);
                let outside = (-along).max(along - of.len()).max(0.0);
                across.max(outside)
            }
            Metric::Projection => of.local(x, y).1,
        }
    }

    /// Parameter interval of `e` on the required side of `other` and within distance
    fn part(&self, e: &Edge, other: &Edge, side: i32) -> Option<(f64, f64)> {
        let fe = FEdge::of(e);
        let fo = FEdge::of(other);

        // side constraint: linear in s
        let sign = side as f64;
        let g0 = sign * fo.side(fe.x1, fe.y1);
        let (ex, ey) = fe.at(1.0);
        let g1 = sign * fo.side(ex, ey);
        let (mut lo, mut hi) = match (g0 > 0.0, g1 > 0.0) {
            (true, true) => (0.0, 1.0),
            (false, false) => return None,
            (true, false) => (0.0, g0 / (g0 - g1)),
            (false, true) => (g0 / (g0 - g1), 1.0),
        };

        if self.options.metric == Metric::Projection {
            // the projection of the part must fall onto the other edge
            let l = fo.len();
            let a0 = fo.local(fe.x1, fe.y1).0;
            let a1 = fo.local(ex, ey).0;
            let (p0, p1) = if (a1 - a0).abs() < 1e-12 {
                if a0 < 0.0 || a0 > l {
                    return None;
                }
                (0.0, 1.0)
            } else {
                let s_at0 = (0.0 - a0) / (a1 - a0);
                let s_atl = (l - a0) / (a1 - a0);
                (s_at0.min(s_atl), s_at0.max(s_atl))
            };
            lo = lo.max(p0);
            hi = hi.min(p1);
        }
        if hi - lo <= 1e-12 {
            return None;
        }

        let d = self.distance;
        let f = |s: f64| {
            let (x, y) = fe.at(s);
            self.metric_distance(x, y, other, &fo)
        };

        let (mut l, mut h) = (lo, hi);
        for _ in 0..SEARCH_STEPS {
            let m1 = l + (h - l) / 3.0;
            let m2 = h - (h - l) / 3.0;
            if f(m1) <= f(m2) {
                h = m2;
            } else {
                l = m1;
            }
        }
        let sm = (l + h) / 2.0;
        if f(sm) >= d {
            return None;
        }
        let bisect = |mut inside: f64, mut outside: f64| {
            for _ in 0..SEARCH_STEPS {
                let m = (inside + outside) / 2.0;
                if f(m) < d {
                    inside = m;
                } else {
                    outside = m;
                }
            }
            inside
        };
        let s0 = if f(lo) < d { lo } else { bisect(sm, lo) };
        let s1 = if f(hi) < d { hi } else { bisect(sm, hi) };
        if s1 - s0 <= 1e-12 {
            return None;
        }
        Some((s0, s1))
    }

    fn sub_edge(e: &Edge, iv: (f64, f64)) -> Edge {
        let fe = FEdge::of(e);
        let (x0, y0) = fe.at(iv.0);
        let (x1, y1) = fe.at(iv.1);
        Edge::new(
            Point::new(x0.round() as Coord, y0.round() as Coord),
            Point::new(x1.round() as Coord, y1.round() as Coord),
        )
    }

    /// Check edge `a` (from the subject) against edge `b`
    pub fn check(&self, a: &Edge, b: &Edge) -> Option<EdgePair> {
        if a.is_degenerate() || b.is_degenerate() {
            return None;
        }
        let reach = self.search_distance();
        if !a.bbox().enlarged(reach, reach).touches(&b.bbox()) {
            return None;
        }
        if !self.angle_ok(a, b) {
            return None;
        }
        let (side_b, side_a) = self.kind.sides();
        let ia = self.part(a, b, side_a)?;
        let ib = self.part(b, a, side_b)?;

        let fb = FEdge::of(b);
        let fa = FEdge::of(a);
        let proj = (ia.1 - ia.0) * ((fa.dx * fb.dx + fa.dy * fb.dy) / fb.len()).abs();
        if proj + 1e-9 < self.options.min_projection as f64 {
            return None;
        }
        if let Some(max) = self.options.max_projection {
            if proj > max as f64 + 1e-9 {
                return None;
            }
        }

        let (first, second) = if self.options.whole_edges {
            (*a, *b)
        } else {
            (Self::sub_edge(a, ia), Self::sub_edge(b, ib))
        };
        Some(EdgePair { first, second, symmetric: self.kind.is_symmetric() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(kind: RelationKind, d: f64) -> EdgeRelationFilter {
        EdgeRelationFilter::new(kind, d, CheckOptions::default())
    }

    #[test]
    fn test_width_facing_edges() {
        let bottom = Edge::from_coords(0, 0, 10, 0);
        let top = Edge::from_coords(10, 2, 0, 2);
        let ep = filter(RelationKind::Width, 3.0).check(&bottom, &top).unwrap();
        assert_eq!(ep.first, bottom);
        assert_eq!(ep.second, top);
        assert!(ep.symmetric);
        assert!(filter(RelationKind::Width, 2.0).check(&bottom, &top).is_none());
    }

    #[test]
    fn test_space_needs_outside_facing() {
        // right edge of box 1 and left edge of box 2
        let a = Edge::from_coords(10, 0, 10, 10);
        let b = Edge::from_coords(12, 10, 12, 0);
        assert!(filter(RelationKind::Space, 3.0).check(&a, &b).is_some());
        assert!(filter(RelationKind::Width, 3.0).check(&a, &b).is_none());
    }

    #[test]
    fn test_partial_edges_reported() {
        let a = Edge::from_coords(0, 10, 0, 0);
        let b = Edge::from_coords(-2, 5, -2, 20);
        let ep = filter(RelationKind::Space, 3.0).check(&a, &b).unwrap();
        assert_eq!(ep.first, Edge::from_coords(0, 10, 0, 3));
        assert_eq!(ep.second, Edge::from_coords(-2, 5, -2, 12));

        let opts = CheckOptions { metric: Metric::Projection, ..CheckOptions::default() };
        let ep = EdgeRelationFilter::new(RelationKind::Space, 3.0, opts).check(&a, &b).unwrap();
        assert_eq!(ep.first, Edge::from_coords(0, 10, 0, 5));
        assert_eq!(ep.second, Edge::from_coords(-2, 5, -2, 10));
    }

    #[test]
    fn test_projection_metric_ignores_corners() {
        let a = Edge::from_coords(10, 10, 0, 10);
        let b = Edge::from_coords(12, 12, 22, 12);
        assert!(filter(RelationKind::Space, 3.0).check(&a, &b).is_some());
        let opts = CheckOptions { metric: Metric::Projection, ..CheckOptions::default() };
        assert!(EdgeRelationFilter::new(RelationKind::Space, 3.0, opts).check(&a, &b).is_none());
    }

    #[test]
    fn test_enclosing_relation() {
        // outer box edge and inner box edge, both bottom edges
        let outer = Edge::from_coords(0, 0, 20, 0);
        let inner = Edge::from_coords(5, 1, 15, 1);
        let ep = filter(RelationKind::Enclosing, 2.0).check(&outer, &inner).unwrap();
        assert_eq!(ep.second, inner);
        assert!(!ep.symmetric);
        assert!(filter(RelationKind::Inside, 2.0).check(&inner, &outer).is_some());
        assert!(filter(RelationKind::Enclosing, 1.0).check(&outer, &inner).is_none());
    }
}

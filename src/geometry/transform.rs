//! Orientations, simple and complex transformations
//!
//! An [`Orientation`] is one of the eight axis-preserving rotations/mirrors.
//! It is encoded mirror-then-rotate: `M0` mirrors at the x axis, the other
//! mirrored codes rotate that mirror image by 90°, 180° or 270°.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Mul;

use super::types::{Coord, Point, Vector};

/// Anything that maps grid points to grid points
pub trait Transformation {
    fn apply(&self, p: Point) -> Point;
    fn is_mirror(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    R0,
    R90,
    R180,
    R270,
    M0,
    M45,
    M90,
    M135,
}

const ROTATIONS: [[[i64; 2]; 2]; 4] = [
    [[1, 0], [0, 1]],
    [[0, -1], [1, 0]],
    [[-1, 0], [0, -1]],
    [[0, 1], [-1, 0]],
];

impl Orientation {
    pub const ALL: [Orientation; 8] = [
        Orientation::R0,
        Orientation::R90,
        Orientation::R180,
        Orientation::R270,
        Orientation::M0,
        Orientation::M45,
        Orientation::M90,
        Orientation::M135,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Self {
        Self::ALL[(code & 7) as usize]
    }

    /// Number of counter-clockwise quarter turns
    pub fn quarter_turns(self) -> u8 {
        self.code() & 3
    }

    pub fn is_mirror(self) -> bool {
        self.code() >= 4
    }

    /// True if x and y axes are exchanged
    pub fn swaps_axes(self) -> bool {
        self.quarter_turns() % 2 == 1
    }

    /// Rotation angle in degrees (0, 90, 180, 270)
    pub fn angle(self) -> u32 {
        self.quarter_turns() as u32 * 90
    }

    pub fn matrix(self) -> [[i64; 2]; 2] {
        let r = ROTATIONS[self.quarter_turns() as usize];
        if self.is_mirror() {
            [[r[0][0], -r[0][1]], [r[1][0], -r[1][1]]]
        } else {
            r
        }
    }

    fn from_matrix(m: [[i64; 2]; 2]) -> Self {
        Self::ALL
            .iter()
            .copied()
            .find(|o| o.matrix() == m)
            .unwrap_or(Orientation::R0)
    }

    pub fn apply(self, x: Coord, y: Coord) -> (Coord, Coord) {
        let m = self.matrix();
        (m[0][0] * x + m[0][1] * y, m[1][0] * x + m[1][1] * y)
    }

    pub fn apply_f64(self, x: f64, y: f64) -> (f64, f64) {
        let m = self.matrix();
        (
            m[0][0] as f64 * x + m[0][1] as f64 * y,
            m[1][0] as f64 * x + m[1][1] as f64 * y,
        )
    }

    /// `self * other`: `other` is applied first
    pub fn compose(self, other: Orientation) -> Orientation {
        let a = self.matrix();
        let b = other.matrix();
        let mut m = [[0; 2]; 2];
        for (i, row) in m.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = a[i][0] * b[0][j] + a[i][1] * b[1][j];
            }
        }
        Self::from_matrix(m)
    }

    pub fn inverted(self) -> Orientation {
        let m = self.matrix();
        Self::from_matrix([[m[0][0], m[1][0]], [m[0][1], m[1][1]]])
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Orientation::R0 => "r0",
            Orientation::R90 => "r90",
            Orientation::R180 => "r180",
            Orientation::R270 => "r270",
            Orientation::M0 => "m0",
            Orientation::M45 => "m45",
            Orientation::M90 => "m90",
            Orientation::M135 => "m135",
        };
        f.write_str(s)
    }
}

/// Orientation plus integer displacement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct SimpleTrans {
    pub rot: Orientation,
    pub disp: Vector,
}

impl SimpleTrans {
    pub const fn new(rot: Orientation, disp: Vector) -> Self {
        Self { rot, disp }
    }

    pub fn identity() -> Self {
        Self::default()
    }

    pub fn translation(disp: Vector) -> Self {
        Self::new(Orientation::R0, disp)
    }

    pub fn is_identity(&self) -> bool {
        self.rot == Orientation::R0 && self.disp.is_zero()
    }

    pub fn rotate_vector(&self, v: Vector) -> Vector {
        let (x, y) = self.rot.apply(v.x, v.y);
        Vector::new(x, y)
    }

    pub fn compose(&self, other: &SimpleTrans) -> SimpleTrans {
        SimpleTrans {
            rot: self.rot.compose(other.rot),
            disp: self.rotate_vector(other.disp) + self.disp,
        }
    }

    pub fn inverted(&self) -> SimpleTrans {
        let rot = self.rot.inverted();
        let (x, y) = rot.apply(self.disp.x, self.disp.y);
        SimpleTrans { rot, disp: Vector::new(-x, -y) }
    }
}

impl Transformation for SimpleTrans {
    fn apply(&self, p: Point) -> Point {
        let (x, y) = self.rot.apply(p.x, p.y);
        Point::new(x + self.disp.x, y + self.disp.y)
    }

    fn is_mirror(&self) -> bool {
        self.rot.is_mirror()
    }
}

impl Mul for SimpleTrans {
    type Output = SimpleTrans;
    fn mul(self, rhs: SimpleTrans) -> SimpleTrans {
        self.compose(&rhs)
    }
}

const MAG_QUANTUM: f64 = 1e9;
const DISP_QUANTUM: f64 = 1e5;

/// Orientation, magnification and real-valued displacement.
///
/// Points are rounded to the grid after transformation. Comparison, hashing
/// and ordering use a quantized key so transformations that agree up to
/// floating-point noise are the same key in variant and context maps.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ComplexTrans {
    pub rot: Orientation,
    pub mag: f64,
    pub dx: f64,
    pub dy: f64,
}

impl Default for ComplexTrans {
    fn default() -> Self {
        Self::identity()
    }
}

impl ComplexTrans {
    pub fn new(rot: Orientation, mag: f64, dx: f64, dy: f64) -> Self {
        Self { rot, mag, dx, dy }
    }

    pub const fn identity() -> Self {
        Self { rot: Orientation::R0, mag: 1.0, dx: 0.0, dy: 0.0 }
    }

    pub fn from_simple(t: &SimpleTrans) -> Self {
        Self::new(t.rot, 1.0, t.disp.x as f64, t.disp.y as f64)
    }

    pub fn translation(v: Vector) -> Self {
        Self::new(Orientation::R0, 1.0, v.x as f64, v.y as f64)
    }

    pub fn rotation(rot: Orientation) -> Self {
        Self::new(rot, 1.0, 0.0, 0.0)
    }

    pub fn magnification(mag: f64) -> Self {
        Self::new(Orientation::R0, mag, 0.0, 0.0)
    }

    fn key(&self) -> (u8, i64, i64, i64) {
        (
            self.rot.code(),
            (self.mag * MAG_QUANTUM).round() as i64,
            (self.dx * DISP_QUANTUM).round() as i64,
            (self.dy * DISP_QUANTUM).round() as i64,
        )
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    pub fn is_mag(&self) -> bool {
        (self.mag - 1.0).abs() > 1e-10
    }

    pub fn is_ortho_unit(&self) -> bool {
        !self.is_mag()
    }

    /// The transformation as a simple one if it has unit magnification and an integer displacement
    pub fn to_simple(&self) -> Option<SimpleTrans> {
        if self.is_mag() {
            return None;
        }
        let (rx, ry) = (self.dx.round(), self.dy.round());
        if (rx - self.dx).abs() > 1e-6 || (ry - self.dy).abs() > 1e-6 {
            return None;
        }
        Some(SimpleTrans::new(self.rot, Vector::new(rx as Coord, ry as Coord)))
    }

    pub fn disp(&self) -> Vector {
        Vector::new(self.dx.round() as Coord, self.dy.round() as Coord)
    }

    pub fn apply_f64(&self, x: f64, y: f64) -> (f64, f64) {
        let (rx, ry) = self.rot.apply_f64(x, y);
        (rx * self.mag + self.dx, ry * self.mag + self.dy)
    }

    /// Transform a length (used for distances measured in a cell's frame)
    pub fn apply_distance(&self, d: Coord) -> Coord {
        (d as f64 * self.mag).round() as Coord
    }

    pub fn compose(&self, other: &ComplexTrans) -> ComplexTrans {
        let (ox, oy) = self.rot.apply_f64(other.dx, other.dy);
        ComplexTrans {
            rot: self.rot.compose(other.rot),
            mag: self.mag * other.mag,
            dx: ox * self.mag + self.dx,
            dy: oy * self.mag + self.dy,
        }
    }

    pub fn inverted(&self) -> ComplexTrans {
        let rot = self.rot.inverted();
        let mag = 1.0 / self.mag;
        let (x, y) = rot.apply_f64(self.dx, self.dy);
        ComplexTrans { rot, mag, dx: -x * mag, dy: -y * mag }
    }
}

impl Transformation for ComplexTrans {
    fn apply(&self, p: Point) -> Point {
        let (x, y) = self.apply_f64(p.x as f64, p.y as f64);
        Point::new(x.round() as Coord, y.round() as Coord)
    }

    fn is_mirror(&self) -> bool {
        self.rot.is_mirror()
    }
}

impl Mul for ComplexTrans {
    type Output = ComplexTrans;
    fn mul(self, rhs: ComplexTrans) -> ComplexTrans {
        self.compose(&rhs)
    }
}

impl PartialEq for ComplexTrans {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ComplexTrans {}

impl Hash for ComplexTrans {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for ComplexTrans {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ComplexTrans {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for ComplexTrans {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.rot)?;
        if self.is_mag() {
            write!(f, " *{}", self.mag)?;
        }
        write!(f, " {},{}", self.dx, self.dy)
    }
}

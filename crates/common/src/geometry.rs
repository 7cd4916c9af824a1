//! Geometric primitives.
//!
//! World space is a plain Cartesian plane; nothing here assumes the y axis
//! points up or down. Render targets decide that through their view window.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// A 2D point (or vector) in world units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance(&self, other: Point) -> f64 {
        (*self - other).length()
    }

    #[inline]
    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    #[inline]
    pub fn dot(&self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    #[inline]
    pub fn lerp(&self, other: Point, t: f64) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Distance from this point to the segment `a`–`b`.
    pub fn distance_to_segment(&self, a: Point, b: Point) -> f64 {
        let ab = b - a;
        let len2 = ab.dot(ab);
        if len2 == 0.0 {
            return self.distance(a);
        }
        let t = ((*self - a).dot(ab) / len2).clamp(0.0, 1.0);
        self.distance(a + ab * t)
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f64> for Point {
    type Output = Point;
    fn div(self, rhs: f64) -> Point {
        Point::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Point::new(x, y)
    }
}

/// An axis-aligned rectangle given by its minimum and maximum corners.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    /// Build a rectangle from two opposite corners in any order.
    #[inline]
    pub fn from_points(p1: Point, p2: Point) -> Self {
        Self {
            min: Point::new(p1.x.min(p2.x), p1.y.min(p2.y)),
            max: Point::new(p1.x.max(p2.x), p1.y.max(p2.y)),
        }
    }

    #[inline]
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self::from_points(Point::new(x0, y0), Point::new(x1, y1))
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn center(&self) -> Point {
        self.min.lerp(self.max, 0.5)
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// The four corners, counter-clockwise from `min`.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }

    /// Inclusive point containment.
    #[inline]
    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }

    #[inline]
    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.contains_point(other.min) && self.contains_point(other.max)
    }

    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        if !self.intersects(other) {
            return None;
        }
        Some(Rect {
            min: Point::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y)),
            max: Point::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y)),
        })
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    #[inline]
    pub fn translate(&self, offset: Point) -> Rect {
        Rect {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    #[inline]
    pub fn inflate(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.min.x - dx, self.min.y - dy, self.max.x + dx, self.max.y + dy)
    }

    /// Bounding box of a set of points; `None` for an empty iterator.
    pub fn enclosing(points: impl IntoIterator<Item = Point>) -> Option<Rect> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Rect { min: first, max: first }, |r, p| r.union(&Rect { min: p, max: p })))
    }

    pub fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }
}

/// The extent of a layer's (or a stack's) visible contribution.
///
/// Unbounded contributions are an explicit variant rather than a rectangle
/// with huge coordinates; every consumer has to match on it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Bounds {
    /// Contributes nothing.
    #[default]
    Empty,
    Finite(Rect),
    /// Covers the whole plane.
    Infinite,
}

impl Bounds {
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Bounds::Empty)
    }

    #[inline]
    pub fn is_infinite(&self) -> bool {
        matches!(self, Bounds::Infinite)
    }

    #[inline]
    pub fn rect(&self) -> Option<Rect> {
        match self {
            Bounds::Finite(rect) => Some(*rect),
            _ => None,
        }
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        match (self, other) {
            (Bounds::Infinite, _) | (_, Bounds::Infinite) => Bounds::Infinite,
            (Bounds::Empty, b) | (b, Bounds::Empty) => *b,
            (Bounds::Finite(a), Bounds::Finite(b)) => Bounds::Finite(a.union(b)),
        }
    }

    pub fn intersection(&self, other: &Bounds) -> Bounds {
        match (self, other) {
            (Bounds::Empty, _) | (_, Bounds::Empty) => Bounds::Empty,
            (Bounds::Infinite, b) | (b, Bounds::Infinite) => *b,
            (Bounds::Finite(a), Bounds::Finite(b)) => {
                a.intersection(b).map_or(Bounds::Empty, Bounds::Finite)
            }
        }
    }

    /// Whether `other` lies entirely within this bound.
    pub fn covers(&self, other: &Bounds) -> bool {
        match (self, other) {
            (_, Bounds::Empty) => true,
            (Bounds::Infinite, _) => true,
            (_, Bounds::Infinite) | (Bounds::Empty, _) => false,
            (Bounds::Finite(a), Bounds::Finite(b)) => a.contains_rect(b),
        }
    }

    pub fn contains_point(&self, point: Point) -> bool {
        match self {
            Bounds::Empty => false,
            Bounds::Finite(rect) => rect.contains_point(point),
            Bounds::Infinite => true,
        }
    }

    pub fn inflate(&self, dx: f64, dy: f64) -> Bounds {
        match self {
            Bounds::Finite(rect) => Bounds::Finite(rect.inflate(dx, dy)),
            other => *other,
        }
    }

    /// Map a finite bound through a point function by its corners. A mapping
    /// that produces non-finite coordinates yields [`Bounds::Infinite`].
    pub fn map_corners(&self, f: impl Fn(Point) -> Point) -> Bounds {
        match self {
            Bounds::Finite(rect) => match Rect::enclosing(rect.corners().map(f)) {
                Some(mapped) if mapped.is_finite() => Bounds::Finite(mapped),
                _ => Bounds::Infinite,
            },
            other => *other,
        }
    }
}

impl From<Rect> for Bounds {
    fn from(rect: Rect) -> Self {
        Bounds::Finite(rect)
    }
}

/// A 2D affine transformation matrix (row-vector convention).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub m11: f64,
    pub m12: f64,
    pub m21: f64,
    pub m22: f64,
    pub m31: f64,
    pub m32: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        m11: 1.0,
        m12: 0.0,
        m21: 0.0,
        m22: 1.0,
        m31: 0.0,
        m32: 0.0,
    };

    pub fn translation(offset: Point) -> Self {
        Self {
            m31: offset.x,
            m32: offset.y,
            ..Self::IDENTITY
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            m11: sx,
            m22: sy,
            ..Self::IDENTITY
        }
    }

    /// Rotation by `angle` radians.
    pub fn rotation(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            m11: cos,
            m12: sin,
            m21: -sin,
            m22: cos,
            m31: 0.0,
            m32: 0.0,
        }
    }

    pub fn skew(sx: f64, sy: f64) -> Self {
        Self {
            m12: sy.tan(),
            m21: sx.tan(),
            ..Self::IDENTITY
        }
    }

    /// Uniform scale about `center`.
    pub fn scale_about(center: Point, factor: f64) -> Self {
        Self::translation(-center)
            .then(&Self::scale(factor, factor))
            .then(&Self::translation(center))
    }

    /// Rotation by `angle` radians about `center`.
    pub fn rotation_about(center: Point, angle: f64) -> Self {
        Self::translation(-center)
            .then(&Self::rotation(angle))
            .then(&Self::translation(center))
    }

    /// Apply `self`, then `other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        Matrix {
            m11: self.m11 * other.m11 + self.m12 * other.m21,
            m12: self.m11 * other.m12 + self.m12 * other.m22,
            m21: self.m21 * other.m11 + self.m22 * other.m21,
            m22: self.m21 * other.m12 + self.m22 * other.m22,
            m31: self.m31 * other.m11 + self.m32 * other.m21 + other.m31,
            m32: self.m31 * other.m12 + self.m32 * other.m22 + other.m32,
        }
    }

    #[inline]
    pub fn transform_point(&self, point: Point) -> Point {
        Point::new(
            self.m11 * point.x + self.m21 * point.y + self.m31,
            self.m12 * point.x + self.m22 * point.y + self.m32,
        )
    }

    pub fn transform_bounds(&self, bounds: &Bounds) -> Bounds {
        bounds.map_corners(|p| self.transform_point(p))
    }

    pub fn determinant(&self) -> f64 {
        self.m11 * self.m22 - self.m12 * self.m21
    }

    /// The inverse mapping, if every entry of it is finite.
    ///
    /// The linear part is normalized before the determinant is taken, so a
    /// uniform scale inverts however small or large it is.
    pub fn inverse(&self) -> Option<Matrix> {
        let norm = self
            .m11
            .abs()
            .max(self.m12.abs())
            .max(self.m21.abs())
            .max(self.m22.abs());
        if !norm.is_finite() || norm == 0.0 {
            return None;
        }
        let (a, b, c, d) = (
            self.m11 / norm,
            self.m12 / norm,
            self.m21 / norm,
            self.m22 / norm,
        );
        let det = a * d - b * c;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let m11 = d / det / norm;
        let m12 = -b / det / norm;
        let m21 = -c / det / norm;
        let m22 = a / det / norm;
        let inverse = Matrix {
            m11,
            m12,
            m21,
            m22,
            m31: -(self.m31 * m11 + self.m32 * m21),
            m32: -(self.m31 * m12 + self.m32 * m22),
        };
        inverse.is_finite().then_some(inverse)
    }

    pub fn is_finite(&self) -> bool {
        [self.m11, self.m12, self.m21, self.m22, self.m31, self.m32]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Whether axis-aligned rectangles stay axis-aligned.
    pub fn is_axis_aligned(&self) -> bool {
        self.m12 == 0.0 && self.m21 == 0.0
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

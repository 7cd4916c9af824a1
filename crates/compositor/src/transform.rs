//! Coordinate-space transforms and transform stacks.
//!
//! A transform maps a layer's inner coordinate space (the space the layers
//! beneath it are evaluated in) to its outer space. `perform` goes inner to
//! outer, `unperform` outer to inner. Forward and inverse are exact algebraic
//! inverses for every transform constructed here; constructors refuse inputs
//! that would break that.

use crate::layer::LayerId;
use common::error::{CompositeError, CompositeResult};
use common::geometry::{Bounds, Matrix, Point};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// An invertible coordinate mapping.
pub trait Transform: Send + Sync + fmt::Debug {
    /// Map an inner-space point to outer space.
    fn perform(&self, point: Point) -> Point;

    /// Map an outer-space point to inner space.
    fn unperform(&self, point: Point) -> Point;

    /// Map inner-space bounds to outer space.
    fn transform_bounds(&self, bounds: &Bounds) -> Bounds {
        bounds.map_corners(|p| self.perform(p))
    }

    /// The forward mapping as a matrix, when it is affine.
    fn matrix(&self) -> Option<Matrix> {
        None
    }

    /// The layer that produced this transform.
    fn layer(&self) -> Option<LayerId> {
        None
    }
}

/// A shared transform handle.
pub type TransformRef = Arc<dyn Transform>;

/// The identity mapping.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IdentityTransform {
    layer: Option<LayerId>,
}

impl IdentityTransform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, layer: LayerId) -> Self {
        self.layer = Some(layer);
        self
    }
}

impl Transform for IdentityTransform {
    fn perform(&self, point: Point) -> Point {
        point
    }

    fn unperform(&self, point: Point) -> Point {
        point
    }

    fn transform_bounds(&self, bounds: &Bounds) -> Bounds {
        *bounds
    }

    fn matrix(&self) -> Option<Matrix> {
        Some(Matrix::IDENTITY)
    }

    fn layer(&self) -> Option<LayerId> {
        self.layer
    }
}

/// An affine mapping with its exact inverse.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineTransform {
    forward: Matrix,
    inverse: Matrix,
    layer: Option<LayerId>,
}

impl AffineTransform {
    /// Fails with [`CompositeError::Unsupported`] for singular matrices.
    pub fn new(forward: Matrix) -> CompositeResult<Self> {
        let inverse = forward
            .inverse()
            .ok_or_else(|| CompositeError::unsupported("singular transform matrix"))?;
        Ok(Self {
            forward,
            inverse,
            layer: None,
        })
    }

    pub fn translation(offset: Point) -> Self {
        Self {
            forward: Matrix::translation(offset),
            inverse: Matrix::translation(-offset),
            layer: None,
        }
    }

    pub fn with_layer(mut self, layer: LayerId) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn forward(&self) -> &Matrix {
        &self.forward
    }

    pub fn inverse(&self) -> &Matrix {
        &self.inverse
    }
}

impl Transform for AffineTransform {
    fn perform(&self, point: Point) -> Point {
        self.forward.transform_point(point)
    }

    fn unperform(&self, point: Point) -> Point {
        self.inverse.transform_point(point)
    }

    fn transform_bounds(&self, bounds: &Bounds) -> Bounds {
        self.forward.transform_bounds(bounds)
    }

    fn matrix(&self) -> Option<Matrix> {
        Some(self.forward)
    }

    fn layer(&self) -> Option<LayerId> {
        self.layer
    }
}

/// Exponential scale about a center: factor `e^amount`.
///
/// `amount = 0` is the identity; equal positive and negative amounts zoom in
/// and out by the same ratio.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ZoomTransform {
    center: Point,
    factor: f64,
    layer: Option<LayerId>,
}

impl ZoomTransform {
    pub fn new(center: Point, amount: f64) -> Self {
        Self {
            center,
            factor: amount.exp(),
            layer: None,
        }
    }

    pub fn with_layer(mut self, layer: LayerId) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Whether forward and inverse are both well defined, by the same rule
    /// [`Matrix::inverse`] applies.
    pub fn is_invertible(&self) -> bool {
        self.factor.is_finite()
            && self.factor > 0.0
            && Matrix::scale_about(self.center, self.factor).inverse().is_some()
    }
}

impl Transform for ZoomTransform {
    fn perform(&self, point: Point) -> Point {
        (point - self.center) * self.factor + self.center
    }

    fn unperform(&self, point: Point) -> Point {
        (point - self.center) / self.factor + self.center
    }

    fn transform_bounds(&self, bounds: &Bounds) -> Bounds {
        match bounds {
            Bounds::Empty => Bounds::Empty,
            _ if !self.is_invertible() => Bounds::Infinite,
            _ => bounds.map_corners(|p| self.perform(p)),
        }
    }

    fn matrix(&self) -> Option<Matrix> {
        self.is_invertible()
            .then(|| Matrix::scale_about(self.center, self.factor))
    }

    fn layer(&self) -> Option<LayerId> {
        self.layer
    }
}

/// A stack of nested transforms, outermost first.
#[derive(Clone, Debug, Default)]
pub struct TransformStack {
    transforms: SmallVec<[TransformRef; 4]>,
}

impl TransformStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a transform nested inside every transform already on the stack.
    pub fn push(&mut self, transform: TransformRef) {
        self.transforms.push(transform);
    }

    pub fn pop(&mut self) -> Option<TransformRef> {
        self.transforms.pop()
    }

    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransformRef> {
        self.transforms.iter()
    }

    /// Innermost space to world: innermost transform first.
    pub fn perform(&self, point: Point) -> Point {
        self.transforms.iter().rev().fold(point, |p, t| t.perform(p))
    }

    /// World to innermost space: outermost transform first.
    pub fn unperform(&self, point: Point) -> Point {
        self.transforms.iter().fold(point, |p, t| t.unperform(p))
    }

    pub fn transform_bounds(&self, bounds: &Bounds) -> Bounds {
        self.transforms
            .iter()
            .rev()
            .fold(*bounds, |b, t| t.transform_bounds(&b))
    }

    /// The composed forward matrix, if every transform is affine.
    pub fn matrix(&self) -> Option<Matrix> {
        self.transforms
            .iter()
            .rev()
            .try_fold(Matrix::IDENTITY, |m, t| Some(m.then(&t.matrix()?)))
    }

    /// Layers that contributed a transform, outermost first.
    pub fn layers(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.transforms.iter().filter_map(|t| t.layer())
    }
}

impl Transform for TransformStack {
    fn perform(&self, point: Point) -> Point {
        TransformStack::perform(self, point)
    }

    fn unperform(&self, point: Point) -> Point {
        TransformStack::unperform(self, point)
    }

    fn transform_bounds(&self, bounds: &Bounds) -> Bounds {
        TransformStack::transform_bounds(self, bounds)
    }

    fn matrix(&self) -> Option<Matrix> {
        TransformStack::matrix(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::geometry::Rect;

    const EPS: f64 = 1e-9;

    fn samples() -> Vec<Point> {
        vec![
            Point::ZERO,
            Point::new(1.0, 0.0),
            Point::new(-3.5, 2.25),
            Point::new(100.0, -42.0),
            Point::new(0.001, 1e4),
        ]
    }

    fn assert_near(a: Point, b: Point) {
        assert!(
            (a.x - b.x).abs() < EPS * (1.0 + b.x.abs()) && (a.y - b.y).abs() < EPS * (1.0 + b.y.abs()),
            "{a:?} != {b:?}"
        );
    }

    fn assert_round_trip(t: &dyn Transform) {
        for p in samples() {
            assert_near(t.perform(t.unperform(p)), p);
            assert_near(t.unperform(t.perform(p)), p);
        }
    }

    #[test]
    fn test_round_trips() {
        assert_round_trip(&IdentityTransform::new());
        assert_round_trip(&AffineTransform::translation(Point::new(3.0, -1.0)));
        let m = Matrix::rotation(0.7)
            .then(&Matrix::skew(0.2, 0.0))
            .then(&Matrix::scale(2.0, 0.5))
            .then(&Matrix::translation(Point::new(5.0, 5.0)));
        assert_round_trip(&AffineTransform::new(m).unwrap());
        assert_round_trip(&ZoomTransform::new(Point::new(1.0, 2.0), 1.3));
        assert_round_trip(&ZoomTransform::new(Point::new(-4.0, 0.5), -2.0));
    }

    #[test]
    fn test_singular_affine_rejected() {
        let err = AffineTransform::new(Matrix::scale(0.0, 1.0)).unwrap_err();
        assert!(matches!(err, CompositeError::Unsupported(_)));
    }

    #[test]
    fn test_zoom_identity_at_zero() {
        let zoom = ZoomTransform::new(Point::new(3.0, 4.0), 0.0);
        assert_eq!(zoom.factor(), 1.0);
        for p in samples() {
            assert_eq!(zoom.perform(p), p);
            assert_eq!(zoom.unperform(p), p);
        }
    }

    #[test]
    fn test_zoom_doubles_at_ln2() {
        let center = Point::new(1.0, -1.0);
        let zoom = ZoomTransform::new(center, std::f64::consts::LN_2);
        for p in samples() {
            let d = p.distance(center);
            let mapped = zoom.perform(p).distance(center);
            assert!((mapped - 2.0 * d).abs() < EPS * (1.0 + d));
        }
    }

    #[test]
    fn test_zoom_degenerate_bounds() {
        let zoom = ZoomTransform::new(Point::ZERO, 1000.0);
        assert!(!zoom.is_invertible());
        let b = Bounds::from(Rect::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(zoom.transform_bounds(&b), Bounds::Infinite);
        assert_eq!(zoom.transform_bounds(&Bounds::Empty), Bounds::Empty);
        assert!(zoom.matrix().is_none());

        let shrink = ZoomTransform::new(Point::ZERO, -1000.0);
        assert_eq!(shrink.transform_bounds(&b), Bounds::Infinite);
    }

    #[test]
    fn test_strong_zoom_out_is_invertible() {
        for amount in [-19.0, -300.0, 300.0] {
            let zoom = ZoomTransform::new(Point::new(1.0, 1.0), amount);
            assert!(zoom.is_invertible(), "amount {amount}");
            let m = zoom.matrix().unwrap();
            assert!(m.inverse().is_some());
            assert!(AffineTransform::new(m).is_ok());
        }
        // e^-710 is subnormal; its reciprocal overflows.
        assert!(!ZoomTransform::new(Point::ZERO, -710.0).is_invertible());
    }

    #[test]
    fn test_stack_order() {
        // Outer translation, inner scale: inner space is scaled first.
        let mut stack = TransformStack::new();
        stack.push(Arc::new(AffineTransform::translation(Point::new(10.0, 0.0))));
        stack.push(Arc::new(ZoomTransform::new(Point::ZERO, std::f64::consts::LN_2)));

        assert_near(stack.perform(Point::new(1.0, 1.0)), Point::new(12.0, 2.0));
        assert_near(stack.unperform(Point::new(12.0, 2.0)), Point::new(1.0, 1.0));
        assert_round_trip(&stack);

        let m = stack.matrix().unwrap();
        assert_near(m.transform_point(Point::new(1.0, 1.0)), Point::new(12.0, 2.0));

        let bounds = stack.transform_bounds(&Rect::new(0.0, 0.0, 1.0, 1.0).into());
        let rect = bounds.rect().unwrap();
        assert_near(rect.min, Point::new(10.0, 0.0));
        assert_near(rect.max, Point::new(12.0, 2.0));
        assert_eq!(stack.transform_bounds(&Bounds::Infinite), Bounds::Infinite);
    }

    #[test]
    fn test_stack_layers() {
        let a = LayerId::next();
        let mut stack = TransformStack::new();
        stack.push(Arc::new(IdentityTransform::new()));
        stack.push(Arc::new(ZoomTransform::new(Point::ZERO, 0.5).with_layer(a)));
        assert_eq!(stack.layers().collect::<Vec<_>>(), vec![a]);
        assert_eq!(stack.len(), 2);
        stack.pop();
        assert_eq!(stack.layers().count(), 0);
    }
}

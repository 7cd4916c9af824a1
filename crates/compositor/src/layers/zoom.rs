//! Exponential zoom about a center.

use super::shape::{real_value, vector_value};
use super::{record_through, render_through};
use crate::context::Context;
use crate::layer::{HitCheck, Layer, LayerBase, Sample};
use crate::param::{ParamDesc, ParamFlags, ParamVocab};
use crate::transform::{Transform, TransformRef, ZoomTransform};
use crate::value::{Value, ValueType};
use common::color::Color;
use common::error::{CompositeError, CompositeResult};
use common::geometry::Point;
use render::{check_cancelled, ProgressCallback, RendDesc, Surface, VectorTarget};
use std::sync::Arc;

/// Scales everything beneath it by `e^amount` about `center`.
///
/// Draws nothing of its own.
#[derive(Clone, Debug)]
pub struct ZoomLayer {
    base: LayerBase,
    amount: f64,
    center: Point,
}

impl ZoomLayer {
    pub fn new(center: Point, amount: f64) -> Self {
        Self {
            base: LayerBase::new(),
            amount,
            center,
        }
    }

    fn zoom(&self) -> ZoomTransform {
        ZoomTransform::new(self.center, self.amount).with_layer(self.id())
    }

    fn invertible_zoom(&self) -> CompositeResult<ZoomTransform> {
        let zoom = self.zoom();
        if zoom.is_invertible() {
            Ok(zoom)
        } else {
            Err(CompositeError::unsupported(format!(
                "zoom amount {} is out of range",
                self.amount
            )))
        }
    }
}

impl Default for ZoomLayer {
    fn default() -> Self {
        Self::new(Point::ZERO, 0.0)
    }
}

impl Layer for ZoomLayer {
    fn name(&self) -> &'static str {
        "zoom"
    }

    fn local_name(&self) -> &'static str {
        "Scale"
    }

    fn base(&self) -> &LayerBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut LayerBase {
        &mut self.base
    }

    fn clone_layer(&self) -> Box<dyn Layer> {
        Box::new(self.clone())
    }

    fn param_vocab(&self) -> ParamVocab {
        vec![
            ParamDesc::new("amount", ValueType::Real)
                .with_local_name("Amount")
                .with_description("Logarithm of the scale factor"),
            ParamDesc::new("center", ValueType::Vector)
                .with_local_name("Center")
                .with_flags(ParamFlags::ORIGIN),
        ]
    }

    fn get_param(&self, name: &str) -> Option<Value> {
        match name {
            "amount" => Some(self.amount.into()),
            "center" => Some(self.center.into()),
            _ => None,
        }
    }

    fn apply_param(&mut self, name: &str, value: Value) -> CompositeResult<()> {
        match name {
            "amount" => self.amount = real_value(name, &value)?,
            "center" => self.center = vector_value(name, &value)?,
            _ => return Err(CompositeError::unknown_param(name)),
        }
        Ok(())
    }

    // A zoom without an inverse shows nothing: every point is transparent.
    fn sample(&self, point: Point) -> Sample {
        let zoom = self.zoom();
        if zoom.is_invertible() {
            Sample::Beneath(zoom.unperform(point))
        } else {
            Sample::Custom
        }
    }

    fn get_color(&self, context: Context<'_>, point: Point) -> Color {
        match self.sample(point) {
            Sample::Beneath(mapped) => context.get_color(mapped),
            _ => Color::TRANSPARENT,
        }
    }

    fn accelerated_render(
        &self,
        context: Context<'_>,
        surface: &mut Surface,
        quality: u32,
        desc: &RendDesc,
        cb: &dyn ProgressCallback,
    ) -> CompositeResult<()> {
        check_cancelled(cb)?;
        let zoom = self.invertible_zoom()?;
        render_through(&zoom, context, surface, quality, desc, cb)
    }

    fn vector_render(
        &self,
        context: Context<'_>,
        target: &mut VectorTarget,
        quality: u32,
        desc: &RendDesc,
        cb: &dyn ProgressCallback,
    ) -> CompositeResult<()> {
        check_cancelled(cb)?;
        let zoom = self.invertible_zoom()?;
        match zoom.matrix() {
            Some(matrix) => record_through(&matrix, context, target, quality, desc, cb),
            None => Err(CompositeError::internal("invertible zoom without a matrix")),
        }
    }

    fn passthrough(&self) -> Option<CompositeResult<TransformRef>> {
        Some(self.invertible_zoom().map(|zoom| Arc::new(zoom) as TransformRef))
    }

    fn get_transform(&self) -> Option<TransformRef> {
        Some(Arc::new(self.zoom()))
    }

    fn hit_check(&self, _context: Context<'_>, point: Point) -> HitCheck {
        let zoom = self.zoom();
        if zoom.is_invertible() {
            HitCheck::Below(zoom.unperform(point))
        } else {
            HitCheck::Miss
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerRef;
    use crate::layers::RectangleLayer;
    use common::geometry::{Bounds, Rect};
    use render::NullProgress;

    #[test]
    fn test_zoom_maps_distances() {
        let zoom = ZoomLayer::new(Point::new(1.0, 1.0), std::f64::consts::LN_2);
        let transform = zoom.get_transform().unwrap();
        assert_eq!(transform.layer(), Some(zoom.id()));
        let p = transform.perform(Point::new(2.0, 1.0));
        assert!((p.distance(Point::new(1.0, 1.0)) - 2.0).abs() < 1e-12);
        assert_eq!(zoom.sample(Point::new(1.0, 1.0)), Sample::Beneath(Point::new(1.0, 1.0)));
    }

    #[test]
    fn test_params() {
        let mut zoom = ZoomLayer::default();
        zoom.set_param("amount", Value::Integer(1)).unwrap();
        zoom.set_param("center", Point::new(3.0, 4.0).into()).unwrap();
        assert_eq!(zoom.get_param("amount"), Some(Value::Real(1.0)));
        assert_eq!(zoom.get_param("center"), Some(Value::Vector(Point::new(3.0, 4.0))));
        assert!(zoom.set_param("center", Value::Real(1.0)).is_err());
    }

    #[test]
    fn test_zoomed_out_shape_gets_smaller() {
        let layers: Vec<LayerRef> = vec![
            Arc::new(ZoomLayer::new(Point::ZERO, -std::f64::consts::LN_2)),
            Arc::new(RectangleLayer::new(Rect::new(-2.0, -2.0, 2.0, 2.0), Color::RED)),
        ];
        let ctx = Context::new(&layers);
        assert_eq!(ctx.get_color(Point::new(0.9, 0.9)), Color::RED);
        assert_eq!(ctx.get_color(Point::new(1.1, 0.0)), Color::TRANSPARENT);
        let rect = ctx.get_full_bounding_rect().rect().unwrap();
        assert!((rect.width() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_zoom() {
        let zoom = ZoomLayer::new(Point::ZERO, -1000.0);
        let layers: Vec<LayerRef> = vec![Arc::new(zoom.clone())];
        assert!(matches!(zoom.hit_check(Context::empty(), Point::ZERO), HitCheck::Miss));
        assert_eq!(zoom.combine_bounds(Bounds::Empty), Bounds::Empty);
        assert_eq!(
            zoom.combine_bounds(Bounds::Finite(Rect::new(0.0, 0.0, 1.0, 1.0))),
            Bounds::Infinite
        );

        let desc = RendDesc::new(2, 2, Point::ZERO, Point::new(1.0, 1.0));
        let mut surface = Surface::for_desc(&desc);
        let err = Context::new(&layers)
            .accelerated_render(&mut surface, 0, &desc, &NullProgress)
            .unwrap_err();
        assert!(matches!(err, CompositeError::Unsupported(_)));
        let mut target = VectorTarget::new();
        let err = Context::new(&layers)
            .vector_render(&mut target, 0, &desc, &NullProgress)
            .unwrap_err();
        assert!(matches!(err, CompositeError::Unsupported(_)));
    }

    #[test]
    fn test_degenerate_zoom_samples_transparent() {
        let red = || -> LayerRef {
            Arc::new(RectangleLayer::new(Rect::new(-10.0, -10.0, 10.0, 10.0), Color::RED))
        };
        for amount in [-1000.0, 1000.0] {
            let zoom = ZoomLayer::new(Point::ZERO, amount);
            assert_eq!(zoom.sample(Point::ZERO), Sample::Custom);
            let layers: Vec<LayerRef> = vec![Arc::new(zoom), red()];
            let ctx = Context::new(&layers);
            for p in [Point::ZERO, Point::new(1.0, 1.0), Point::new(50.0, 0.0)] {
                assert_eq!(ctx.get_color(p), Color::TRANSPARENT, "amount {amount} at {p:?}");
            }
            assert!(ctx.hit_check(Point::ZERO).is_none());
        }

        // Layers above a degenerate zoom still draw.
        let layers: Vec<LayerRef> = vec![red(), Arc::new(ZoomLayer::new(Point::ZERO, -1000.0)), red()];
        assert_eq!(Context::new(&layers).get_color(Point::ZERO), Color::RED);
    }
}

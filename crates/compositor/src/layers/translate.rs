//! Translation of everything beneath.

use super::shape::vector_value;
use super::{record_through, render_through};
use crate::context::Context;
use crate::layer::{Layer, LayerBase, Sample};
use crate::param::{ParamDesc, ParamFlags, ParamVocab};
use crate::transform::{AffineTransform, TransformRef};
use crate::value::{Value, ValueType};
use common::error::{CompositeError, CompositeResult};
use common::geometry::Point;
use render::{check_cancelled, ProgressCallback, RendDesc, Surface, VectorTarget};
use std::sync::Arc;

/// Moves the content beneath it so its origin lands on `origin`.
#[derive(Clone, Debug)]
pub struct TranslateLayer {
    base: LayerBase,
    origin: Point,
}

impl TranslateLayer {
    pub fn new(origin: Point) -> Self {
        Self {
            base: LayerBase::new(),
            origin,
        }
    }

    fn translation(&self) -> AffineTransform {
        AffineTransform::translation(self.origin).with_layer(self.id())
    }
}

impl Default for TranslateLayer {
    fn default() -> Self {
        Self::new(Point::ZERO)
    }
}

impl Layer for TranslateLayer {
    fn name(&self) -> &'static str {
        "translate"
    }

    fn local_name(&self) -> &'static str {
        "Translate"
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
        vec![ParamDesc::new("origin", ValueType::Vector)
            .with_local_name("Origin")
            .with_flags(ParamFlags::ORIGIN)]
    }

    fn get_param(&self, name: &str) -> Option<Value> {
        match name {
            "origin" => Some(self.origin.into()),
            _ => None,
        }
    }

    fn apply_param(&mut self, name: &str, value: Value) -> CompositeResult<()> {
        match name {
            "origin" => self.origin = vector_value(name, &value)?,
            _ => return Err(CompositeError::unknown_param(name)),
        }
        Ok(())
    }

    fn sample(&self, point: Point) -> Sample {
        Sample::Beneath(point - self.origin)
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
        render_through(&self.translation(), context, surface, quality, desc, cb)
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
        let translation = self.translation();
        record_through(translation.forward(), context, target, quality, desc, cb)
    }

    fn passthrough(&self) -> Option<CompositeResult<TransformRef>> {
        self.get_transform().map(Ok)
    }

    fn get_transform(&self) -> Option<TransformRef> {
        Some(Arc::new(self.translation()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{HitCheck, LayerRef};
    use crate::layers::CircleLayer;
    use common::color::Color;
    use common::geometry::{Bounds, Rect};

    #[test]
    fn test_translate_moves_content() {
        let layers: Vec<LayerRef> = vec![
            Arc::new(TranslateLayer::new(Point::new(3.0, -1.0))),
            Arc::new(CircleLayer::new(Point::ZERO, 1.0, Color::RED)),
        ];
        let ctx = Context::new(&layers);
        assert_eq!(ctx.get_color(Point::new(3.0, -1.0)), Color::RED);
        assert_eq!(ctx.get_color(Point::ZERO), Color::TRANSPARENT);
        assert_eq!(
            ctx.get_full_bounding_rect(),
            Bounds::Finite(Rect::new(2.0, -2.0, 4.0, 0.0))
        );
        assert!(matches!(
            layers[0].hit_check(Context::new(&layers[1..]), Point::new(3.0, -1.0)),
            HitCheck::Below(p) if p == Point::ZERO
        ));
    }

    #[test]
    fn test_origin_param() {
        let mut layer = TranslateLayer::default();
        layer.set_param("origin", Point::new(1.0, 2.0).into()).unwrap();
        assert_eq!(layer.get_transform().unwrap().perform(Point::ZERO), Point::new(1.0, 2.0));
        assert!(layer.set_param("amount", Value::Real(1.0)).is_err());
    }
}

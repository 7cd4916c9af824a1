//! A layer that composites a nested canvas.

use super::shape::{real_value, vector_value};
use crate::canvas::Canvas;
use crate::context::Context;
use crate::layer::{apply_bindings, composite_over, HitCheck, Layer, LayerBase, Sample};
use crate::param::{blend_params, ParamDesc, ParamFlags, ParamVocab};
use crate::transform::{AffineTransform, Transform, TransformRef};
use crate::value::{Value, ValueType};
use common::color::{BlendMethod, Color};
use common::error::{CompositeError, CompositeResult};
use common::geometry::{Bounds, Point};
use common::units::Time;
use render::{check_cancelled, ProgressCallback, RendDesc, Surface, VectorTarget};
use std::sync::Arc;
use tracing::trace;

/// Renders its own canvas, offset by `origin`, and blends the result over
/// whatever lies beneath it as a single unit.
///
/// The canvas is evaluated at the group's time plus `time_offset`.
#[derive(Clone, Debug)]
pub struct GroupLayer {
    base: LayerBase,
    canvas: Arc<Canvas>,
    origin: Point,
    amount: f32,
    method: BlendMethod,
    time_offset: Time,
}

impl GroupLayer {
    pub fn new(canvas: Canvas) -> Self {
        Self {
            base: LayerBase::new(),
            canvas: Arc::new(canvas),
            origin: Point::ZERO,
            amount: 1.0,
            method: BlendMethod::Composite,
            time_offset: Time::ZERO,
        }
    }

    pub fn canvas(&self) -> &Arc<Canvas> {
        &self.canvas
    }

    fn offset(&self) -> AffineTransform {
        AffineTransform::translation(self.origin).with_layer(self.id())
    }
}

impl Default for GroupLayer {
    fn default() -> Self {
        Self::new(Canvas::new_inline())
    }
}

impl Layer for GroupLayer {
    fn name(&self) -> &'static str {
        "group"
    }

    fn local_name(&self) -> &'static str {
        "Group"
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
        let mut vocab = vec![
            ParamDesc::new("canvas", ValueType::Canvas)
                .with_local_name("Canvas")
                .with_flags(ParamFlags::HIDDEN)
                .not_animatable(),
            ParamDesc::new("origin", ValueType::Vector)
                .with_local_name("Origin")
                .with_flags(ParamFlags::ORIGIN),
            ParamDesc::new("time_offset", ValueType::Time).with_local_name("Time Offset"),
        ];
        vocab.extend(blend_params());
        vocab
    }

    fn get_param(&self, name: &str) -> Option<Value> {
        match name {
            "canvas" => Some(Value::Canvas(self.canvas.clone())),
            "origin" => Some(self.origin.into()),
            "time_offset" => Some(self.time_offset.into()),
            "amount" => Some(Value::Real(self.amount as f64)),
            "blend_method" => Some(self.method.into()),
            _ => None,
        }
    }

    fn apply_param(&mut self, name: &str, value: Value) -> CompositeResult<()> {
        let mismatch = |expected: &str, value: &Value| {
            CompositeError::type_mismatch(name, expected, value.value_type().name())
        };
        match name {
            "canvas" => {
                self.canvas = value.as_canvas().cloned().ok_or_else(|| mismatch("canvas", &value))?
            }
            "origin" => self.origin = vector_value(name, &value)?,
            "time_offset" => {
                self.time_offset = value.as_time().ok_or_else(|| mismatch("time", &value))?
            }
            "amount" => self.amount = real_value(name, &value)? as f32,
            "blend_method" => {
                self.method = value
                    .as_blend_method()
                    .ok_or_else(|| mismatch("blend_method", &value))?
            }
            _ => return Err(CompositeError::unknown_param(name)),
        }
        Ok(())
    }

    fn set_time(&mut self, time: Time) {
        apply_bindings(self, time);
        let inner = self.canvas.at_time(time + self.time_offset);
        self.canvas = Arc::new(inner);
    }

    fn sample(&self, _point: Point) -> Sample {
        Sample::Custom
    }

    fn get_color(&self, context: Context<'_>, point: Point) -> Color {
        let inner = self.canvas.get_color(point - self.origin);
        composite_over(inner, self.amount, self.method, || context.get_color(point))
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
        let offset = self.offset();
        let inner_desc = desc.map_window(|p| offset.unperform(p));
        let mut inner = Surface::for_desc(&inner_desc);
        self.canvas.render(&mut inner, quality, &inner_desc, cb)?;

        context.accelerated_render(surface, quality, desc, cb)?;
        trace!("{}: blending {} inner layer(s)", self.id(), self.canvas.len());
        surface.blend_surface(&inner, self.amount, self.method);
        Ok(())
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
        context.vector_render(target, quality, desc, cb)?;
        target.push_group();
        target.push_transform(self.offset().forward());
        let result = self.canvas.context().vector_render(target, quality, desc, cb);
        target.pop_transform();
        target.pop_group(self.amount, self.method);
        result
    }

    fn get_transform(&self) -> Option<TransformRef> {
        Some(Arc::new(self.offset()))
    }

    fn bounding_rect(&self) -> Bounds {
        self.offset().transform_bounds(&self.canvas.bounds())
    }

    fn combine_bounds(&self, beneath: Bounds) -> Bounds {
        self.bounding_rect().union(&beneath)
    }

    fn hit_check(&self, _context: Context<'_>, point: Point) -> HitCheck {
        if self.amount != 0.0 && self.canvas.hit_check(point - self.origin).is_some() {
            HitCheck::This
        } else {
            HitCheck::Below(point)
        }
    }

    fn inline_canvas(&self) -> Option<&Arc<Canvas>> {
        Some(&self.canvas)
    }

    fn inline_canvas_mut(&mut self) -> Option<&mut Arc<Canvas>> {
        Some(&mut self.canvas)
    }
}

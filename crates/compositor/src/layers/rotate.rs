//! Rotation of everything beneath about an origin.

use super::record_through;
use super::shape::vector_value;
use crate::context::Context;
use crate::layer::{render_by_sampling, Layer, LayerBase, Sample};
use crate::param::{ParamDesc, ParamFlags, ParamVocab};
use crate::transform::{AffineTransform, Transform, TransformRef};
use crate::value::{Value, ValueType};
use common::error::{CompositeError, CompositeResult};
use common::geometry::{Matrix, Point};
use common::units::Angle;
use render::{check_cancelled, ProgressCallback, RendDesc, Surface, VectorTarget};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct RotateLayer {
    base: LayerBase,
    origin: Point,
    amount: Angle,
}

impl RotateLayer {
    pub fn new(origin: Point, degrees: f64) -> Self {
        Self {
            base: LayerBase::new(),
            origin,
            amount: Angle::from_degrees(degrees),
        }
    }

    fn rotation(&self) -> CompositeResult<AffineTransform> {
        let matrix = Matrix::rotation_about(self.origin, self.amount.radians());
        Ok(AffineTransform::new(matrix)?.with_layer(self.id()))
    }
}

impl Default for RotateLayer {
    fn default() -> Self {
        Self::new(Point::ZERO, 0.0)
    }
}

impl Layer for RotateLayer {
    fn name(&self) -> &'static str {
        "rotate"
    }

    fn local_name(&self) -> &'static str {
        "Rotate"
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
            ParamDesc::new("origin", ValueType::Vector)
                .with_local_name("Origin")
                .with_flags(ParamFlags::ORIGIN),
            ParamDesc::new("amount", ValueType::Angle).with_local_name("Amount"),
        ]
    }

    fn get_param(&self, name: &str) -> Option<Value> {
        match name {
            "origin" => Some(self.origin.into()),
            "amount" => Some(self.amount.into()),
            _ => None,
        }
    }

    fn apply_param(&mut self, name: &str, value: Value) -> CompositeResult<()> {
        match name {
            "origin" => self.origin = vector_value(name, &value)?,
            "amount" => {
                self.amount = value.as_angle().ok_or_else(|| {
                    CompositeError::type_mismatch(name, "angle", value.value_type().name())
                })?
            }
            _ => return Err(CompositeError::unknown_param(name)),
        }
        Ok(())
    }

    fn sample(&self, point: Point) -> Sample {
        match self.rotation() {
            Ok(rotation) => Sample::Beneath(rotation.unperform(point)),
            Err(_) => Sample::Beneath(point),
        }
    }

    // A rotated window is no longer axis-aligned, so the raster path samples.
    fn accelerated_render(
        &self,
        context: Context<'_>,
        surface: &mut Surface,
        _quality: u32,
        desc: &RendDesc,
        cb: &dyn ProgressCallback,
    ) -> CompositeResult<()> {
        render_by_sampling(self, context, surface, desc, cb)
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
        let rotation = self.rotation()?;
        record_through(rotation.forward(), context, target, quality, desc, cb)
    }

    fn passthrough(&self) -> Option<CompositeResult<TransformRef>> {
        Some(self.rotation().map(|rotation| Arc::new(rotation) as TransformRef))
    }

    fn get_transform(&self) -> Option<TransformRef> {
        self.rotation().ok().map(|rotation| Arc::new(rotation) as TransformRef)
    }
}

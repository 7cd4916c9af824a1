//! Box blur of everything beneath.
//!
//! The kernel is a 5×5 grid of taps spaced `size / 2` world units apart,
//! averaged with premultiplied alpha. Sampling and the raster fast path read
//! the same taps in the same order, so both produce the same colors.

use super::shape::real_value;
use crate::context::Context;
use crate::layer::{composite_over, render_by_sampling, Layer, LayerBase, Sample};
use crate::param::{blend_params, ParamDesc, ParamFlags, ParamVocab};
use crate::value::{Value, ValueType};
use common::color::{BlendMethod, Color};
use common::error::{CompositeError, CompositeResult};
use common::geometry::{Bounds, Point};
use rayon::prelude::*;
use render::{check_cancelled, ProgressCallback, RendDesc, Surface};
use tracing::trace;

const TAPS: i32 = 5;
const HALF_TAPS: i32 = TAPS / 2;
/// Largest per-tap pixel stride the raster fast path accepts.
const MAX_STEP: f64 = 64.0;

/// Running sum of premultiplied colors.
#[derive(Default)]
struct Accumulator {
    r: f32,
    g: f32,
    b: f32,
    a: f32,
}

impl Accumulator {
    fn add(&mut self, color: Color) {
        let c = color.premultiplied();
        self.r += c.r;
        self.g += c.g;
        self.b += c.b;
        self.a += c.a;
    }

    fn average(&self) -> Color {
        let n = (TAPS * TAPS) as f32;
        Color::rgba(self.r / n, self.g / n, self.b / n, self.a / n).demultiplied()
    }
}

#[derive(Clone, Debug)]
pub struct BlurLayer {
    base: LayerBase,
    size: f64,
    amount: f32,
    method: BlendMethod,
}

impl BlurLayer {
    pub fn new(size: f64) -> Self {
        Self {
            base: LayerBase::new(),
            size,
            amount: 1.0,
            method: BlendMethod::Straight,
        }
    }

    fn spacing(&self) -> f64 {
        self.size.abs() / 2.0
    }

    /// Whole-pixel tap strides for `desc`, when the taps land on pixel centers.
    fn pixel_steps(&self, desc: &RendDesc) -> Option<(i64, i64)> {
        let step = |pixel: f64| {
            let s = self.spacing() / pixel;
            let rounded = s.round();
            ((s - rounded).abs() < 1e-9 && rounded.abs() <= MAX_STEP).then_some(rounded as i64)
        };
        Some((step(desc.pw())?, step(desc.ph())?))
    }

    fn blurred(&self, context: Context<'_>, point: Point) -> Color {
        let spacing = self.spacing();
        let mut acc = Accumulator::default();
        for j in -HALF_TAPS..=HALF_TAPS {
            for i in -HALF_TAPS..=HALF_TAPS {
                let offset = Point::new(i as f64 * spacing, j as f64 * spacing);
                acc.add(context.get_color(point + offset));
            }
        }
        acc.average()
    }
}

impl Default for BlurLayer {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl Layer for BlurLayer {
    fn name(&self) -> &'static str {
        "blur"
    }

    fn local_name(&self) -> &'static str {
        "Blur"
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
        let mut vocab = vec![ParamDesc::new("size", ValueType::Real)
            .with_local_name("Size")
            .with_flags(ParamFlags::DISTANCE)];
        vocab.extend(blend_params());
        vocab
    }

    fn get_param(&self, name: &str) -> Option<Value> {
        match name {
            "size" => Some(self.size.into()),
            "amount" => Some(Value::Real(self.amount as f64)),
            "blend_method" => Some(self.method.into()),
            _ => None,
        }
    }

    fn apply_param(&mut self, name: &str, value: Value) -> CompositeResult<()> {
        match name {
            "size" => self.size = real_value(name, &value)?,
            "amount" => self.amount = real_value(name, &value)? as f32,
            "blend_method" => {
                self.method = value.as_blend_method().ok_or_else(|| {
                    CompositeError::type_mismatch(name, "blend_method", value.value_type().name())
                })?
            }
            _ => return Err(CompositeError::unknown_param(name)),
        }
        Ok(())
    }

    fn sample(&self, _point: Point) -> Sample {
        Sample::Custom
    }

    fn get_color(&self, context: Context<'_>, point: Point) -> Color {
        let blurred = self.blurred(context, point);
        composite_over(blurred, self.amount, self.method, || context.get_color(point))
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
        let Some((step_x, step_y)) = self.pixel_steps(desc) else {
            trace!("blur: taps fall between pixels, sampling");
            return render_by_sampling(self, context, surface, desc, cb);
        };

        let margin = HALF_TAPS as i64 * step_x.abs().max(step_y.abs());
        let margin = u32::try_from(margin)
            .map_err(|_| CompositeError::internal("blur margin out of range"))?;
        let source_desc = desc.expanded(margin);
        let mut source = Surface::for_desc(&source_desc);
        context.accelerated_render(&mut source, quality, &source_desc, cb)?;
        check_cancelled(cb)?;

        let width = surface.width() as usize;
        if width == 0 || surface.height() == 0 {
            return Ok(());
        }
        let margin = margin as i64;
        let source = &source;
        surface
            .pixels_mut()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                let cy = y as i64 + margin;
                for (x, pixel) in row.iter_mut().enumerate() {
                    let cx = x as i64 + margin;
                    let mut acc = Accumulator::default();
                    for j in -HALF_TAPS..=HALF_TAPS {
                        for i in -HALF_TAPS..=HALF_TAPS {
                            let sx = cx + i as i64 * step_x;
                            let sy = cy + j as i64 * step_y;
                            acc.add(source.get_pixel(sx as u32, sy as u32));
                        }
                    }
                    let beneath = source.get_pixel(cx as u32, cy as u32);
                    *pixel = composite_over(acc.average(), self.amount, self.method, || beneath);
                }
            });
        Ok(())
    }

    fn combine_bounds(&self, beneath: Bounds) -> Bounds {
        let reach = self.size.abs();
        beneath.inflate(reach, reach)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerRef;
    use crate::layers::RectangleLayer;
    use common::geometry::Rect;
    use render::NullProgress;
    use std::sync::Arc;

    fn stack(blur: BlurLayer) -> Vec<LayerRef> {
        vec![
            Arc::new(blur),
            Arc::new(RectangleLayer::new(Rect::new(-1.0, -1.0, 1.0, 1.0), Color::RED)),
        ]
    }

    #[test]
    fn test_blur_softens_edges() {
        let layers = stack(BlurLayer::new(1.0));
        let ctx = Context::new(&layers);
        assert_eq!(ctx.get_color(Point::ZERO), Color::RED);
        let edge = ctx.get_color(Point::new(1.0, 0.0));
        assert!(edge.a > 0.0 && edge.a < 1.0);
        assert_eq!(ctx.get_color(Point::new(2.5, 0.0)), Color::TRANSPARENT);
        assert_eq!(
            ctx.get_full_bounding_rect(),
            Bounds::Finite(Rect::new(-2.0, -2.0, 2.0, 2.0))
        );
    }

    #[test]
    fn test_zero_amount_passes_through() {
        let mut blur = BlurLayer::new(1.0);
        blur.set_param("amount", 0.0.into()).unwrap();
        blur.set_param("blend_method", BlendMethod::Composite.into()).unwrap();
        let layers = stack(blur);
        let ctx = Context::new(&layers);
        assert_eq!(ctx.get_color(Point::new(0.9, 0.0)), Color::RED);
    }

    #[test]
    fn test_off_grid_taps_fall_back_to_sampling() {
        let layers = stack(BlurLayer::new(0.3));
        let desc = RendDesc::new(8, 8, Point::new(-2.0, 2.0), Point::new(2.0, -2.0));
        assert!(BlurLayer::new(0.3).pixel_steps(&desc).is_none());
        assert_eq!(BlurLayer::new(1.0).pixel_steps(&desc), Some((1, -1)));

        let mut surface = Surface::for_desc(&desc);
        Context::new(&layers)
            .accelerated_render(&mut surface, 3, &desc, &NullProgress)
            .unwrap();
        let center = Context::new(&layers).get_color(desc.pixel_center(4, 4));
        assert_eq!(surface.get_pixel(4, 4), center);
    }
}

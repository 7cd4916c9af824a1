//! Cursor over the layers beneath a point in a stack.
//!
//! All walks are iterative: per-layer answers ([`Sample`], [`HitCheck`],
//! [`Layer::combine_bounds`], overlay runs, [`Layer::passthrough`]) let the
//! context fold a stack of any depth without one call frame per layer, while
//! producing exactly the result of recursive delegation. Only layers that
//! composite a sub-render of their own (groups, blurs) nest a walk.

use crate::layer::{composite_over, HitCheck, LayerRef, Sample};
use common::color::{BlendMethod, Color};
use common::error::{CompositeError, CompositeResult};
use common::geometry::{Bounds, Point};
use render::{check_cancelled, ProgressCallback, RendDesc, Surface, VectorTarget};
use smallvec::SmallVec;
use std::fmt;
use tracing::trace;

/// A non-owning view of the remainder of a canvas, topmost first.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    layers: &'a [LayerRef],
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("remaining", &self.layers.len()).finish()
    }
}

impl<'a> Context<'a> {
    pub fn new(layers: &'a [LayerRef]) -> Self {
        Self { layers }
    }

    /// A context with nothing beneath.
    pub fn empty() -> Self {
        Self { layers: &[] }
    }

    /// Whether no active layer remains.
    pub fn is_empty(&self) -> bool {
        self.next_active().is_none()
    }

    pub fn layers(&self) -> &'a [LayerRef] {
        self.layers
    }

    /// The next active layer and the context beneath it.
    pub fn next_active(&self) -> Option<(&'a LayerRef, Context<'a>)> {
        let index = self.layers.iter().position(|layer| layer.is_active())?;
        Some((
            &self.layers[index],
            Context {
                layers: &self.layers[index + 1..],
            },
        ))
    }

    /// Composited color of the remaining stack at `point`.
    pub fn get_color(self, point: Point) -> Color {
        let mut pending: SmallVec<[(Color, f32, BlendMethod); 16]> = SmallVec::new();
        let mut context = self;
        let mut point = point;

        let base = loop {
            let Some((layer, rest)) = context.next_active() else {
                break Color::TRANSPARENT;
            };
            match layer.sample(point) {
                Sample::Beneath(mapped) => point = mapped,
                Sample::Blend { color, amount, method } => {
                    if method.replaces(color, amount) {
                        break composite_over(color, amount, method, || Color::TRANSPARENT);
                    }
                    pending.push((color, amount, method));
                }
                Sample::Custom => break layer.get_color(rest, point),
            }
            context = rest;
        };

        pending
            .iter()
            .rev()
            .fold(base, |beneath, &(color, amount, method)| {
                Color::blend(color, beneath, amount, method)
            })
    }

    /// Render the remaining stack into `surface`.
    ///
    /// Cancellation is checked before the surface is touched, so a cancelled
    /// render leaves it as it was. Axis-aligned passthrough layers move the
    /// view window in place, so a stack of them costs no call depth.
    pub fn accelerated_render(
        self,
        surface: &mut Surface,
        quality: u32,
        desc: &RendDesc,
        cb: &dyn ProgressCallback,
    ) -> CompositeResult<()> {
        check_cancelled(cb)?;
        // Overlay runs still to paint, each with the window it was reached in.
        let mut levels: Vec<(OverlayRun<'a>, RendDesc)> = Vec::new();
        let mut context = self;
        let mut desc = desc.clone();

        loop {
            check_cancelled(cb)?;
            let (run, beneath) = context.overlay_run();
            trace!("raster: {} overlay layer(s) above {:?}", run.len(), beneath);
            if !run.is_empty() {
                levels.push((run, desc.clone()));
            }
            let Some((layer, rest)) = beneath.next_active() else {
                surface.clear();
                break;
            };
            match layer.passthrough() {
                Some(Ok(transform))
                    if transform.matrix().map_or(false, |m| m.is_axis_aligned()) =>
                {
                    desc = desc.map_window(|p| transform.unperform(p));
                    context = rest;
                }
                _ => {
                    layer.accelerated_render(rest, surface, quality, &desc, cb)?;
                    break;
                }
            }
        }

        for (run, desc) in levels.iter().rev() {
            for layer in run.iter().rev() {
                check_cancelled(cb)?;
                layer.paint(surface, quality, desc)?;
            }
        }
        Ok(())
    }

    /// Record the remaining stack into `target`, bottom first.
    ///
    /// Passthrough layers push their matrix in place; every push is popped
    /// again before returning, on failure too.
    pub fn vector_render(
        self,
        target: &mut VectorTarget,
        quality: u32,
        desc: &RendDesc,
        cb: &dyn ProgressCallback,
    ) -> CompositeResult<()> {
        check_cancelled(cb)?;
        // `levels[d]` is recorded under the first `d` pushed transforms.
        let mut levels: Vec<OverlayRun<'a>> = Vec::new();
        let mut pushed = 0;
        let mut context = self;

        let mut result = loop {
            if let Err(err) = check_cancelled(cb) {
                break Err(err);
            }
            let (run, beneath) = context.overlay_run();
            trace!("vector: {} overlay layer(s) above {:?}", run.len(), beneath);
            levels.push(run);
            let Some((layer, rest)) = beneath.next_active() else {
                break Ok(());
            };
            match layer.passthrough() {
                Some(Ok(transform)) => match transform.matrix() {
                    Some(matrix) => {
                        target.push_transform(&matrix);
                        pushed += 1;
                        context = rest;
                    }
                    None => {
                        break Err(CompositeError::unsupported(format!(
                            "{} has no affine form",
                            layer.name()
                        )))
                    }
                },
                Some(Err(err)) => break Err(err),
                None => break layer.vector_render(rest, target, quality, desc, cb),
            }
        };

        for (depth, run) in levels.iter().enumerate().rev() {
            while pushed > depth {
                target.pop_transform();
                pushed -= 1;
            }
            if result.is_ok() {
                result = record_run(run, target, cb);
            }
        }
        result
    }

    /// The topmost layer owning `point`, if any.
    pub fn hit_check(self, point: Point) -> Option<LayerRef> {
        let mut context = self;
        let mut point = point;
        while let Some((layer, rest)) = context.next_active() {
            match layer.hit_check(rest, point) {
                HitCheck::This => return Some(layer.clone()),
                HitCheck::Found(found) => return Some(found),
                HitCheck::Miss => return None,
                HitCheck::Below(mapped) => point = mapped,
            }
            context = rest;
        }
        None
    }

    /// Bounds of everything the remaining stack can draw.
    pub fn get_full_bounding_rect(self) -> Bounds {
        let active: SmallVec<[&LayerRef; 32]> =
            self.layers.iter().filter(|layer| layer.is_active()).collect();
        active
            .iter()
            .rev()
            .fold(Bounds::Empty, |beneath, layer| layer.combine_bounds(beneath))
    }

    /// Split off the leading run of overlay layers.
    ///
    /// The run stops early at an occluding layer, in which case nothing
    /// beneath it needs rendering.
    fn overlay_run(self) -> (OverlayRun<'a>, Context<'a>) {
        let mut run = SmallVec::new();
        let mut context = self;
        while let Some((layer, rest)) = context.next_active() {
            if !layer.is_overlay() {
                break;
            }
            run.push(layer);
            if layer.occludes() {
                return (run, Context::empty());
            }
            context = rest;
        }
        (run, context)
    }
}

/// A run of overlay layers, topmost first.
type OverlayRun<'a> = SmallVec<[&'a LayerRef; 16]>;

fn record_run(run: &[&LayerRef], target: &mut VectorTarget, cb: &dyn ProgressCallback) -> CompositeResult<()> {
    for layer in run.iter().rev() {
        check_cancelled(cb)?;
        layer.record(target)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::Layer;
    use crate::layers::{
        BlurLayer, CircleLayer, GroupLayer, RectangleLayer, RotateLayer, SolidColorLayer,
        TranslateLayer, ZoomLayer,
    };
    use crate::canvas::Canvas;
    use common::geometry::Rect;
    use render::{CancelFlag, NullProgress, Rasterizer};
    use std::sync::Arc;

    fn rect_layer(x0: f64, y0: f64, x1: f64, y1: f64, color: Color) -> LayerRef {
        Arc::new(RectangleLayer::new(Rect::new(x0, y0, x1, y1), color))
    }

    fn desc() -> RendDesc {
        RendDesc::new(16, 16, Point::new(-4.0, 4.0), Point::new(4.0, -4.0))
    }

    fn raster(layers: &[LayerRef], desc: &RendDesc) -> Surface {
        let mut surface = Surface::for_desc(desc);
        Context::new(layers)
            .accelerated_render(&mut surface, 3, desc, &NullProgress)
            .unwrap();
        surface
    }

    fn vector(layers: &[LayerRef], desc: &RendDesc) -> Surface {
        let mut target = VectorTarget::new();
        Context::new(layers)
            .vector_render(&mut target, 3, desc, &NullProgress)
            .unwrap();
        let mut surface = Surface::for_desc(desc);
        Rasterizer::new()
            .rasterize(target.list(), desc, &mut surface, &NullProgress)
            .unwrap();
        surface
    }

    fn sampled(layers: &[LayerRef], desc: &RendDesc) -> Surface {
        let mut surface = Surface::for_desc(desc);
        for y in 0..desc.height() {
            for x in 0..desc.width() {
                surface.set_pixel(x, y, Context::new(layers).get_color(desc.pixel_center(x, y)));
            }
        }
        surface
    }

    fn assert_surfaces_close(a: &Surface, b: &Surface) {
        for (i, (p, q)) in a.pixels().iter().zip(b.pixels()).enumerate() {
            let close = (p.r - q.r).abs() < 1e-5
                && (p.g - q.g).abs() < 1e-5
                && (p.b - q.b).abs() < 1e-5
                && (p.a - q.a).abs() < 1e-5;
            assert!(close, "pixel {i}: {p:?} != {q:?}");
        }
    }

    fn shape_stack() -> Vec<LayerRef> {
        let mut top = RectangleLayer::new(Rect::new(-1.0, -1.0, 3.0, 3.0), Color::BLUE);
        top.set_param("amount", 0.5.into()).unwrap();
        top.set_param("blend_method", BlendMethod::Multiply.into()).unwrap();
        vec![
            Arc::new(top),
            Arc::new(CircleLayer::new(Point::new(0.5, 0.5), 2.0, Color::GREEN.with_alpha(0.7))),
            rect_layer(-3.0, -3.0, 1.0, 1.0, Color::RED),
        ]
    }

    #[test]
    fn test_empty_context() {
        let ctx = Context::empty();
        assert!(ctx.is_empty());
        assert_eq!(ctx.get_color(Point::ZERO), Color::TRANSPARENT);
        assert_eq!(ctx.get_full_bounding_rect(), Bounds::Empty);
        assert!(ctx.hit_check(Point::ZERO).is_none());

        let mut surface = Surface::filled(2, 2, Color::RED);
        let d = RendDesc::new(2, 2, Point::ZERO, Point::new(1.0, 1.0));
        ctx.accelerated_render(&mut surface, 0, &d, &NullProgress).unwrap();
        assert_eq!(surface.get_pixel(0, 0), Color::TRANSPARENT);
    }

    #[test]
    fn test_transparent_outside_all_bounds() {
        let layers = shape_stack();
        let bounds = Context::new(&layers).get_full_bounding_rect();
        for p in [Point::new(10.0, 10.0), Point::new(-50.0, 3.0), Point::new(3.5, -3.5)] {
            assert!(!bounds.contains_point(p));
            assert_eq!(Context::new(&layers).get_color(p), Color::TRANSPARENT);
        }
    }

    #[test]
    fn test_get_color_composites_in_order() {
        let layers = vec![
            rect_layer(0.0, 0.0, 2.0, 2.0, Color::BLUE.with_alpha(0.5)),
            rect_layer(0.0, 0.0, 2.0, 2.0, Color::RED),
        ];
        let c = Context::new(&layers).get_color(Point::new(1.0, 1.0));
        let expected = Color::blend(Color::BLUE.with_alpha(0.5), Color::RED, 1.0, BlendMethod::Composite);
        assert_eq!(c, expected);
        // The top layer can be asked directly; the answer is the same.
        assert_eq!(layers[0].get_color(Context::new(&layers[1..]), Point::new(1.0, 1.0)), expected);
    }

    #[test]
    fn test_inactive_layers_are_skipped() {
        let mut hidden = RectangleLayer::new(Rect::new(-10.0, -10.0, 10.0, 10.0), Color::BLUE);
        hidden.base_mut().set_active(false);
        let layers: Vec<LayerRef> = vec![Arc::new(hidden), rect_layer(0.0, 0.0, 1.0, 1.0, Color::RED)];
        let ctx = Context::new(&layers);
        assert_eq!(ctx.get_color(Point::new(0.5, 0.5)), Color::RED);
        assert_eq!(ctx.get_color(Point::new(5.0, 5.0)), Color::TRANSPARENT);
        assert_eq!(ctx.get_full_bounding_rect(), Bounds::Finite(Rect::new(0.0, 0.0, 1.0, 1.0)));
        assert!(Arc::ptr_eq(&ctx.hit_check(Point::new(0.5, 0.5)).unwrap(), &layers[1]));
    }

    #[test]
    fn test_deep_stack_does_not_recurse() {
        let mut layers: Vec<LayerRef> = Vec::new();
        for i in 0..20_000 {
            if i % 2 == 0 {
                layers.push(Arc::new(ZoomLayer::new(Point::ZERO, 0.0)));
            } else {
                layers.push(rect_layer(0.0, 0.0, 1.0, 1.0, Color::RED.with_alpha(0.01)));
            }
        }
        layers.push(rect_layer(0.0, 0.0, 1.0, 1.0, Color::RED));
        let ctx = Context::new(&layers);
        let c = ctx.get_color(Point::new(0.5, 0.5));
        assert!((c.a - 1.0).abs() < 1e-4);
        assert!(ctx.hit_check(Point::new(0.5, 0.5)).is_some());
        assert_eq!(ctx.get_full_bounding_rect(), Bounds::Finite(Rect::new(0.0, 0.0, 1.0, 1.0)));
    }

    #[test]
    fn test_deep_transform_stack_renders_without_recursing() {
        let mut layers: Vec<LayerRef> = Vec::new();
        for i in 0..20_000 {
            match i % 4 {
                0 => layers.push(Arc::new(ZoomLayer::new(Point::ZERO, 0.0))),
                2 => layers.push(Arc::new(TranslateLayer::new(Point::ZERO))),
                _ => layers.push(rect_layer(0.0, 0.0, 1.0, 1.0, Color::RED.with_alpha(0.01))),
            }
        }
        layers.push(rect_layer(0.0, 0.0, 1.0, 1.0, Color::RED));
        let d = desc();

        let r = raster(&layers, &d);
        let inside = r.get_pixel(8, 7);
        assert!((inside.a - 1.0).abs() < 1e-4, "{inside:?}");
        assert_eq!(r.get_pixel(0, 0), Color::TRANSPARENT);
        assert_surfaces_close(&vector(&layers, &d), &r);
    }

    #[test]
    fn test_vector_render_balances_transforms_on_failure() {
        let d = desc();
        let layers: Vec<LayerRef> = vec![
            Arc::new(TranslateLayer::new(Point::new(1.0, 0.0))),
            rect_layer(0.0, 0.0, 1.0, 1.0, Color::RED),
            Arc::new(ZoomLayer::new(Point::ZERO, 0.5)),
            Arc::new(BlurLayer::new(1.0)),
            rect_layer(0.0, 0.0, 1.0, 1.0, Color::BLUE),
        ];
        let mut target = VectorTarget::new();
        let err = Context::new(&layers)
            .vector_render(&mut target, 3, &d, &NullProgress)
            .unwrap_err();
        assert!(matches!(err, common::error::CompositeError::Unsupported(_)));
        assert!(target.current_transform().is_identity());
    }

    #[test]
    fn test_paths_agree_under_strong_zoom_out() {
        let d = desc();
        let layers: Vec<LayerRef> = vec![
            Arc::new(ZoomLayer::new(Point::ZERO, -19.0)),
            rect_layer(0.0, 0.0, 1e9, 1e9, Color::RED),
        ];
        let r = raster(&layers, &d);
        assert_eq!(r.get_pixel(15, 0), Color::RED);
        assert_eq!(r.get_pixel(0, 15), Color::TRANSPARENT);
        assert_surfaces_close(&vector(&layers, &d), &r);
        assert_surfaces_close(&sampled(&layers, &d), &r);
    }

    #[test]
    fn test_bounding_rect_covers_suffixes() {
        let layers = shape_stack();
        for start in 0..=layers.len() {
            let full = Context::new(&layers).get_full_bounding_rect();
            let suffix = Context::new(&layers[start..]).get_full_bounding_rect();
            assert!(full.covers(&suffix), "suffix {start}: {full:?} does not cover {suffix:?}");
        }
    }

    #[test]
    fn test_infinite_bounds_are_sentinel() {
        let layers: Vec<LayerRef> = vec![
            rect_layer(0.0, 0.0, 1.0, 1.0, Color::RED),
            Arc::new(SolidColorLayer::new(Color::WHITE)),
        ];
        assert_eq!(Context::new(&layers).get_full_bounding_rect(), Bounds::Infinite);

        // Extreme zoom: the bound is declared infinite instead of overflowing.
        let layers: Vec<LayerRef> = vec![
            Arc::new(ZoomLayer::new(Point::ZERO, 800.0)),
            rect_layer(0.0, 0.0, 1.0, 1.0, Color::RED),
        ];
        assert_eq!(Context::new(&layers).get_full_bounding_rect(), Bounds::Infinite);
    }

    #[test]
    fn test_hit_check_precedence() {
        let layers = vec![
            rect_layer(0.0, 0.0, 2.0, 2.0, Color::BLUE),
            rect_layer(1.0, 1.0, 3.0, 3.0, Color::RED),
        ];
        let ctx = Context::new(&layers);
        assert!(Arc::ptr_eq(&ctx.hit_check(Point::new(1.5, 1.5)).unwrap(), &layers[0]));
        assert!(Arc::ptr_eq(&ctx.hit_check(Point::new(2.5, 2.5)).unwrap(), &layers[1]));
        assert!(ctx.hit_check(Point::new(5.0, 5.0)).is_none());
    }

    #[test]
    fn test_hit_check_through_transforms() {
        // Beneath a 2x zoom the unit square appears as [0, 2]².
        let layers: Vec<LayerRef> = vec![
            Arc::new(TranslateLayer::new(Point::new(10.0, 0.0))),
            Arc::new(ZoomLayer::new(Point::ZERO, std::f64::consts::LN_2)),
            rect_layer(0.0, 0.0, 1.0, 1.0, Color::RED),
        ];
        let ctx = Context::new(&layers);
        assert!(Arc::ptr_eq(&ctx.hit_check(Point::new(11.5, 1.5)).unwrap(), &layers[2]));
        assert!(ctx.hit_check(Point::new(1.5, 1.5)).is_none());
        let rect = ctx.get_full_bounding_rect().rect().unwrap();
        let expected = Rect::new(10.0, 0.0, 12.0, 2.0);
        assert!(rect.min.distance(expected.min) < 1e-9 && rect.max.distance(expected.max) < 1e-9);
    }

    #[test]
    fn test_cancelled_render_leaves_surface_untouched() {
        let layers = shape_stack();
        let d = desc();
        let sentinel = Color::rgba(0.25, 0.5, 0.75, 1.0);
        let mut surface = Surface::filled(d.width(), d.height(), sentinel);

        let err = Context::new(&layers)
            .accelerated_render(&mut surface, 3, &d, &CancelFlag::cancelled())
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(surface.pixels().iter().all(|&p| p == sentinel));

        let mut target = VectorTarget::new();
        assert!(Context::new(&layers)
            .vector_render(&mut target, 3, &d, &CancelFlag::cancelled())
            .unwrap_err()
            .is_cancelled());
        assert!(target.list().is_empty());
    }

    #[test]
    fn test_red_rectangle_under_identity_zoom() {
        let d = desc();
        let red = rect_layer(-4.0, -4.0, 4.0, 4.0, Color::RED);
        let alone = raster(&[red.clone()], &d);
        assert!(alone.pixels().iter().all(|&p| p == Color::RED));

        let stack: Vec<LayerRef> = vec![Arc::new(ZoomLayer::new(Point::ZERO, 0.0)), red];
        assert_eq!(raster(&stack, &d), alone);
        assert_eq!(vector(&stack, &d), alone);
        assert_eq!(sampled(&stack, &d), alone);
    }

    #[test]
    fn test_raster_vector_and_sampling_agree() {
        let d = desc();
        let layers = shape_stack();
        let r = raster(&layers, &d);
        assert_eq!(vector(&layers, &d), r);
        assert_surfaces_close(&sampled(&layers, &d), &r);
    }

    #[test]
    fn test_paths_agree_through_transforms() {
        let d = desc();
        let mut inner = Canvas::new_inline();
        inner.push_back(Arc::new(CircleLayer::new(Point::ZERO, 1.0, Color::BLUE)));
        inner.push_back(rect_layer(-2.0, -2.0, 0.0, 0.0, Color::GREEN));
        let mut group = GroupLayer::new(inner);
        group.set_param("origin", Point::new(1.0, 1.0).into()).unwrap();
        group.set_param("amount", 0.75.into()).unwrap();

        let layers: Vec<LayerRef> = vec![
            rect_layer(2.0, 2.0, 3.0, 3.0, Color::WHITE),
            Arc::new(ZoomLayer::new(Point::new(0.5, 0.0), 0.4)),
            Arc::new(group),
            Arc::new(TranslateLayer::new(Point::new(-1.0, 0.5))),
            rect_layer(-1.0, -1.0, 2.0, 0.0, Color::RED),
        ];
        let r = raster(&layers, &d);
        assert_surfaces_close(&vector(&layers, &d), &r);
        assert_surfaces_close(&sampled(&layers, &d), &r);
    }

    #[test]
    fn test_rotate_and_blur_raster_match_sampling() {
        let d = desc();
        let layers: Vec<LayerRef> = vec![
            Arc::new(RotateLayer::new(Point::ZERO, 30.0)),
            rect_layer(-1.0, -1.0, 2.0, 1.0, Color::RED),
        ];
        assert_surfaces_close(&raster(&layers, &d), &sampled(&layers, &d));
        // Rotation has an affine vector form.
        assert_surfaces_close(&vector(&layers, &d), &raster(&layers, &d));

        let layers: Vec<LayerRef> = vec![
            Arc::new(BlurLayer::new(1.0)),
            rect_layer(-1.0, -1.0, 2.0, 1.0, Color::RED),
        ];
        assert_surfaces_close(&raster(&layers, &d), &sampled(&layers, &d));
        let mut target = VectorTarget::new();
        let err = Context::new(&layers)
            .vector_render(&mut target, 3, &d, &NullProgress)
            .unwrap_err();
        assert!(matches!(err, common::error::CompositeError::Unsupported(_)));
    }

    #[test]
    fn test_occluding_layer_hides_everything_beneath() {
        let d = desc();
        let layers: Vec<LayerRef> = vec![
            rect_layer(0.0, 0.0, 1.0, 1.0, Color::RED),
            Arc::new(SolidColorLayer::new(Color::WHITE)),
            Arc::new(BlurLayer::new(2.0)),
            rect_layer(-4.0, -4.0, 4.0, 4.0, Color::BLUE),
        ];
        let r = raster(&layers, &d);
        assert!(r.pixels().iter().all(|&p| p == Color::WHITE || p == Color::RED));
        assert_eq!(Context::new(&layers).get_color(Point::new(-2.0, -2.0)), Color::WHITE);
        assert_eq!(vector(&layers, &d), r);
    }
}

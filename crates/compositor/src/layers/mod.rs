//! Built-in layer types.

mod blur;
mod group;
mod rotate;
mod shape;
mod translate;
mod zoom;

pub use blur::BlurLayer;
pub use group::GroupLayer;
pub use rotate::RotateLayer;
pub use shape::{CircleLayer, OutlineLayer, RectangleLayer, RegionLayer, SolidColorLayer};
pub use translate::TranslateLayer;
pub use zoom::ZoomLayer;

use crate::context::Context;
use crate::transform::Transform;
use common::error::CompositeResult;
use common::geometry::Matrix;
use render::{ProgressCallback, RendDesc, Surface, VectorTarget};

/// Render `context` as seen through `transform` by moving the view window
/// instead of every sample.
///
/// Only valid for transforms that keep the window axis-aligned.
pub(crate) fn render_through(
    transform: &dyn Transform,
    context: Context<'_>,
    surface: &mut Surface,
    quality: u32,
    desc: &RendDesc,
    cb: &dyn ProgressCallback,
) -> CompositeResult<()> {
    let inner = desc.map_window(|p| transform.unperform(p));
    context.accelerated_render(surface, quality, &inner, cb)
}

/// Record `context` with `matrix` mapping its space into the current one.
pub(crate) fn record_through(
    matrix: &Matrix,
    context: Context<'_>,
    target: &mut VectorTarget,
    quality: u32,
    desc: &RendDesc,
    cb: &dyn ProgressCallback,
) -> CompositeResult<()> {
    target.push_transform(matrix);
    let result = context.vector_render(target, quality, desc, cb);
    target.pop_transform();
    result
}

//! The layer contract.
//!
//! A layer is a node in a canvas's ordered stack. It sees the layers beneath
//! it only through a [`Context`], and answers four kinds of question about
//! the composite of itself over that context: its color at a point, a whole
//! rendered surface (raster or vector), its bounds, and which layer owns a
//! point. Every method has a default, so a concrete layer only overrides
//! what it customizes. Layers that fill a shape describe it once through
//! [`Layer::fill`] and inherit consistent sampling, painting, recording,
//! bounds and hit-testing from it.

use crate::canvas::Canvas;
use crate::context::Context;
use crate::param::{find_param, ParamDesc, ParamVocab};
use crate::transform::TransformRef;
use crate::value::{Value, ValueNode};
use common::color::{BlendMethod, Color};
use common::error::{CompositeError, CompositeResult};
use common::geometry::{Bounds, Matrix, Point};
use common::units::Time;
use rayon::prelude::*;
use render::{check_cancelled, ProgressCallback, RendDesc, Shape, Surface, VectorTarget};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

static NEXT_LAYER_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_CANVAS_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a layer; survives copy-on-write cloning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(u64);

impl LayerId {
    pub fn next() -> Self {
        Self(NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// Identity of a canvas, used as a non-owning back-reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanvasId(u64);

impl CanvasId {
    pub fn next() -> Self {
        Self(NEXT_CANVAS_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for CanvasId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "canvas#{}", self.0)
    }
}

/// State shared by every layer type.
#[derive(Clone, Debug)]
pub struct LayerBase {
    id: LayerId,
    /// The canvas this layer was inserted into.
    canvas: Option<CanvasId>,
    active: bool,
    description: String,
    /// Parameters bound to time-varying sources.
    dynamic: BTreeMap<String, Arc<dyn ValueNode>>,
    /// Bumped on every parameter change.
    revision: u64,
}

impl Default for LayerBase {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerBase {
    pub fn new() -> Self {
        Self {
            id: LayerId::next(),
            canvas: None,
            active: true,
            description: String::new(),
            dynamic: BTreeMap::new(),
            revision: 0,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn canvas(&self) -> Option<CanvasId> {
        self.canvas
    }

    pub fn set_canvas(&mut self, canvas: Option<CanvasId>) {
        self.canvas = canvas;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        if self.active != active {
            self.active = active;
            self.touch();
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn dynamic_param(&self, name: &str) -> Option<&Arc<dyn ValueNode>> {
        self.dynamic.get(name)
    }

    pub fn dynamic_params(&self) -> impl Iterator<Item = (&str, &Arc<dyn ValueNode>)> {
        self.dynamic.iter().map(|(name, node)| (name.as_str(), node))
    }

    pub fn has_dynamic_params(&self) -> bool {
        !self.dynamic.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Record a change.
    pub fn touch(&mut self) {
        self.revision += 1;
    }

    fn connect(&mut self, name: &str, node: Arc<dyn ValueNode>) -> Option<Arc<dyn ValueNode>> {
        self.dynamic.insert(name.to_owned(), node)
    }

    fn disconnect(&mut self, name: &str) -> Option<Arc<dyn ValueNode>> {
        self.dynamic.remove(name)
    }
}

/// What a layer contributes at a single point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sample {
    /// Nothing of its own: the color beneath at the (possibly mapped) point.
    Beneath(Point),
    /// Its own color blended over the color beneath at the same point.
    Blend {
        color: Color,
        amount: f32,
        method: BlendMethod,
    },
    /// Needs the context itself; answered by [`Layer::get_color`].
    Custom,
}

/// Outcome of asking one layer whether it owns a point.
#[derive(Clone, Debug)]
pub enum HitCheck {
    /// This layer owns the point.
    This,
    /// Continue below with the point mapped into the space beneath.
    Below(Point),
    /// A specific layer owns the point.
    Found(LayerRef),
    /// Nothing at or below this layer owns the point.
    Miss,
}

/// A filled shape with its compositing parameters.
#[derive(Clone, Copy, Debug)]
pub struct Fill<'a> {
    pub shape: &'a Shape,
    pub color: Color,
    pub amount: f32,
    pub method: BlendMethod,
}

/// Blend `color` over the result of `beneath`, skipping it when the blend
/// does not depend on what lies beneath.
#[inline]
pub fn composite_over(
    color: Color,
    amount: f32,
    method: BlendMethod,
    beneath: impl FnOnce() -> Color,
) -> Color {
    if method.replaces(color, amount) {
        Color::blend(color, Color::TRANSPARENT, amount, method)
    } else {
        Color::blend(color, beneath(), amount, method)
    }
}

/// Type-check `value` against the parameter `name` in `vocab`.
pub fn validate_param(vocab: &[ParamDesc], name: &str, value: Value) -> CompositeResult<Value> {
    let desc = find_param(vocab, name).ok_or_else(|| CompositeError::unknown_param(name))?;
    value.expect_type(name, desc.value_type)
}

/// Store the value of every bound parameter of `layer` at `time`.
///
/// A binding whose value the layer rejects is logged and skipped; the
/// parameter keeps its previous value.
pub fn apply_bindings<L: Layer + ?Sized>(layer: &mut L, time: Time) {
    let bindings: Vec<(String, Arc<dyn ValueNode>)> = layer
        .base()
        .dynamic_params()
        .map(|(name, node)| (name.to_owned(), node.clone()))
        .collect();
    let vocab = layer.param_vocab();
    for (name, node) in bindings {
        let result = validate_param(&vocab, &name, node.evaluate(time))
            .and_then(|value| layer.apply_param(&name, value));
        if let Err(err) = result {
            warn!("{} ({}): dynamic parameter '{}' rejected: {}", layer.name(), layer.id(), name, err);
        }
    }
}

/// Fill `surface` by sampling `layer` over `context` at every pixel center.
///
/// The fallback raster path for layers that have no faster one.
pub fn render_by_sampling<L: Layer + ?Sized>(
    layer: &L,
    context: Context<'_>,
    surface: &mut Surface,
    desc: &RendDesc,
    cb: &dyn ProgressCallback,
) -> CompositeResult<()> {
    check_cancelled(cb)?;
    let width = surface.width() as usize;
    if width == 0 || surface.height() == 0 {
        return Ok(());
    }
    surface
        .pixels_mut()
        .par_chunks_mut(width)
        .enumerate()
        .try_for_each(|(y, row)| {
            check_cancelled(cb)?;
            for (x, pixel) in row.iter_mut().enumerate() {
                *pixel = layer.get_color(context, desc.pixel_center(x as u32, y as u32));
            }
            Ok(())
        })
}

/// A node in a canvas.
pub trait Layer: Send + Sync + fmt::Debug {
    /// Type name used by the factory.
    fn name(&self) -> &'static str;

    /// Human-readable type name.
    fn local_name(&self) -> &'static str {
        self.name()
    }

    fn base(&self) -> &LayerBase;

    fn base_mut(&mut self) -> &mut LayerBase;

    /// A deep copy that keeps the layer's id.
    fn clone_layer(&self) -> Box<dyn Layer>;

    fn id(&self) -> LayerId {
        self.base().id()
    }

    fn is_active(&self) -> bool {
        self.base().is_active()
    }

    // Parameters

    fn param_vocab(&self) -> ParamVocab;

    fn get_param(&self, name: &str) -> Option<Value>;

    /// Store a value already checked against the vocabulary.
    fn apply_param(&mut self, name: &str, value: Value) -> CompositeResult<()>;

    /// Set a static parameter value.
    ///
    /// Unknown names and values of the wrong type are rejected without
    /// touching the layer.
    fn set_param(&mut self, name: &str, value: Value) -> CompositeResult<()> {
        let value = validate_param(&self.param_vocab(), name, value)?;
        self.apply_param(name, value)?;
        self.base_mut().touch();
        Ok(())
    }

    /// Bind a parameter to a time-varying source, returning the previous one.
    fn connect_param(
        &mut self,
        name: &str,
        node: Arc<dyn ValueNode>,
    ) -> CompositeResult<Option<Arc<dyn ValueNode>>> {
        let vocab = self.param_vocab();
        let desc = find_param(&vocab, name).ok_or_else(|| CompositeError::unknown_param(name))?;
        if !desc.is_animatable() {
            return Err(CompositeError::invalid(format!(
                "parameter '{name}' of {} cannot be animated",
                self.name()
            )));
        }
        let found = node.value_type();
        if !found.widens_to(desc.value_type) {
            return Err(CompositeError::type_mismatch(name, desc.value_type.name(), found.name()));
        }
        let previous = self.base_mut().connect(name, node);
        self.base_mut().touch();
        Ok(previous)
    }

    /// Remove a parameter binding, returning it.
    fn disconnect_param(&mut self, name: &str) -> Option<Arc<dyn ValueNode>> {
        let previous = self.base_mut().disconnect(name);
        if previous.is_some() {
            self.base_mut().touch();
        }
        previous
    }

    /// Evaluate bound parameters at `time`.
    fn set_time(&mut self, time: Time) {
        apply_bindings(self, time);
    }

    // Sampling

    /// The shape this layer fills, if it is a plain shape layer.
    fn fill(&self) -> Option<Fill<'_>> {
        None
    }

    fn sample(&self, point: Point) -> Sample {
        match self.fill() {
            Some(fill) if fill.shape.contains(point) => Sample::Blend {
                color: fill.color,
                amount: fill.amount,
                method: fill.method,
            },
            _ => Sample::Beneath(point),
        }
    }

    /// This layer's color at `point` composited over `context`.
    fn get_color(&self, context: Context<'_>, point: Point) -> Color {
        match self.sample(point) {
            Sample::Beneath(mapped) => context.get_color(mapped),
            Sample::Blend { color, amount, method } => {
                composite_over(color, amount, method, || context.get_color(point))
            }
            Sample::Custom => context.get_color(point),
        }
    }

    // Raster path

    /// Whether this layer only paints its own contribution on top of an
    /// already rendered context.
    fn is_overlay(&self) -> bool {
        self.fill().is_some()
    }

    /// Whether this layer hides everything beneath it.
    fn occludes(&self) -> bool {
        self.fill().map_or(false, |fill| {
            matches!(fill.shape, Shape::Plane) && fill.method.replaces(fill.color, fill.amount)
        })
    }

    /// Paint this layer's own contribution over `surface`.
    fn paint(&self, surface: &mut Surface, _quality: u32, desc: &RendDesc) -> CompositeResult<()> {
        match self.fill() {
            Some(fill) => surface.fill_shape(
                desc,
                fill.shape,
                &Matrix::IDENTITY,
                fill.color,
                fill.amount,
                fill.method,
            ),
            None => Ok(()),
        }
    }

    /// Render this layer over `context` into `surface`.
    fn accelerated_render(
        &self,
        context: Context<'_>,
        surface: &mut Surface,
        quality: u32,
        desc: &RendDesc,
        cb: &dyn ProgressCallback,
    ) -> CompositeResult<()> {
        check_cancelled(cb)?;
        if self.is_overlay() {
            context.accelerated_render(surface, quality, desc, cb)?;
            return self.paint(surface, quality, desc);
        }
        render_by_sampling(self, context, surface, desc, cb)
    }

    // Vector path

    /// Record this layer's own contribution.
    fn record(&self, target: &mut VectorTarget) -> CompositeResult<()> {
        match self.fill() {
            Some(fill) => {
                target.fill(fill.shape.clone(), fill.color, fill.amount, fill.method);
                Ok(())
            }
            None => Err(CompositeError::unsupported(format!(
                "{} has no vector form",
                self.name()
            ))),
        }
    }

    /// Record this layer over `context` into `target`.
    fn vector_render(
        &self,
        context: Context<'_>,
        target: &mut VectorTarget,
        quality: u32,
        desc: &RendDesc,
        cb: &dyn ProgressCallback,
    ) -> CompositeResult<()> {
        check_cancelled(cb)?;
        if self.fill().is_none() {
            return Err(CompositeError::unsupported(format!(
                "{} has no vector render path",
                self.name()
            )));
        }
        context.vector_render(target, quality, desc, cb)?;
        self.record(target)
    }

    // Geometry

    /// Maps the space beneath this layer into the space above it.
    fn get_transform(&self) -> Option<TransformRef> {
        None
    }

    /// For a layer that draws nothing and only shows the layers beneath
    /// through a transform: that transform, or the reason it cannot be
    /// rendered. Context render walks apply it in place of calling the
    /// layer's own render methods.
    fn passthrough(&self) -> Option<CompositeResult<TransformRef>> {
        None
    }

    /// Bounds of this layer's own contribution.
    fn bounding_rect(&self) -> Bounds {
        self.fill().map_or(Bounds::Empty, |fill| fill.shape.bounds())
    }

    /// Bounds of this layer composited over content bounded by `beneath`.
    fn combine_bounds(&self, beneath: Bounds) -> Bounds {
        let beneath = match self.get_transform() {
            Some(transform) => transform.transform_bounds(&beneath),
            None => beneath,
        };
        self.bounding_rect().union(&beneath)
    }

    fn get_full_bounding_rect(&self, context: Context<'_>) -> Bounds {
        self.combine_bounds(context.get_full_bounding_rect())
    }

    fn hit_check(&self, _context: Context<'_>, point: Point) -> HitCheck {
        if let Some(fill) = self.fill() {
            return if fill.amount != 0.0 && fill.shape.contains(point) {
                HitCheck::This
            } else {
                HitCheck::Below(point)
            };
        }
        match self.get_transform() {
            Some(transform) => HitCheck::Below(transform.unperform(point)),
            None => HitCheck::Below(point),
        }
    }

    // Containers

    fn inline_canvas(&self) -> Option<&Arc<Canvas>> {
        None
    }

    fn inline_canvas_mut(&mut self) -> Option<&mut Arc<Canvas>> {
        None
    }
}

/// A shared layer handle.
pub type LayerRef = Arc<dyn Layer>;

/// Get mutable access to a shared layer, cloning it first if other handles
/// (such as a running render's snapshot) still point at it.
pub fn make_layer_mut(layer: &mut LayerRef) -> &mut dyn Layer {
    if Arc::get_mut(layer).is_none() {
        *layer = Arc::from(layer.clone_layer());
    }
    match Arc::get_mut(layer) {
        Some(layer) => layer,
        None => unreachable!("a freshly cloned layer has a single owner"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{CircleLayer, RectangleLayer, ZoomLayer};
    use crate::value::{ConstantNode, LinearNode};
    use common::geometry::Rect;

    #[test]
    fn test_ids_are_unique() {
        let a = LayerBase::new();
        let b = LayerBase::new();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn test_set_param_rejects_without_mutation() {
        let mut circle = CircleLayer::new(Point::ZERO, 1.0, Color::RED);
        let revision = circle.base().revision();

        let err = circle.set_param("radius", Value::Bool(true)).unwrap_err();
        assert!(matches!(err, CompositeError::TypeMismatch { .. }));
        let err = circle.set_param("no_such_param", Value::Real(1.0)).unwrap_err();
        assert!(matches!(err, CompositeError::UnknownParam(_)));

        assert_eq!(circle.get_param("radius"), Some(Value::Real(1.0)));
        assert_eq!(circle.base().revision(), revision);

        circle.set_param("radius", Value::Integer(3)).unwrap();
        assert_eq!(circle.get_param("radius"), Some(Value::Real(3.0)));
        assert_eq!(circle.base().revision(), revision + 1);
    }

    #[test]
    fn test_connect_and_set_time() {
        let mut circle = CircleLayer::new(Point::ZERO, 1.0, Color::RED);
        let node = LinearNode::from_keys([
            (Time::ZERO, Value::Real(1.0)),
            (Time::from_seconds(1.0), Value::Real(3.0)),
        ])
        .unwrap();
        assert!(circle.connect_param("radius", Arc::new(node)).unwrap().is_none());
        circle.set_time(Time::from_seconds(0.5));
        assert_eq!(circle.get_param("radius"), Some(Value::Real(2.0)));

        let err = circle
            .connect_param("radius", ConstantNode::shared(Color::RED))
            .unwrap_err();
        assert!(matches!(err, CompositeError::TypeMismatch { .. }));
        assert!(circle.connect_param("blend_method", ConstantNode::shared(BlendMethod::Add)).is_err());

        assert!(circle.disconnect_param("radius").is_some());
        assert!(circle.disconnect_param("radius").is_none());
    }

    #[test]
    fn test_default_contract_from_fill() {
        let rect = RectangleLayer::new(Rect::new(0.0, 0.0, 1.0, 1.0), Color::RED);
        assert!(rect.is_overlay());
        assert!(!rect.occludes());
        assert_eq!(rect.bounding_rect(), Bounds::Finite(Rect::new(0.0, 0.0, 1.0, 1.0)));
        assert!(matches!(rect.sample(Point::new(0.5, 0.5)), Sample::Blend { .. }));
        assert_eq!(rect.sample(Point::new(2.0, 2.0)), Sample::Beneath(Point::new(2.0, 2.0)));
        assert!(matches!(rect.hit_check(Context::empty(), Point::new(0.5, 0.5)), HitCheck::This));
        assert!(matches!(
            rect.hit_check(Context::empty(), Point::new(5.0, 5.0)),
            HitCheck::Below(_)
        ));
    }

    #[test]
    fn test_transform_layer_has_no_vector_form_of_its_own() {
        let zoom = ZoomLayer::new(Point::ZERO, 0.0);
        let mut target = VectorTarget::new();
        assert!(matches!(zoom.record(&mut target), Err(CompositeError::Unsupported(_))));
    }

    #[test]
    fn test_make_layer_mut_copies_shared_layers() {
        let mut handle: LayerRef = Arc::new(CircleLayer::new(Point::ZERO, 1.0, Color::RED));
        let snapshot = handle.clone();

        make_layer_mut(&mut handle).set_param("radius", Value::Real(5.0)).unwrap();
        assert_eq!(snapshot.get_param("radius"), Some(Value::Real(1.0)));
        assert_eq!(handle.get_param("radius"), Some(Value::Real(5.0)));
        assert_eq!(handle.id(), snapshot.id());
        assert!(!Arc::ptr_eq(&handle, &snapshot));

        // A uniquely owned handle is edited in place.
        let before = Arc::as_ptr(&handle) as *const ();
        make_layer_mut(&mut handle).set_param("radius", Value::Real(6.0)).unwrap();
        assert_eq!(Arc::as_ptr(&handle) as *const (), before);
    }
}

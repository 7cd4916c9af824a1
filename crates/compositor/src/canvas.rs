//! Canvases and the editable document root.

use crate::action::Action;
use crate::context::Context;
use crate::layer::{make_layer_mut, CanvasId, Layer, LayerId, LayerRef};
use crate::transform::TransformStack;
use crate::value::Value;
use common::color::Color;
use common::error::{CompositeError, CompositeResult};
use common::geometry::{Bounds, Point};
use common::units::Time;
use parking_lot::RwLock;
use render::{ProgressCallback, RendDesc, Surface};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// An ordered stack of layers; index 0 is the topmost.
///
/// Cloning is cheap: layers are shared handles and are only copied when an
/// edit reaches a handle some other clone still holds.
#[derive(Clone, Debug)]
pub struct Canvas {
    id: CanvasId,
    /// Owned by a container layer rather than standing on its own.
    inline: bool,
    layers: Vec<LayerRef>,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new()
    }
}

impl Canvas {
    pub fn new() -> Self {
        Self {
            id: CanvasId::next(),
            inline: false,
            layers: Vec::new(),
        }
    }

    /// A canvas owned by a container layer.
    pub fn new_inline() -> Self {
        Self {
            inline: true,
            ..Self::new()
        }
    }

    pub fn id(&self) -> CanvasId {
        self.id
    }

    pub fn is_inline(&self) -> bool {
        self.inline
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[LayerRef] {
        &self.layers
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerRef> {
        self.layers.iter()
    }

    /// A context over the whole stack.
    pub fn context(&self) -> Context<'_> {
        Context::new(&self.layers)
    }

    pub fn get(&self, index: usize) -> Option<&LayerRef> {
        self.layers.get(index)
    }

    /// Depth of the layer with `id` in this canvas.
    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|layer| layer.id() == id)
    }

    pub fn find(&self, id: LayerId) -> Option<&LayerRef> {
        self.layers.iter().find(|layer| layer.id() == id)
    }

    /// Insert `layer` at depth `index`, claiming it for this canvas.
    pub fn insert(&mut self, index: usize, mut layer: LayerRef) -> CompositeResult<()> {
        if index > self.layers.len() {
            return Err(CompositeError::invalid(format!(
                "depth {index} out of range for canvas of {} layers",
                self.layers.len()
            )));
        }
        self.claim(&mut layer);
        self.layers.insert(index, layer);
        Ok(())
    }

    /// Add a layer on top.
    pub fn push_front(&mut self, mut layer: LayerRef) {
        self.claim(&mut layer);
        self.layers.insert(0, layer);
    }

    /// Add a layer at the bottom.
    pub fn push_back(&mut self, mut layer: LayerRef) {
        self.claim(&mut layer);
        self.layers.push(layer);
    }

    fn claim(&self, layer: &mut LayerRef) {
        if layer.base().canvas() != Some(self.id) {
            make_layer_mut(layer).base_mut().set_canvas(Some(self.id));
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<LayerRef> {
        (index < self.layers.len()).then(|| self.layers.remove(index))
    }

    /// Move the layer at `from` so that it ends up at depth `to`.
    pub fn move_layer(&mut self, from: usize, to: usize) -> CompositeResult<()> {
        if from >= self.layers.len() || to >= self.layers.len() {
            return Err(CompositeError::invalid(format!(
                "cannot move depth {from} to {to} in canvas of {} layers",
                self.layers.len()
            )));
        }
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);
        Ok(())
    }

    /// Mutable access to a layer of this canvas, copying it if shared.
    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut dyn Layer> {
        let index = self.index_of(id)?;
        Some(make_layer_mut(&mut self.layers[index]))
    }

    // Tree queries

    /// The canvas (this one or a nested one) that directly holds `id`, and
    /// the layer's depth in it.
    pub fn find_deep(&self, id: LayerId) -> Option<(&Canvas, usize)> {
        if let Some(index) = self.index_of(id) {
            return Some((self, index));
        }
        self.layers
            .iter()
            .filter_map(|layer| layer.inline_canvas())
            .find_map(|canvas| canvas.find_deep(id))
    }

    /// The canvas with `id` in this tree.
    pub fn canvas_by_id(&self, id: CanvasId) -> Option<&Canvas> {
        if self.id == id {
            return Some(self);
        }
        self.layers
            .iter()
            .filter_map(|layer| layer.inline_canvas())
            .find_map(|canvas| canvas.canvas_by_id(id))
    }

    /// Mutable access to the canvas with `id`, copying every shared layer
    /// and canvas on the way down.
    pub fn canvas_by_id_mut(&mut self, id: CanvasId) -> Option<&mut Canvas> {
        if self.id == id {
            return Some(self);
        }
        let index = self.layers.iter().position(|layer| {
            layer
                .inline_canvas()
                .map_or(false, |canvas| canvas.canvas_by_id(id).is_some())
        })?;
        let container = make_layer_mut(&mut self.layers[index]);
        let canvas = Arc::make_mut(container.inline_canvas_mut()?);
        canvas.canvas_by_id_mut(id)
    }

    /// Mutable access to the canvas directly holding `id`.
    pub fn canvas_containing_mut(&mut self, id: LayerId) -> Option<&mut Canvas> {
        let canvas_id = self.find_deep(id)?.0.id();
        self.canvas_by_id_mut(canvas_id)
    }

    /// Mutable access to a layer anywhere in this tree.
    pub fn layer_deep_mut(&mut self, id: LayerId) -> Option<&mut dyn Layer> {
        self.canvas_containing_mut(id)?.layer_mut(id)
    }

    /// Set a parameter of a layer anywhere in this tree.
    pub fn set_param(&mut self, id: LayerId, name: &str, value: Value) -> CompositeResult<()> {
        self.layer_deep_mut(id)
            .ok_or_else(|| CompositeError::layer_not_found(id.to_string()))?
            .set_param(name, value)
    }

    /// The transforms in effect at the layer `id`, outermost first.
    ///
    /// These are the transforms of layers above it in its canvas and of the
    /// containers it is nested in. `None` if the layer is not in this tree.
    pub fn transform_stack_for(&self, id: LayerId) -> Option<TransformStack> {
        let mut stack = TransformStack::new();
        let mut canvas = self;
        loop {
            if let Some(index) = canvas.index_of(id) {
                push_transforms(&mut stack, &canvas.layers[..index]);
                return Some(stack);
            }
            let (index, inner) = canvas.layers.iter().enumerate().find_map(|(index, layer)| {
                let inner = layer.inline_canvas()?;
                inner.find_deep(id).map(|_| (index, inner))
            })?;
            push_transforms(&mut stack, &canvas.layers[..index]);
            if let Some(transform) = canvas.layers[index].get_transform() {
                stack.push(transform);
            }
            canvas = &**inner;
        }
    }

    /// Every layer in this tree, depth first.
    pub fn walk(&self) -> Vec<LayerRef> {
        let mut out = Vec::new();
        let mut pending: Vec<&Canvas> = vec![self];
        while let Some(canvas) = pending.pop() {
            for layer in &canvas.layers {
                out.push(layer.clone());
                if let Some(inner) = layer.inline_canvas() {
                    pending.push(inner);
                }
            }
        }
        out
    }

    // Evaluation

    /// A copy with every animated parameter evaluated at `time`.
    ///
    /// Layers without bindings or nested canvases stay shared.
    pub fn at_time(&self, time: Time) -> Canvas {
        let mut out = self.clone();
        for layer in &mut out.layers {
            if layer.base().has_dynamic_params() || layer.inline_canvas().is_some() {
                make_layer_mut(layer).set_time(time);
            }
        }
        out
    }

    pub fn get_color(&self, point: Point) -> Color {
        self.context().get_color(point)
    }

    pub fn hit_check(&self, point: Point) -> Option<LayerRef> {
        self.context().hit_check(point)
    }

    pub fn bounds(&self) -> Bounds {
        self.context().get_full_bounding_rect()
    }

    /// Render the whole stack into `surface` on the raster path.
    pub fn render(
        &self,
        surface: &mut Surface,
        quality: u32,
        desc: &RendDesc,
        cb: &dyn ProgressCallback,
    ) -> CompositeResult<()> {
        self.context().accelerated_render(surface, quality, desc, cb)
    }
}

fn push_transforms(stack: &mut TransformStack, above: &[LayerRef]) {
    // A container's transform only maps its own content.
    let passthrough = |layer: &&LayerRef| layer.is_active() && layer.inline_canvas().is_none();
    for layer in above.iter().filter(passthrough) {
        if let Some(transform) = layer.get_transform() {
            stack.push(transform);
        }
    }
}

/// A change reported to document observers.
#[derive(Clone, Debug, PartialEq)]
pub enum Change {
    ParamChanged { layer: LayerId, param: String },
    Performed(&'static str),
    Undone(&'static str),
}

/// Callback invoked after every document change.
pub type ChangeObserver = Box<dyn Fn(&Change) + Send + Sync>;

/// The single-writer root of an editable canvas tree.
///
/// Renders work on snapshots; an edit replaces the root, so a snapshot taken
/// before the edit never observes it.
pub struct Document {
    root: RwLock<Arc<Canvas>>,
    observers: RwLock<Vec<ChangeObserver>>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("root", &self.root.read().id())
            .field("observers", &self.observers.read().len())
            .finish()
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new(Canvas::new())
    }
}

impl Document {
    pub fn new(root: Canvas) -> Self {
        Self {
            root: RwLock::new(Arc::new(root)),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// The current root.
    pub fn snapshot(&self) -> Arc<Canvas> {
        self.root.read().clone()
    }

    /// The current root evaluated at `time`.
    pub fn snapshot_at(&self, time: Time) -> Arc<Canvas> {
        Arc::new(self.snapshot().at_time(time))
    }

    pub fn subscribe(&self, observer: ChangeObserver) {
        self.observers.write().push(observer);
    }

    /// Apply `f` to the root under the write lock.
    pub fn edit<R>(&self, f: impl FnOnce(&mut Canvas) -> CompositeResult<R>) -> CompositeResult<R> {
        let mut root = self.root.write();
        let mut canvas = Canvas::clone(&root);
        let result = f(&mut canvas)?;
        *root = Arc::new(canvas);
        Ok(result)
    }

    pub fn set_param(&self, layer: LayerId, name: &str, value: Value) -> CompositeResult<()> {
        self.edit(|canvas| canvas.set_param(layer, name, value))?;
        debug!("{layer}: parameter '{name}' changed");
        self.notify(&Change::ParamChanged {
            layer,
            param: name.to_owned(),
        });
        Ok(())
    }

    pub fn perform(&self, action: &mut dyn Action) -> CompositeResult<()> {
        self.edit(|canvas| action.perform(canvas))?;
        debug!("performed {}", action.name());
        self.notify(&Change::Performed(action.name()));
        Ok(())
    }

    pub fn undo(&self, action: &mut dyn Action) -> CompositeResult<()> {
        self.edit(|canvas| action.undo(canvas))?;
        debug!("undid {}", action.name());
        self.notify(&Change::Undone(action.name()));
        Ok(())
    }

    fn notify(&self, change: &Change) {
        for observer in self.observers.read().iter() {
            observer(change);
        }
    }
}

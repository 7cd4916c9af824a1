//! Undoable edits of a canvas tree.
//!
//! Every action records what it needs to revert itself while performing, so
//! `undo` right after a successful `perform` restores the tree. Actions are
//! applied through [`Document::perform`](crate::canvas::Document::perform),
//! which discards the edit entirely when an action fails part way.

use crate::canvas::Canvas;
use crate::layer::{CanvasId, Layer, LayerId, LayerRef};
use crate::layers::{OutlineLayer, RegionLayer};
use crate::value::{Value, ValueNode};
use common::error::{CompositeError, CompositeResult};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// An undoable edit.
pub trait Action: Send + fmt::Debug {
    fn name(&self) -> &'static str;

    fn perform(&mut self, root: &mut Canvas) -> CompositeResult<()>;

    fn undo(&mut self, root: &mut Canvas) -> CompositeResult<()>;
}

fn canvas_mut(root: &mut Canvas, id: CanvasId) -> CompositeResult<&mut Canvas> {
    root.canvas_by_id_mut(id)
        .ok_or_else(|| CompositeError::not_in_canvas(format!("{id} is not in this tree")))
}

fn layer_mut(root: &mut Canvas, id: LayerId) -> CompositeResult<&mut dyn Layer> {
    root.layer_deep_mut(id)
        .ok_or_else(|| CompositeError::layer_not_found(id.to_string()))
}

fn not_performed(name: &str) -> CompositeError {
    CompositeError::invalid(format!("{name} undone before it was performed"))
}

/// Insert a layer into a canvas at a depth.
#[derive(Debug)]
pub struct LayerAdd {
    canvas: CanvasId,
    layer: LayerRef,
    depth: usize,
}

impl LayerAdd {
    pub fn new(canvas: CanvasId, layer: LayerRef, depth: usize) -> Self {
        Self { canvas, layer, depth }
    }

    /// Add on top of `canvas`.
    pub fn on_top(canvas: CanvasId, layer: LayerRef) -> Self {
        Self::new(canvas, layer, 0)
    }
}

impl Action for LayerAdd {
    fn name(&self) -> &'static str {
        "LayerAdd"
    }

    fn perform(&mut self, root: &mut Canvas) -> CompositeResult<()> {
        canvas_mut(root, self.canvas)?.insert(self.depth, self.layer.clone())
    }

    fn undo(&mut self, root: &mut Canvas) -> CompositeResult<()> {
        let id = self.layer.id();
        let canvas = canvas_mut(root, self.canvas)?;
        let index = canvas
            .index_of(id)
            .ok_or_else(|| CompositeError::layer_not_found(id.to_string()))?;
        canvas.remove(index);
        Ok(())
    }
}

/// Remove a layer from whichever canvas holds it.
#[derive(Debug)]
pub struct LayerRemove {
    layer: LayerId,
    removed: Option<(CanvasId, usize, LayerRef)>,
}

impl LayerRemove {
    pub fn new(layer: LayerId) -> Self {
        Self { layer, removed: None }
    }
}

impl Action for LayerRemove {
    fn name(&self) -> &'static str {
        "LayerRemove"
    }

    fn perform(&mut self, root: &mut Canvas) -> CompositeResult<()> {
        let canvas = root
            .canvas_containing_mut(self.layer)
            .ok_or_else(|| CompositeError::layer_not_found(self.layer.to_string()))?;
        let index = canvas
            .index_of(self.layer)
            .ok_or_else(|| CompositeError::layer_not_found(self.layer.to_string()))?;
        let canvas_id = canvas.id();
        let layer = canvas
            .remove(index)
            .ok_or_else(|| CompositeError::internal("layer vanished while removing it"))?;
        self.removed = Some((canvas_id, index, layer));
        Ok(())
    }

    fn undo(&mut self, root: &mut Canvas) -> CompositeResult<()> {
        let (canvas, index, layer) = self.removed.take().ok_or_else(|| not_performed(self.name()))?;
        canvas_mut(root, canvas)?.insert(index, layer)
    }
}

/// Move a layer to another depth within its canvas.
#[derive(Debug)]
pub struct LayerMove {
    layer: LayerId,
    to: usize,
    from: Option<usize>,
}

impl LayerMove {
    pub fn new(layer: LayerId, to: usize) -> Self {
        Self { layer, to, from: None }
    }

    fn relocate(root: &mut Canvas, layer: LayerId, to: usize) -> CompositeResult<usize> {
        let canvas = root
            .canvas_containing_mut(layer)
            .ok_or_else(|| CompositeError::layer_not_found(layer.to_string()))?;
        let from = canvas
            .index_of(layer)
            .ok_or_else(|| CompositeError::layer_not_found(layer.to_string()))?;
        canvas.move_layer(from, to)?;
        Ok(from)
    }
}

impl Action for LayerMove {
    fn name(&self) -> &'static str {
        "LayerMove"
    }

    fn perform(&mut self, root: &mut Canvas) -> CompositeResult<()> {
        self.from = Some(Self::relocate(root, self.layer, self.to)?);
        Ok(())
    }

    fn undo(&mut self, root: &mut Canvas) -> CompositeResult<()> {
        let from = self.from.take().ok_or_else(|| not_performed(self.name()))?;
        Self::relocate(root, self.layer, from).map(|_| ())
    }
}

/// Set a static parameter value.
#[derive(Debug)]
pub struct LayerParamSet {
    layer: LayerId,
    param: String,
    value: Value,
    old: Option<Value>,
}

impl LayerParamSet {
    pub fn new(layer: LayerId, param: impl Into<String>, value: Value) -> Self {
        Self {
            layer,
            param: param.into(),
            value,
            old: None,
        }
    }
}

impl Action for LayerParamSet {
    fn name(&self) -> &'static str {
        "LayerParamSet"
    }

    fn perform(&mut self, root: &mut Canvas) -> CompositeResult<()> {
        let layer = layer_mut(root, self.layer)?;
        let old = layer
            .get_param(&self.param)
            .ok_or_else(|| CompositeError::unknown_param(self.param.as_str()))?;
        layer.set_param(&self.param, self.value.clone())?;
        self.old = Some(old);
        Ok(())
    }

    fn undo(&mut self, root: &mut Canvas) -> CompositeResult<()> {
        let old = self.old.take().ok_or_else(|| not_performed(self.name()))?;
        layer_mut(root, self.layer)?.set_param(&self.param, old)
    }
}

/// Bind a parameter to a value node.
#[derive(Debug)]
pub struct LayerParamConnect {
    layer: LayerId,
    param: String,
    node: Arc<dyn ValueNode>,
    previous: Option<Option<Arc<dyn ValueNode>>>,
}

impl LayerParamConnect {
    pub fn new(layer: LayerId, param: impl Into<String>, node: Arc<dyn ValueNode>) -> Self {
        Self {
            layer,
            param: param.into(),
            node,
            previous: None,
        }
    }
}

impl Action for LayerParamConnect {
    fn name(&self) -> &'static str {
        "LayerParamConnect"
    }

    fn perform(&mut self, root: &mut Canvas) -> CompositeResult<()> {
        let previous = layer_mut(root, self.layer)?.connect_param(&self.param, self.node.clone())?;
        self.previous = Some(previous);
        Ok(())
    }

    fn undo(&mut self, root: &mut Canvas) -> CompositeResult<()> {
        let previous = self.previous.take().ok_or_else(|| not_performed(self.name()))?;
        let layer = layer_mut(root, self.layer)?;
        match previous {
            Some(node) => layer.connect_param(&self.param, node).map(|_| ()),
            None => {
                layer.disconnect_param(&self.param);
                Ok(())
            }
        }
    }
}

/// Remove a parameter's value node binding.
#[derive(Debug)]
pub struct LayerParamDisconnect {
    layer: LayerId,
    param: String,
    removed: Option<Arc<dyn ValueNode>>,
}

impl LayerParamDisconnect {
    pub fn new(layer: LayerId, param: impl Into<String>) -> Self {
        Self {
            layer,
            param: param.into(),
            removed: None,
        }
    }
}

impl Action for LayerParamDisconnect {
    fn name(&self) -> &'static str {
        "LayerParamDisconnect"
    }

    fn perform(&mut self, root: &mut Canvas) -> CompositeResult<()> {
        let removed = layer_mut(root, self.layer)?
            .disconnect_param(&self.param)
            .ok_or_else(|| CompositeError::missing_dynamic_param(self.param.as_str()))?;
        self.removed = Some(removed);
        Ok(())
    }

    fn undo(&mut self, root: &mut Canvas) -> CompositeResult<()> {
        let node = self.removed.take().ok_or_else(|| not_performed(self.name()))?;
        layer_mut(root, self.layer)?.connect_param(&self.param, node).map(|_| ())
    }
}

/// The kind of layer [`LayerMakeBline`] creates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlineKind {
    Outline,
    Region,
}

impl BlineKind {
    /// Factory name of the layer type created.
    pub fn type_name(self) -> &'static str {
        match self {
            BlineKind::Outline => "outline",
            BlineKind::Region => "region",
        }
    }

    fn create(self) -> Box<dyn Layer> {
        match self {
            BlineKind::Outline => Box::new(OutlineLayer::default()),
            BlineKind::Region => Box::new(RegionLayer::default()),
        }
    }
}

/// Create an outline or region layer that follows another layer's spline.
///
/// The new layer is placed directly above the source layer in the source's
/// canvas, and its `bline` is linked to the same value node as the source's.
#[derive(Debug)]
pub struct LayerMakeBline {
    source: LayerRef,
    kind: BlineKind,
    steps: Vec<Box<dyn Action>>,
    done: usize,
}

impl LayerMakeBline {
    pub fn new(source: LayerRef, kind: BlineKind) -> Self {
        Self {
            source,
            kind,
            steps: Vec::new(),
            done: 0,
        }
    }

    pub fn outline(source: LayerRef) -> Self {
        Self::new(source, BlineKind::Outline)
    }

    pub fn region(source: LayerRef) -> Self {
        Self::new(source, BlineKind::Region)
    }

    /// Whether the action applies to `layer`: it must have a linked `bline`
    /// and not already be of the kind that would be created.
    pub fn is_candidate(layer: &dyn Layer, kind: BlineKind) -> bool {
        layer.base().dynamic_param("bline").is_some() && layer.name() != kind.type_name()
    }

    pub fn is_prepared(&self) -> bool {
        !self.steps.is_empty()
    }

    /// Work out the sub-actions against `root` without changing it.
    pub fn prepare(&mut self, root: &Canvas) -> CompositeResult<()> {
        let source = &self.source;
        let id = source.id();
        let node = source
            .base()
            .dynamic_param("bline")
            .cloned()
            .ok_or_else(|| CompositeError::missing_dynamic_param("bline"))?;

        let canvas_id = source
            .base()
            .canvas()
            .ok_or_else(|| CompositeError::layer_not_found(format!("{id} belongs to no canvas")))?;
        let subcanvas = root
            .canvas_by_id(canvas_id)
            .ok_or_else(|| CompositeError::layer_not_found(format!("{canvas_id} is not in this tree")))?;
        let depth = subcanvas
            .index_of(id)
            .ok_or_else(|| CompositeError::layer_not_found(format!("{id} is not in {canvas_id}")))?;
        if subcanvas.id() != root.id() && !subcanvas.is_inline() {
            return Err(CompositeError::not_in_canvas(format!(
                "{id} lives in {canvas_id}, which is not inline in {}",
                root.id()
            )));
        }

        let mut layer = self.kind.create();
        let description = match source.base().description() {
            "" => source.local_name().to_owned(),
            text => text.to_owned(),
        };
        let local = layer.local_name();
        layer
            .base_mut()
            .set_description(format!("{description} {local}"));
        let new_id = layer.id();

        self.steps = vec![
            Box::new(LayerAdd::on_top(canvas_id, Arc::from(layer))),
            Box::new(LayerMove::new(new_id, depth)),
            Box::new(LayerParamConnect::new(new_id, "bline", node)),
        ];
        self.done = 0;
        debug!("prepared {} from {id} at depth {depth} of {canvas_id}", self.kind.type_name());
        Ok(())
    }

    fn rollback(&mut self, root: &mut Canvas) {
        while self.done > 0 {
            self.done -= 1;
            if let Err(err) = self.steps[self.done].undo(root) {
                warn!("rolling back {}: {err}", self.steps[self.done].name());
            }
        }
    }
}

impl Action for LayerMakeBline {
    fn name(&self) -> &'static str {
        match self.kind {
            BlineKind::Outline => "LayerMakeOutline",
            BlineKind::Region => "LayerMakeRegion",
        }
    }

    fn perform(&mut self, root: &mut Canvas) -> CompositeResult<()> {
        if !self.is_prepared() {
            self.prepare(root)?;
        }
        while self.done < self.steps.len() {
            if let Err(err) = self.steps[self.done].perform(root) {
                self.rollback(root);
                return Err(err);
            }
            self.done += 1;
        }
        Ok(())
    }

    fn undo(&mut self, root: &mut Canvas) -> CompositeResult<()> {
        if self.done < self.steps.len() {
            return Err(not_performed(self.name()));
        }
        while self.done > 0 {
            self.steps[self.done - 1].undo(root)?;
            self.done -= 1;
        }
        Ok(())
    }
}

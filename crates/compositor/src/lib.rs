//! Layered compositing engine.
//!
//! A [`Canvas`] is an ordered stack of layers, topmost first. Every layer
//! composites itself over a [`Context`], the read-only view of the layers
//! beneath it. Layers may:
//! - paint a shape (rectangles, circles, regions, outlines)
//! - transform the coordinates of everything beneath (zoom, translate, rotate)
//! - filter the image beneath (blur)
//! - nest another canvas (groups)
//!
//! Edits go through a [`Document`], either directly or as undoable
//! [`Action`]s, while renders work from immutable snapshots.

pub mod action;
pub mod canvas;
pub mod config;
pub mod context;
pub mod damage;
pub mod factory;
pub mod layer;
pub mod layers;
pub mod param;
pub mod renderer;
pub mod transform;
pub mod value;

pub use action::{Action, BlineKind, LayerAdd, LayerMakeBline, LayerMove, LayerRemove};
pub use canvas::{Canvas, Change, Document};
pub use config::{Backend, RenderConfig};
pub use context::Context;
pub use damage::{canvas_damage, DamageTracker};
pub use factory::{LayerFactory, BUILTIN_LAYERS};
pub use layer::{CanvasId, HitCheck, Layer, LayerId, LayerRef, Sample};
pub use param::{ParamDesc, ParamVocab};
pub use renderer::Renderer;
pub use transform::{Transform, TransformStack};
pub use value::{Value, ValueNode, ValueType};

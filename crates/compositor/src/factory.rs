//! Layer construction by type name.

use crate::layer::{Layer, LayerRef};
use crate::layers::{
    BlurLayer, CircleLayer, GroupLayer, OutlineLayer, RectangleLayer, RegionLayer, RotateLayer,
    SolidColorLayer, TranslateLayer, ZoomLayer,
};
use common::error::{CompositeError, CompositeResult};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds a layer with default parameters.
pub type LayerConstructor = fn() -> Box<dyn Layer>;

/// The factory with every built-in layer type.
pub static BUILTIN_LAYERS: Lazy<LayerFactory> = Lazy::new(LayerFactory::with_builtins);

/// A registry of layer types.
#[derive(Clone, Debug, Default)]
pub struct LayerFactory {
    constructors: BTreeMap<&'static str, LayerConstructor>,
}

fn build<L: Layer + Default + 'static>() -> Box<dyn Layer> {
    Box::new(L::default())
}

impl LayerFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builtins() -> Self {
        let mut factory = Self::new();
        factory.register("rectangle", build::<RectangleLayer>);
        factory.register("circle", build::<CircleLayer>);
        factory.register("region", build::<RegionLayer>);
        factory.register("outline", build::<OutlineLayer>);
        factory.register("solid_color", build::<SolidColorLayer>);
        factory.register("zoom", build::<ZoomLayer>);
        factory.register("translate", build::<TranslateLayer>);
        factory.register("rotate", build::<RotateLayer>);
        factory.register("blur", build::<BlurLayer>);
        factory.register("group", build::<GroupLayer>);
        factory
    }

    /// Register a type, replacing any previous constructor for `name`.
    pub fn register(&mut self, name: &'static str, constructor: LayerConstructor) {
        self.constructors.insert(name, constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// A new layer of type `name` with default parameters.
    pub fn create(&self, name: &str) -> CompositeResult<LayerRef> {
        self.create_boxed(name).map(Arc::from)
    }

    pub fn create_boxed(&self, name: &str) -> CompositeResult<Box<dyn Layer>> {
        self.constructors
            .get(name)
            .map(|constructor| constructor())
            .ok_or_else(|| CompositeError::unknown_layer_type(name))
    }

    /// Registered type names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.constructors.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_report_their_names() {
        let names: Vec<_> = BUILTIN_LAYERS.names().collect();
        assert_eq!(names.len(), 10);
        for name in names {
            let layer = BUILTIN_LAYERS.create(name).unwrap();
            assert_eq!(layer.name(), name);
            for desc in layer.param_vocab() {
                assert!(layer.get_param(desc.name).is_some(), "{name}.{} unreadable", desc.name);
            }
        }
    }

    #[test]
    fn test_unknown_type() {
        let err = LayerFactory::new().create("circle").unwrap_err();
        assert!(matches!(err, CompositeError::UnknownLayerType(ref n) if n == "circle"));
        assert!(BUILTIN_LAYERS.contains("group"));
    }
}

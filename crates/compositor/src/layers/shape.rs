//! Layers that fill a shape with a color.
//!
//! Each layer keeps its [`Shape`] rebuilt from its parameters, so the default
//! sampling, painting, recording, bounds and hit-testing in [`Layer`] all
//! work off the same geometry.

use crate::layer::{Fill, Layer, LayerBase};
use crate::param::{blend_params, ParamDesc, ParamFlags, ParamVocab};
use crate::value::{Value, ValueType};
use common::color::{BlendMethod, Color};
use common::error::{CompositeError, CompositeResult};
use common::geometry::{Point, Rect};
use render::{Shape, Winding};

/// Color and compositing parameters shared by shape layers.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Paint {
    color: Color,
    amount: f32,
    method: BlendMethod,
}

impl Paint {
    fn new(color: Color) -> Self {
        Self {
            color,
            amount: 1.0,
            method: BlendMethod::Composite,
        }
    }

    fn vocab() -> ParamVocab {
        let mut vocab = vec![ParamDesc::new("color", ValueType::Color).with_local_name("Color")];
        vocab.extend(blend_params());
        vocab
    }

    fn get(&self, name: &str) -> Option<Value> {
        match name {
            "color" => Some(self.color.into()),
            "amount" => Some(Value::Real(self.amount as f64)),
            "blend_method" => Some(self.method.into()),
            _ => None,
        }
    }

    /// Store a paint parameter; `Ok(false)` if `name` is not one.
    fn apply(&mut self, name: &str, value: &Value) -> CompositeResult<bool> {
        match name {
            "color" => self.color = color_value(name, value)?,
            "amount" => self.amount = real_value(name, value)? as f32,
            "blend_method" => {
                self.method = value
                    .as_blend_method()
                    .ok_or_else(|| mismatch(name, ValueType::BlendMethod, value))?
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn fill<'a>(&self, shape: &'a Shape) -> Fill<'a> {
        Fill {
            shape,
            color: self.color,
            amount: self.amount,
            method: self.method,
        }
    }
}

fn mismatch(name: &str, expected: ValueType, found: &Value) -> CompositeError {
    CompositeError::type_mismatch(name, expected.name(), found.value_type().name())
}

pub(crate) fn real_value(name: &str, value: &Value) -> CompositeResult<f64> {
    value.as_real().ok_or_else(|| mismatch(name, ValueType::Real, value))
}

pub(crate) fn vector_value(name: &str, value: &Value) -> CompositeResult<Point> {
    value.as_vector().ok_or_else(|| mismatch(name, ValueType::Vector, value))
}

pub(crate) fn bool_value(name: &str, value: &Value) -> CompositeResult<bool> {
    value.as_bool().ok_or_else(|| mismatch(name, ValueType::Bool, value))
}

fn color_value(name: &str, value: &Value) -> CompositeResult<Color> {
    value.as_color().ok_or_else(|| mismatch(name, ValueType::Color, value))
}

fn list_value(name: &str, value: &Value) -> CompositeResult<Vec<Point>> {
    value
        .as_list()
        .map(<[Point]>::to_vec)
        .ok_or_else(|| mismatch(name, ValueType::List, value))
}

fn invert_if(shape: Shape, invert: bool) -> Shape {
    if invert {
        shape.inverted()
    } else {
        shape
    }
}

/// An axis-aligned rectangle between two corners.
#[derive(Clone, Debug)]
pub struct RectangleLayer {
    base: LayerBase,
    paint: Paint,
    point1: Point,
    point2: Point,
    expand: f64,
    invert: bool,
    shape: Shape,
}

impl RectangleLayer {
    pub fn new(rect: Rect, color: Color) -> Self {
        let mut layer = Self {
            base: LayerBase::new(),
            paint: Paint::new(color),
            point1: rect.min,
            point2: rect.max,
            expand: 0.0,
            invert: false,
            shape: Shape::Plane,
        };
        layer.rebuild();
        layer
    }

    fn rebuild(&mut self) {
        let rect = Rect::from_points(self.point1, self.point2).inflate(self.expand, self.expand);
        self.shape = invert_if(Shape::Rect(rect), self.invert);
    }
}

impl Default for RectangleLayer {
    fn default() -> Self {
        Self::new(Rect::new(0.0, 0.0, 1.0, 1.0), Color::WHITE)
    }
}

impl Layer for RectangleLayer {
    fn name(&self) -> &'static str {
        "rectangle"
    }

    fn local_name(&self) -> &'static str {
        "Rectangle"
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
        let mut vocab = Paint::vocab();
        vocab.extend([
            ParamDesc::new("point1", ValueType::Vector)
                .with_local_name("Point 1")
                .with_flags(ParamFlags::DISTANCE),
            ParamDesc::new("point2", ValueType::Vector)
                .with_local_name("Point 2")
                .with_flags(ParamFlags::DISTANCE),
            ParamDesc::new("expand", ValueType::Real)
                .with_local_name("Expand Amount")
                .with_flags(ParamFlags::DISTANCE),
            ParamDesc::new("invert", ValueType::Bool).with_local_name("Invert"),
        ]);
        vocab
    }

    fn get_param(&self, name: &str) -> Option<Value> {
        match name {
            "point1" => Some(self.point1.into()),
            "point2" => Some(self.point2.into()),
            "expand" => Some(self.expand.into()),
            "invert" => Some(self.invert.into()),
            _ => self.paint.get(name),
        }
    }

    fn apply_param(&mut self, name: &str, value: Value) -> CompositeResult<()> {
        match name {
            "point1" => self.point1 = vector_value(name, &value)?,
            "point2" => self.point2 = vector_value(name, &value)?,
            "expand" => self.expand = real_value(name, &value)?,
            "invert" => self.invert = bool_value(name, &value)?,
            _ => {
                if !self.paint.apply(name, &value)? {
                    return Err(CompositeError::unknown_param(name));
                }
            }
        }
        self.rebuild();
        Ok(())
    }

    fn fill(&self) -> Option<Fill<'_>> {
        Some(self.paint.fill(&self.shape))
    }
}

/// A disc around an origin.
#[derive(Clone, Debug)]
pub struct CircleLayer {
    base: LayerBase,
    paint: Paint,
    origin: Point,
    radius: f64,
    invert: bool,
    shape: Shape,
}

impl CircleLayer {
    pub fn new(origin: Point, radius: f64, color: Color) -> Self {
        let mut layer = Self {
            base: LayerBase::new(),
            paint: Paint::new(color),
            origin,
            radius,
            invert: false,
            shape: Shape::Plane,
        };
        layer.rebuild();
        layer
    }

    fn rebuild(&mut self) {
        let circle = Shape::Circle {
            center: self.origin,
            radius: self.radius,
        };
        self.shape = invert_if(circle, self.invert);
    }
}

impl Default for CircleLayer {
    fn default() -> Self {
        Self::new(Point::ZERO, 1.0, Color::WHITE)
    }
}

impl Layer for CircleLayer {
    fn name(&self) -> &'static str {
        "circle"
    }

    fn local_name(&self) -> &'static str {
        "Circle"
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
        let mut vocab = Paint::vocab();
        vocab.extend([
            ParamDesc::new("origin", ValueType::Vector)
                .with_local_name("Origin")
                .with_flags(ParamFlags::ORIGIN),
            ParamDesc::new("radius", ValueType::Real)
                .with_local_name("Radius")
                .with_flags(ParamFlags::DISTANCE),
            ParamDesc::new("invert", ValueType::Bool).with_local_name("Invert"),
        ]);
        vocab
    }

    fn get_param(&self, name: &str) -> Option<Value> {
        match name {
            "origin" => Some(self.origin.into()),
            "radius" => Some(self.radius.into()),
            "invert" => Some(self.invert.into()),
            _ => self.paint.get(name),
        }
    }

    fn apply_param(&mut self, name: &str, value: Value) -> CompositeResult<()> {
        match name {
            "origin" => self.origin = vector_value(name, &value)?,
            "radius" => self.radius = real_value(name, &value)?,
            "invert" => self.invert = bool_value(name, &value)?,
            _ => {
                if !self.paint.apply(name, &value)? {
                    return Err(CompositeError::unknown_param(name));
                }
            }
        }
        self.rebuild();
        Ok(())
    }

    fn fill(&self) -> Option<Fill<'_>> {
        Some(self.paint.fill(&self.shape))
    }
}

/// A filled polygon through the points of a spline's control polygon.
#[derive(Clone, Debug)]
pub struct RegionLayer {
    base: LayerBase,
    paint: Paint,
    bline: Vec<Point>,
    winding: Winding,
    invert: bool,
    shape: Shape,
}

impl RegionLayer {
    pub fn new(bline: Vec<Point>, color: Color) -> Self {
        let mut layer = Self {
            base: LayerBase::new(),
            paint: Paint::new(color),
            bline,
            winding: Winding::NonZero,
            invert: false,
            shape: Shape::Plane,
        };
        layer.rebuild();
        layer
    }

    fn rebuild(&mut self) {
        let polygon = Shape::Polygon {
            points: self.bline.clone(),
            winding: self.winding,
        };
        self.shape = invert_if(polygon, self.invert);
    }
}

impl Default for RegionLayer {
    fn default() -> Self {
        Self::new(Vec::new(), Color::WHITE)
    }
}

impl Layer for RegionLayer {
    fn name(&self) -> &'static str {
        "region"
    }

    fn local_name(&self) -> &'static str {
        "Region"
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
        let mut vocab = Paint::vocab();
        vocab.extend([
            ParamDesc::new("bline", ValueType::List).with_local_name("Vertices"),
            ParamDesc::new("winding_style", ValueType::Integer)
                .with_local_name("Winding Style")
                .with_description("0 for non-zero, 1 for even-odd"),
            ParamDesc::new("invert", ValueType::Bool).with_local_name("Invert"),
        ]);
        vocab
    }

    fn get_param(&self, name: &str) -> Option<Value> {
        match name {
            "bline" => Some(self.bline.clone().into()),
            "winding_style" => Some(Value::Integer(match self.winding {
                Winding::NonZero => 0,
                Winding::EvenOdd => 1,
            })),
            "invert" => Some(self.invert.into()),
            _ => self.paint.get(name),
        }
    }

    fn apply_param(&mut self, name: &str, value: Value) -> CompositeResult<()> {
        match name {
            "bline" => self.bline = list_value(name, &value)?,
            "winding_style" => {
                self.winding = match value.as_integer() {
                    Some(0) => Winding::NonZero,
                    Some(1) => Winding::EvenOdd,
                    _ => {
                        return Err(CompositeError::invalid(format!(
                            "winding_style must be 0 or 1, got {value:?}"
                        )))
                    }
                }
            }
            "invert" => self.invert = bool_value(name, &value)?,
            _ => {
                if !self.paint.apply(name, &value)? {
                    return Err(CompositeError::unknown_param(name));
                }
            }
        }
        self.rebuild();
        Ok(())
    }

    fn fill(&self) -> Option<Fill<'_>> {
        Some(self.paint.fill(&self.shape))
    }
}

/// A stroke of constant width along a spline's control polygon.
#[derive(Clone, Debug)]
pub struct OutlineLayer {
    base: LayerBase,
    paint: Paint,
    bline: Vec<Point>,
    width: f64,
    closed: bool,
    shape: Shape,
}

impl OutlineLayer {
    pub fn new(bline: Vec<Point>, width: f64, color: Color) -> Self {
        let mut layer = Self {
            base: LayerBase::new(),
            paint: Paint::new(color),
            bline,
            width,
            closed: false,
            shape: Shape::Plane,
        };
        layer.rebuild();
        layer
    }

    fn rebuild(&mut self) {
        self.shape = Shape::Stroke {
            points: self.bline.clone(),
            width: self.width,
            closed: self.closed,
        };
    }
}

impl Default for OutlineLayer {
    fn default() -> Self {
        Self::new(Vec::new(), 1.0, Color::BLACK)
    }
}

impl Layer for OutlineLayer {
    fn name(&self) -> &'static str {
        "outline"
    }

    fn local_name(&self) -> &'static str {
        "Outline"
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
        let mut vocab = Paint::vocab();
        vocab.extend([
            ParamDesc::new("bline", ValueType::List).with_local_name("Vertices"),
            ParamDesc::new("width", ValueType::Real)
                .with_local_name("Outline Width")
                .with_flags(ParamFlags::DISTANCE),
            ParamDesc::new("loop", ValueType::Bool).with_local_name("Loop"),
        ]);
        vocab
    }

    fn get_param(&self, name: &str) -> Option<Value> {
        match name {
            "bline" => Some(self.bline.clone().into()),
            "width" => Some(self.width.into()),
            "loop" => Some(self.closed.into()),
            _ => self.paint.get(name),
        }
    }

    fn apply_param(&mut self, name: &str, value: Value) -> CompositeResult<()> {
        match name {
            "bline" => self.bline = list_value(name, &value)?,
            "width" => self.width = real_value(name, &value)?,
            "loop" => self.closed = bool_value(name, &value)?,
            _ => {
                if !self.paint.apply(name, &value)? {
                    return Err(CompositeError::unknown_param(name));
                }
            }
        }
        self.rebuild();
        Ok(())
    }

    fn fill(&self) -> Option<Fill<'_>> {
        Some(self.paint.fill(&self.shape))
    }
}

/// Fills the whole plane.
#[derive(Clone, Debug)]
pub struct SolidColorLayer {
    base: LayerBase,
    paint: Paint,
    shape: Shape,
}

impl SolidColorLayer {
    pub fn new(color: Color) -> Self {
        Self {
            base: LayerBase::new(),
            paint: Paint::new(color),
            shape: Shape::Plane,
        }
    }
}

impl Default for SolidColorLayer {
    fn default() -> Self {
        Self::new(Color::WHITE)
    }
}

impl Layer for SolidColorLayer {
    fn name(&self) -> &'static str {
        "solid_color"
    }

    fn local_name(&self) -> &'static str {
        "Solid Color"
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
        Paint::vocab()
    }

    fn get_param(&self, name: &str) -> Option<Value> {
        self.paint.get(name)
    }

    fn apply_param(&mut self, name: &str, value: Value) -> CompositeResult<()> {
        if self.paint.apply(name, &value)? {
            Ok(())
        } else {
            Err(CompositeError::unknown_param(name))
        }
    }

    fn fill(&self) -> Option<Fill<'_>> {
        Some(self.paint.fill(&self.shape))
    }
}

//! Parameter values and the time-varying sources that produce them.

use crate::canvas::Canvas;
use common::color::{BlendMethod, Color};
use common::error::{CompositeError, CompositeResult};
use common::geometry::Point;
use common::units::{Angle, Time};
use derive_more::From;
use ordered_float::OrderedFloat;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A single parameter value.
#[derive(Clone, Debug, From)]
pub enum Value {
    Real(f64),
    Integer(i64),
    Bool(bool),
    Angle(Angle),
    Vector(Point),
    Color(Color),
    BlendMethod(BlendMethod),
    Time(Time),
    /// A polyline or spline control polygon.
    List(Vec<Point>),
    String(String),
    /// An inline canvas owned by a container layer.
    Canvas(Arc<Canvas>),
}

/// The declared type of a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueType {
    Real,
    Integer,
    Bool,
    Angle,
    Vector,
    Color,
    BlendMethod,
    Time,
    List,
    String,
    Canvas,
}

impl ValueType {
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Real => "real",
            ValueType::Integer => "integer",
            ValueType::Bool => "bool",
            ValueType::Angle => "angle",
            ValueType::Vector => "vector",
            ValueType::Color => "color",
            ValueType::BlendMethod => "blend_method",
            ValueType::Time => "time",
            ValueType::List => "list",
            ValueType::String => "string",
            ValueType::Canvas => "canvas",
        }
    }

    /// Whether every value of this type converts to `target`.
    pub fn widens_to(self, target: ValueType) -> bool {
        self == target
            || matches!(
                (self, target),
                (ValueType::Integer, ValueType::Real)
                    | (ValueType::Integer, ValueType::Angle)
                    | (ValueType::Integer, ValueType::Time)
                    | (ValueType::Real, ValueType::Angle)
                    | (ValueType::Real, ValueType::Time)
            )
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Real(_) => ValueType::Real,
            Value::Integer(_) => ValueType::Integer,
            Value::Bool(_) => ValueType::Bool,
            Value::Angle(_) => ValueType::Angle,
            Value::Vector(_) => ValueType::Vector,
            Value::Color(_) => ValueType::Color,
            Value::BlendMethod(_) => ValueType::BlendMethod,
            Value::Time(_) => ValueType::Time,
            Value::List(_) => ValueType::List,
            Value::String(_) => ValueType::String,
            Value::Canvas(_) => ValueType::Canvas,
        }
    }

    /// Convert to `ty` where the conversion is lossless.
    ///
    /// Integers widen to reals, angles and times; reals narrow to integers
    /// only when integral. Every other conversion fails.
    pub fn coerce(self, ty: ValueType) -> Option<Value> {
        if self.value_type() == ty {
            return Some(self);
        }
        match (self, ty) {
            (Value::Integer(i), ValueType::Real) => Some(Value::Real(i as f64)),
            (Value::Integer(i), ValueType::Angle) => Some(Value::Angle(Angle::from_degrees(i as f64))),
            (Value::Real(r), ValueType::Angle) => Some(Value::Angle(Angle::from_degrees(r))),
            (Value::Integer(i), ValueType::Time) => Some(Value::Time(Time::from_seconds(i as f64))),
            (Value::Real(r), ValueType::Time) => Some(Value::Time(Time::from_seconds(r))),
            (Value::Real(r), ValueType::Integer) if r.fract() == 0.0 && r.is_finite() => {
                Some(Value::Integer(r as i64))
            }
            _ => None,
        }
    }

    /// Coerce to `ty`, naming `param` in the error.
    pub fn expect_type(self, param: &str, ty: ValueType) -> CompositeResult<Value> {
        let found = self.value_type();
        self.coerce(ty)
            .ok_or_else(|| CompositeError::type_mismatch(param, ty.name(), found.name()))
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(r) => Some(*r),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_angle(&self) -> Option<Angle> {
        match self {
            Value::Angle(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<Point> {
        match self {
            Value::Vector(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            Value::Color(c) => Some(*c),
            _ => None,
        }
    }

    pub fn as_blend_method(&self) -> Option<BlendMethod> {
        match self {
            Value::BlendMethod(m) => Some(*m),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<Time> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Point]> {
        match self {
            Value::List(points) => Some(points),
            _ => None,
        }
    }

    pub fn as_canvas(&self) -> Option<&Arc<Canvas>> {
        match self {
            Value::Canvas(canvas) => Some(canvas),
            _ => None,
        }
    }

    /// Interpolate towards `other`.
    ///
    /// Numeric, vector and color values interpolate linearly; everything
    /// else (and mismatched types) steps at `t = 1`.
    pub fn lerp(&self, other: &Value, t: f64) -> Value {
        match (self, other) {
            (Value::Real(a), Value::Real(b)) => Value::Real(a + (b - a) * t),
            (Value::Integer(a), Value::Integer(b)) => {
                Value::Integer((*a as f64 + (*b - *a) as f64 * t).round() as i64)
            }
            (Value::Angle(a), Value::Angle(b)) => {
                Value::Angle(Angle::from_degrees(a.degrees() + (b.degrees() - a.degrees()) * t))
            }
            (Value::Vector(a), Value::Vector(b)) => Value::Vector(a.lerp(*b, t)),
            (Value::Color(a), Value::Color(b)) => Value::Color(a.lerp(*b, t as f32)),
            (Value::Time(a), Value::Time(b)) => {
                Value::Time(Time::from_seconds(a.seconds() + (b.seconds() - a.seconds()) * t))
            }
            (Value::List(a), Value::List(b)) if a.len() == b.len() => {
                Value::List(a.iter().zip(b).map(|(p, q)| p.lerp(*q, t)).collect())
            }
            _ if t >= 1.0 => other.clone(),
            _ => self.clone(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Real(a), Value::Real(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Angle(a), Value::Angle(b)) => a == b,
            (Value::Vector(a), Value::Vector(b)) => a == b,
            (Value::Color(a), Value::Color(b)) => a == b,
            (Value::BlendMethod(a), Value::BlendMethod(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Canvas(a), Value::Canvas(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Real(v as f64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<Canvas> for Value {
    fn from(canvas: Canvas) -> Self {
        Value::Canvas(Arc::new(canvas))
    }
}

/// A source of parameter values over time.
///
/// Evaluation is a pure function of time; callers may cache per frame.
pub trait ValueNode: Send + Sync + fmt::Debug {
    fn evaluate(&self, time: Time) -> Value;

    fn value_type(&self) -> ValueType;
}

/// A node that yields the same value at every time.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantNode {
    value: Value,
}

impl ConstantNode {
    pub fn new(value: impl Into<Value>) -> Self {
        Self { value: value.into() }
    }

    /// Shorthand for a shared constant node.
    pub fn shared(value: impl Into<Value>) -> Arc<dyn ValueNode> {
        Arc::new(Self::new(value))
    }
}

impl ValueNode for ConstantNode {
    fn evaluate(&self, _time: Time) -> Value {
        self.value.clone()
    }

    fn value_type(&self) -> ValueType {
        self.value.value_type()
    }
}

/// A node interpolating linearly between keyed values.
///
/// Before the first key and after the last the end values hold.
#[derive(Clone, Debug)]
pub struct LinearNode {
    value_type: ValueType,
    keys: BTreeMap<OrderedFloat<f64>, Value>,
}

impl LinearNode {
    /// A node with a single key.
    pub fn new(time: Time, value: impl Into<Value>) -> Self {
        let value = value.into();
        let mut keys = BTreeMap::new();
        let value_type = value.value_type();
        keys.insert(OrderedFloat(time.seconds()), value);
        Self { value_type, keys }
    }

    /// Build from `(time, value)` pairs; `None` if empty or mixed-type.
    pub fn from_keys(keys: impl IntoIterator<Item = (Time, Value)>) -> Option<Self> {
        let mut iter = keys.into_iter();
        let (time, value) = iter.next()?;
        let mut node = Self::new(time, value);
        for (time, value) in iter {
            node.add_key(time, value).ok()?;
        }
        Some(node)
    }

    /// Insert or replace the key at `time`.
    pub fn add_key(&mut self, time: Time, value: impl Into<Value>) -> CompositeResult<()> {
        let value = value.into().expect_type("key", self.value_type)?;
        self.keys.insert(OrderedFloat(time.seconds()), value);
        Ok(())
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }
}

impl ValueNode for LinearNode {
    fn evaluate(&self, time: Time) -> Value {
        let t = OrderedFloat(time.seconds());
        let before = self.keys.range(..=t).next_back();
        let after = self.keys.range(t..).next();
        match (before, after) {
            (Some((t0, v0)), Some((t1, v1))) => {
                if t0 == t1 {
                    v0.clone()
                } else {
                    v0.lerp(v1, (t.0 - t0.0) / (t1.0 - t0.0))
                }
            }
            (Some((_, v)), None) | (None, Some((_, v))) => v.clone(),
            // Unreachable for a node built through `new`, which always holds a key.
            (None, None) => Value::Real(0.0),
        }
    }

    fn value_type(&self) -> ValueType {
        self.value_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce() {
        assert_eq!(Value::Integer(2).coerce(ValueType::Real), Some(Value::Real(2.0)));
        assert_eq!(Value::Real(2.0).coerce(ValueType::Integer), Some(Value::Integer(2)));
        assert_eq!(Value::Real(2.5).coerce(ValueType::Integer), None);
        assert_eq!(Value::Bool(true).coerce(ValueType::Real), None);
        assert_eq!(
            Value::Real(90.0).coerce(ValueType::Angle),
            Some(Value::Angle(Angle::from_degrees(90.0)))
        );
    }

    #[test]
    fn test_expect_type_error() {
        let err = Value::Bool(true).expect_type("radius", ValueType::Real).unwrap_err();
        assert!(matches!(err, CompositeError::TypeMismatch { .. }));
        assert!(err.to_string().contains("radius"));
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(Value::from(1.5), Value::Real(1.5));
        assert_eq!(Value::from(Point::new(1.0, 2.0)).value_type(), ValueType::Vector);
        assert_eq!(Value::from(Color::RED).as_color(), Some(Color::RED));
        assert_eq!(Value::from("x").value_type(), ValueType::String);
    }

    #[test]
    fn test_canvas_values_compare_by_identity() {
        let a = Arc::new(Canvas::new());
        let b = Arc::new(Canvas::new());
        assert_eq!(Value::Canvas(a.clone()), Value::Canvas(a));
        assert_ne!(Value::Canvas(b.clone()), Value::Canvas(Arc::new(b.as_ref().clone())));
    }

    #[test]
    fn test_constant_node() {
        let node = ConstantNode::new(3.0);
        assert_eq!(node.evaluate(Time::from_seconds(10.0)), Value::Real(3.0));
        assert_eq!(node.value_type(), ValueType::Real);
    }

    #[test]
    fn test_linear_node() {
        let node = LinearNode::from_keys([
            (Time::ZERO, Value::Real(0.0)),
            (Time::from_seconds(2.0), Value::Real(10.0)),
        ])
        .unwrap();
        assert_eq!(node.evaluate(Time::from_seconds(-1.0)), Value::Real(0.0));
        assert_eq!(node.evaluate(Time::from_seconds(1.0)), Value::Real(5.0));
        assert_eq!(node.evaluate(Time::from_seconds(2.0)), Value::Real(10.0));
        assert_eq!(node.evaluate(Time::from_seconds(5.0)), Value::Real(10.0));
    }

    #[test]
    fn test_linear_node_steps_discrete_values() {
        let mut node = LinearNode::new(Time::ZERO, false);
        node.add_key(Time::from_seconds(1.0), true).unwrap();
        assert_eq!(node.evaluate(Time::from_seconds(0.5)), Value::Bool(false));
        assert_eq!(node.evaluate(Time::from_seconds(1.0)), Value::Bool(true));
        assert!(node.add_key(Time::from_seconds(2.0), 1.0).is_err());
        assert!(LinearNode::from_keys(Vec::new()).is_none());
    }
}

//! JSON scene descriptions.
//!
//! A scene file names the image size, the view window and a nested list of
//! layers. Parameter values are plain JSON and are converted using each
//! layer type's parameter vocabulary:
//!
//! ```json
//! {
//!   "version": 1,
//!   "width": 480,
//!   "height": 270,
//!   "view": { "tl": [-4, 2.25], "br": [4, -2.25] },
//!   "layers": [
//!     { "type": "zoom", "params": { "amount": 0.5 } },
//!     { "type": "circle", "params": { "radius": 1, "color": "#ff0000" },
//!       "animated": { "radius": [[0, 1], [2, 2]] } }
//!   ]
//! }
//! ```

use common::color::{BlendMethod, Color};
use common::error::CompositeError;
use common::geometry::Point;
use common::units::{Angle, Time};
use compositor::param::find_param;
use compositor::value::LinearNode;
use compositor::{Canvas, Layer, LayerRef, Value, ValueType, BUILTIN_LAYERS};
use render::RendDesc;
use serde::Deserialize;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// The scene format version this build reads.
pub const SCENE_VERSION: u32 = 1;

/// Pixels per world unit when a scene gives no view window.
const DEFAULT_PIXELS_PER_UNIT: f64 = 60.0;

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("scene file {0} not found")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed scene: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported scene version {found} (expected {})", SCENE_VERSION)]
    BadVersion { found: u32 },

    #[error("bad value for {layer}.{param}: expected {expected}, got {found}")]
    BadValue {
        layer: String,
        param: String,
        expected: ValueType,
        found: String,
    },

    #[error("invalid canvas: {0}")]
    Canvas(String),

    #[error(transparent)]
    Composite(#[from] CompositeError),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SceneFile {
    version: u32,
    width: u32,
    height: u32,
    #[serde(default)]
    view: Option<ViewFile>,
    #[serde(default)]
    layers: Vec<LayerFile>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ViewFile {
    tl: [f64; 2],
    br: [f64; 2],
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LayerFile {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    desc: Option<String>,
    #[serde(default = "active_default")]
    active: bool,
    #[serde(default)]
    params: BTreeMap<String, Json>,
    /// Linearly interpolated keys, as `[seconds, value]` pairs.
    #[serde(default)]
    animated: BTreeMap<String, Vec<(f64, Json)>>,
    /// Content of a group layer, topmost first.
    #[serde(default)]
    layers: Vec<LayerFile>,
}

fn active_default() -> bool {
    true
}

/// A loaded scene.
#[derive(Debug)]
pub struct Scene {
    pub canvas: Canvas,
    pub width: u32,
    pub height: u32,
    pub tl: Point,
    pub br: Point,
}

impl Scene {
    pub fn load(path: &Path) -> Result<Self, SceneError> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SceneError::NotFound(path.to_owned())
            } else {
                SceneError::Io {
                    path: path.to_owned(),
                    source,
                }
            }
        })?;
        debug!("loading scene {}", path.display());
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, SceneError> {
        // Check the version before the rest of the layout.
        let raw: Json = serde_json::from_str(text)?;
        let found = raw.get("version").and_then(Json::as_u64).unwrap_or(0);
        if found != SCENE_VERSION as u64 {
            return Err(SceneError::BadVersion {
                found: found.min(u32::MAX as u64) as u32,
            });
        }
        let file: SceneFile = serde_json::from_value(raw)?;
        if file.width == 0 || file.height == 0 {
            return Err(SceneError::Canvas(format!(
                "image size {}x{} is empty",
                file.width, file.height
            )));
        }

        let (tl, br) = match &file.view {
            Some(view) => (Point::new(view.tl[0], view.tl[1]), Point::new(view.br[0], view.br[1])),
            None => {
                let hw = file.width as f64 / DEFAULT_PIXELS_PER_UNIT / 2.0;
                let hh = file.height as f64 / DEFAULT_PIXELS_PER_UNIT / 2.0;
                (Point::new(-hw, hh), Point::new(hw, -hh))
            }
        };
        if tl.x == br.x || tl.y == br.y || !tl.is_finite() || !br.is_finite() {
            return Err(SceneError::Canvas("view window has no area".into()));
        }

        let mut canvas = Canvas::new();
        for layer in &file.layers {
            canvas.push_back(build_layer(layer)?);
        }
        debug!("scene has {} top-level layer(s)", canvas.len());
        Ok(Self {
            canvas,
            width: file.width,
            height: file.height,
            tl,
            br,
        })
    }

    /// The render description for this scene.
    ///
    /// When only one of `width` and `height` is overridden, the other is
    /// scaled to keep the scene's aspect ratio.
    pub fn rend_desc(&self, width: Option<u32>, height: Option<u32>, time: Time) -> RendDesc {
        let aspect = self.width as f64 / self.height as f64;
        let (width, height) = match (width, height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, ((w as f64 / aspect).round() as u32).max(1)),
            (None, Some(h)) => (((h as f64 * aspect).round() as u32).max(1), h),
            (None, None) => (self.width, self.height),
        };
        RendDesc::new(width, height, self.tl, self.br).with_time(time)
    }
}

fn build_layer(file: &LayerFile) -> Result<LayerRef, SceneError> {
    let mut layer = BUILTIN_LAYERS.create_boxed(&file.kind)?;
    if !file.layers.is_empty() {
        if layer.inline_canvas().is_none() {
            return Err(SceneError::Canvas(format!(
                "{} layers cannot contain layers",
                file.kind
            )));
        }
        let mut inner = Canvas::new_inline();
        for child in &file.layers {
            inner.push_back(build_layer(child)?);
        }
        layer.set_param("canvas", Value::Canvas(Arc::new(inner)))?;
    }

    let vocab = layer.param_vocab();
    for (name, json) in &file.params {
        let desc = find_param(&vocab, name).ok_or_else(|| CompositeError::unknown_param(name))?;
        let value = json_value(json, desc.value_type)
            .ok_or_else(|| bad_value(&file.kind, name, desc.value_type, json))?;
        layer.set_param(name, value)?;
    }
    for (name, keys) in &file.animated {
        let desc = find_param(&vocab, name).ok_or_else(|| CompositeError::unknown_param(name))?;
        let keys = keys
            .iter()
            .map(|(seconds, json)| {
                json_value(json, desc.value_type)
                    .map(|value| (Time::from_seconds(*seconds), value))
                    .ok_or_else(|| bad_value(&file.kind, name, desc.value_type, json))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let node = LinearNode::from_keys(keys).ok_or_else(|| {
            SceneError::Canvas(format!("{}.{name} has no animation keys", file.kind))
        })?;
        layer.connect_param(name, Arc::new(node))?;
    }

    if let Some(desc) = &file.desc {
        layer.base_mut().set_description(desc.clone());
    }
    layer.base_mut().set_active(file.active);
    Ok(Arc::from(layer))
}

fn bad_value(layer: &str, param: &str, expected: ValueType, json: &Json) -> SceneError {
    SceneError::BadValue {
        layer: layer.to_owned(),
        param: param.to_owned(),
        expected,
        found: json.to_string(),
    }
}

fn json_point(json: &Json) -> Option<Point> {
    match json {
        Json::Array(xy) if xy.len() == 2 => Some(Point::new(xy[0].as_f64()?, xy[1].as_f64()?)),
        Json::Object(map) => Some(Point::new(map.get("x")?.as_f64()?, map.get("y")?.as_f64()?)),
        _ => None,
    }
}

fn json_color(json: &Json) -> Option<Color> {
    match json {
        Json::String(hex) => Color::from_hex(hex),
        Json::Array(parts) if parts.len() == 3 || parts.len() == 4 => {
            let mut rgba = [1.0f32; 4];
            for (slot, part) in rgba.iter_mut().zip(parts) {
                *slot = part.as_f64()? as f32;
            }
            Some(Color::rgba(rgba[0], rgba[1], rgba[2], rgba[3]))
        }
        _ => None,
    }
}

/// Convert JSON to a value of type `ty`, if it has a sensible reading.
fn json_value(json: &Json, ty: ValueType) -> Option<Value> {
    let value = match ty {
        ValueType::Real => Value::Real(json.as_f64()?),
        ValueType::Integer => Value::Integer(json.as_i64()?),
        ValueType::Bool => Value::Bool(json.as_bool()?),
        ValueType::Angle => Value::Angle(Angle::from_degrees(json.as_f64()?)),
        ValueType::Time => Value::Time(Time::from_seconds(json.as_f64()?)),
        ValueType::Vector => Value::Vector(json_point(json)?),
        ValueType::Color => Value::Color(json_color(json)?),
        ValueType::BlendMethod => Value::BlendMethod(BlendMethod::from_name(json.as_str()?)?),
        ValueType::List => Value::List(
            json.as_array()?
                .iter()
                .map(json_point)
                .collect::<Option<Vec<_>>>()?,
        ),
        ValueType::String => Value::String(json.as_str()?.to_owned()),
        ValueType::Canvas => return None,
    };
    Some(value)
}

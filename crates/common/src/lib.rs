//! Common utilities and types used across the compositing engine.

pub mod color;
pub mod geometry;
pub mod error;
pub mod units;

pub use color::{BlendMethod, Color, Gamma};
pub use geometry::{Bounds, Matrix, Point, Rect};
pub use error::{CompositeError, CompositeResult};
pub use units::{Angle, Time};

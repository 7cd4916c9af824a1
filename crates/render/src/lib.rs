//! Pixel-level rendering primitives for the compositor.
//!
//! This crate handles:
//! - Render target descriptions and tiling
//! - Floating-point pixel surfaces
//! - Shape coverage shared by the raster and vector paths
//! - Display list recording and rasterization
//! - Progress reporting and cancellation

pub mod display_list;
pub mod progress;
pub mod rasterizer;
pub mod renddesc;
pub mod shape;
pub mod surface;

pub use display_list::{DisplayList, DrawCommand, VectorTarget};
pub use progress::{check_cancelled, CancelFlag, NullProgress, ProgressCallback, ProgressLog};
pub use rasterizer::Rasterizer;
pub use renddesc::{PixelSpan, RendDesc};
pub use shape::{Shape, Winding};
pub use surface::Surface;

//! Command-line front-end for the Vexel compositor.
//!
//! Loads a JSON scene, renders it with the configured backend and writes
//! one or two images.

pub mod exit;
pub mod job;
pub mod scene;

pub use exit::{ExitStatus, Failure, WithStatus};
pub use job::{append_alpha_to_filename, AlphaMode, Job};
pub use scene::{Scene, SceneError};

/// Tool version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

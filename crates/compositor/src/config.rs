//! Render configuration.

use common::color::Gamma;
use std::path::PathBuf;

/// Which render path produces the pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Backend {
    /// Layers render directly into surfaces.
    #[default]
    Raster,
    /// Layers record a display list that is rasterized afterwards.
    Vector,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Raster => "raster",
            Backend::Vector => "vector",
        }
    }
}

/// Process-wide render settings, built once and passed by reference.
#[derive(Clone, Debug)]
pub struct RenderConfig {
    /// Output gamma applied when converting to 8-bit pixels.
    pub gamma: f32,
    /// Quality hint passed to layers; lower is better.
    pub quality: u32,
    /// Edge length of a render tile in pixels.
    pub tile_size: u32,
    /// Worker threads for tiles and frames; 0 uses the default pool.
    pub threads: usize,
    pub backend: Backend,
    /// Location of the running executable, if known.
    pub binary_path: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            gamma: 2.2,
            quality: 3,
            tile_size: 128,
            threads: 0,
            backend: Backend::Raster,
            binary_path: None,
        }
    }
}

impl RenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gamma(mut self, gamma: f32) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_quality(mut self, quality: u32) -> Self {
        self.quality = quality;
        self
    }

    /// Set the tile size; zero is treated as one.
    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size.max(1);
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_binary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary_path = Some(path.into());
        self
    }

    /// The gamma curve for output encoding.
    pub fn output_gamma(&self) -> Gamma {
        Gamma::new(self.gamma)
    }
}

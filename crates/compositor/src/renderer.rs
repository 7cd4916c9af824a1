//! Frame rendering: tiling, backend selection and parallel frames.

use crate::canvas::Canvas;
use crate::config::{Backend, RenderConfig};
use common::error::{CompositeError, CompositeResult};
use common::units::Time;
use rayon::prelude::*;
use rayon::ThreadPool;
use render::{check_cancelled, ProgressCallback, RendDesc, Rasterizer, Surface, VectorTarget};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// Renders canvases according to a [`RenderConfig`].
///
/// Each tile or frame renders into its own surface from the same read-only
/// canvas, so the canvas passed in is never observed mid-edit.
pub struct Renderer {
    config: RenderConfig,
    pool: Option<ThreadPool>,
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.config)
            .field("dedicated_pool", &self.pool.is_some())
            .finish()
    }
}

impl Renderer {
    pub fn new(config: RenderConfig) -> CompositeResult<Self> {
        let pool = match config.threads {
            0 => None,
            threads => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|err| CompositeError::internal(format!("thread pool: {err}")))?,
            ),
        };
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }

    /// Render `canvas` at `desc.time()`.
    pub fn render(
        &self,
        canvas: &Canvas,
        desc: &RendDesc,
        cb: &dyn ProgressCallback,
    ) -> CompositeResult<Surface> {
        if desc.width() == 0 || desc.height() == 0 {
            return Err(CompositeError::unsupported("zero-sized render target"));
        }
        check_cancelled(cb)?;
        let frame = canvas.at_time(desc.time());
        debug!(
            "rendering {}x{} at {} with the {} backend",
            desc.width(),
            desc.height(),
            desc.time(),
            self.config.backend.name()
        );
        self.install(|| match self.config.backend {
            Backend::Raster => self.render_tiles(&frame, desc, cb),
            Backend::Vector => self.render_vector(&frame, desc, cb),
        })
    }

    /// Render several times of the same canvas, one surface per time.
    pub fn render_frames(
        &self,
        canvas: &Canvas,
        desc: &RendDesc,
        times: &[Time],
        cb: &dyn ProgressCallback,
    ) -> CompositeResult<Vec<Surface>> {
        self.install(|| {
            times
                .par_iter()
                .map(|&time| self.render(canvas, &desc.clone().with_time(time), cb))
                .collect()
        })
    }

    fn render_tiles(
        &self,
        canvas: &Canvas,
        desc: &RendDesc,
        cb: &dyn ProgressCallback,
    ) -> CompositeResult<Surface> {
        let size = self.config.tile_size.max(1);
        let tiles: Vec<(u32, u32)> = (0..desc.height())
            .step_by(size as usize)
            .flat_map(|y| (0..desc.width()).step_by(size as usize).map(move |x| (x, y)))
            .collect();
        let total = tiles.len() as u64;
        let done = AtomicU64::new(0);
        trace!("{} tile(s) of {}px", total, size);

        let rendered: Vec<(u32, u32, Surface)> = tiles
            .par_iter()
            .map(|&(x, y)| {
                let tile_desc = desc.tile(
                    x,
                    y,
                    size.min(desc.width() - x),
                    size.min(desc.height() - y),
                );
                let mut tile = Surface::for_desc(&tile_desc);
                canvas.render(&mut tile, self.config.quality, &tile_desc, cb)?;
                cb.progress(done.fetch_add(1, Ordering::AcqRel) + 1, total);
                Ok((x, y, tile))
            })
            .collect::<CompositeResult<_>>()?;

        let mut surface = Surface::for_desc(desc);
        for (x, y, tile) in &rendered {
            surface.blit(tile, *x, *y);
        }
        Ok(surface)
    }

    fn render_vector(
        &self,
        canvas: &Canvas,
        desc: &RendDesc,
        cb: &dyn ProgressCallback,
    ) -> CompositeResult<Surface> {
        let mut target = VectorTarget::new();
        canvas
            .context()
            .vector_render(&mut target, self.config.quality, desc, cb)?;
        let list = target.finish();
        trace!("recorded {} command(s)", list.len());

        let mut surface = Surface::for_desc(desc);
        Rasterizer::new().rasterize(&list, desc, &mut surface, cb)?;
        cb.progress(1, 1);
        Ok(surface)
    }
}

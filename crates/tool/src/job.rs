//! Output jobs.

use common::color::Gamma;
use image::{ImageFormat, RgbaImage};
use render::Surface;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// What a job does with the alpha channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlphaMode {
    /// Written as rendered.
    Keep,
    /// Color only, fully opaque.
    Reduce,
    /// Alpha only, as a gray image.
    Extract,
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("no image writer for {0}")]
    UnknownTarget(PathBuf),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// One image to write.
#[derive(Clone, Debug, PartialEq)]
pub struct Job {
    pub output: PathBuf,
    pub alpha: AlphaMode,
}

impl Job {
    /// The jobs for one render: a single image, or a color image plus an
    /// alpha image next to it when `extract_alpha` is set.
    pub fn list(output: &Path, extract_alpha: bool) -> Vec<Job> {
        if extract_alpha {
            vec![
                Job {
                    output: output.to_owned(),
                    alpha: AlphaMode::Reduce,
                },
                Job {
                    output: append_alpha_to_filename(output),
                    alpha: AlphaMode::Extract,
                },
            ]
        } else {
            vec![Job {
                output: output.to_owned(),
                alpha: AlphaMode::Keep,
            }]
        }
    }

    /// The output format, if this build can write it.
    pub fn format(&self) -> Result<ImageFormat, JobError> {
        ImageFormat::from_path(&self.output)
            .ok()
            .filter(|format| format.writing_enabled())
            .ok_or_else(|| JobError::UnknownTarget(self.output.clone()))
    }

    /// Encode `surface` and write it.
    pub fn write(&self, surface: &Surface, gamma: &Gamma) -> Result<(), JobError> {
        let format = self.format()?;
        let image = self.encode(surface, gamma);
        image
            .save_with_format(&self.output, format)
            .map_err(|source| JobError::Write {
                path: self.output.clone(),
                source,
            })?;
        debug!("wrote {}", self.output.display());
        Ok(())
    }

    /// Convert to 8-bit pixels according to the alpha mode.
    pub fn encode(&self, surface: &Surface, gamma: &Gamma) -> RgbaImage {
        let mut bytes = surface.to_rgba8(gamma);
        for pixel in bytes.chunks_exact_mut(4) {
            match self.alpha {
                AlphaMode::Keep => {}
                AlphaMode::Reduce => pixel[3] = u8::MAX,
                AlphaMode::Extract => {
                    let alpha = pixel[3];
                    pixel.copy_from_slice(&[alpha, alpha, alpha, u8::MAX]);
                }
            }
        }
        RgbaImage::from_raw(surface.width(), surface.height(), bytes)
            .unwrap_or_else(|| RgbaImage::new(surface.width(), surface.height()))
    }
}

/// `dir/name.ext` becomes `dir/name-alpha.ext`; a name without an extension
/// gets `-alpha` appended.
pub fn append_alpha_to_filename(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}-alpha.{}", ext.to_string_lossy()),
        None => format!("{stem}-alpha"),
    };
    path.with_file_name(name)
}

//! Pixel surfaces.

use crate::renddesc::RendDesc;
use crate::shape::Shape;
use common::color::{BlendMethod, Color, Gamma};
use common::error::{CompositeError, CompositeResult};
use common::geometry::Matrix;

/// A grid of colors, owned by the render call that allocated it.
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    /// Width in pixels.
    width: u32,
    /// Height in pixels.
    height: u32,
    /// Row-major pixel data.
    data: Vec<Color>,
}

impl Surface {
    /// A fully transparent surface.
    pub fn new(width: u32, height: u32) -> Self {
        Self::filled(width, height, Color::TRANSPARENT)
    }

    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        Self {
            width,
            height,
            data: vec![color; width as usize * height as usize],
        }
    }

    /// A surface sized for the given target.
    pub fn for_desc(desc: &RendDesc) -> Self {
        Self::new(desc.width(), desc.height())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Fill with a color.
    pub fn fill(&mut self, color: Color) {
        self.data.fill(color);
    }

    /// Clear to transparent.
    pub fn clear(&mut self) {
        self.fill(Color::TRANSPARENT);
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Get pixel at position; transparent outside the surface.
    pub fn get_pixel(&self, x: u32, y: u32) -> Color {
        if x >= self.width || y >= self.height {
            return Color::TRANSPARENT;
        }
        self.data[self.offset(x, y)]
    }

    /// Set pixel at position.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = self.offset(x, y);
        self.data[offset] = color;
    }

    /// Blend a color onto the pixel at position.
    #[inline]
    pub fn blend_pixel(&mut self, x: u32, y: u32, color: Color, amount: f32, method: BlendMethod) {
        if x >= self.width || y >= self.height {
            return;
        }
        let offset = self.offset(x, y);
        self.data[offset] = Color::blend(color, self.data[offset], amount, method);
    }

    pub fn pixels(&self) -> &[Color] {
        &self.data
    }

    pub fn pixels_mut(&mut self) -> &mut [Color] {
        &mut self.data
    }

    /// Iterate rows mutably.
    pub fn rows_mut(&mut self) -> std::slice::ChunksExactMut<'_, Color> {
        self.data.chunks_exact_mut(self.width.max(1) as usize)
    }

    /// Copy `src` into this surface with its top-left corner at `(x, y)`.
    pub fn blit(&mut self, src: &Surface, x: u32, y: u32) {
        for sy in 0..src.height {
            let dy = y + sy;
            if dy >= self.height {
                break;
            }
            let width = src.width.min(self.width.saturating_sub(x)) as usize;
            if width == 0 {
                break;
            }
            let from = src.offset(0, sy);
            let to = self.offset(x, dy);
            self.data[to..to + width].copy_from_slice(&src.data[from..from + width]);
        }
    }

    /// Copy a `width`×`height` region starting at `(x, y)` out of this surface.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Surface {
        let mut out = Surface::new(width, height);
        for oy in 0..height {
            for ox in 0..width {
                out.set_pixel(ox, oy, self.get_pixel(x + ox, y + oy));
            }
        }
        out
    }

    /// Blend every pixel of `src` onto the matching pixel of this surface.
    pub fn blend_surface(&mut self, src: &Surface, amount: f32, method: BlendMethod) {
        assert!(
            src.width == self.width && src.height == self.height,
            "blend_surface size mismatch: {}x{} onto {}x{}",
            src.width,
            src.height,
            self.width,
            self.height
        );
        for (dst, s) in self.data.iter_mut().zip(&src.data) {
            *dst = Color::blend(*s, *dst, amount, method);
        }
    }

    /// Blend `color` onto every pixel whose center lies inside `shape`.
    ///
    /// `transform` maps the shape's local coordinates into world space. The
    /// test is done on pixel centers in local space, so a raster render with
    /// the identity transform and a vector render of the same command touch
    /// exactly the same pixels.
    pub fn fill_shape(
        &mut self,
        desc: &RendDesc,
        shape: &Shape,
        transform: &Matrix,
        color: Color,
        amount: f32,
        method: BlendMethod,
    ) -> CompositeResult<()> {
        assert!(
            desc.width() == self.width && desc.height() == self.height,
            "surface does not match its render description"
        );

        let identity = transform.is_identity();
        let inverse = if identity {
            Matrix::IDENTITY
        } else {
            transform
                .inverse()
                .ok_or_else(|| CompositeError::unsupported("singular shape transform"))?
        };

        let bounds = transform.transform_bounds(&shape.bounds());
        let Some(span) = desc.pixel_span(&bounds) else {
            return Ok(());
        };

        for y in span.y0..span.y1 {
            for x in span.x0..span.x1 {
                let world = desc.pixel_center(x, y);
                let local = if identity { world } else { inverse.transform_point(world) };
                if shape.contains(local) {
                    self.blend_pixel(x, y, color, amount, method);
                }
            }
        }
        Ok(())
    }

    /// Quantize to RGBA8 bytes after gamma encoding.
    pub fn to_rgba8(&self, gamma: &Gamma) -> Vec<u8> {
        self.data.iter().flat_map(|c| c.to_rgba8(gamma)).collect()
    }
}

//! Render target description.

use common::geometry::{Bounds, Point, Rect};
use common::units::Time;

/// An immutable description of what to render: pixel grid, the world-space
/// window mapped onto it, and the time.
///
/// The window always describes the *full* frame; a tile is the same frame
/// with a pixel offset and a smaller pixel extent. Pixel centers are computed
/// from full-frame coordinates, so a tiled render samples exactly the same
/// world points as an untiled one.
#[derive(Clone, Debug, PartialEq)]
pub struct RendDesc {
    tl: Point,
    br: Point,
    frame_width: u32,
    frame_height: u32,
    x_offset: i64,
    y_offset: i64,
    width: u32,
    height: u32,
    time: Time,
    pixel_aspect: f64,
}

/// A half-open range of pixel indices inside a render target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelSpan {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelSpan {
    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }
}

impl RendDesc {
    /// Describe a `width`×`height` frame showing the window from `tl`
    /// (top-left pixel corner) to `br` (bottom-right pixel corner).
    pub fn new(width: u32, height: u32, tl: Point, br: Point) -> Self {
        Self {
            tl,
            br,
            frame_width: width,
            frame_height: height,
            x_offset: 0,
            y_offset: 0,
            width,
            height,
            time: Time::ZERO,
            pixel_aspect: 1.0,
        }
    }

    pub fn with_time(mut self, time: Time) -> Self {
        self.time = time;
        self
    }

    pub fn with_pixel_aspect(mut self, aspect: f64) -> Self {
        self.pixel_aspect = aspect;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tl(&self) -> Point {
        self.tl
    }

    pub fn br(&self) -> Point {
        self.br
    }

    pub fn time(&self) -> Time {
        self.time
    }

    pub fn pixel_aspect(&self) -> f64 {
        self.pixel_aspect
    }

    /// Offset of this target's first pixel within the full frame.
    pub fn offset(&self) -> (i64, i64) {
        (self.x_offset, self.y_offset)
    }

    /// World width of one pixel (negative when x runs right-to-left).
    #[inline]
    pub fn pw(&self) -> f64 {
        (self.br.x - self.tl.x) / self.frame_width as f64
    }

    /// World height of one pixel (negative when y points up).
    #[inline]
    pub fn ph(&self) -> f64 {
        (self.br.y - self.tl.y) / self.frame_height as f64
    }

    /// World coordinates of the center of pixel `(x, y)` of this target.
    #[inline]
    pub fn pixel_center(&self, x: u32, y: u32) -> Point {
        Point::new(
            self.tl.x + ((x as i64 + self.x_offset) as f64 + 0.5) * self.pw(),
            self.tl.y + ((y as i64 + self.y_offset) as f64 + 0.5) * self.ph(),
        )
    }

    /// Continuous pixel coordinates of a world point in this target.
    pub fn world_to_pixel(&self, point: Point) -> (f64, f64) {
        (
            (point.x - self.tl.x) / self.pw() - self.x_offset as f64,
            (point.y - self.tl.y) / self.ph() - self.y_offset as f64,
        )
    }

    /// The world rectangle covered by this target's pixels.
    pub fn view_rect(&self) -> Rect {
        let corner = |x: i64, y: i64| {
            Point::new(
                self.tl.x + x as f64 * self.pw(),
                self.tl.y + y as f64 * self.ph(),
            )
        };
        Rect::from_points(
            corner(self.x_offset, self.y_offset),
            corner(
                self.x_offset + self.width as i64,
                self.y_offset + self.height as i64,
            ),
        )
    }

    /// Pixels whose centers may fall inside `bounds`, clipped to the target.
    pub fn pixel_span(&self, bounds: &Bounds) -> Option<PixelSpan> {
        let full = PixelSpan {
            x0: 0,
            y0: 0,
            x1: self.width,
            y1: self.height,
        };
        let span = match bounds {
            Bounds::Empty => return None,
            Bounds::Infinite => full,
            Bounds::Finite(rect) => {
                let (ax, ay) = self.world_to_pixel(rect.min);
                let (bx, by) = self.world_to_pixel(rect.max);
                let clip = |v: f64, limit: u32| v.clamp(0.0, limit as f64) as u32;
                PixelSpan {
                    x0: clip(ax.min(bx).floor(), self.width),
                    y0: clip(ay.min(by).floor(), self.height),
                    x1: clip(ax.max(bx).ceil(), self.width),
                    y1: clip(ay.max(by).ceil(), self.height),
                }
            }
        };
        (!span.is_empty()).then_some(span)
    }

    /// The same frame with its window corners mapped through `f`.
    ///
    /// Only meaningful for mappings that keep the window axis-aligned
    /// (translation and uniform scale).
    pub fn map_window(&self, f: impl Fn(Point) -> Point) -> Self {
        Self {
            tl: f(self.tl),
            br: f(self.br),
            ..self.clone()
        }
    }

    /// A `width`×`height` tile of this target starting at pixel `(x, y)`.
    pub fn tile(&self, x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x_offset: self.x_offset + x as i64,
            y_offset: self.y_offset + y as i64,
            width,
            height,
            ..self.clone()
        }
    }

    /// This target grown by `margin` pixels on every side.
    pub fn expanded(&self, margin: u32) -> Self {
        Self {
            x_offset: self.x_offset - margin as i64,
            y_offset: self.y_offset - margin as i64,
            width: self.width + 2 * margin,
            height: self.height + 2 * margin,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc() -> RendDesc {
        RendDesc::new(8, 4, Point::new(-4.0, 2.0), Point::new(4.0, -2.0))
    }

    #[test]
    fn test_pixel_centers() {
        let d = desc();
        assert_eq!(d.pw(), 1.0);
        assert_eq!(d.ph(), -1.0);
        assert_eq!(d.pixel_center(0, 0), Point::new(-3.5, 1.5));
        assert_eq!(d.pixel_center(7, 3), Point::new(3.5, -1.5));
        assert_eq!(d.world_to_pixel(Point::new(-3.5, 1.5)), (0.5, 0.5));
    }

    #[test]
    fn test_tile_matches_frame() {
        let d = desc();
        let tile = d.tile(4, 2, 4, 2);
        assert_eq!(tile.width(), 4);
        for y in 0..2 {
            for x in 0..4 {
                assert_eq!(tile.pixel_center(x, y), d.pixel_center(x + 4, y + 2));
            }
        }
        assert_eq!(tile.view_rect(), Rect::new(0.0, 0.0, 4.0, -2.0));
    }

    #[test]
    fn test_expanded_keeps_pixel_grid() {
        let d = desc();
        let grown = d.expanded(2);
        assert_eq!((grown.width(), grown.height()), (12, 8));
        assert_eq!(grown.pixel_center(2, 2), d.pixel_center(0, 0));
    }

    #[test]
    fn test_pixel_span() {
        let d = desc();
        assert_eq!(d.pixel_span(&Bounds::Empty), None);
        assert_eq!(
            d.pixel_span(&Bounds::Infinite),
            Some(PixelSpan { x0: 0, y0: 0, x1: 8, y1: 4 })
        );
        let span = d.pixel_span(&Rect::new(-1.0, -1.0, 1.0, 1.0).into()).unwrap();
        assert_eq!(span, PixelSpan { x0: 3, y0: 1, x1: 5, y1: 3 });
        assert_eq!(d.pixel_span(&Rect::new(10.0, 10.0, 11.0, 11.0).into()), None);
    }

    #[test]
    fn test_map_window() {
        let d = desc();
        let zoomed = d.map_window(|p| p * 0.5);
        assert_eq!(zoomed.tl(), Point::new(-2.0, 1.0));
        assert_eq!(zoomed.pixel_center(0, 0), Point::new(-1.75, 0.75));
    }
}

//! Fillable geometry shared by the raster and vector paths.

use common::geometry::{Bounds, Point, Rect};

/// Rule deciding which points a self-overlapping polygon covers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Winding {
    #[default]
    NonZero,
    EvenOdd,
}

/// A region of the plane a layer fills with its color.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    /// The whole plane.
    Plane,
    Rect(Rect),
    Circle { center: Point, radius: f64 },
    Polygon { points: Vec<Point>, winding: Winding },
    /// A polyline widened to `width`, with round joins and caps.
    Stroke { points: Vec<Point>, width: f64, closed: bool },
    /// Everything outside the inner shape.
    Inverted(Box<Shape>),
}

impl Shape {
    pub fn inverted(self) -> Shape {
        match self {
            Shape::Inverted(inner) => *inner,
            other => Shape::Inverted(Box::new(other)),
        }
    }

    pub fn contains(&self, p: Point) -> bool {
        match self {
            Shape::Plane => true,
            Shape::Rect(rect) => rect.contains_point(p),
            Shape::Circle { center, radius } => p.distance(*center) <= *radius,
            Shape::Polygon { points, winding } => {
                let n = winding_number(points, p);
                match winding {
                    Winding::NonZero => n != 0,
                    Winding::EvenOdd => n % 2 != 0,
                }
            }
            Shape::Stroke { points, width, closed } => {
                let half = width.abs() / 2.0;
                match points.len() {
                    0 => false,
                    1 => p.distance(points[0]) <= half,
                    _ => {
                        let hit = points
                            .windows(2)
                            .any(|seg| p.distance_to_segment(seg[0], seg[1]) <= half);
                        hit || (*closed
                            && p.distance_to_segment(points[points.len() - 1], points[0]) <= half)
                    }
                }
            }
            Shape::Inverted(inner) => !inner.contains(p),
        }
    }

    /// Conservative bound of the covered region.
    pub fn bounds(&self) -> Bounds {
        match self {
            Shape::Plane | Shape::Inverted(_) => Bounds::Infinite,
            Shape::Rect(rect) => Bounds::Finite(*rect),
            Shape::Circle { center, radius } => {
                let r = radius.abs();
                Bounds::Finite(Rect::new(center.x - r, center.y - r, center.x + r, center.y + r))
            }
            Shape::Polygon { points, .. } => {
                Rect::enclosing(points.iter().copied()).map_or(Bounds::Empty, Bounds::Finite)
            }
            Shape::Stroke { points, width, .. } => {
                let half = width.abs() / 2.0;
                Rect::enclosing(points.iter().copied())
                    .map_or(Bounds::Empty, |r| Bounds::Finite(r.inflate(half, half)))
            }
        }
    }
}

fn winding_number(points: &[Point], p: Point) -> i32 {
    if points.len() < 3 {
        return 0;
    }
    let is_left = |a: Point, b: Point| (b.x - a.x) * (p.y - a.y) - (p.x - a.x) * (b.y - a.y);

    let mut winding = 0;
    for (i, &a) in points.iter().enumerate() {
        let b = points[(i + 1) % points.len()];
        if a.y <= p.y {
            if b.y > p.y && is_left(a, b) > 0.0 {
                winding += 1;
            }
        } else if b.y <= p.y && is_left(a, b) < 0.0 {
            winding -= 1;
        }
    }
    winding
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ]
    }

    #[test]
    fn test_polygon_contains() {
        let poly = Shape::Polygon { points: square(), winding: Winding::NonZero };
        assert!(poly.contains(Point::new(1.0, 1.0)));
        assert!(!poly.contains(Point::new(3.0, 1.0)));
        assert_eq!(poly.bounds(), Bounds::Finite(Rect::new(0.0, 0.0, 2.0, 2.0)));
    }

    #[test]
    fn test_winding_rules_differ_on_overlap() {
        // The same square traced twice winds twice around its interior.
        let mut twice = square();
        twice.extend(square());
        let nonzero = Shape::Polygon { points: twice.clone(), winding: Winding::NonZero };
        let evenodd = Shape::Polygon { points: twice, winding: Winding::EvenOdd };
        assert!(nonzero.contains(Point::new(1.0, 1.0)));
        assert!(!evenodd.contains(Point::new(1.0, 1.0)));
    }

    #[test]
    fn test_stroke_contains() {
        let stroke = Shape::Stroke { points: square(), width: 0.2, closed: false };
        assert!(stroke.contains(Point::new(1.0, 0.05)));
        assert!(!stroke.contains(Point::new(1.0, 1.0)));
        // The closing edge only counts for closed strokes.
        assert!(!stroke.contains(Point::new(0.0, 1.0)));
        let closed = Shape::Stroke { points: square(), width: 0.2, closed: true };
        assert!(closed.contains(Point::new(1.0, 0.0)));
        assert!(closed.contains(Point::new(0.05, 1.0)));
    }

    #[test]
    fn test_inverted() {
        let circle = Shape::Circle { center: Point::ZERO, radius: 1.0 };
        let outside = circle.clone().inverted();
        assert!(!outside.contains(Point::ZERO));
        assert!(outside.contains(Point::new(2.0, 0.0)));
        assert_eq!(outside.bounds(), Bounds::Infinite);
        assert_eq!(outside.inverted(), circle);
    }
}

//! Display list for the vector render path.
//!
//! Instead of painting pixels, layers record fill commands in world space
//! together with the transform that was current when they were recorded.
//! Transform-bearing layers push their forward matrix rather than remapping
//! sample points; groups bracket their content so it can be composited as a
//! unit. The [`Rasterizer`](crate::rasterizer::Rasterizer) turns the list into
//! pixels for any target.

use crate::shape::Shape;
use common::color::{BlendMethod, Color};
use common::geometry::Matrix;
use smallvec::SmallVec;

/// A single recorded drawing command.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    /// Blend `color` over every point inside `shape`.
    Fill {
        shape: Shape,
        /// Shape-local to world.
        transform: Matrix,
        color: Color,
        amount: f32,
        method: BlendMethod,
    },
    /// Start an isolated, initially transparent group.
    PushGroup,
    /// Composite the innermost group onto what lies beneath it.
    PopGroup { amount: f32, method: BlendMethod },
}

/// A display list containing all commands to be rasterized, bottom first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DisplayList {
    commands: Vec<DrawCommand>,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: DrawCommand) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

/// Recording target handed to layers on the vector path.
#[derive(Debug)]
pub struct VectorTarget {
    list: DisplayList,
    transforms: SmallVec<[Matrix; 8]>,
    open_groups: usize,
}

impl Default for VectorTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl VectorTarget {
    pub fn new() -> Self {
        Self {
            list: DisplayList::new(),
            transforms: SmallVec::new(),
            open_groups: 0,
        }
    }

    /// The matrix mapping the current coordinate space to world space.
    pub fn current_transform(&self) -> Matrix {
        self.transforms.last().copied().unwrap_or(Matrix::IDENTITY)
    }

    /// Enter a nested coordinate space; `matrix` maps it into the current one.
    pub fn push_transform(&mut self, matrix: &Matrix) {
        let combined = matrix.then(&self.current_transform());
        self.transforms.push(combined);
    }

    pub fn pop_transform(&mut self) {
        self.transforms.pop();
    }

    pub fn fill(&mut self, shape: Shape, color: Color, amount: f32, method: BlendMethod) {
        let transform = self.current_transform();
        self.list.push(DrawCommand::Fill {
            shape,
            transform,
            color,
            amount,
            method,
        });
    }

    pub fn push_group(&mut self) {
        self.open_groups += 1;
        self.list.push(DrawCommand::PushGroup);
    }

    pub fn pop_group(&mut self, amount: f32, method: BlendMethod) {
        self.open_groups = self.open_groups.saturating_sub(1);
        self.list.push(DrawCommand::PopGroup { amount, method });
    }

    /// Number of groups pushed but not yet popped.
    pub fn open_groups(&self) -> usize {
        self.open_groups
    }

    pub fn list(&self) -> &DisplayList {
        &self.list
    }

    pub fn finish(self) -> DisplayList {
        self.list
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::geometry::Point;

    #[test]
    fn test_transform_stack_composes_inner_first() {
        let mut target = VectorTarget::new();
        target.push_transform(&Matrix::translation(Point::new(1.0, 0.0)));
        target.push_transform(&Matrix::scale(2.0, 2.0));

        // Inner scale applies before the outer translation.
        let m = target.current_transform();
        assert_eq!(m.transform_point(Point::new(1.0, 1.0)), Point::new(3.0, 2.0));

        target.pop_transform();
        target.pop_transform();
        assert!(target.current_transform().is_identity());
    }

    #[test]
    fn test_records_commands() {
        let mut target = VectorTarget::new();
        target.push_group();
        target.fill(Shape::Plane, Color::RED, 1.0, BlendMethod::Composite);
        assert_eq!(target.open_groups(), 1);
        target.pop_group(0.5, BlendMethod::Composite);
        assert_eq!(target.open_groups(), 0);

        let list = target.finish();
        assert_eq!(list.len(), 3);
        assert!(matches!(list.commands()[0], DrawCommand::PushGroup));
        assert!(matches!(list.commands()[2], DrawCommand::PopGroup { .. }));
    }
}

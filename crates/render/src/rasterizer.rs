//! Rasterizer for converting display lists to pixels.

use crate::display_list::{DisplayList, DrawCommand};
use crate::progress::{check_cancelled, ProgressCallback};
use crate::renddesc::RendDesc;
use crate::surface::Surface;
use common::error::{CompositeError, CompositeResult};
use tracing::trace;

/// Commands executed between two cancellation polls.
const POLL_INTERVAL: usize = 64;

/// Software rasterizer for recorded display lists.
#[derive(Debug, Default)]
pub struct Rasterizer {
    /// Surfaces of the currently open groups, innermost last.
    group_stack: Vec<Surface>,
}

impl Rasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rasterize a display list on top of the existing contents of `surface`.
    pub fn rasterize(
        &mut self,
        list: &DisplayList,
        desc: &RendDesc,
        surface: &mut Surface,
        cb: &dyn ProgressCallback,
    ) -> CompositeResult<()> {
        self.group_stack.clear();
        trace!("rasterizing {} commands into {}x{}", list.len(), desc.width(), desc.height());

        for (i, command) in list.commands().iter().enumerate() {
            if i % POLL_INTERVAL == 0 {
                check_cancelled(cb)?;
            }
            self.rasterize_command(command, desc, surface)?;
        }

        if !self.group_stack.is_empty() {
            let open = self.group_stack.len();
            self.group_stack.clear();
            return Err(CompositeError::invalid(format!(
                "display list ends with {open} unclosed group(s)"
            )));
        }
        Ok(())
    }

    fn rasterize_command(
        &mut self,
        command: &DrawCommand,
        desc: &RendDesc,
        base: &mut Surface,
    ) -> CompositeResult<()> {
        match command {
            DrawCommand::Fill {
                shape,
                transform,
                color,
                amount,
                method,
            } => {
                let target = self.group_stack.last_mut().unwrap_or(base);
                target.fill_shape(desc, shape, transform, *color, *amount, *method)
            }
            DrawCommand::PushGroup => {
                self.group_stack.push(Surface::for_desc(desc));
                Ok(())
            }
            DrawCommand::PopGroup { amount, method } => {
                let group = self
                    .group_stack
                    .pop()
                    .ok_or_else(|| CompositeError::invalid("group popped without a push"))?;
                let target = self.group_stack.last_mut().unwrap_or(base);
                target.blend_surface(&group, *amount, *method);
                Ok(())
            }
        }
    }
}

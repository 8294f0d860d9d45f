use anyhow::Result;
use renderer::{CommandChannels, Frame, GpuContext, Program, Size, Tick};

/// Clears the screen every frame. Useful as a blank slot in the catalog
/// and for measuring host overhead.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgram;

impl Program for NoopProgram {
    fn name(&self) -> &str {
        "noop"
    }

    fn load(&mut self, _ctx: &GpuContext, _size: Size, _commands: &mut CommandChannels) -> Result<()> {
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame<'_>, _tick: &Tick) -> Result<()> {
        frame.clear([0.0, 0.0, 0.0, 1.0]);
        Ok(())
    }

    fn recolor(&mut self, frame: &mut Frame<'_>) -> Result<()> {
        frame.clear([0.0, 0.0, 0.0, 1.0]);
        Ok(())
    }

    fn resize(&mut self, _ctx: &GpuContext, _size: Size) -> Result<()> {
        Ok(())
    }
}

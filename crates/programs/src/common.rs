//! Pieces every simulation program shares: stage compilation, the final
//! colorize pass and the brush-size control.

use anyhow::{bail, Context, Result};
use renderer::{
    CommandChannels, CommandKind, Cycle, Frame, GpuContext, InputEvent, Key, Palette,
    PassPipeline, ShaderProgram, Stage, TextureKey, VertexLayout, COLORIZE_FRAGMENT_GLSL,
    QUAD_VERTEX_GLSL,
};

pub(crate) const CURSOR_STEP: f64 = 0.005;

/// Compiles a full-screen fragment stage against the shared quad. Debug
/// builds also check that every name in `expected` resolves.
pub(crate) fn compile_stage(
    ctx: &GpuContext,
    label: &str,
    fragment: &str,
    expected: &[&str],
) -> Result<ShaderProgram> {
    let mut program =
        ShaderProgram::compile_named(ctx, label, QUAD_VERTEX_GLSL, fragment, &VertexLayout::quad())
            .with_context(|| format!("failed to compile `{label}` stage"))?;
    if cfg!(debug_assertions) {
        program.use_program().validate_uniforms(expected)?;
    }
    Ok(program)
}

/// Scroll up shrinks the brush, scroll down grows it, within [0, 1].
pub(crate) fn adjust_cursor_size(size: f64, delta: f64) -> f64 {
    if delta > 0.0 {
        (size - CURSOR_STEP).max(0.0)
    } else if delta < 0.0 {
        (size + CURSOR_STEP).min(1.0)
    } else {
        size
    }
}

/// Final pass mapping a state texture onto the selected palette.
pub struct Colorizer {
    program: ShaderProgram,
    palettes: Cycle<Palette>,
    channels: Cycle<usize>,
}

impl Colorizer {
    pub fn new(ctx: &GpuContext, commands: &CommandChannels, palettes: &[Palette]) -> Result<Self> {
        if !commands.is_registered(CommandKind::Recolor) {
            bail!("colorize pass needs the {} command", CommandKind::Recolor);
        }
        let program = compile_stage(
            ctx,
            "colorize",
            COLORIZE_FRAGMENT_GLSL,
            &["state", "palette", "index", "mode"],
        )?;
        Ok(Self {
            program,
            palettes: Cycle::new(palettes.to_vec()),
            channels: Cycle::new(vec![0, 1, 2, 3]),
        })
    }

    pub fn palette(&self) -> Palette {
        self.palettes.current().copied().unwrap_or(Palette::Viridis)
    }

    pub fn channel(&self) -> usize {
        self.channels.current().copied().unwrap_or(0)
    }

    pub fn draw(
        &mut self,
        pipeline: &mut PassPipeline,
        frame: &mut Frame<'_>,
        source: TextureKey,
    ) -> Result<()> {
        let uniforms = self.palette().uniforms(self.channel());
        self.program.use_program().apply(&uniforms);
        pipeline.run(frame, &Stage::new("colorize", &self.program).read(source, 0).to_screen())?;
        Ok(())
    }

    /// J/K step the palette, H/L the channel. Returns true when the key was
    /// consumed; a change raises a recolor.
    pub fn input(&mut self, event: &InputEvent, commands: &CommandChannels) -> bool {
        let changed = match event.released() {
            Some(Key::Char('j')) => self.palettes.previous().is_some(),
            Some(Key::Char('k')) => self.palettes.next().is_some(),
            Some(Key::Char('h')) => self.channels.previous().is_some(),
            Some(Key::Char('l')) => self.channels.next().is_some(),
            _ => return false,
        };
        if changed {
            tracing::debug!(palette = self.palette().name(), channel = self.channel(), "recolor");
            if let Err(err) = commands.issue(CommandKind::Recolor) {
                tracing::warn!(error = %err, "recolor request dropped");
            }
        }
        true
    }
}

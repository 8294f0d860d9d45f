//! Escape-time fractal explorers for the Mandelbrot and Julia sets.

use std::fmt;

use anyhow::{anyhow, Result};
use renderer::{
    CommandChannels, Frame, FrameUniforms, GpuContext, InputEvent, Key, KeyState, MouseButton,
    MouseDelta, Palette, PassPipeline, Program, ShaderProgram, Size, Stage, TextureKey, Tick,
    UniformGroup, UniformState,
};

use crate::common::{compile_stage, Colorizer};

pub const MANDELBROT_FRAGMENT_GLSL: &str = include_str!("../shaders/mandelbrot.frag");
pub const JULIA_FRAGMENT_GLSL: &str = include_str!("../shaders/julia.frag");

pub const DEFAULT_ITERATIONS: u32 = 255;
pub const ITERATION_STEP: u32 = 10;
/// Relative zoom change per scroll step.
pub const ZOOM_FACTOR: f64 = 0.01;

const MANDELBROT_FOCUS: [f64; 2] = [-0.51, 0.0];
const JULIA_CONSTANT: [f64; 2] = [-0.7, 0.27015];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FractalKind {
    Mandelbrot,
    Julia,
}

impl FractalKind {
    pub fn name(&self) -> &'static str {
        match self {
            FractalKind::Mandelbrot => "mandelbrot",
            FractalKind::Julia => "julia",
        }
    }

    fn fragment(&self) -> &'static str {
        match self {
            FractalKind::Mandelbrot => MANDELBROT_FRAGMENT_GLSL,
            FractalKind::Julia => JULIA_FRAGMENT_GLSL,
        }
    }
}

impl fmt::Display for FractalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a drag moves in the Julia explorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanTarget {
    /// The constant c, which reshapes the set.
    Constant,
    /// The view over the plane.
    View,
}

/// Camera and iteration state of one explorer.
///
/// For the Mandelbrot set `focus` is the plane point at the window centre.
/// For the Julia set `focus` is the constant c and `offset` the view centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractalView {
    pub kind: FractalKind,
    pub focus: [f64; 2],
    pub offset: [f64; 2],
    pub zoom: f64,
    pub iterations: u32,
    pub pan: PanTarget,
}

impl FractalView {
    pub fn new(kind: FractalKind) -> Self {
        let focus = match kind {
            FractalKind::Mandelbrot => MANDELBROT_FOCUS,
            FractalKind::Julia => JULIA_CONSTANT,
        };
        Self {
            kind,
            focus,
            offset: [0.0, 0.0],
            zoom: 1.0,
            iterations: DEFAULT_ITERATIONS,
            pan: PanTarget::Constant,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.kind);
    }

    /// Moves by a cursor drag of `(dx, dy)` pixels so the plane point under
    /// the cursor follows it. The shader maps the window height onto two
    /// plane units at zoom 1.
    pub fn drag(&mut self, dx: f64, dy: f64, height: u32) {
        let units = 2.0 / (f64::from(height.max(1)) * self.zoom);
        let target = match (self.kind, self.pan) {
            (FractalKind::Julia, PanTarget::View) => &mut self.offset,
            (FractalKind::Julia, PanTarget::Constant) | (FractalKind::Mandelbrot, _) => &mut self.focus,
        };
        target[0] -= dx * units;
        target[1] += dy * units;
    }

    /// Positive steps zoom in.
    pub fn zoom_by(&mut self, steps: f64) {
        self.zoom = (self.zoom * (1.0 + ZOOM_FACTOR).powf(steps)).max(f64::MIN_POSITIVE);
    }

    pub fn more_iterations(&mut self) {
        self.iterations = self.iterations.saturating_add(ITERATION_STEP);
    }

    pub fn fewer_iterations(&mut self) {
        self.iterations = self.iterations.saturating_sub(ITERATION_STEP).max(1);
    }

    pub fn toggle_pan(&mut self) {
        self.pan = match self.pan {
            PanTarget::Constant => PanTarget::View,
            PanTarget::View => PanTarget::Constant,
        };
    }
}

impl UniformGroup for FractalView {
    fn apply_to(&self, uniforms: &mut UniformState) {
        uniforms
            .uniform("focus", [self.focus[0] as f32, self.focus[1] as f32])
            .uniform("zoom", self.zoom as f32)
            .uniform("maxIterations", self.iterations.min(i32::MAX as u32) as i32)
            .optional_uniform("offset", [self.offset[0] as f32, self.offset[1] as f32]);
    }
}

struct FractalResources {
    pipeline: PassPipeline,
    escape: TextureKey,
    fractal: ShaderProgram,
    colorizer: Colorizer,
}

pub struct FractalProgram {
    view: FractalView,
    dragging: bool,
    cursor: MouseDelta,
    height: u32,
    resources: Option<FractalResources>,
}

impl FractalProgram {
    pub fn new(kind: FractalKind) -> Self {
        Self {
            view: FractalView::new(kind),
            dragging: false,
            cursor: MouseDelta::default(),
            height: 1,
            resources: None,
        }
    }

    pub fn mandelbrot() -> Self {
        Self::new(FractalKind::Mandelbrot)
    }

    pub fn julia() -> Self {
        Self::new(FractalKind::Julia)
    }

    pub fn view(&self) -> &FractalView {
        &self.view
    }

    fn loaded_mut(&mut self) -> Result<&mut FractalResources> {
        let kind = self.view.kind;
        self.resources
            .as_mut()
            .ok_or_else(|| anyhow!("{kind} program is not loaded"))
    }

    /// View changes that do not depend on GPU resources.
    fn navigate(&mut self, event: &InputEvent) {
        match *event {
            InputEvent::MouseButton {
                button: MouseButton::Left,
                state,
            } => {
                self.dragging = state == KeyState::Pressed;
                self.cursor.reset();
            }
            InputEvent::CursorMoved { x, y } => {
                let (dx, dy) = self.cursor.delta(x, y);
                if self.dragging {
                    self.view.drag(dx, dy, self.height);
                }
            }
            InputEvent::Scroll { delta } => self.view.zoom_by(delta),
            _ => match event.pressed() {
                Some(Key::Char('=')) => self.view.more_iterations(),
                Some(Key::Char('-')) => self.view.fewer_iterations(),
                _ => match event.released() {
                    Some(Key::Char('r')) => self.view.reset(),
                    Some(Key::Space) if self.view.kind == FractalKind::Julia => {
                        self.view.toggle_pan();
                        tracing::debug!(pan = ?self.view.pan, "julia pan target");
                    }
                    _ => {}
                },
            },
        }
    }
}

impl Program for FractalProgram {
    fn name(&self) -> &str {
        self.view.kind.name()
    }

    fn load(&mut self, ctx: &GpuContext, size: Size, commands: &mut CommandChannels) -> Result<()> {
        let size = size.at_least_one();
        let kind = self.view.kind;
        let mut pipeline = PassPipeline::new(ctx, kind.name(), size);
        let escape = pipeline.add_blank(ctx, &format!("{kind} escape"))?;
        let fractal = compile_stage(
            ctx,
            kind.name(),
            kind.fragment(),
            &["scale", "focus", "zoom", "maxIterations"],
        )?;
        let colorizer = Colorizer::new(ctx, commands, &Palette::ALL)?;

        self.height = size.height;
        self.resources = Some(FractalResources {
            pipeline,
            escape,
            fractal,
            colorizer,
        });
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame<'_>, tick: &Tick) -> Result<()> {
        let view = self.view;
        let res = self.loaded_mut()?;
        res.fractal
            .use_program()
            .apply(&FrameUniforms::from_tick(tick))
            .apply(&view);
        res.pipeline.run(
            frame,
            &Stage::new(view.kind.name(), &res.fractal).write(res.escape),
        )?;
        res.colorizer.draw(&mut res.pipeline, frame, res.escape)
    }

    fn recolor(&mut self, frame: &mut Frame<'_>) -> Result<()> {
        let res = self.loaded_mut()?;
        res.colorizer.draw(&mut res.pipeline, frame, res.escape)
    }

    fn resize(&mut self, ctx: &GpuContext, size: Size) -> Result<()> {
        self.height = size.at_least_one().height;
        self.loaded_mut()?.pipeline.resize(ctx, size)
    }

    fn input(&mut self, event: &InputEvent, commands: &CommandChannels) {
        if let Some(res) = self.resources.as_mut() {
            if res.colorizer.input(event, commands) {
                return;
            }
        }
        self.navigate(event);
    }

    fn status(&self) -> Option<String> {
        let res = self.resources.as_ref()?;
        Some(format!(
            "{} x{:.2} {} iterations {}",
            self.view.kind,
            self.view.zoom,
            self.view.iterations,
            res.colorizer.palette().name()
        ))
    }

    fn unload(&mut self, _commands: &mut CommandChannels) {
        self.resources = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use renderer::compile::prepare_program;
    use renderer::{VertexLayout, QUAD_VERTEX_GLSL};
    use std::sync::Arc;

    fn key(key: Key) -> InputEvent {
        InputEvent::key_pressed(key)
    }

    #[test]
    fn iterations_step_by_ten_and_stay_positive() {
        let mut program = FractalProgram::mandelbrot();
        assert_eq!(program.view().iterations, 255);
        program.navigate(&key(Key::Char('=')));
        assert_eq!(program.view().iterations, 265);
        for _ in 0..40 {
            program.navigate(&key(Key::Char('-')));
        }
        assert_eq!(program.view().iterations, 1);
    }

    #[test]
    fn drag_keeps_point_under_cursor() {
        let mut view = FractalView::new(FractalKind::Mandelbrot);
        view.zoom = 2.0;
        view.drag(100.0, -50.0, 400);
        // 2 / (400 * 2) plane units per pixel.
        assert!((view.focus[0] - (-0.51 - 0.25)).abs() < 1e-12);
        assert!((view.focus[1] - (-0.125)).abs() < 1e-12);
    }

    #[test]
    fn cursor_moves_pan_only_while_dragging() {
        let mut program = FractalProgram::mandelbrot();
        program.height = 200;
        program.navigate(&InputEvent::CursorMoved { x: 10.0, y: 10.0 });
        program.navigate(&InputEvent::CursorMoved { x: 50.0, y: 10.0 });
        assert_eq!(program.view().focus, MANDELBROT_FOCUS);

        program.navigate(&InputEvent::MouseButton {
            button: MouseButton::Left,
            state: KeyState::Pressed,
        });
        program.navigate(&InputEvent::CursorMoved { x: 50.0, y: 10.0 });
        program.navigate(&InputEvent::CursorMoved { x: 60.0, y: 10.0 });
        assert!((program.view().focus[0] - (-0.51 - 0.1)).abs() < 1e-12);
    }

    #[test]
    fn scroll_zooms_multiplicatively() {
        let mut view = FractalView::new(FractalKind::Mandelbrot);
        view.zoom_by(1.0);
        assert!((view.zoom - 1.01).abs() < 1e-12);
        view.zoom_by(-1.0);
        assert!((view.zoom - 1.0).abs() < 1e-12);
    }

    #[test]
    fn julia_space_switches_pan_target_and_r_resets() {
        let mut program = FractalProgram::julia();
        program.height = 100;
        let drag = |program: &mut FractalProgram| {
            program.navigate(&InputEvent::MouseButton {
                button: MouseButton::Left,
                state: KeyState::Pressed,
            });
            program.navigate(&InputEvent::CursorMoved { x: 0.0, y: 0.0 });
            program.navigate(&InputEvent::CursorMoved { x: 0.0, y: 10.0 });
        };

        drag(&mut program);
        assert!((program.view().focus[1] - (0.27015 + 0.2)).abs() < 1e-12);
        assert_eq!(program.view().offset, [0.0, 0.0]);

        program.navigate(&InputEvent::key_released(Key::Space));
        assert_eq!(program.view().pan, PanTarget::View);
        drag(&mut program);
        assert!((program.view().offset[1] - 0.2).abs() < 1e-12);

        program.navigate(&InputEvent::key_released(Key::Char('r')));
        assert_eq!(*program.view(), FractalView::new(FractalKind::Julia));
    }

    #[test]
    fn view_uniforms_cover_both_shaders() {
        for kind in [FractalKind::Mandelbrot, FractalKind::Julia] {
            let prepared =
                prepare_program(QUAD_VERTEX_GLSL, kind.fragment(), &VertexLayout::quad()).unwrap();
            let mut uniforms = UniformState::new(kind.name(), Arc::new(prepared.uniforms));
            uniforms.apply(&FractalView::new(kind));
            assert!(uniforms.missing_uniforms().is_empty(), "{kind}");
        }
    }
}

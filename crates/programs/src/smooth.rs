//! SmoothLife: a continuous Life variant driven by blurred neighbourhood
//! fillings.

use anyhow::{anyhow, Result};
use image::RgbaImage;
use renderer::gpu::noise_image;
use renderer::{
    CommandChannels, Frame, FrameUniforms, GpuContext, InputEvent, Key, Palette, PassPipeline,
    PingPong, Program, ShaderProgram, Size, Stage, TextureKey, Tick, UniformGroup, UniformState,
};

use crate::common::{adjust_cursor_size, compile_stage, Colorizer};

pub const SMOOTH_FRAGMENT_GLSL: &str = include_str!("../shaders/smooth.frag");
pub const GAUSS_X_FRAGMENT_GLSL: &str = include_str!("../shaders/gauss_x.frag");
pub const GAUSS_Y_FRAGMENT_GLSL: &str = include_str!("../shaders/gauss_y.frag");

/// Rule parameters of the SmoothLife transition function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothLifeRules {
    pub outer_radius: f32,
    pub inner_radius: f32,
    pub b1: f32,
    pub b2: f32,
    pub s1: f32,
    pub s2: f32,
    pub dt: f32,
    pub alpha_m: f32,
    pub alpha_n: f32,
}

impl Default for SmoothLifeRules {
    fn default() -> Self {
        Self {
            outer_radius: 18.0,
            inner_radius: 6.0,
            b1: 0.2,
            b2: 0.215,
            s1: 0.25,
            s2: 0.5,
            dt: 0.2,
            alpha_m: 0.02,
            alpha_n: 0.11,
        }
    }
}

impl SmoothLifeRules {
    /// The two radii alone, for the blur stages.
    pub fn radii(&self) -> impl Fn(&mut UniformState) + '_ {
        move |uniforms: &mut UniformState| {
            uniforms
                .uniform("outer_radius", self.outer_radius)
                .uniform("inner_radius", self.inner_radius);
        }
    }
}

impl UniformGroup for SmoothLifeRules {
    fn apply_to(&self, uniforms: &mut UniformState) {
        uniforms
            .apply(&self.radii())
            .uniform("b1", self.b1)
            .uniform("b2", self.b2)
            .uniform("s1", self.s1)
            .uniform("s2", self.s2)
            .uniform("dt", self.dt)
            .uniform("alpha_m", self.alpha_m)
            .uniform("alpha_n", self.alpha_n);
    }
}

struct SmoothResources {
    pipeline: PassPipeline,
    /// Cell state.
    state: PingPong,
    /// Horizontal blur of the state.
    blur_x: TextureKey,
    /// Full blur; r inner filling, g outer filling.
    blur: TextureKey,
    smooth: ShaderProgram,
    gauss_x: ShaderProgram,
    gauss_y: ShaderProgram,
    colorizer: Colorizer,
}

pub struct SmoothLifeProgram {
    rules: SmoothLifeRules,
    seed: Option<u64>,
    paused: bool,
    cursor_size: f64,
    resources: Option<SmoothResources>,
}

impl SmoothLifeProgram {
    pub fn new(rules: SmoothLifeRules, seed: Option<u64>) -> Self {
        Self {
            rules,
            seed,
            paused: false,
            cursor_size: 0.025,
            resources: None,
        }
    }

    pub fn rules(&self) -> &SmoothLifeRules {
        &self.rules
    }

    pub fn read_state(&self, ctx: &GpuContext) -> Result<RgbaImage> {
        let res = self.loaded()?;
        res.pipeline.read_pixels(ctx, res.state.read)
    }

    fn loaded(&self) -> Result<&SmoothResources> {
        self.resources
            .as_ref()
            .ok_or_else(|| anyhow!("smooth life program is not loaded"))
    }

    fn loaded_mut(&mut self) -> Result<&mut SmoothResources> {
        self.resources
            .as_mut()
            .ok_or_else(|| anyhow!("smooth life program is not loaded"))
    }
}

impl Program for SmoothLifeProgram {
    fn name(&self) -> &str {
        "smooth-life"
    }

    fn load(&mut self, ctx: &GpuContext, size: Size, commands: &mut CommandChannels) -> Result<()> {
        let size = size.at_least_one();
        let mut pipeline = PassPipeline::new(ctx, "smooth life", size);
        let seed = noise_image(size, self.seed.unwrap_or_else(rand::random));
        let state = pipeline.ping_pong(ctx, "smooth state", &seed)?;
        let blur_x = pipeline.add_blank(ctx, "smooth blur x")?;
        let blur = pipeline.add_blank(ctx, "smooth blur")?;

        let smooth = compile_stage(
            ctx,
            "smooth",
            SMOOTH_FRAGMENT_GLSL,
            &["inputA", "inputC", "scale", "mouse", "cursorSize", "outer_radius", "dt"],
        )?;
        let gauss_x = compile_stage(ctx, "gauss x", GAUSS_X_FRAGMENT_GLSL, &["inputA", "scale"])?;
        let gauss_y = compile_stage(ctx, "gauss y", GAUSS_Y_FRAGMENT_GLSL, &["inputB", "scale"])?;
        let colorizer = Colorizer::new(ctx, commands, &Palette::ALL)?;

        self.resources = Some(SmoothResources {
            pipeline,
            state,
            blur_x,
            blur,
            smooth,
            gauss_x,
            gauss_y,
            colorizer,
        });
        tracing::info!(rules = ?self.rules, %size, "smooth life loaded");
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame<'_>, tick: &Tick) -> Result<()> {
        let rules = self.rules;
        let paused = self.paused;
        let cursor_size = self.cursor_size as f32;
        let res = self.loaded_mut()?;
        if paused {
            return res.colorizer.draw(&mut res.pipeline, frame, res.state.read);
        }

        let uniforms = FrameUniforms::from_tick(tick);
        res.smooth
            .use_program()
            .apply(&uniforms)
            .apply(&rules)
            .uniform("cursorSize", cursor_size)
            .sampler("inputA", 0)
            .sampler("inputC", 1);
        res.pipeline.run(
            frame,
            &Stage::new("smooth", &res.smooth)
                .read(res.state.read, 0)
                .read(res.blur, 1)
                .write(res.state.write),
        )?;
        res.state.swap();

        res.gauss_x.use_program().apply(&uniforms).apply(&rules.radii());
        res.pipeline.run(
            frame,
            &Stage::new("gauss x", &res.gauss_x)
                .read(res.state.read, 0)
                .write(res.blur_x),
        )?;

        res.gauss_y.use_program().apply(&uniforms).apply(&rules.radii());
        res.pipeline.run(
            frame,
            &Stage::new("gauss y", &res.gauss_y)
                .read(res.blur_x, 0)
                .write(res.blur),
        )?;

        res.colorizer.draw(&mut res.pipeline, frame, res.state.read)
    }

    fn recolor(&mut self, frame: &mut Frame<'_>) -> Result<()> {
        let res = self.loaded_mut()?;
        res.colorizer.draw(&mut res.pipeline, frame, res.state.read)
    }

    fn resize(&mut self, ctx: &GpuContext, size: Size) -> Result<()> {
        self.loaded_mut()?.pipeline.resize(ctx, size)
    }

    fn input(&mut self, event: &InputEvent, commands: &CommandChannels) {
        if let Some(res) = self.resources.as_mut() {
            if res.colorizer.input(event, commands) {
                return;
            }
        }
        match *event {
            InputEvent::Scroll { delta } => {
                self.cursor_size = adjust_cursor_size(self.cursor_size, delta);
            }
            _ if event.released() == Some(Key::Space) => self.paused = !self.paused,
            _ => {}
        }
    }

    fn status(&self) -> Option<String> {
        let res = self.resources.as_ref()?;
        let paused = if self.paused { " (paused)" } else { "" };
        Some(format!("smooth life {}{paused}", res.colorizer.palette().name()))
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

    fn uniforms_for(fragment: &str) -> UniformState {
        let prepared = prepare_program(QUAD_VERTEX_GLSL, fragment, &VertexLayout::quad()).unwrap();
        UniformState::new("test", Arc::new(prepared.uniforms))
    }

    #[test]
    fn rules_cover_the_smooth_stage() {
        let mut uniforms = uniforms_for(SMOOTH_FRAGMENT_GLSL);
        uniforms.apply(&SmoothLifeRules::default());
        assert!(uniforms.missing_uniforms().is_empty());
    }

    #[test]
    fn radii_fit_the_blur_stages() {
        let rules = SmoothLifeRules::default();
        for fragment in [GAUSS_X_FRAGMENT_GLSL, GAUSS_Y_FRAGMENT_GLSL] {
            let mut uniforms = uniforms_for(fragment);
            uniforms.apply(&rules.radii());
            assert!(uniforms.missing_uniforms().is_empty());
            assert!(uniforms.resolves("outer_radius"));
        }
    }
}

//! Life-like cellular automata: the classic B/S rules with a growth/decay
//! trail, and a cyclic automaton over a fixed number of stages.

use std::fmt;

use anyhow::{anyhow, Result};
use image::{Rgba, RgbaImage};
use renderer::gpu::noise_image;
use renderer::{
    CommandChannels, Frame, FrameUniforms, GpuContext, InputEvent, Key, Palette, PassPipeline,
    PingPong, Program, ShaderProgram, Size, Stage, Tick,
};

use crate::common::{adjust_cursor_size, compile_stage, Colorizer};
use crate::rules::RuleSet;

pub const LIFE_FRAGMENT_GLSL: &str = include_str!("../shaders/life.frag");
pub const GROWTH_FRAGMENT_GLSL: &str = include_str!("../shaders/growth.frag");
pub const CYCLIC_FRAGMENT_GLSL: &str = include_str!("../shaders/cyclic.frag");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifeMode {
    /// life -> swap -> growth/decay -> colorize the trail.
    Standard,
    /// cyclic rule -> swap -> colorize the state.
    Cyclic,
}

impl fmt::Display for LifeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifeMode::Standard => f.write_str("standard"),
            LifeMode::Cyclic => f.write_str("cyclic"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LifeOptions {
    pub rule: RuleSet,
    pub mode: LifeMode,
    pub cyclic_stages: u32,
    /// Brush radius as a fraction of the window height.
    pub cursor_size: f64,
    /// Seed for the initial noise; random when unset.
    pub seed: Option<u64>,
}

impl Default for LifeOptions {
    fn default() -> Self {
        Self {
            rule: RuleSet::CONWAY,
            mode: LifeMode::Standard,
            cyclic_stages: 16,
            cursor_size: 0.025,
            seed: None,
        }
    }
}

struct LifeResources {
    pipeline: PassPipeline,
    state: PingPong,
    trail: PingPong,
    life: ShaderProgram,
    growth: ShaderProgram,
    cyclic: ShaderProgram,
    colorizer: Colorizer,
}

impl LifeResources {
    fn colorize(&mut self, mode: LifeMode, frame: &mut Frame<'_>) -> Result<()> {
        let source = match mode {
            LifeMode::Standard => self.trail.read,
            LifeMode::Cyclic => self.state.read,
        };
        self.colorizer.draw(&mut self.pipeline, frame, source)
    }
}

pub struct LifeProgram {
    options: LifeOptions,
    mode: LifeMode,
    paused: bool,
    reseed: bool,
    cursor_size: f64,
    resources: Option<LifeResources>,
}

impl LifeProgram {
    pub fn new(options: LifeOptions) -> Self {
        Self {
            mode: options.mode,
            cursor_size: options.cursor_size,
            options,
            paused: false,
            reseed: false,
            resources: None,
        }
    }

    pub fn mode(&self) -> LifeMode {
        self.mode
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn cursor_size(&self) -> f64 {
        self.cursor_size
    }

    /// Replaces the current generation with `image`, resampled to the grid.
    pub fn write_state(&mut self, ctx: &GpuContext, image: &RgbaImage) -> Result<()> {
        let res = self.loaded_mut()?;
        res.pipeline.write_image(ctx, res.state.read, image)
    }

    /// Current generation.
    pub fn read_state(&self, ctx: &GpuContext) -> Result<RgbaImage> {
        let res = self.loaded()?;
        res.pipeline.read_pixels(ctx, res.state.read)
    }

    /// Growth/decay trail shown in standard mode.
    pub fn read_trail(&self, ctx: &GpuContext) -> Result<RgbaImage> {
        let res = self.loaded()?;
        res.pipeline.read_pixels(ctx, res.trail.read)
    }

    fn loaded(&self) -> Result<&LifeResources> {
        self.resources
            .as_ref()
            .ok_or_else(|| anyhow!("life program is not loaded"))
    }

    fn loaded_mut(&mut self) -> Result<&mut LifeResources> {
        self.resources
            .as_mut()
            .ok_or_else(|| anyhow!("life program is not loaded"))
    }

    fn set_mode(&mut self, mode: LifeMode) {
        if mode != self.mode {
            self.mode = mode;
            self.reseed = true;
            tracing::info!(%mode, "life mode changed");
        }
    }
}

impl Program for LifeProgram {
    fn name(&self) -> &str {
        "life"
    }

    fn load(&mut self, ctx: &GpuContext, size: Size, commands: &mut CommandChannels) -> Result<()> {
        let size = size.at_least_one();
        let mut pipeline = PassPipeline::new(ctx, "life", size);
        let seed = noise_image(size, self.options.seed.unwrap_or_else(rand::random));
        let state = pipeline.ping_pong(ctx, "life state", &seed)?;
        let white = RgbaImage::from_pixel(size.width, size.height, Rgba([255, 255, 255, 255]));
        let trail = pipeline.ping_pong(ctx, "life trail", &white)?;

        let life = compile_stage(
            ctx,
            "life",
            LIFE_FRAGMENT_GLSL,
            &["state", "scale", "mouse", "cursorSize", "s", "b"],
        )?;
        let growth = compile_stage(ctx, "growth", GROWTH_FRAGMENT_GLSL, &["state", "trail"])?;
        let cyclic = compile_stage(
            ctx,
            "cyclic",
            CYCLIC_FRAGMENT_GLSL,
            &["state", "scale", "mouse", "cursorSize", "stages"],
        )?;
        let colorizer = Colorizer::new(ctx, commands, &Palette::ALL)?;

        self.resources = Some(LifeResources {
            pipeline,
            state,
            trail,
            life,
            growth,
            cyclic,
            colorizer,
        });
        tracing::info!(rule = %self.options.rule, mode = %self.mode, %size, "life loaded");
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame<'_>, tick: &Tick) -> Result<()> {
        let mode = self.mode;
        let paused = self.paused;
        let cursor_size = self.cursor_size as f32;
        let rule = self.options.rule;
        let stages = self.options.cyclic_stages.max(2) as f32;
        let reseed = std::mem::take(&mut self.reseed).then(|| {
            self.options
                .seed
                .map(|seed| seed.wrapping_add(tick.frame))
                .unwrap_or_else(rand::random)
        });
        let res = self.loaded_mut()?;

        if let Some(seed) = reseed {
            let image = noise_image(res.pipeline.size(), seed);
            res.pipeline.write_image(frame.ctx(), res.state.read, &image)?;
        }
        if paused {
            return res.colorize(mode, frame);
        }

        let uniforms = FrameUniforms::from_tick(tick);
        match mode {
            LifeMode::Standard => {
                res.life
                    .use_program()
                    .apply(&uniforms)
                    .apply(&rule)
                    .uniform("cursorSize", cursor_size);
                res.pipeline.run(
                    frame,
                    &Stage::new("life", &res.life)
                        .read(res.state.read, 0)
                        .write(res.state.write),
                )?;
                res.state.swap();

                res.growth.use_program().sampler("state", 0).sampler("trail", 1);
                res.pipeline.run(
                    frame,
                    &Stage::new("growth", &res.growth)
                        .read(res.state.read, 0)
                        .read(res.trail.read, 1)
                        .write(res.trail.write),
                )?;
                res.trail.swap();
            }
            LifeMode::Cyclic => {
                res.cyclic
                    .use_program()
                    .apply(&uniforms)
                    .uniform("cursorSize", cursor_size)
                    .uniform("stages", stages);
                res.pipeline.run(
                    frame,
                    &Stage::new("cyclic", &res.cyclic)
                        .read(res.state.read, 0)
                        .write(res.state.write),
                )?;
                res.state.swap();
            }
        }
        res.colorize(mode, frame)
    }

    fn recolor(&mut self, frame: &mut Frame<'_>) -> Result<()> {
        let mode = self.mode;
        self.loaded_mut()?.colorize(mode, frame)
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
        if let InputEvent::Scroll { delta } = *event {
            self.cursor_size = adjust_cursor_size(self.cursor_size, delta);
            return;
        }
        match event.released() {
            Some(Key::Char('1')) => self.set_mode(LifeMode::Standard),
            Some(Key::Char('2')) => self.set_mode(LifeMode::Cyclic),
            Some(Key::Space) => self.paused = !self.paused,
            _ => {}
        }
    }

    fn status(&self) -> Option<String> {
        let res = self.resources.as_ref()?;
        let mut status = format!("{} {} {}", self.options.rule, self.mode, res.colorizer.palette().name());
        if self.paused {
            status.push_str(" (paused)");
        }
        Some(status)
    }

    fn unload(&mut self, _commands: &mut CommandChannels) {
        self.resources = None;
    }
}

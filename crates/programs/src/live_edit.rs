//! A program whose shader pair is edited on disk while it runs.
//!
//! Every saved change is recompiled on the render thread at the start of
//! the next frame. A successful compile replaces the running program and
//! resumes drawing; a failed one keeps the last good program, pauses the
//! canvas and reports the error through [`Program::status`].

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use image::{Rgba, RgbaImage};
use renderer::{
    CommandChannels, Frame, FrameUniforms, GpuContext, InputEvent, Key, Palette, PassPipeline,
    PingPong, Program, ShaderProgram, ShaderWatcher, Size, Stage, Tick, VertexLayout, WatchId,
    QUAD_VERTEX_GLSL,
};

use crate::common::Colorizer;

/// Seed contents for a fresh live-edit vertex file.
pub const LIVE_VERTEX_GLSL: &str = QUAD_VERTEX_GLSL;
/// Seed contents for a fresh live-edit fragment file.
pub const LIVE_FRAGMENT_GLSL: &str = include_str!("../shaders/live.frag");
/// Compiled revisions kept in the history.
pub const HISTORY_LIMIT: usize = 64;

#[derive(Debug, Clone)]
pub struct LiveEditOptions {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

/// A source pair that compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveSources {
    pub vertex: String,
    pub fragment: String,
}

struct LiveResources {
    pipeline: PassPipeline,
    /// Previous frame, readable by the edited shader as `state`.
    canvas: PingPong,
    watcher: ShaderWatcher,
    watch: WatchId,
    program: Option<ShaderProgram>,
    colorizer: Colorizer,
}

pub struct LiveEditProgram {
    options: LiveEditOptions,
    watcher: Option<ShaderWatcher>,
    history: Vec<LiveSources>,
    error: Option<String>,
    paused: bool,
    resources: Option<LiveResources>,
}

impl LiveEditProgram {
    pub fn new(options: LiveEditOptions) -> Self {
        Self {
            options,
            watcher: None,
            history: Vec::new(),
            error: None,
            paused: false,
            resources: None,
        }
    }

    /// Uses `watcher` instead of an OS-backed one, e.g. a detached watcher
    /// driven by hand.
    pub fn with_watcher(options: LiveEditOptions, watcher: ShaderWatcher) -> Self {
        Self {
            watcher: Some(watcher),
            ..Self::new(options)
        }
    }

    pub fn options(&self) -> &LiveEditOptions {
        &self.options
    }

    /// Successfully compiled revisions, oldest first.
    pub fn history(&self) -> &[LiveSources] {
        &self.history
    }

    /// Message of the latest failed compile or draw, cleared by the next
    /// successful compile.
    pub fn last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn has_program(&self) -> bool {
        self.resources
            .as_ref()
            .is_some_and(|res| res.program.is_some())
    }

    pub fn read_canvas(&self, ctx: &GpuContext) -> Result<RgbaImage> {
        let res = self
            .resources
            .as_ref()
            .ok_or_else(|| anyhow!("live edit program is not loaded"))?;
        res.pipeline.read_pixels(ctx, res.canvas.read)
    }
}

fn record(history: &mut Vec<LiveSources>, sources: Option<(&str, &str)>) {
    let Some((vertex, fragment)) = sources else {
        return;
    };
    if history.len() == HISTORY_LIMIT {
        history.remove(0);
    }
    history.push(LiveSources {
        vertex: vertex.to_string(),
        fragment: fragment.to_string(),
    });
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or(message)
}

impl Program for LiveEditProgram {
    fn name(&self) -> &str {
        "live-edit"
    }

    fn load(&mut self, ctx: &GpuContext, size: Size, commands: &mut CommandChannels) -> Result<()> {
        let size = size.at_least_one();
        let mut pipeline = PassPipeline::new(ctx, "live edit", size);
        let black = RgbaImage::from_pixel(size.width, size.height, Rgba([0, 0, 0, 255]));
        let canvas = pipeline.ping_pong(ctx, "live canvas", &black)?;
        let palettes: Vec<Palette> = std::iter::once(Palette::Rgb)
            .chain(Palette::ALL.into_iter().filter(|palette| *palette != Palette::Rgb))
            .collect();
        let colorizer = Colorizer::new(ctx, commands, &palettes)?;

        let mut watcher = match self.watcher.take() {
            Some(watcher) => watcher,
            None => ShaderWatcher::new()?,
        };
        let (watch, initial) = watcher.register(
            ctx,
            "live edit",
            &self.options.vertex,
            &self.options.fragment,
            &VertexLayout::quad(),
        );
        let program = match initial {
            Some(Ok(program)) => {
                record(&mut self.history, watcher.sources(watch));
                self.error = None;
                self.paused = false;
                Some(program)
            }
            Some(Err(err)) => {
                tracing::warn!(error = %err, "live edit shader failed to compile");
                self.error = Some(err.to_string());
                self.paused = true;
                None
            }
            None => {
                self.error = Some(format!("waiting for {}", self.options.fragment.display()));
                self.paused = true;
                None
            }
        };

        self.resources = Some(LiveResources {
            pipeline,
            canvas,
            watcher,
            watch,
            program,
            colorizer,
        });
        tracing::info!(
            vertex = %self.options.vertex.display(),
            fragment = %self.options.fragment.display(),
            "live edit watching"
        );
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame<'_>, tick: &Tick) -> Result<()> {
        let res = self
            .resources
            .as_mut()
            .ok_or_else(|| anyhow!("live edit program is not loaded"))?;

        if let Some((id, result)) = res.watcher.poll(frame.ctx()) {
            match result {
                Ok(program) => {
                    record(&mut self.history, res.watcher.sources(id));
                    res.program = Some(program);
                    self.error = None;
                    self.paused = false;
                    tracing::info!(revision = self.history.len(), "live edit shader reloaded");
                }
                Err(err) => {
                    tracing::warn!(error = %err, "live edit reload failed, keeping last good shader");
                    self.error = Some(err.to_string());
                    self.paused = true;
                }
            }
        }

        if !self.paused {
            if let Some(program) = res.program.as_mut() {
                let samplers = program.uniforms().layout().samplers().to_vec();
                let uniforms = program.use_program();
                uniforms.apply(&FrameUniforms::from_tick(tick));
                for sampler in &samplers {
                    uniforms.sampler(sampler, 0);
                }
                let stage = Stage::new("live edit", program)
                    .read(res.canvas.read, 0)
                    .write(res.canvas.write);
                match res.pipeline.run(frame, &stage) {
                    Ok(()) => res.canvas.swap(),
                    Err(err) => {
                        tracing::warn!(error = %err, "live edit shader cannot draw");
                        self.error = Some(err.to_string());
                        self.paused = true;
                    }
                }
            }
        }

        res.colorizer.draw(&mut res.pipeline, frame, res.canvas.read)
    }

    fn recolor(&mut self, frame: &mut Frame<'_>) -> Result<()> {
        let res = self
            .resources
            .as_mut()
            .ok_or_else(|| anyhow!("live edit program is not loaded"))?;
        res.colorizer.draw(&mut res.pipeline, frame, res.canvas.read)
    }

    fn resize(&mut self, ctx: &GpuContext, size: Size) -> Result<()> {
        match self.resources.as_mut() {
            Some(res) => res.pipeline.resize(ctx, size),
            None => Err(anyhow!("live edit program is not loaded")),
        }
    }

    fn input(&mut self, event: &InputEvent, commands: &CommandChannels) {
        if let Some(res) = self.resources.as_mut() {
            if res.colorizer.input(event, commands) {
                return;
            }
        }
        if event.released() == Some(Key::Space) && self.error.is_none() {
            self.paused = !self.paused;
        }
    }

    fn status(&self) -> Option<String> {
        if let Some(error) = &self.error {
            return Some(format!("live edit: {}", first_line(error)));
        }
        let paused = if self.paused { " (paused)" } else { "" };
        Some(format!("live edit rev {}{paused}", self.history.len()))
    }

    fn unload(&mut self, _commands: &mut CommandChannels) {
        if let Some(mut res) = self.resources.take() {
            res.watcher.unregister(res.watch);
        }
    }
}

//! Turtle graphics: a pen walking in straight lines and turning on a
//! fixed frame schedule.

use anyhow::{anyhow, Result};
use image::{Rgba, RgbaImage};
use renderer::{
    CommandChannels, Frame, FrameUniforms, GpuContext, InputEvent, Key, Palette, PassPipeline,
    PingPong, Program, ShaderProgram, Size, Stage, Tick,
};

use crate::common::{compile_stage, Colorizer};
use crate::vector::Vector2;

pub const TURTLE_FRAGMENT_GLSL: &str = include_str!("../shaders/turtle.frag");

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Turtle {
    pub position: Vector2,
    pub heading: Vector2,
    /// Pixels per step.
    pub speed: f64,
    pub pen_down: bool,
}

impl Default for Turtle {
    fn default() -> Self {
        Self {
            position: Vector2::default(),
            heading: Vector2::new(0.0, -1.0),
            speed: 1.0,
            pen_down: true,
        }
    }
}

impl Turtle {
    /// Starting pose for a canvas of `size`: horizontally centred, a little
    /// below the middle, heading rotated by 100 degrees.
    pub fn placed(size: Size) -> Self {
        let width = f64::from(size.width);
        let height = f64::from(size.height);
        let distance = width.min(height) * 0.25;
        let mut turtle = Self {
            position: Vector2::new(width / 2.0, height / 2.0 + distance / 4.0),
            ..Self::default()
        };
        turtle.turn(100.0);
        turtle
    }

    pub fn turn(&mut self, degrees: f64) -> Vector2 {
        self.heading = self.heading.turn(degrees);
        self.heading
    }

    /// Moves one step and returns the walked segment.
    pub fn advance(&mut self) -> (Vector2, Vector2) {
        let previous = self.position;
        self.position = previous + self.heading * self.speed;
        (previous, self.position)
    }

    pub fn toggle_pen(&mut self) {
        self.pen_down = !self.pen_down;
    }

    /// Frame periods of the 90 and 100 degree turns on a canvas of `size`.
    pub fn pivots(&self, size: Size) -> (u64, u64) {
        let distance = f64::from(size.width.min(size.height)) * 0.15;
        let first = ((distance * self.speed) as u64).max(1);
        (first, (first / 2).max(1))
    }

    /// Advances for frame `frame` (counted from one) and applies any turns
    /// that fall on it.
    pub fn step(&mut self, frame: u64, size: Size) -> (Vector2, Vector2) {
        let segment = self.advance();
        let (first, second) = self.pivots(size);
        if frame % first == 0 {
            self.turn(90.0);
        }
        if frame % second == 0 {
            self.turn(100.0);
        }
        segment
    }
}

struct TurtleResources {
    pipeline: PassPipeline,
    trail: PingPong,
    turtle: ShaderProgram,
    colorizer: Colorizer,
}

pub struct TurtleProgram {
    turtle: Turtle,
    paused: bool,
    resources: Option<TurtleResources>,
}

impl TurtleProgram {
    pub fn new() -> Self {
        Self {
            turtle: Turtle::default(),
            paused: false,
            resources: None,
        }
    }

    pub fn turtle(&self) -> &Turtle {
        &self.turtle
    }

    fn loaded_mut(&mut self) -> Result<&mut TurtleResources> {
        self.resources
            .as_mut()
            .ok_or_else(|| anyhow!("turtle program is not loaded"))
    }
}

impl Default for TurtleProgram {
    fn default() -> Self {
        Self::new()
    }
}

impl Program for TurtleProgram {
    fn name(&self) -> &str {
        "turtle"
    }

    fn load(&mut self, ctx: &GpuContext, size: Size, commands: &mut CommandChannels) -> Result<()> {
        let size = size.at_least_one();
        let mut pipeline = PassPipeline::new(ctx, "turtle", size);
        let black = RgbaImage::from_pixel(size.width, size.height, Rgba([0, 0, 0, 255]));
        let trail = pipeline.ping_pong(ctx, "turtle trail", &black)?;
        let turtle = compile_stage(
            ctx,
            "turtle",
            TURTLE_FRAGMENT_GLSL,
            &["trail", "a", "b", "w", "pen"],
        )?;
        let colorizer = Colorizer::new(ctx, commands, &Palette::ALL)?;

        self.turtle = Turtle::placed(size);
        self.resources = Some(TurtleResources {
            pipeline,
            trail,
            turtle,
            colorizer,
        });
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame<'_>, tick: &Tick) -> Result<()> {
        if self.paused {
            let res = self.loaded_mut()?;
            return res.colorizer.draw(&mut res.pipeline, frame, res.trail.read);
        }

        let (from, to) = self.turtle.step(tick.frame + 1, tick.size);
        let pen = i32::from(self.turtle.pen_down);
        let width = (tick.seconds.sin() * 6.0).max(2.0);

        let res = self.loaded_mut()?;
        res.turtle
            .use_program()
            .apply(&FrameUniforms::from_tick(tick))
            .uniform("a", [from.x as f32, from.y as f32])
            .uniform("b", [to.x as f32, to.y as f32])
            .uniform("w", width)
            .uniform("pen", pen);
        res.pipeline.run(
            frame,
            &Stage::new("turtle", &res.turtle)
                .read(res.trail.read, 0)
                .write(res.trail.write),
        )?;
        res.trail.swap();
        res.colorizer.draw(&mut res.pipeline, frame, res.trail.read)
    }

    fn recolor(&mut self, frame: &mut Frame<'_>) -> Result<()> {
        let res = self.loaded_mut()?;
        res.colorizer.draw(&mut res.pipeline, frame, res.trail.read)
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
        match event.released() {
            Some(Key::Space) => self.paused = !self.paused,
            Some(Key::Char('p')) => self.turtle.toggle_pen(),
            _ => {}
        }
    }

    fn unload(&mut self, _commands: &mut CommandChannels) {
        self.resources = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Vector2, b: Vector2) -> bool {
        (a - b).length() < 1e-9
    }

    #[test]
    fn advance_walks_along_heading() {
        let mut turtle = Turtle {
            position: Vector2::new(10.0, 10.0),
            heading: Vector2::new(1.0, 0.0),
            speed: 3.0,
            pen_down: true,
        };
        let (from, to) = turtle.advance();
        assert_eq!(from, Vector2::new(10.0, 10.0));
        assert_eq!(to, Vector2::new(13.0, 10.0));
    }

    #[test]
    fn placement_is_centred_below_middle() {
        let turtle = Turtle::placed(Size::new(400, 200));
        assert!(close(turtle.position, Vector2::new(200.0, 112.5)));
        assert!(close(turtle.heading, Vector2::new(0.0, -1.0).turn(100.0)));
    }

    #[test]
    fn pivots_scale_with_canvas() {
        let turtle = Turtle::default();
        assert_eq!(turtle.pivots(Size::new(800, 600)), (90, 45));
        assert_eq!(turtle.pivots(Size::new(4, 4)), (1, 1));
    }

    #[test]
    fn turns_fall_on_pivot_frames() {
        let size = Size::new(800, 600);
        let mut turtle = Turtle {
            heading: Vector2::new(1.0, 0.0),
            ..Turtle::default()
        };
        for frame in 1..45 {
            turtle.step(frame, size);
        }
        assert!(close(turtle.heading, Vector2::new(1.0, 0.0)));
        turtle.step(45, size);
        assert!(close(turtle.heading, Vector2::new(1.0, 0.0).turn(100.0)));
        for frame in 46..=90 {
            turtle.step(frame, size);
        }
        // Frame 90 turns by 90 and by 100 degrees on top of frame 45.
        assert!(close(turtle.heading, Vector2::new(1.0, 0.0).turn(290.0)));
    }

    #[test]
    fn pen_toggles() {
        let mut turtle = Turtle::default();
        turtle.toggle_pen();
        assert!(!turtle.pen_down);
        turtle.toggle_pen();
        assert!(turtle.pen_down);
    }
}

//! Balls bouncing around the window, stamped into a fading trail.

use anyhow::{anyhow, Result};
use image::{Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use renderer::{
    CommandChannels, Frame, FrameUniforms, GpuContext, InputEvent, Key, Palette, PassPipeline,
    PingPong, Program, ShaderProgram, Size, Stage, Tick,
};

use crate::common::{compile_stage, Colorizer};
use crate::vector::Vector2;

pub const PONG_FRAGMENT_GLSL: &str = include_str!("../shaders/pong.frag");
/// Matches the array length in the pong shader.
pub const BALL_COUNT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ball {
    pub position: Vector2,
    pub heading: Vector2,
    pub speed: f64,
    pub size: f64,
    bounds: Size,
}

impl Ball {
    /// Random heading, speed in [1, 11) and size in [3, 15).
    pub fn random(rng: &mut impl Rng, bounds: Size) -> Self {
        let heading = Vector2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)).normalize();
        let mut ball = Self {
            position: Vector2::default(),
            heading: if heading.length() > 0.0 {
                heading
            } else {
                Vector2::new(1.0, 0.0)
            },
            speed: rng.gen_range(1.0..11.0),
            size: rng.gen_range(3.0..15.0),
            bounds,
        };
        ball.place(rng, bounds);
        ball
    }

    pub fn new(position: Vector2, heading: Vector2, speed: f64, size: f64, bounds: Size) -> Self {
        Self {
            position,
            heading: heading.normalize(),
            speed,
            size,
            bounds,
        }
    }

    /// Drops the ball somewhere inside `bounds`.
    pub fn place(&mut self, rng: &mut impl Rng, bounds: Size) {
        self.bounds = bounds;
        self.position = Vector2::new(
            rng.gen::<f64>() * f64::from(bounds.width),
            rng.gen::<f64>() * f64::from(bounds.height),
        );
    }

    /// Moves one step, reflecting off the first wall the step would cross.
    pub fn advance(&mut self) {
        let width = f64::from(self.bounds.width);
        let height = f64::from(self.bounds.height);
        let next = self.position + self.heading * self.speed;

        // A wall only reflects a ball moving towards it.
        let heading = self.heading;
        let normal = if next.x <= self.size && heading.x < 0.0 {
            Some(Vector2::new(1.0, 0.0))
        } else if next.x >= width - self.size && heading.x > 0.0 {
            Some(Vector2::new(-1.0, 0.0))
        } else if next.y <= self.size && heading.y < 0.0 {
            Some(Vector2::new(0.0, 1.0))
        } else if next.y >= height - self.size && heading.y > 0.0 {
            Some(Vector2::new(0.0, -1.0))
        } else {
            None
        };

        self.position = match normal {
            Some(normal) => {
                self.heading = self.heading.reflect(normal).normalize();
                self.position + self.heading * self.speed
            }
            None => next,
        };
    }
}

struct PongResources {
    pipeline: PassPipeline,
    trail: PingPong,
    pong: ShaderProgram,
    colorizer: Colorizer,
}

pub struct PongProgram {
    rng: StdRng,
    balls: Vec<Ball>,
    paused: bool,
    resources: Option<PongResources>,
}

impl PongProgram {
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            },
            balls: Vec::new(),
            paused: false,
            resources: None,
        }
    }

    pub fn balls(&self) -> &[Ball] {
        &self.balls
    }

    fn loaded_mut(&mut self) -> Result<&mut PongResources> {
        self.resources
            .as_mut()
            .ok_or_else(|| anyhow!("pong program is not loaded"))
    }
}

impl Program for PongProgram {
    fn name(&self) -> &str {
        "pong"
    }

    fn load(&mut self, ctx: &GpuContext, size: Size, commands: &mut CommandChannels) -> Result<()> {
        let size = size.at_least_one();
        let mut pipeline = PassPipeline::new(ctx, "pong", size);
        let black = RgbaImage::from_pixel(size.width, size.height, Rgba([0, 0, 0, 255]));
        let trail = pipeline.ping_pong(ctx, "pong trail", &black)?;
        let pong = compile_stage(
            ctx,
            "pong",
            PONG_FRAGMENT_GLSL,
            &["trail", "positions", "sizes", "count"],
        )?;
        let colorizer = Colorizer::new(ctx, commands, &Palette::ALL)?;

        let rng = &mut self.rng;
        self.balls = (0..BALL_COUNT).map(|_| Ball::random(rng, size)).collect();
        self.resources = Some(PongResources {
            pipeline,
            trail,
            pong,
            colorizer,
        });
        Ok(())
    }

    fn render(&mut self, frame: &mut Frame<'_>, tick: &Tick) -> Result<()> {
        if self.paused {
            let res = self.loaded_mut()?;
            return res.colorizer.draw(&mut res.pipeline, frame, res.trail.read);
        }

        for ball in &mut self.balls {
            ball.advance();
        }
        let positions: Vec<[f32; 2]> = self
            .balls
            .iter()
            .map(|ball| [ball.position.x as f32, ball.position.y as f32])
            .collect();
        let sizes: Vec<f32> = self.balls.iter().map(|ball| ball.size as f32).collect();
        let count = self.balls.len().min(BALL_COUNT) as i32;

        let res = self.loaded_mut()?;
        res.pong
            .use_program()
            .apply(&FrameUniforms::from_tick(tick))
            .uniform("positions", positions)
            .uniform("sizes", sizes)
            .uniform("count", count);
        res.pipeline.run(
            frame,
            &Stage::new("pong", &res.pong)
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
        self.loaded_mut()?.pipeline.resize(ctx, size)?;
        let size = size.at_least_one();
        for ball in &mut self.balls {
            ball.place(&mut self.rng, size);
        }
        Ok(())
    }

    fn input(&mut self, event: &InputEvent, commands: &CommandChannels) {
        if let Some(res) = self.resources.as_mut() {
            if res.colorizer.input(event, commands) {
                return;
            }
        }
        if event.released() == Some(Key::Space) {
            self.paused = !self.paused;
        }
    }

    fn unload(&mut self, _commands: &mut CommandChannels) {
        self.resources = None;
        self.balls.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: Size = Size::new(200, 100);

    #[test]
    fn ball_moves_along_heading() {
        let mut ball = Ball::new(Vector2::new(100.0, 50.0), Vector2::new(1.0, 0.0), 2.0, 5.0, BOUNDS);
        ball.advance();
        assert_eq!(ball.position, Vector2::new(102.0, 50.0));
    }

    #[test]
    fn ball_reflects_off_left_wall() {
        let mut ball = Ball::new(Vector2::new(8.0, 50.0), Vector2::new(-1.0, 0.0), 4.0, 5.0, BOUNDS);
        ball.advance();
        assert_eq!(ball.heading, Vector2::new(1.0, 0.0));
        assert_eq!(ball.position, Vector2::new(12.0, 50.0));
    }

    #[test]
    fn ball_reflects_off_bottom_wall_keeping_x() {
        let heading = Vector2::new(1.0, 1.0).normalize();
        let mut ball = Ball::new(Vector2::new(100.0, 93.0), heading, 4.0, 5.0, BOUNDS);
        ball.advance();
        assert!(ball.heading.x > 0.0);
        assert!(ball.heading.y < 0.0);
        assert!(ball.position.y < 93.0);
    }

    #[test]
    fn random_balls_stay_in_spec_ranges() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let ball = Ball::random(&mut rng, BOUNDS);
            assert!((1.0..11.0).contains(&ball.speed));
            assert!((3.0..15.0).contains(&ball.size));
            assert!((ball.heading.length() - 1.0).abs() < 1e-9);
            assert!(ball.position.x <= 200.0 && ball.position.y <= 100.0);
        }
    }

    #[test]
    fn balls_stay_inside_over_time() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut ball = Ball::random(&mut rng, BOUNDS);
        ball.position = Vector2::new(100.0, 50.0);
        for _ in 0..1_000 {
            ball.advance();
            assert!(ball.position.x > -ball.speed && ball.position.x < 200.0 + ball.speed);
            assert!(ball.position.y > -ball.speed && ball.position.y < 100.0 + ball.speed);
        }
    }
}

//! Multi-stage compute passes over ping-ponged state textures.
//!
//! A [`PassPipeline`] owns every live texture of a program variant, one
//! shared framebuffer and the full-screen quad. Each [`Stage`] names its
//! sources (texture + unit) and its destination; running a stage binds the
//! framebuffer to the destination, activates the sources, draws and pops the
//! framebuffer again. Because the pipeline owns all textures, a resize
//! reaches all of them, and every stage checks that the textures it touches
//! still share the pipeline extent.
//!
//! A stage may never sample the texture it writes. Iterative updates use a
//! [`PingPong`] pair and swap roles after the advancing stage.

use anyhow::{Context, Result};
use image::RgbaImage;

use crate::error::PassError;
use crate::gpu::{
    Frame, Framebuffer, GpuContext, ShaderProgram, Texture, UniformGroup, UniformState,
    VertexBuffer,
};
use crate::runtime::Tick;
use crate::types::{CursorState, Size};

/// Vertex stage matching [`VertexBuffer::quad`].
pub const QUAD_VERTEX_GLSL: &str = include_str!("../shaders/quad.vert");
/// Final pass mapping a state channel onto a [`Palette`].
pub const COLORIZE_FRAGMENT_GLSL: &str = include_str!("../shaders/colorize.frag");

/// Index of a texture owned by a [`PassPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureKey(usize);

/// Read/write roles of a double-buffered state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingPong {
    pub read: TextureKey,
    pub write: TextureKey,
}

impl PingPong {
    /// Exchanges roles; no texel data moves.
    pub fn swap(&mut self) {
        std::mem::swap(&mut self.read, &mut self.write);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Screen,
    Textures,
}

/// One draw of a compute pipeline.
pub struct Stage<'p> {
    label: &'p str,
    program: &'p ShaderProgram,
    reads: Vec<(TextureKey, u32)>,
    writes: Vec<TextureKey>,
    target: Target,
}

impl<'p> Stage<'p> {
    pub fn new(label: &'p str, program: &'p ShaderProgram) -> Self {
        Self {
            label,
            program,
            reads: Vec::new(),
            writes: Vec::new(),
            target: Target::Textures,
        }
    }

    /// Activates `key` on texture `unit` for this draw.
    pub fn read(mut self, key: TextureKey, unit: u32) -> Self {
        self.reads.push((key, unit));
        self
    }

    /// Adds `key` as the next color attachment.
    pub fn write(mut self, key: TextureKey) -> Self {
        self.writes.push(key);
        self.target = Target::Textures;
        self
    }

    /// Draws into the frame's current target (the screen unless the caller
    /// bound a framebuffer).
    pub fn to_screen(mut self) -> Self {
        self.writes.clear();
        self.target = Target::Screen;
        self
    }

    pub fn label(&self) -> &str {
        self.label
    }
}

pub struct PassPipeline {
    label: String,
    size: Size,
    textures: Vec<Texture>,
    framebuffer: Framebuffer,
    quad: VertexBuffer,
}

impl PassPipeline {
    pub fn new(ctx: &GpuContext, label: impl Into<String>, size: Size) -> Self {
        let label = label.into();
        Self {
            framebuffer: Framebuffer::new(format!("{label} framebuffer")),
            label,
            size: size.at_least_one(),
            textures: Vec::new(),
            quad: VertexBuffer::quad(ctx),
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn quad(&self) -> &VertexBuffer {
        &self.quad
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Takes ownership of `texture`, which must match the pipeline extent.
    pub fn add_texture(&mut self, texture: Texture) -> Result<TextureKey, PassError> {
        self.check_size(texture.label(), &texture)?;
        self.textures.push(texture);
        Ok(TextureKey(self.textures.len() - 1))
    }

    pub fn add_blank(&mut self, ctx: &GpuContext, label: &str) -> Result<TextureKey> {
        let texture = Texture::blank(ctx, label, self.size)?;
        Ok(self.add_texture(texture)?)
    }

    pub fn add_image(&mut self, ctx: &GpuContext, label: &str, image: &RgbaImage) -> Result<TextureKey> {
        let texture = Texture::from_image(ctx, label, image)?;
        self.add_texture(texture)
            .with_context(|| format!("seed image for `{label}` does not match {}", self.size))
    }

    /// Creates a double-buffered state whose read side starts as `seed`.
    pub fn ping_pong(&mut self, ctx: &GpuContext, label: &str, seed: &RgbaImage) -> Result<PingPong> {
        let read = self.add_image(ctx, &format!("{label} a"), seed)?;
        let write = self.add_blank(ctx, &format!("{label} b"))?;
        Ok(PingPong { read, write })
    }

    pub fn texture(&self, key: TextureKey) -> Result<&Texture, PassError> {
        self.textures.get(key.0).ok_or_else(|| self.unknown(key))
    }

    /// Overwrites `key` with `image`, resampling it to the pipeline extent.
    pub fn write_image(&mut self, ctx: &GpuContext, key: TextureKey, image: &RgbaImage) -> Result<()> {
        let image = crate::gpu::resample(image, self.size);
        let Some(texture) = self.textures.get_mut(key.0) else {
            return Err(self.unknown(key).into());
        };
        texture.write_image(ctx, &image)
    }

    pub fn read_pixels(&self, ctx: &GpuContext, key: TextureKey) -> Result<RgbaImage> {
        self.texture(key)?.read_pixels(ctx)
    }

    /// Resizes every owned texture to `size`. Nothing changes unless every
    /// texture could be read back and reallocated.
    pub fn resize(&mut self, ctx: &GpuContext, size: Size) -> Result<()> {
        let size = size.at_least_one();
        if size == self.size {
            return Ok(());
        }
        let resized = self
            .textures
            .iter()
            .map(|texture| texture.resampled(ctx, size))
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("failed to resize pipeline `{}` to {size}", self.label))?;
        self.textures = resized;
        tracing::debug!(
            pipeline = %self.label,
            textures = self.textures.len(),
            from = %self.size,
            to = %size,
            "resized pipeline"
        );
        self.size = size;
        Ok(())
    }

    /// Encodes `stage` into `frame`.
    pub fn run(&mut self, frame: &mut Frame<'_>, stage: &Stage<'_>) -> Result<(), PassError> {
        for (key, unit) in &stage.reads {
            let texture = self.texture(*key)?;
            self.check_size(stage.label, texture)?;
            frame.activate(texture, *unit)?;
        }

        match stage.target {
            Target::Screen => frame.draw(stage.program, &self.quad),
            Target::Textures => {
                self.framebuffer.detach_all();
                for (slot, key) in stage.writes.iter().enumerate() {
                    let texture = self.textures.get(key.0).ok_or_else(|| self.unknown(*key))?;
                    self.check_size(stage.label, texture)?;
                    self.framebuffer.attach(slot, texture);
                }
                frame.bind_framebuffer(&self.framebuffer)?;
                let result = frame.draw(stage.program, &self.quad);
                frame.unbind_framebuffer();
                result
            }
        }
    }

    fn unknown(&self, key: TextureKey) -> PassError {
        PassError::UnknownTexture {
            pipeline: self.label.clone(),
            index: key.0,
        }
    }

    fn check_size(&self, stage: &str, texture: &Texture) -> Result<(), PassError> {
        if texture.size() == self.size {
            return Ok(());
        }
        Err(PassError::SizeMismatch {
            stage: stage.to_string(),
            expected: (self.size.width, self.size.height),
            found: (texture.size().width, texture.size().height),
        })
    }
}

/// Per-frame values shared by every stage: `time`, `frame`, `resolution`
/// (also published as `scale`) and `mouse`. Only names a program declares
/// are written.
#[derive(Debug, Clone, Copy)]
pub struct FrameUniforms {
    pub time: f32,
    pub frame: u64,
    pub resolution: Size,
    pub mouse: CursorState,
}

impl FrameUniforms {
    pub fn from_tick(tick: &Tick) -> Self {
        Self {
            time: tick.seconds,
            frame: tick.frame,
            resolution: tick.size,
            mouse: tick.cursor,
        }
    }
}

impl UniformGroup for FrameUniforms {
    fn apply_to(&self, uniforms: &mut UniformState) {
        uniforms
            .optional_uniform("time", self.time)
            .optional_uniform("frame", self.frame as i32)
            .optional_uniform("resolution", self.resolution.as_f32())
            .optional_uniform("scale", self.resolution.as_f32())
            .optional_uniform("mouse", self.mouse.as_uniform());
    }
}

/// Color ramps available to the colorize pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Palette {
    Viridis,
    Inferno,
    Magma,
    Plasma,
    Cividis,
    Turbo,
    Sinebow,
    /// Raw red, green and blue channels.
    Rgb,
    /// Raw channels including alpha.
    Rgba,
}

const fn hex(rgb: u32) -> [f32; 4] {
    [
        ((rgb >> 16) & 0xff) as f32 / 255.0,
        ((rgb >> 8) & 0xff) as f32 / 255.0,
        (rgb & 0xff) as f32 / 255.0,
        1.0,
    ]
}

const VIRIDIS: [[f32; 4]; 5] = [hex(0x440154), hex(0x3b528b), hex(0x21918c), hex(0x5ec962), hex(0xfde725)];
const INFERNO: [[f32; 4]; 5] = [hex(0x000004), hex(0x57106e), hex(0xbc3754), hex(0xf98e09), hex(0xfcffa4)];
const MAGMA: [[f32; 4]; 5] = [hex(0x000004), hex(0x51127c), hex(0xb73779), hex(0xfc8961), hex(0xfcfdbf)];
const PLASMA: [[f32; 4]; 5] = [hex(0x0d0887), hex(0x7e03a8), hex(0xcc4778), hex(0xf89540), hex(0xf0f921)];
const CIVIDIS: [[f32; 4]; 5] = [hex(0x00224e), hex(0x414d6b), hex(0x7c7b78), hex(0xbcaf6f), hex(0xfee838)];
const TURBO: [[f32; 4]; 5] = [hex(0x30123b), hex(0x28bbec), hex(0xa2fc3c), hex(0xfb8022), hex(0x7a0403)];
const SINEBOW: [[f32; 4]; 5] = [
    [0.0, 0.75, 0.75, 1.0],
    [0.5, 0.933, 0.067, 1.0],
    [1.0, 0.25, 0.25, 1.0],
    [0.5, 0.067, 0.933, 1.0],
    [0.0, 0.75, 0.75, 1.0],
];
const GRAYSCALE: [[f32; 4]; 5] = [hex(0x000000), hex(0x404040), hex(0x808080), hex(0xbfbfbf), hex(0xffffff)];

impl Palette {
    pub const ALL: [Palette; 9] = [
        Palette::Viridis,
        Palette::Inferno,
        Palette::Magma,
        Palette::Plasma,
        Palette::Cividis,
        Palette::Turbo,
        Palette::Sinebow,
        Palette::Rgb,
        Palette::Rgba,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Palette::Viridis => "viridis",
            Palette::Inferno => "inferno",
            Palette::Magma => "magma",
            Palette::Plasma => "plasma",
            Palette::Cividis => "cividis",
            Palette::Turbo => "turbo",
            Palette::Sinebow => "sinebow",
            Palette::Rgb => "rgb",
            Palette::Rgba => "rgba",
        }
    }

    pub fn stops(&self) -> [[f32; 4]; 5] {
        match self {
            Palette::Viridis => VIRIDIS,
            Palette::Inferno => INFERNO,
            Palette::Magma => MAGMA,
            Palette::Plasma => PLASMA,
            Palette::Cividis => CIVIDIS,
            Palette::Turbo => TURBO,
            Palette::Sinebow => SINEBOW,
            Palette::Rgb | Palette::Rgba => GRAYSCALE,
        }
    }

    fn mode(&self) -> i32 {
        match self {
            Palette::Rgb => 1,
            Palette::Rgba => 2,
            _ => 0,
        }
    }

    /// Uniforms for the colorize pass, reading intensity from `channel`.
    pub fn uniforms(&self, channel: usize) -> ColorizeUniforms {
        ColorizeUniforms {
            palette: *self,
            channel: channel.min(3),
        }
    }
}

/// Palette selection plus the channel index the ramp reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorizeUniforms {
    pub palette: Palette,
    pub channel: usize,
}

impl UniformGroup for ColorizeUniforms {
    fn apply_to(&self, uniforms: &mut UniformState) {
        uniforms
            .uniform("palette", self.palette.stops().to_vec())
            .uniform("index", self.channel as i32)
            .uniform("mode", self.palette.mode());
    }
}

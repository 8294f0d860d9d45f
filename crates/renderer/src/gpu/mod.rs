//! GPU resources and the per-frame recording state.
//!
//! - `context` owns instance/adapter/device wiring and, when a window is
//!   present, the surface plus the blit that presents the screen texture.
//! - `texture` and `framebuffer` are the data buffers and render targets the
//!   compute passes shuffle between.
//! - `pipeline` compiles prepared GLSL into render pipelines and carries the
//!   program's uniform state.
//! - `uniforms` mirrors each program's std140 block on the CPU.
//! - `frame` replaces process-wide binding globals: the unit table and the
//!   framebuffer stack live on the frame being recorded, so independent
//!   pipelines cannot observe each other's bindings.

mod buffer;
mod context;
mod frame;
mod framebuffer;
mod pipeline;
mod texture;
mod uniforms;

pub use buffer::{VertexAttribute, VertexBuffer, VertexLayout, POSITION_ATTRIBUTE, TEXCOORD_ATTRIBUTE};
pub use context::{AdapterProfile, Display, GpuContext};
pub use frame::{Frame, MAX_UNITS};
pub use framebuffer::Framebuffer;
pub use pipeline::{NagaCompiler, ProgramId, ShaderCompiler, ShaderProgram};
pub use texture::{gradient_image, noise_image, resample, Handle, Texture, TEXTURE_FORMAT};
pub use uniforms::{
    ScalarType, UniformGroup, UniformLayout, UniformShape, UniformSlot, UniformState, UniformValue,
};

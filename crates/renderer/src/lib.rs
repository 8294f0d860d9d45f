//! Renderer crate for the visuals playground.
//!
//! The crate glues the preview window, the `wgpu` render pipeline and the
//! live-reload machinery together. The overall flow is:
//!
//! ```text
//!   visuals binary
//!          │ WindowConfig + ProgramCatalog
//!          ▼
//!   WindowRuntime ──▶ winit event loop ──▶ Host::tick()
//!                                              │
//!            CommandChannels (capture/recolor) ┤
//!                                              ▼
//!                              Program::render(Frame) ──▶ PassPipeline stages
//!                                              │
//!                                              └─▶ screen texture ──▶ Display::present
//! ```
//!
//! `Host` owns the GPU context, the off-screen screen texture and the active
//! [`Program`]. Programs describe their compute passes as [`Stage`]s run
//! through a [`PassPipeline`], which owns every texture the program keeps
//! alive. Fragment programs are GLSL sources rewritten at runtime into Vulkan
//! GLSL, so they can be hot-reloaded by [`ShaderWatcher`] without touching the
//! running program on failure.

pub mod commands;
pub mod compile;
pub mod cycle;
pub mod error;
pub mod gpu;
pub mod host;
pub mod passes;
pub mod runtime;
pub mod types;
pub mod watcher;
pub mod window;

pub use commands::{CommandChannels, CommandKind, CommandSender, Issued};
pub use cycle::Cycle;
pub use error::{CommandError, CompileError, FramebufferError, PassError, UniformError};
pub use gpu::{
    Display, Frame, Framebuffer, GpuContext, NagaCompiler, ShaderCompiler, ShaderProgram, Texture,
    UniformGroup, UniformState, UniformValue, VertexBuffer, VertexLayout,
};
pub use host::{
    binding_for, CatalogEntry, Host, HostAction, HostBinding, Program, ProgramCatalog,
    ProgramFactory, TickOutcome,
};
pub use passes::{
    ColorizeUniforms, FrameUniforms, Palette, PassPipeline, PingPong, Stage, TextureKey,
    COLORIZE_FRAGMENT_GLSL, QUAD_VERTEX_GLSL,
};
pub use runtime::{FrameClock, FramePacer, FrameStats, PacingMode, Tick};
pub use types::{
    CursorState, InputEvent, Key, KeyState, Modifiers, MouseButton, MouseDelta, Size,
};
pub use watcher::{ChangeFeed, ShaderWatcher, WatchId};
pub use window::{WindowConfig, WindowRuntime, WindowSignal};

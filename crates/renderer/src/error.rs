use std::fmt;
use std::path::PathBuf;

use crate::commands::CommandKind;

/// Shader stage a diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Vertex,
    Fragment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Vertex => f.write_str("vertex"),
            Stage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Failure to turn a vertex/fragment source pair into a runnable program.
///
/// Every variant carries text meant for the user; the live program is never
/// touched when one of these is returned.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    #[error("failed to read shader source {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
    #[error("{stage} shader failed to parse:\n{message}")]
    Parse { stage: Stage, message: String },
    #[error("{stage} shader failed validation: {message}")]
    Validation { stage: Stage, message: String },
    #[error("failed to link program: {0}")]
    Link(String),
    #[error("GPU rejected program: {0}")]
    Device(String),
}

impl CompileError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// A framebuffer that cannot be drawn into. Treated as a fatal setup error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramebufferError {
    #[error("framebuffer {label} is incomplete: no color attachment at slot {slot}")]
    Incomplete { label: String, slot: usize },
    #[error(
        "framebuffer {label} attachments disagree on size: slot 0 is {expected:?}, slot {slot} is {found:?}"
    )]
    SizeMismatch {
        label: String,
        slot: usize,
        expected: (u32, u32),
        found: (u32, u32),
    },
}

/// Reasons a single draw could not be encoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PassError {
    #[error(transparent)]
    Framebuffer(#[from] FramebufferError),
    #[error("sampler `{sampler}` reads texture unit {unit}, but nothing is bound there")]
    UnboundUnit { sampler: String, unit: u32 },
    #[error("texture unit {unit} is out of range (max {max})")]
    UnitOutOfRange { unit: u32, max: u32 },
    #[error("sampler `{sampler}` reads the texture the pass is writing to")]
    FeedbackLoop { sampler: String },
    #[error("program `{program}` writes {outputs} color outputs but the target has {attachments}")]
    AttachmentCount {
        program: String,
        outputs: usize,
        attachments: usize,
    },
    #[error("program `{program}` was compiled for a different vertex layout than the buffer provides")]
    LayoutMismatch { program: String },
    #[error("program `{program}` targets {expected:?} but the render target is {found:?}")]
    FormatMismatch {
        program: String,
        expected: wgpu::TextureFormat,
        found: wgpu::TextureFormat,
    },
    #[error("texture {index} does not belong to pipeline `{pipeline}`")]
    UnknownTexture { pipeline: String, index: usize },
    #[error("stage `{stage}` texture is {found:?} but the pipeline extent is {expected:?}")]
    SizeMismatch {
        stage: String,
        expected: (u32, u32),
        found: (u32, u32),
    },
}

/// Misuse of the out-of-band command channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("command {0} is not registered")]
    NotRegistered(CommandKind),
    #[error("command {0} is already registered")]
    AlreadyRegistered(CommandKind),
}

/// Raised by debug-mode uniform validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UniformError {
    #[error("program `{program}` does not expose uniforms: {}", names.join(", "))]
    Unresolved { program: String, names: Vec<String> },
}

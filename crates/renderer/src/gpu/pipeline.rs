use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::compile::{create_module, prepare_program, PreparedProgram};
use crate::error::{CompileError, Stage};

use super::buffer::VertexLayout;
use super::context::GpuContext;
use super::texture::TEXTURE_FORMAT;
use super::uniforms::UniformState;

static NEXT_PROGRAM: AtomicU64 = AtomicU64::new(1);

/// Identity of a compiled program. A recompile always yields a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(u64);

/// Turns a vertex/fragment source pair into something runnable.
///
/// [`GpuContext`] produces real [`ShaderProgram`]s; [`NagaCompiler`] stops
/// after CPU-side validation, which is enough to drive the watcher without
/// a GPU.
pub trait ShaderCompiler {
    type Output;

    fn compile_program(
        &self,
        label: &str,
        vertex: &str,
        fragment: &str,
        layout: &VertexLayout,
    ) -> Result<Self::Output, CompileError>;
}

impl ShaderCompiler for GpuContext {
    type Output = ShaderProgram;

    fn compile_program(
        &self,
        label: &str,
        vertex: &str,
        fragment: &str,
        layout: &VertexLayout,
    ) -> Result<ShaderProgram, CompileError> {
        ShaderProgram::compile_named(self, label, vertex, fragment, layout)
    }
}

/// Validation-only compiler.
#[derive(Debug, Clone, Copy, Default)]
pub struct NagaCompiler;

impl ShaderCompiler for NagaCompiler {
    type Output = PreparedProgram;

    fn compile_program(
        &self,
        _label: &str,
        vertex: &str,
        fragment: &str,
        layout: &VertexLayout,
    ) -> Result<PreparedProgram, CompileError> {
        prepare_program(vertex, fragment, layout)
    }
}

/// A linked vertex + fragment pipeline with its uniform interface.
///
/// Compilation is all-or-nothing: sources are rewritten and validated on the
/// CPU, then the GPU objects are created inside a validation error scope. A
/// failure at any step returns an error and creates nothing the caller holds,
/// so replacing a live program is just assigning the new value on success.
pub struct ShaderProgram {
    id: ProgramId,
    label: String,
    pipeline: wgpu::RenderPipeline,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    vertex_layout: VertexLayout,
    outputs: usize,
    uniforms: UniformState,
}

impl ShaderProgram {
    pub fn compile(
        ctx: &GpuContext,
        vertex: &str,
        fragment: &str,
        layout: &VertexLayout,
    ) -> Result<Self, CompileError> {
        Self::compile_named(ctx, "program", vertex, fragment, layout)
    }

    pub fn compile_named(
        ctx: &GpuContext,
        label: &str,
        vertex: &str,
        fragment: &str,
        layout: &VertexLayout,
    ) -> Result<Self, CompileError> {
        let prepared = prepare_program(vertex, fragment, layout)?;
        let device = &ctx.device;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let vertex_module = create_module(device, &format!("{label} vertex"), Stage::Vertex, &prepared.vertex);
        let fragment_module = create_module(
            device,
            &format!("{label} fragment"),
            Stage::Fragment,
            &prepared.fragment,
        );

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let texture_entries = texture_layout_entries(prepared.uniforms.samplers().len());
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture layout"),
            entries: &texture_entries,
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let attributes = layout.wgpu_attributes();
        let buffers = [wgpu::VertexBufferLayout {
            array_stride: layout.stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &attributes,
        }];
        let targets: Vec<Option<wgpu::ColorTargetState>> = (0..prepared.outputs)
            .map(|_| {
                Some(wgpu::ColorTargetState {
                    format: TEXTURE_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: &buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("main"),
                targets: &targets,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
            cache: None,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(CompileError::Device(err.to_string()));
        }

        let uniforms = UniformState::new(label, Arc::new(prepared.uniforms));
        tracing::debug!(
            program = label,
            outputs = prepared.outputs,
            samplers = uniforms.layout().samplers().len(),
            uniform_bytes = uniforms.layout().size(),
            "compiled shader program"
        );

        Ok(Self {
            id: ProgramId(NEXT_PROGRAM.fetch_add(1, Ordering::Relaxed)),
            label: label.to_string(),
            pipeline,
            uniform_layout,
            texture_layout,
            vertex_layout: layout.clone(),
            outputs: prepared.outputs,
            uniforms,
        })
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Number of color attachments a draw with this program must target.
    pub fn outputs(&self) -> usize {
        self.outputs
    }

    pub fn vertex_layout(&self) -> &VertexLayout {
        &self.vertex_layout
    }

    /// Selects the program for configuration; uniforms set here are used by
    /// the next draw.
    pub fn use_program(&mut self) -> &mut UniformState {
        &mut self.uniforms
    }

    pub fn uniforms(&self) -> &UniformState {
        &self.uniforms
    }

    pub(crate) fn pipeline(&self) -> &wgpu::RenderPipeline {
        &self.pipeline
    }

    pub(crate) fn uniform_layout(&self) -> &wgpu::BindGroupLayout {
        &self.uniform_layout
    }

    pub(crate) fn texture_layout(&self) -> &wgpu::BindGroupLayout {
        &self.texture_layout
    }
}

fn texture_layout_entries(samplers: usize) -> Vec<wgpu::BindGroupLayoutEntry> {
    let mut entries = Vec::with_capacity(samplers * 2);
    for index in 0..samplers as u32 {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: index * 2 + 1,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_entries_pair_textures_with_samplers() {
        let entries = texture_layout_entries(2);
        let bindings: Vec<u32> = entries.iter().map(|entry| entry.binding).collect();
        assert_eq!(bindings, vec![0, 1, 2, 3]);
        assert!(matches!(entries[2].ty, wgpu::BindingType::Texture { .. }));
        assert!(matches!(entries[3].ty, wgpu::BindingType::Sampler(_)));
    }

    #[test]
    fn naga_compiler_rejects_broken_fragment() {
        let vertex = "in vec3 vert;\nvoid main() { gl_Position = vec4(vert, 1.0); }\n";
        let fragment = "out vec4 color;\nvoid main() { color = vec4(1.0) }\n";
        let result = NagaCompiler.compile_program("broken", vertex, fragment, &VertexLayout::quad());
        assert!(result.is_err());
    }
}

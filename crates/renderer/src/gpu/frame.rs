use wgpu::util::DeviceExt;

use crate::compile::{TEXTURE_GROUP, UNIFORM_GROUP};
use crate::error::{FramebufferError, PassError};
use crate::types::Size;

use super::buffer::VertexBuffer;
use super::context::GpuContext;
use super::framebuffer::{Attachment, Framebuffer};
use super::pipeline::ShaderProgram;
use super::texture::{Handle, Texture, TEXTURE_FORMAT};

/// Number of texture units a frame tracks.
pub const MAX_UNITS: usize = 8;

#[derive(Debug, Clone)]
struct BoundTexture {
    handle: Handle,
    generation: u32,
    view: wgpu::TextureView,
}

/// Recording state for one tick: the command encoder, which texture sits on
/// each unit, and the stack of bound framebuffers.
///
/// The bottom of the framebuffer stack is always the screen texture, so a
/// draw with nothing bound lands on what the window presents. Nothing is
/// visible to the GPU until [`Frame::finish`].
pub struct Frame<'a> {
    ctx: &'a GpuContext,
    screen: &'a Texture,
    encoder: wgpu::CommandEncoder,
    units: [Option<BoundTexture>; MAX_UNITS],
    targets: Vec<Framebuffer>,
    draws: u32,
}

impl<'a> Frame<'a> {
    pub fn new(ctx: &'a GpuContext, screen: &'a Texture) -> Self {
        let encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        Self {
            ctx,
            screen,
            encoder,
            units: Default::default(),
            targets: Vec::new(),
            draws: 0,
        }
    }

    pub fn ctx(&self) -> &'a GpuContext {
        self.ctx
    }

    pub fn screen_size(&self) -> Size {
        self.screen.size()
    }

    /// Binds `texture` to `unit`. Re-activating the texture already on that
    /// unit is a no-op.
    pub fn activate(&mut self, texture: &Texture, unit: u32) -> Result<(), PassError> {
        let slot = self
            .units
            .get_mut(unit as usize)
            .ok_or(PassError::UnitOutOfRange {
                unit,
                max: MAX_UNITS as u32 - 1,
            })?;
        if let Some(bound) = slot {
            if bound.handle == texture.handle() && bound.generation == texture.generation() {
                return Ok(());
            }
        }
        *slot = Some(BoundTexture {
            handle: texture.handle(),
            generation: texture.generation(),
            view: texture.view().clone(),
        });
        Ok(())
    }

    /// Handle of the texture occupying `unit`, if any.
    pub fn active_texture(&self, unit: u32) -> Option<Handle> {
        self.units
            .get(unit as usize)
            .and_then(|slot| slot.as_ref())
            .map(|bound| bound.handle)
    }

    pub fn deactivate_all(&mut self) {
        self.units = Default::default();
    }

    /// Pushes `framebuffer` as the render target. It must be complete.
    pub fn bind_framebuffer(&mut self, framebuffer: &Framebuffer) -> Result<(), FramebufferError> {
        framebuffer.check()?;
        self.targets.push(framebuffer.clone());
        Ok(())
    }

    /// Pops the current framebuffer, returning to the previous target. The
    /// screen cannot be popped.
    pub fn unbind_framebuffer(&mut self) -> bool {
        self.targets.pop().is_some()
    }

    /// Depth of the framebuffer stack above the screen.
    pub fn bound_framebuffers(&self) -> usize {
        self.targets.len()
    }

    /// Size of the current render target.
    pub fn target_size(&self) -> Size {
        self.targets
            .last()
            .and_then(|fb| fb.check().ok())
            .unwrap_or_else(|| self.screen.size())
    }

    fn target_attachments(&self) -> Vec<Attachment> {
        match self.targets.last() {
            Some(fb) => fb.attachments().cloned().collect(),
            None => vec![Attachment::of(self.screen)],
        }
    }

    /// Clears every attachment of the current target.
    pub fn clear(&mut self, color: [f64; 4]) {
        let attachments = self.target_attachments();
        let color = wgpu::Color {
            r: color[0],
            g: color[1],
            b: color[2],
            a: color[3],
        };
        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = attachments
            .iter()
            .map(|attachment| {
                Some(wgpu::RenderPassColorAttachment {
                    view: &attachment.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(color),
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();
        let _pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
    }

    /// Records one draw of `buffer` with `program` into the current target,
    /// reading each sampler from the unit its uniform selects.
    pub fn draw(&mut self, program: &ShaderProgram, buffer: &VertexBuffer) -> Result<(), PassError> {
        let attachments = self.target_attachments();
        if attachments.len() != program.outputs() {
            return Err(PassError::AttachmentCount {
                program: program.label().to_string(),
                outputs: program.outputs(),
                attachments: attachments.len(),
            });
        }
        if let Some(attachment) = attachments.iter().find(|a| a.format != TEXTURE_FORMAT) {
            return Err(PassError::FormatMismatch {
                program: program.label().to_string(),
                expected: TEXTURE_FORMAT,
                found: attachment.format,
            });
        }
        if buffer.layout() != program.vertex_layout() {
            return Err(PassError::LayoutMismatch {
                program: program.label().to_string(),
            });
        }

        let uniforms = program.uniforms();
        let mut views = Vec::with_capacity(uniforms.layout().samplers().len());
        for (index, sampler) in uniforms.layout().samplers().iter().enumerate() {
            let unit = uniforms.sampler_unit(index).unwrap_or(index as u32);
            let bound = self
                .units
                .get(unit as usize)
                .ok_or(PassError::UnitOutOfRange {
                    unit,
                    max: MAX_UNITS as u32 - 1,
                })?
                .as_ref()
                .ok_or_else(|| PassError::UnboundUnit {
                    sampler: sampler.clone(),
                    unit,
                })?;
            if attachments.iter().any(|a| a.handle == bound.handle) {
                return Err(PassError::FeedbackLoop {
                    sampler: sampler.clone(),
                });
            }
            views.push(bound.view.clone());
        }

        let device = &self.ctx.device;
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("draw uniforms"),
            contents: uniforms.bytes(),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let uniform_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform bind group"),
            layout: program.uniform_layout(),
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });
        let mut texture_entries = Vec::with_capacity(views.len() * 2);
        for (index, view) in views.iter().enumerate() {
            let binding = index as u32 * 2;
            texture_entries.push(wgpu::BindGroupEntry {
                binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
            texture_entries.push(wgpu::BindGroupEntry {
                binding: binding + 1,
                resource: wgpu::BindingResource::Sampler(&self.ctx.sampler),
            });
        }
        let texture_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("texture bind group"),
            layout: program.texture_layout(),
            entries: &texture_entries,
        });

        let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment<'_>>> = attachments
            .iter()
            .map(|attachment| {
                Some(wgpu::RenderPassColorAttachment {
                    view: &attachment.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect();
        {
            let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(program.label()),
                color_attachments: &color_attachments,
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(program.pipeline());
            pass.set_bind_group(UNIFORM_GROUP, &uniform_group, &[]);
            pass.set_bind_group(TEXTURE_GROUP, &texture_group, &[]);
            buffer.encode(&mut pass);
        }
        self.draws += 1;
        Ok(())
    }

    pub fn draw_count(&self) -> u32 {
        self.draws
    }

    /// Submits everything recorded this frame.
    pub fn finish(self) {
        if !self.targets.is_empty() {
            tracing::trace!(
                depth = self.targets.len(),
                "frame finished with framebuffers still bound"
            );
        }
        self.ctx.queue.submit(Some(self.encoder.finish()));
    }
}

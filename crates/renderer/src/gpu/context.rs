use anyhow::{anyhow, Context as AnyhowContext, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::compile::compile_blit_shaders;
use crate::types::Size;

use super::texture::Texture;

/// Summary of the adapter we ended up on, for logs and the software cap.
#[derive(Debug, Clone)]
pub struct AdapterProfile {
    pub name: String,
    pub backend: wgpu::Backend,
    pub device_type: wgpu::DeviceType,
    pub max_texture_dimension: u32,
}

impl AdapterProfile {
    fn from_wgpu(info: &wgpu::AdapterInfo, limits: &wgpu::Limits) -> Self {
        Self {
            name: info.name.clone(),
            backend: info.backend,
            device_type: info.device_type,
            max_texture_dimension: limits.max_texture_dimension_2d,
        }
    }

    pub fn is_software(&self) -> bool {
        matches!(self.device_type, wgpu::DeviceType::Cpu)
    }
}

/// Device-level GPU state shared by every resource and pass.
///
/// This is the explicit context resource operations receive in place of
/// process-wide binding globals; per-frame binding state lives in
/// [`Frame`](super::Frame).
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub(crate) sampler: wgpu::Sampler,
    adapter: wgpu::Adapter,
    profile: AdapterProfile,
}

impl GpuContext {
    /// Context without a surface, for off-screen rendering and tests.
    pub fn headless() -> Result<Self> {
        let instance = new_instance();
        Self::with_instance(instance, None)
    }

    /// Creates a context plus the [`Display`] presenting into `target`.
    pub fn for_window<T>(target: &T, size: Size) -> Result<(Self, Display)>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let instance = new_instance();
        let window_handle = target
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        let display_handle = target
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;

        // SAFETY: the window outlives the surface; the window runtime drops
        // the display before the window it was created from.
        let surface = unsafe {
            instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                raw_display_handle: display_handle.as_raw(),
                raw_window_handle: window_handle.as_raw(),
            })
        }
        .context("failed to create rendering surface")?;

        let ctx = Self::with_instance(instance, Some(&surface))?;
        let display = Display::new(&ctx, surface, size)?;
        Ok((ctx, display))
    }

    fn with_instance(instance: wgpu::Instance, surface: Option<&wgpu::Surface<'_>>) -> Result<Self> {
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: surface,
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        let limits = adapter.limits();
        let profile = AdapterProfile::from_wgpu(&info, &limits);
        tracing::debug!(
            name = %profile.name,
            backend = ?profile.backend,
            device_type = ?profile.device_type,
            is_software = profile.is_software(),
            "selected GPU adapter"
        );

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("visuals device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits.clone(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("state sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            device,
            queue,
            sampler,
            adapter,
            profile,
        })
    }

    pub fn profile(&self) -> &AdapterProfile {
        &self.profile
    }

    pub fn max_texture_dimension(&self) -> u32 {
        self.profile.max_texture_dimension
    }
}

fn new_instance() -> wgpu::Instance {
    wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        flags: wgpu::InstanceFlags::default(),
        memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
        backend_options: wgpu::BackendOptions::default(),
    })
}

/// Window surface plus the blit pass that copies the off-screen screen
/// texture onto it.
pub struct Display {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    caps: wgpu::SurfaceCapabilities,
    blit_pipeline: wgpu::RenderPipeline,
    blit_layout: wgpu::BindGroupLayout,
}

impl Display {
    fn new(ctx: &GpuContext, surface: wgpu::Surface<'static>, size: Size) -> Result<Self> {
        let size = size.at_least_one();
        let caps = surface.get_capabilities(&ctx.adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| anyhow!("surface reports no supported formats"))?;
        if format.is_srgb() {
            tracing::warn!(
                ?format,
                "no linear (non-sRGB) surface format available; colors will be gamma shifted"
            );
        }

        let present_mode = pick_present_mode(&caps, true)
            .ok_or_else(|| anyhow!("surface reports no present modes"))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width,
            height: size.height,
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&ctx.device, &config);
        tracing::debug!(?format, ?present_mode, %size, "configured surface");

        let (blit_pipeline, blit_layout) = build_blit_pipeline(ctx, format)?;
        Ok(Self {
            surface,
            config,
            caps,
            blit_pipeline,
            blit_layout,
        })
    }

    pub fn size(&self) -> Size {
        Size::new(self.config.width, self.config.height)
    }

    pub fn resize(&mut self, ctx: &GpuContext, size: Size) {
        if size.is_empty() {
            return;
        }
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&ctx.device, &self.config);
    }

    /// Locked pacing presents with vsync (Fifo); unlocked prefers Immediate,
    /// then Mailbox.
    pub fn set_vsync(&mut self, ctx: &GpuContext, enabled: bool) {
        let Some(target_mode) = pick_present_mode(&self.caps, enabled) else {
            return;
        };
        if target_mode != self.config.present_mode {
            self.config.present_mode = target_mode;
            self.surface.configure(&ctx.device, &self.config);
            tracing::debug!(
                ?target_mode,
                vsync_enabled = enabled,
                "reconfigured surface present mode"
            );
        }
    }

    /// Copies `screen` onto the next surface texture and presents it.
    pub fn present(&mut self, ctx: &GpuContext, screen: &Texture) -> Result<(), wgpu::SurfaceError> {
        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blit bind group"),
            layout: &self.blit_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(screen.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&ctx.sampler),
                },
            ],
        });

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("present encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("present pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.blit_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        ctx.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}

fn pick_present_mode(caps: &wgpu::SurfaceCapabilities, vsync: bool) -> Option<wgpu::PresentMode> {
    let has = |mode: wgpu::PresentMode| caps.present_modes.contains(&mode);
    let preferred: &[wgpu::PresentMode] = if vsync {
        &[wgpu::PresentMode::Fifo]
    } else {
        &[wgpu::PresentMode::Immediate, wgpu::PresentMode::Mailbox]
    };
    preferred
        .iter()
        .copied()
        .find(|mode| has(*mode))
        .or_else(|| caps.present_modes.first().copied())
}

fn build_blit_pipeline(
    ctx: &GpuContext,
    format: wgpu::TextureFormat,
) -> Result<(wgpu::RenderPipeline, wgpu::BindGroupLayout)> {
    let (vertex, fragment) = compile_blit_shaders(&ctx.device)?;
    let layout = ctx
        .device
        .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blit layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
    let pipeline_layout = ctx
        .device
        .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blit pipeline layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
    let pipeline = ctx
        .device
        .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("blit pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex,
                entry_point: Some("main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
    Ok((pipeline, layout))
}

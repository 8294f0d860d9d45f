use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use anyhow::{anyhow, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use image::RgbaImage;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy};
use winit::keyboard::{Key as WinitKey, ModifiersState, NamedKey};
use winit::window::WindowBuilder;

use tracing::{error, info};

use crate::gpu::{Display, GpuContext};
use crate::host::{Host, HostAction, ProgramCatalog, TickOutcome};
use crate::runtime::{FramePacer, FrameStats, PacingMode};
use crate::types::{InputEvent, Key, KeyState, Modifiers, MouseButton, Size};

const SOFTWARE_FPS_CAP: f32 = 15.0;
const DEFAULT_FPS: f32 = 60.0;

/// Startup parameters for the window runtime.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub title: String,
    pub size: Size,
    /// Catalog name of the first program; the first entry when unset.
    pub program: Option<String>,
    /// Overrides the monitor refresh rate for locked pacing.
    pub fps: Option<f32>,
    pub unlocked: bool,
    pub visible: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "visuals".into(),
            size: Size::new(1280, 720),
            program: None,
            fps: None,
            unlocked: false,
            visible: true,
        }
    }
}

#[derive(Debug, Clone)]
enum WindowCommand {
    Shutdown,
}

/// Frames and recording state reported by the window thread.
#[derive(Debug)]
pub enum WindowSignal {
    Captured(RgbaImage),
    RecordingStarted,
    RecordingFrame(RgbaImage),
    RecordingStopped,
}

pub struct WindowRuntime {
    proxy: EventLoopProxy<WindowCommand>,
    events: Receiver<WindowSignal>,
    join_handle: Option<JoinHandle<Result<()>>>,
}

impl WindowRuntime {
    /// Opens the window on its own thread and starts the configured program.
    pub fn spawn(config: WindowConfig, catalog: ProgramCatalog) -> Result<Self> {
        let (ready_tx, ready_rx) = bounded(1);
        let (signal_tx, signal_rx) = unbounded();
        let handle = thread::Builder::new()
            .name("visuals-window".into())
            .spawn(move || run_window_thread(config, catalog, ready_tx, signal_tx))
            .map_err(|err| anyhow!("failed to spawn window thread: {err}"))?;

        let proxy = ready_rx
            .recv()
            .map_err(|err| anyhow!("window thread failed to initialise: {err}"))??;

        Ok(Self {
            proxy,
            events: signal_rx,
            join_handle: Some(handle),
        })
    }

    /// Signals from the window thread. Disconnects once the window closes.
    pub fn signals(&self) -> &Receiver<WindowSignal> {
        &self.events
    }

    /// Kill signal: the loop unloads the active program and returns.
    pub fn shutdown(mut self) -> Result<()> {
        if let Some(handle) = self.join_handle.take() {
            let _ = self.proxy.send_event(WindowCommand::Shutdown);
            handle
                .join()
                .map_err(|err| anyhow!("window thread panicked: {err:?}"))??;
        }
        Ok(())
    }

    /// Blocks until the user closes the window.
    pub fn wait(mut self) -> Result<()> {
        if let Some(handle) = self.join_handle.take() {
            handle
                .join()
                .map_err(|err| anyhow!("window thread panicked: {err:?}"))??;
        }
        Ok(())
    }
}

impl Drop for WindowRuntime {
    fn drop(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            let _ = self.proxy.send_event(WindowCommand::Shutdown);
            let _ = handle.join();
        }
    }
}

fn run_window_thread(
    config: WindowConfig,
    catalog: ProgramCatalog,
    ready_tx: Sender<Result<EventLoopProxy<WindowCommand>, anyhow::Error>>,
    signal_tx: Sender<WindowSignal>,
) -> Result<()> {
    let mut builder = EventLoopBuilder::<WindowCommand>::with_user_event();
    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        use winit::platform::wayland::EventLoopBuilderExtWayland;
        EventLoopBuilderExtWayland::with_any_thread(&mut builder, true);
    }

    #[cfg(any(
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
    ))]
    {
        use winit::platform::x11::EventLoopBuilderExtX11;
        EventLoopBuilderExtX11::with_any_thread(&mut builder, true);
    }
    let event_loop = builder
        .build()
        .map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let proxy = event_loop.create_proxy();

    let window = WindowBuilder::new()
        .with_title(config.title.clone())
        .with_inner_size(PhysicalSize::new(config.size.width, config.size.height))
        .with_visible(config.visible)
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create window: {err}"))?;
    let window = Arc::new(window);

    let setup = || -> Result<(Host, Display, FramePacer)> {
        let inner = window.inner_size();
        let size = Size::new(inner.width, inner.height).at_least_one();
        let (ctx, mut display) = GpuContext::for_window(window.as_ref(), size)?;
        let profile = ctx.profile().clone();

        let monitor_fps = window
            .current_monitor()
            .and_then(|monitor| monitor.refresh_rate_millihertz())
            .map(|millihertz| millihertz as f32 / 1000.0);
        let mut fps = config.fps.or(monitor_fps).unwrap_or(DEFAULT_FPS);
        if profile.is_software() && config.fps.is_none() {
            fps = fps.min(SOFTWARE_FPS_CAP);
            tracing::warn!(
                adapter = %profile.name,
                backend = ?profile.backend,
                cap = SOFTWARE_FPS_CAP,
                "software rasterizer detected; capping frame rate (override with --fps)"
            );
        }
        let mode = if config.unlocked {
            PacingMode::Unlocked
        } else {
            PacingMode::Locked
        };
        let pacer = FramePacer::new(fps, mode);
        display.set_vsync(&ctx, mode == PacingMode::Locked);

        let mut host = Host::new(ctx, size, catalog)?;
        match &config.program {
            Some(name) => host.switch_by_name(name)?,
            None => host.switch_to(0)?,
        }
        Ok((host, display, pacer))
    };

    let (mut host, display, mut pacer) = match setup() {
        Ok(parts) => parts,
        Err(err) => {
            let wrapped = anyhow!("failed to initialise window renderer: {err:#}");
            let message = wrapped.to_string();
            let _ = ready_tx.send(Err(anyhow!(message)));
            return Err(wrapped);
        }
    };
    let mut display = Some(display);
    let mut stats = FrameStats::new();
    let mut modifiers = Modifiers::NONE;
    let mut recording = false;

    window.request_redraw();
    let _ = ready_tx.send(Ok(proxy.clone()));

    let mut result = Ok(());
    let run_result = event_loop.run(move |event, elwt| match event {
        Event::UserEvent(WindowCommand::Shutdown) => {
            info!("shutdown requested");
            elwt.exit();
        }
        Event::LoopExiting => {
            host.shutdown();
            // The surface borrows the window; release it first.
            display.take();
        }
        Event::WindowEvent { window_id, event } if window_id == window.id() => match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                elwt.exit();
            }
            WindowEvent::ModifiersChanged(state) => {
                modifiers = translate_modifiers(state.state());
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let Some(input) = translate_key(&event, modifiers) else {
                    return;
                };
                match host.input(&input) {
                    HostAction::None => {}
                    HostAction::TogglePacing => {
                        let mode = pacer.toggle();
                        if let Some(display) = display.as_mut() {
                            display.set_vsync(host.ctx(), mode == PacingMode::Locked);
                        }
                        info!(?mode, "frame pacing changed");
                    }
                    HostAction::ToggleRecording => {
                        recording = !recording;
                        let signal = if recording {
                            WindowSignal::RecordingStarted
                        } else {
                            WindowSignal::RecordingStopped
                        };
                        let _ = signal_tx.send(signal);
                    }
                    HostAction::Quit => elwt.exit(),
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                host.input(&InputEvent::CursorMoved {
                    x: position.x,
                    y: position.y,
                });
            }
            WindowEvent::MouseInput { state, button, .. } => {
                let button = match button {
                    winit::event::MouseButton::Left => MouseButton::Left,
                    winit::event::MouseButton::Right => MouseButton::Right,
                    winit::event::MouseButton::Middle => MouseButton::Middle,
                    _ => return,
                };
                host.input(&InputEvent::MouseButton {
                    button,
                    state: translate_state(state),
                });
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta = match delta {
                    MouseScrollDelta::LineDelta(_, y) => f64::from(y),
                    MouseScrollDelta::PixelDelta(position) => position.y / 40.0,
                };
                host.input(&InputEvent::Scroll { delta });
            }
            WindowEvent::Resized(new_size) => {
                let size = Size::new(new_size.width, new_size.height);
                if let Some(display) = display.as_mut() {
                    display.resize(host.ctx(), size);
                }
                if let Err(err) = host.resize(size) {
                    error!(error = ?err, "failed to resize program");
                }
            }
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let outcome = match host.tick(now) {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        error!(error = ?err, "frame failed");
                        pacer.mark_rendered(now);
                        return;
                    }
                };
                match outcome {
                    TickOutcome::Skipped => return,
                    TickOutcome::Captured(image) => {
                        let _ = signal_tx.send(WindowSignal::Captured(image));
                    }
                    TickOutcome::Rendered => {
                        if recording {
                            match host.read_screen() {
                                Ok(image) => {
                                    let _ = signal_tx.send(WindowSignal::RecordingFrame(image));
                                }
                                Err(err) => error!(error = ?err, "failed to read recording frame"),
                            }
                        }
                    }
                    TickOutcome::Recolored => {}
                }

                if let Some(surface) = display.as_mut() {
                    match surface.present(host.ctx(), host.screen()) {
                        Ok(()) => {}
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            let size = surface.size();
                            surface.resize(host.ctx(), size);
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            error!("surface out of memory; exiting");
                            elwt.exit();
                        }
                        Err(wgpu::SurfaceError::Timeout) => {
                            tracing::debug!("surface timeout; retrying next frame");
                        }
                        Err(other) => {
                            tracing::warn!(error = ?other, "surface error; retrying next frame");
                        }
                    }
                }
                pacer.mark_rendered(now);

                if let Some(fps) = stats.record(now) {
                    let mut title = FrameStats::title(fps, host.size());
                    if let Some(status) = host.status() {
                        title.push_str(" | ");
                        title.push_str(&status);
                    }
                    tracing::debug!(fps, frames = stats.total_frames(), "render stats");
                    window.set_title(&title);
                }
            }
            _ => {}
        },
        Event::AboutToWait => {
            let now = Instant::now();
            if pacer.ready_for_frame(now) {
                tracing::trace!("pacer: issuing redraw now");
                window.request_redraw();
                elwt.set_control_flow(ControlFlow::Wait);
            } else if let Some(deadline) = pacer.next_deadline() {
                let ms = deadline.saturating_duration_since(now).as_millis();
                tracing::trace!(deadline_ms = ms, "pacer: waiting until next frame");
                elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
            } else {
                elwt.set_control_flow(ControlFlow::Wait);
            }
        }
        _ => {}
    });

    if let Err(err) = run_result {
        result = Err(anyhow!("window event loop error: {err}"));
    }

    result
}

fn translate_state(state: ElementState) -> KeyState {
    match state {
        ElementState::Pressed => KeyState::Pressed,
        ElementState::Released => KeyState::Released,
    }
}

fn translate_modifiers(state: ModifiersState) -> Modifiers {
    Modifiers {
        shift: state.shift_key(),
        control: state.control_key(),
        alt: state.alt_key(),
        logo: state.super_key(),
    }
}

fn translate_key(event: &KeyEvent, modifiers: Modifiers) -> Option<InputEvent> {
    let key = match &event.logical_key {
        WinitKey::Character(value) => {
            let mut chars = value.chars();
            let ch = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            if ch == ' ' {
                Key::Space
            } else {
                Key::Char(ch.to_ascii_lowercase())
            }
        }
        WinitKey::Named(named) => translate_named(*named),
        _ => Key::Other,
    };
    Some(InputEvent::Key {
        key,
        state: translate_state(event.state),
        modifiers,
    })
}

fn translate_named(named: NamedKey) -> Key {
    match named {
        NamedKey::Space => Key::Space,
        NamedKey::Enter => Key::Enter,
        NamedKey::Escape => Key::Escape,
        NamedKey::ArrowLeft => Key::Left,
        NamedKey::ArrowRight => Key::Right,
        NamedKey::ArrowUp => Key::Up,
        NamedKey::ArrowDown => Key::Down,
        NamedKey::F1 => Key::F(1),
        NamedKey::F2 => Key::F(2),
        NamedKey::F3 => Key::F(3),
        NamedKey::F4 => Key::F(4),
        NamedKey::F5 => Key::F(5),
        NamedKey::F6 => Key::F(6),
        NamedKey::F7 => Key::F(7),
        NamedKey::F8 => Key::F(8),
        NamedKey::F9 => Key::F(9),
        NamedKey::F10 => Key::F(10),
        NamedKey::F11 => Key::F(11),
        NamedKey::F12 => Key::F(12),
        _ => Key::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_keys_translate() {
        assert_eq!(translate_named(NamedKey::F5), Key::F(5));
        assert_eq!(translate_named(NamedKey::ArrowUp), Key::Up);
        assert_eq!(translate_named(NamedKey::Tab), Key::Other);
    }

    #[test]
    fn modifiers_translate() {
        let mods = translate_modifiers(ModifiersState::SUPER | ModifiersState::SHIFT);
        assert!(mods.logo && mods.shift);
        assert!(!mods.control && !mods.alt);
    }
}

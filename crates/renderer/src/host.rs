//! The program host: owns the active program variant and the screen
//! texture, drains out-of-band commands and drives one frame per tick.

use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;

use crate::commands::{CommandChannels, CommandKind};
use crate::cycle::Cycle;
use crate::gpu::{Frame, GpuContext, Texture};
use crate::runtime::{FrameClock, Tick};
use crate::types::{CursorState, InputEvent, Key, KeyState, Modifiers, Size};

/// Common lifecycle of every program variant.
pub trait Program {
    fn name(&self) -> &str;

    /// Creates GPU resources. A program that fails here is never activated.
    fn load(&mut self, ctx: &GpuContext, size: Size, commands: &mut CommandChannels) -> Result<()>;

    /// Advances one frame and draws it.
    fn render(&mut self, frame: &mut Frame<'_>, tick: &Tick) -> Result<()>;

    /// Re-runs only the final colorize pass.
    fn recolor(&mut self, _frame: &mut Frame<'_>) -> Result<()> {
        Ok(())
    }

    fn resize(&mut self, ctx: &GpuContext, size: Size) -> Result<()>;

    fn input(&mut self, _event: &InputEvent, _commands: &CommandChannels) {}

    /// Short text for the window title, e.g. the last reload error.
    fn status(&self) -> Option<String> {
        None
    }

    /// Releases GPU resources ahead of the program being dropped.
    fn unload(&mut self, _commands: &mut CommandChannels) {}
}

pub type ProgramFactory = Box<dyn Fn() -> Box<dyn Program> + Send>;

pub struct CatalogEntry {
    pub name: String,
    pub description: String,
    factory: ProgramFactory,
}

/// Ordered set of programs the host can switch between.
#[derive(Default)]
pub struct ProgramCatalog {
    entries: Cycle<CatalogEntry>,
}

impl ProgramCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: &str, description: &str, factory: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Program> + Send + 'static,
    {
        self.entries.push(CatalogEntry {
            name: name.to_string(),
            description: description.to_string(),
            factory: Box::new(factory),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    fn instantiate(&self, index: usize) -> Option<Box<dyn Program>> {
        self.entries.get(index).map(|entry| (entry.factory)())
    }
}

/// What a tick did.
#[derive(Debug)]
pub enum TickOutcome {
    Rendered,
    Recolored,
    Captured(RgbaImage),
    /// No program is active.
    Skipped,
}

/// Actions bound to host-level keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostBinding {
    TogglePacing,
    Capture,
    ToggleRecording,
    PreviousProgram,
    NextProgram,
    Quit,
}

/// Maps key releases onto host actions.
pub fn binding_for(event: &InputEvent) -> Option<HostBinding> {
    let InputEvent::Key {
        key,
        state: KeyState::Released,
        modifiers,
    } = *event
    else {
        return None;
    };
    match key {
        Key::F(1) => Some(HostBinding::TogglePacing),
        Key::F(2) => Some(HostBinding::Capture),
        Key::F(3) => Some(HostBinding::ToggleRecording),
        Key::F(5) => Some(HostBinding::PreviousProgram),
        Key::F(6) => Some(HostBinding::NextProgram),
        Key::Char('w') if modifiers == Modifiers::LOGO => Some(HostBinding::Quit),
        _ => None,
    }
}

/// Host response to input the window runtime has to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    None,
    TogglePacing,
    ToggleRecording,
    Quit,
}

pub struct Host {
    ctx: GpuContext,
    screen: Texture,
    size: Size,
    catalog: ProgramCatalog,
    active: Option<Box<dyn Program>>,
    commands: CommandChannels,
    clock: FrameClock,
    cursor: CursorState,
}

impl Host {
    pub fn new(ctx: GpuContext, size: Size, catalog: ProgramCatalog) -> Result<Self> {
        let size = size.at_least_one();
        let screen = Texture::blank(&ctx, "screen", size)?;
        let mut commands = CommandChannels::new();
        for kind in CommandKind::ALL {
            commands.register(kind)?;
        }
        Ok(Self {
            ctx,
            screen,
            size,
            catalog,
            active: None,
            commands,
            clock: FrameClock::new(Instant::now()),
            cursor: CursorState::default(),
        })
    }

    pub fn ctx(&self) -> &GpuContext {
        &self.ctx
    }

    /// Off-screen texture every frame ends up in; the display presents it.
    pub fn screen(&self) -> &Texture {
        &self.screen
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn commands(&self) -> &CommandChannels {
        &self.commands
    }

    pub fn catalog(&self) -> &ProgramCatalog {
        &self.catalog
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active.as_ref().map(|_| self.catalog.entries.index())
    }

    pub fn active_name(&self) -> Option<&str> {
        self.active.as_deref().map(|program| program.name())
    }

    pub fn frame_count(&self) -> u64 {
        self.clock.frame()
    }

    pub fn status(&self) -> Option<String> {
        self.active.as_deref().and_then(|program| program.status())
    }

    /// Loads catalog entry `index` and makes it active. The current program
    /// keeps running when the new one fails to load.
    pub fn switch_to(&mut self, index: usize) -> Result<()> {
        let mut next = self
            .catalog
            .instantiate(index)
            .ok_or_else(|| anyhow!("no program at catalog index {index}"))?;
        let name = next.name().to_string();

        next.load(&self.ctx, self.size, &mut self.commands)
            .with_context(|| format!("failed to load program `{name}`"))?;

        if let Some(mut previous) = self.active.take() {
            tracing::debug!(program = previous.name(), "unloading program");
            previous.unload(&mut self.commands);
        }
        // A recolor raised for the old program has nothing left to recolor.
        self.commands.take(CommandKind::Recolor);
        self.active = Some(next);
        self.catalog.entries.set_index(index);
        self.clock.reset(Instant::now());
        tracing::info!(program = %name, "switched program");
        Ok(())
    }

    pub fn switch_by_name(&mut self, name: &str) -> Result<()> {
        let index = self
            .catalog
            .position(name)
            .ok_or_else(|| anyhow!("unknown program `{name}`"))?;
        self.switch_to(index)
    }

    pub fn next_program(&mut self) -> Result<()> {
        match self.catalog.entries.next_index() {
            Some(index) => self.switch_to(index),
            None => Ok(()),
        }
    }

    pub fn previous_program(&mut self) -> Result<()> {
        match self.catalog.entries.previous_index() {
            Some(index) => self.switch_to(index),
            None => Ok(()),
        }
    }

    /// Runs one frame: a pending command if there is one, otherwise the
    /// active program's render step. Command frames do not advance the
    /// frame counter.
    pub fn tick(&mut self, now: Instant) -> Result<TickOutcome> {
        let Some(program) = self.active.as_deref_mut() else {
            return Ok(TickOutcome::Skipped);
        };
        match self.commands.drain_one() {
            Some(CommandKind::Capture) => {
                let image = self.screen.read_pixels(&self.ctx)?;
                Ok(TickOutcome::Captured(image))
            }
            Some(CommandKind::Recolor) => {
                let mut frame = Frame::new(&self.ctx, &self.screen);
                program.recolor(&mut frame)?;
                frame.finish();
                Ok(TickOutcome::Recolored)
            }
            None => {
                let tick = Tick {
                    seconds: self.clock.seconds(now),
                    frame: self.clock.frame(),
                    cursor: self.cursor,
                    size: self.size,
                };
                let mut frame = Frame::new(&self.ctx, &self.screen);
                program.render(&mut frame, &tick)?;
                frame.finish();
                self.clock.advance();
                Ok(TickOutcome::Rendered)
            }
        }
    }

    /// Synchronous copy of the last completed frame.
    pub fn read_screen(&self) -> Result<RgbaImage> {
        self.screen.read_pixels(&self.ctx)
    }

    pub fn resize(&mut self, size: Size) -> Result<()> {
        if size.is_empty() || size == self.size {
            return Ok(());
        }
        // The old screen and size stay until the program accepted the new one,
        // so a failed resize can simply be retried.
        let screen = Texture::blank(&self.ctx, "screen", size)?;
        if let Some(program) = self.active.as_deref_mut() {
            program
                .resize(&self.ctx, size)
                .with_context(|| format!("failed to resize program `{}`", program.name()))?;
        }
        self.screen = screen;
        self.size = size;
        tracing::debug!(%size, "host resized");
        Ok(())
    }

    /// Routes input: host bindings first, everything else to the program.
    pub fn input(&mut self, event: &InputEvent) -> HostAction {
        self.cursor.apply(event);
        match binding_for(event) {
            Some(HostBinding::TogglePacing) => return HostAction::TogglePacing,
            Some(HostBinding::ToggleRecording) => return HostAction::ToggleRecording,
            Some(HostBinding::Quit) => return HostAction::Quit,
            Some(HostBinding::Capture) => {
                if let Err(err) = self.commands.issue(CommandKind::Capture) {
                    tracing::warn!(error = %err, "capture request dropped");
                }
                return HostAction::None;
            }
            Some(HostBinding::PreviousProgram) => {
                if let Err(err) = self.previous_program() {
                    tracing::error!(error = ?err, "program switch refused");
                }
                return HostAction::None;
            }
            Some(HostBinding::NextProgram) => {
                if let Err(err) = self.next_program() {
                    tracing::error!(error = ?err, "program switch refused");
                }
                return HostAction::None;
            }
            None => {}
        }
        if let Some(program) = self.active.as_deref_mut() {
            program.input(event, &self.commands);
        }
        HostAction::None
    }

    /// Unloads the active program. Called on every exit path.
    pub fn shutdown(&mut self) {
        if let Some(mut program) = self.active.take() {
            tracing::debug!(program = program.name(), "unloading program on shutdown");
            program.unload(&mut self.commands);
        }
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(key: Key, modifiers: Modifiers) -> InputEvent {
        InputEvent::Key {
            key,
            state: KeyState::Released,
            modifiers,
        }
    }

    #[test]
    fn function_keys_map_to_host_bindings() {
        assert_eq!(
            binding_for(&release(Key::F(1), Modifiers::NONE)),
            Some(HostBinding::TogglePacing)
        );
        assert_eq!(
            binding_for(&release(Key::F(2), Modifiers::NONE)),
            Some(HostBinding::Capture)
        );
        assert_eq!(
            binding_for(&release(Key::F(6), Modifiers::NONE)),
            Some(HostBinding::NextProgram)
        );
    }

    #[test]
    fn quit_requires_super() {
        assert_eq!(binding_for(&release(Key::Char('w'), Modifiers::NONE)), None);
        assert_eq!(
            binding_for(&release(Key::Char('w'), Modifiers::LOGO)),
            Some(HostBinding::Quit)
        );
    }

    #[test]
    fn presses_are_left_to_programs() {
        assert_eq!(binding_for(&InputEvent::key_pressed(Key::F(2))), None);
    }

    #[test]
    fn catalog_lookup_ignores_case() {
        struct Idle;
        impl Program for Idle {
            fn name(&self) -> &str {
                "idle"
            }
            fn load(&mut self, _: &GpuContext, _: Size, _: &mut CommandChannels) -> Result<()> {
                Ok(())
            }
            fn render(&mut self, _: &mut Frame<'_>, _: &Tick) -> Result<()> {
                Ok(())
            }
            fn resize(&mut self, _: &GpuContext, _: Size) -> Result<()> {
                Ok(())
            }
        }
        let mut catalog = ProgramCatalog::new();
        catalog
            .register("Life", "cellular automaton", || Box::new(Idle))
            .register("Pong", "bouncing balls", || Box::new(Idle));
        assert_eq!(catalog.position("pong"), Some(1));
        assert_eq!(catalog.position("turtle"), None);
        assert_eq!(catalog.len(), 2);
    }
}

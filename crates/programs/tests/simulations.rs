use std::fs;
use std::time::Instant;

use image::{Rgba, RgbaImage};
use programs::{catalog, CatalogOptions, LifeOptions, LifeProgram, LiveEditOptions, LiveEditProgram};
use renderer::{
    CommandChannels, CommandKind, CursorState, Frame, GpuContext, Host, Program, ShaderWatcher,
    Size, Texture, Tick, TickOutcome, QUAD_VERTEX_GLSL,
};
use tempfile::TempDir;

const ALIVE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const DEAD: Rgba<u8> = Rgba([0, 0, 0, 255]);

fn context() -> Option<GpuContext> {
    match GpuContext::headless() {
        Ok(ctx) => Some(ctx),
        Err(_) => {
            eprintln!("Skipping test: no GPU adapter found");
            None
        }
    }
}

fn commands() -> CommandChannels {
    let mut commands = CommandChannels::new();
    commands.register(CommandKind::Recolor).unwrap();
    commands
}

fn tick(frame: u64, size: Size, cursor: CursorState) -> Tick {
    Tick {
        seconds: frame as f32 / 60.0,
        frame,
        cursor,
        size,
    }
}

fn step(ctx: &GpuContext, screen: &Texture, program: &mut dyn Program, tick: &Tick) {
    let mut frame = Frame::new(ctx, screen);
    program.render(&mut frame, tick).unwrap();
    frame.finish();
}

fn pattern(size: Size, cells: &[(u32, u32)]) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(size.width, size.height, DEAD);
    for &(x, y) in cells {
        image.put_pixel(x, y, ALIVE);
    }
    image
}

fn alive_cells(image: &RgbaImage) -> Vec<(u32, u32)> {
    let mut cells: Vec<(u32, u32)> = image
        .enumerate_pixels()
        .filter(|(_, _, pixel)| pixel[0] > 127)
        .map(|(x, y, _)| (x, y))
        .collect();
    cells.sort();
    cells
}

fn loaded_life(ctx: &GpuContext, size: Size) -> LifeProgram {
    let mut program = LifeProgram::new(LifeOptions {
        seed: Some(7),
        ..LifeOptions::default()
    });
    program.load(ctx, size, &mut commands()).unwrap();
    program
}

#[test]
fn blinker_oscillates_with_period_two() {
    let Some(ctx) = context() else { return };
    let size = Size::new(64, 64);
    let screen = Texture::blank(&ctx, "screen", size).unwrap();
    let mut life = loaded_life(&ctx, size);

    let horizontal = vec![(31, 32), (32, 32), (33, 32)];
    let vertical = vec![(32, 31), (32, 32), (32, 33)];
    life.write_state(&ctx, &pattern(size, &horizontal)).unwrap();

    step(&ctx, &screen, &mut life, &tick(0, size, CursorState::default()));
    assert_eq!(alive_cells(&life.read_state(&ctx).unwrap()), vertical);
    step(&ctx, &screen, &mut life, &tick(1, size, CursorState::default()));
    assert_eq!(alive_cells(&life.read_state(&ctx).unwrap()), horizontal);
}

#[test]
fn block_still_life_is_texel_stable() {
    let Some(ctx) = context() else { return };
    let size = Size::new(32, 32);
    let screen = Texture::blank(&ctx, "screen", size).unwrap();
    let mut life = loaded_life(&ctx, size);

    let block = pattern(size, &[(10, 10), (11, 10), (10, 11), (11, 11)]);
    life.write_state(&ctx, &block).unwrap();
    for frame in 0..6 {
        step(&ctx, &screen, &mut life, &tick(frame, size, CursorState::default()));
        assert_eq!(life.read_state(&ctx).unwrap(), block, "generation {frame}");
    }
}

#[test]
fn pressed_cursor_paints_live_cells() {
    let Some(ctx) = context() else { return };
    let size = Size::new(64, 64);
    let screen = Texture::blank(&ctx, "screen", size).unwrap();
    let mut life = loaded_life(&ctx, size);
    life.write_state(&ctx, &pattern(size, &[])).unwrap();

    let cursor = CursorState {
        x: 32.0,
        y: 32.0,
        left_down: true,
        right_down: false,
    };
    step(&ctx, &screen, &mut life, &tick(0, size, cursor));
    let state = life.read_state(&ctx).unwrap();
    assert_eq!(*state.get_pixel(31, 31), ALIVE);
    assert_eq!(*state.get_pixel(32, 32), ALIVE);
    assert_eq!(*state.get_pixel(10, 50), DEAD);
}

#[test]
fn recolor_leaves_state_untouched() {
    let Some(ctx) = context() else { return };
    let size = Size::new(48, 48);
    let screen = Texture::blank(&ctx, "screen", size).unwrap();
    let mut life = loaded_life(&ctx, size);

    step(&ctx, &screen, &mut life, &tick(0, size, CursorState::default()));
    let state = life.read_state(&ctx).unwrap();
    let trail = life.read_trail(&ctx).unwrap();
    for _ in 0..3 {
        let mut frame = Frame::new(&ctx, &screen);
        life.recolor(&mut frame).unwrap();
        frame.finish();
    }
    assert_eq!(life.read_state(&ctx).unwrap(), state);
    assert_eq!(life.read_trail(&ctx).unwrap(), trail);
}

#[test]
fn resize_keeps_every_texture_aligned() {
    let Some(ctx) = context() else { return };
    let size = Size::new(64, 64);
    let mut life = loaded_life(&ctx, size);
    life.write_state(&ctx, &pattern(size, &[(16, 16), (47, 40)])).unwrap();

    let larger = Size::new(128, 128);
    life.resize(&ctx, larger).unwrap();
    let state = life.read_state(&ctx).unwrap();
    let trail = life.read_trail(&ctx).unwrap();
    assert_eq!(state.dimensions(), (128, 128));
    assert_eq!(trail.dimensions(), (128, 128));
    // Cell (16, 16) of 64 covers texels 32..34 of 128.
    assert_eq!(*state.get_pixel(32, 32), ALIVE);
    assert_eq!(*state.get_pixel(33, 33), ALIVE);
    assert_eq!(*state.get_pixel(95, 81), ALIVE);
    assert_eq!(*state.get_pixel(34, 34), DEAD);

    // A generation still runs on the resized pipeline.
    let screen = Texture::blank(&ctx, "screen", larger).unwrap();
    step(&ctx, &screen, &mut life, &tick(0, larger, CursorState::default()));
}

#[test]
fn host_command_frames_do_not_advance_simulation() {
    let Some(ctx) = context() else { return };
    let size = Size::new(32, 24);
    let options = CatalogOptions {
        seed: Some(11),
        ..CatalogOptions::default()
    };
    let mut host = Host::new(ctx, size, catalog(&options)).unwrap();
    host.switch_by_name("life").unwrap();

    assert!(matches!(host.tick(Instant::now()).unwrap(), TickOutcome::Rendered));
    assert_eq!(host.frame_count(), 1);

    host.commands().issue(CommandKind::Recolor).unwrap();
    assert!(matches!(host.tick(Instant::now()).unwrap(), TickOutcome::Recolored));
    assert_eq!(host.frame_count(), 1);

    host.commands().issue(CommandKind::Capture).unwrap();
    match host.tick(Instant::now()).unwrap() {
        TickOutcome::Captured(image) => assert_eq!(image.dimensions(), (32, 24)),
        other => panic!("expected a capture, got {other:?}"),
    }
    assert_eq!(host.frame_count(), 1);

    assert!(matches!(host.tick(Instant::now()).unwrap(), TickOutcome::Rendered));
    assert_eq!(host.frame_count(), 2);
}

#[test]
fn every_catalog_program_renders() {
    let Some(ctx) = context() else { return };
    let size = Size::new(40, 30);
    let options = CatalogOptions {
        seed: Some(3),
        ..CatalogOptions::default()
    };
    let mut host = Host::new(ctx, size, catalog(&options)).unwrap();
    let names: Vec<String> = host.catalog().entries().map(|entry| entry.name.clone()).collect();
    for name in names {
        host.switch_by_name(&name).unwrap();
        for _ in 0..3 {
            host.tick(Instant::now()).unwrap();
        }
        host.resize(Size::new(50, 20)).unwrap();
        host.tick(Instant::now()).unwrap();
        host.resize(size).unwrap();
        assert_eq!(host.active_name(), Some(name.as_str()));
    }
}

const SOLID_FRAGMENT: &str = "#version 410

uniform vec2 scale;

in vec2 fragTexCoord;
out vec4 outputColor;

void main() {
    outputColor = vec4(gl_FragCoord.x / scale.x, 0.25, 0.5, 1.0);
}
";

const BROKEN_FRAGMENT: &str = "#version 410

out vec4 outputColor;

void main() {
    outputColor = vec4(1.0, 0.0, 0.0, 1.0)
}
";

const RED_FRAGMENT: &str = "#version 410

out vec4 outputColor;

void main() {
    outputColor = vec4(1.0, 0.0, 0.0, 1.0);
}
";

#[test]
fn live_edit_reloads_and_rolls_back() {
    let Some(ctx) = context() else { return };
    let dir = TempDir::new().unwrap();
    let vertex = dir.path().join("live.vert");
    let fragment = dir.path().join("live.frag");
    fs::write(&vertex, QUAD_VERTEX_GLSL).unwrap();
    fs::write(&fragment, SOLID_FRAGMENT).unwrap();

    let (watcher, feed) = ShaderWatcher::detached();
    let options = LiveEditOptions {
        vertex: vertex.clone(),
        fragment: fragment.clone(),
    };
    let mut live = LiveEditProgram::with_watcher(options, watcher);
    let size = Size::new(16, 16);
    let screen = Texture::blank(&ctx, "screen", size).unwrap();
    live.load(&ctx, size, &mut commands()).unwrap();
    assert!(live.has_program());
    assert_eq!(live.history().len(), 1);

    step(&ctx, &screen, &mut live, &tick(0, size, CursorState::default()));
    let first = live.read_canvas(&ctx).unwrap();

    // Identical source twice: both compile and draw the same picture.
    for frame in 1..3 {
        feed.notify(&fragment);
        step(&ctx, &screen, &mut live, &tick(frame, size, CursorState::default()));
        assert!(live.last_error().is_none());
        assert_eq!(live.read_canvas(&ctx).unwrap(), first);
    }
    assert_eq!(live.history().len(), 3);

    // A broken edit keeps the last good program and pauses.
    fs::write(&fragment, BROKEN_FRAGMENT).unwrap();
    feed.notify(&fragment);
    step(&ctx, &screen, &mut live, &tick(3, size, CursorState::default()));
    assert!(live.last_error().is_some());
    assert!(live.is_paused());
    assert!(live.has_program());
    assert_eq!(live.history().len(), 3);
    assert_eq!(live.read_canvas(&ctx).unwrap(), first);
    assert!(live.status().unwrap().starts_with("live edit:"));

    // The next good edit resumes drawing.
    fs::write(&fragment, RED_FRAGMENT).unwrap();
    feed.notify(&fragment);
    step(&ctx, &screen, &mut live, &tick(4, size, CursorState::default()));
    assert!(live.last_error().is_none());
    assert!(!live.is_paused());
    assert_eq!(live.history().len(), 4);
    assert_eq!(*live.read_canvas(&ctx).unwrap().get_pixel(3, 3), Rgba([255, 0, 0, 255]));
}

#[test]
fn live_edit_starts_without_files() {
    let Some(ctx) = context() else { return };
    let dir = TempDir::new().unwrap();
    let (watcher, feed) = ShaderWatcher::detached();
    let options = LiveEditOptions {
        vertex: dir.path().join("missing.vert"),
        fragment: dir.path().join("missing.frag"),
    };
    let mut live = LiveEditProgram::with_watcher(options.clone(), watcher);
    let size = Size::new(8, 8);
    let screen = Texture::blank(&ctx, "screen", size).unwrap();
    live.load(&ctx, size, &mut commands()).unwrap();
    assert!(!live.has_program());
    assert!(live.is_paused());
    step(&ctx, &screen, &mut live, &tick(0, size, CursorState::default()));

    fs::write(&options.vertex, QUAD_VERTEX_GLSL).unwrap();
    fs::write(&options.fragment, RED_FRAGMENT).unwrap();
    feed.notify(&options.fragment);
    step(&ctx, &screen, &mut live, &tick(1, size, CursorState::default()));
    assert!(live.has_program());
    assert!(!live.is_paused());
}

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use playconfig::{SessionConfig, SmoothLifeSection};
use programs::{CatalogOptions, LifeOptions, LiveEditOptions, RuleSet, SmoothLifeRules};
use renderer::{ProgramCatalog, Size, WindowConfig, WindowRuntime, WindowSignal};
use tracing_subscriber::EnvFilter;

use crate::capture::CaptureSink;
use crate::cli::RunArgs;
use crate::paths::AppPaths;

pub fn initialise_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Everything the window needs, with CLI flags applied over the config.
#[derive(Debug, Clone)]
pub struct Session {
    pub window: WindowConfig,
    pub catalog: CatalogOptions,
    pub capture_dir: PathBuf,
    pub gif_max_duration: Duration,
}

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let config = load_config(&args, &paths)?;
    let session = build_session(&args, &config, &paths)?;

    let catalog = programs::catalog(&session.catalog);
    check_program(&catalog, session.window.program.as_deref())?;

    tracing::info!(
        size = %session.window.size,
        program = session.window.program.as_deref().unwrap_or("(first)"),
        captures = %session.capture_dir.display(),
        "starting visuals"
    );

    let runtime = WindowRuntime::spawn(session.window, catalog)?;
    let mut sink = CaptureSink::new(session.capture_dir, session.gif_max_duration);

    for signal in runtime.signals().iter() {
        match signal {
            WindowSignal::Captured(image) => {
                if let Err(err) = sink.screenshot(&image) {
                    tracing::error!(error = %err, "screenshot failed");
                }
            }
            WindowSignal::RecordingStarted => sink.start_recording(Instant::now()),
            WindowSignal::RecordingFrame(image) => sink.record_frame(image, Instant::now()),
            WindowSignal::RecordingStopped => {
                if let Err(err) = sink.stop_recording() {
                    tracing::error!(error = %err, "recording failed");
                }
            }
        }
    }

    let written = sink.finish()?;
    tracing::debug!(recordings = written.len(), "capture sink drained");
    runtime.wait()
}

/// Prints the catalogue the window would switch through.
pub fn list(args: &RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let config = load_config(args, &paths)?;
    let session = build_session(args, &config, &paths)?;
    let catalog = programs::catalog(&session.catalog);

    println!("Programs (F5/F6 to switch):");
    for (index, entry) in catalog.entries().enumerate() {
        println!("  {index:>2} {:<12} {}", entry.name, entry.description);
    }
    Ok(())
}

fn load_config(args: &RunArgs, paths: &AppPaths) -> Result<SessionConfig> {
    if let Some(path) = &args.config {
        return SessionConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()));
    }

    let default = paths.config_file();
    if default.exists() {
        tracing::debug!(path = %default.display(), "loading config");
        return SessionConfig::load(&default)
            .with_context(|| format!("failed to load config {}", default.display()));
    }
    Ok(SessionConfig::default())
}

pub fn build_session(args: &RunArgs, config: &SessionConfig, paths: &AppPaths) -> Result<Session> {
    let defaults = WindowConfig::default();
    let size = args
        .size
        .or_else(|| config.window_size().map(|(w, h)| Size::new(w, h)))
        .unwrap_or(defaults.size);

    let window = WindowConfig {
        title: config.window.title.clone().unwrap_or(defaults.title),
        size,
        program: args.program.clone().or_else(|| config.render.program.clone()),
        fps: args.fps.or(config.render.fps),
        unlocked: args.unlocked || config.render.unlocked,
        visible: true,
    };
    if let Some(fps) = window.fps {
        if !fps.is_finite() || fps <= 0.0 {
            bail!("--fps must be greater than zero");
        }
    }

    let rule_text = args.rule.as_deref().unwrap_or(&config.life.rule);
    let rule = RuleSet::parse(rule_text).with_context(|| format!("invalid life rule `{rule_text}`"))?;
    let life = LifeOptions {
        rule,
        cyclic_stages: config.life.cyclic_stages,
        cursor_size: config.life.cursor_size,
        ..LifeOptions::default()
    };

    let catalog = CatalogOptions {
        life,
        smooth_life: smooth_life_rules(&config.smooth_life),
        seed: args.seed.or(config.render.seed),
        live_edit: Some(live_edit_paths(args, config, paths)?),
    };

    Ok(Session {
        window,
        catalog,
        capture_dir: args
            .capture_dir
            .clone()
            .unwrap_or_else(|| config.capture.directory.clone()),
        gif_max_duration: config.capture.gif_max_duration,
    })
}

fn smooth_life_rules(section: &SmoothLifeSection) -> SmoothLifeRules {
    let defaults = SmoothLifeRules::default();
    SmoothLifeRules {
        outer_radius: section.outer_radius.unwrap_or(defaults.outer_radius),
        inner_radius: section.inner_radius.unwrap_or(defaults.inner_radius),
        b1: section.b1.unwrap_or(defaults.b1),
        b2: section.b2.unwrap_or(defaults.b2),
        s1: section.s1.unwrap_or(defaults.s1),
        s2: section.s2.unwrap_or(defaults.s2),
        dt: section.dt.unwrap_or(defaults.dt),
        alpha_m: section.alpha_m.unwrap_or(defaults.alpha_m),
        alpha_n: section.alpha_n.unwrap_or(defaults.alpha_n),
    }
}

/// Flags beat the config. A file named by neither falls back to the seeded
/// starter pair in the data directory.
fn live_edit_paths(args: &RunArgs, config: &SessionConfig, paths: &AppPaths) -> Result<LiveEditOptions> {
    let vertex = args.vertex.clone().or_else(|| config.live_edit.vertex.clone());
    let fragment = args.fragment.clone().or_else(|| config.live_edit.fragment.clone());
    if let (Some(vertex), Some(fragment)) = (&vertex, &fragment) {
        return Ok(LiveEditOptions {
            vertex: vertex.clone(),
            fragment: fragment.clone(),
        });
    }

    let seeded = paths.seed_live_edit()?;
    Ok(LiveEditOptions {
        vertex: vertex.unwrap_or(seeded.vertex),
        fragment: fragment.unwrap_or(seeded.fragment),
    })
}

fn check_program(catalog: &ProgramCatalog, program: Option<&str>) -> Result<()> {
    let Some(name) = program else {
        return Ok(());
    };
    if catalog.position(name).is_none() {
        let known: Vec<&str> = catalog.entries().map(|entry| entry.name.as_str()).collect();
        bail!("unknown program `{name}`; expected one of {}", known.join(", "));
    }
    Ok(())
}

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use directories_next::ProjectDirs;
use programs::{LiveEditOptions, LIVE_FRAGMENT_GLSL, LIVE_VERTEX_GLSL};

pub const ENV_CONFIG_DIR: &str = "VISUALS_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "VISUALS_DATA_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Visuals";
const APPLICATION: &str = "visuals";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;

        Ok(Self {
            config_dir: resolve_dir(ENV_CONFIG_DIR, project_dirs.config_dir()),
            data_dir: resolve_dir(ENV_DATA_DIR, project_dirs.data_dir()),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn live_edit_dir(&self) -> PathBuf {
        self.data_dir.join("live-edit")
    }

    /// Default live-edit pair, written with the starter shaders when absent.
    /// Existing files are never overwritten.
    pub fn seed_live_edit(&self) -> Result<LiveEditOptions> {
        let dir = self.live_edit_dir();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;

        let options = LiveEditOptions {
            vertex: dir.join("live.vert"),
            fragment: dir.join("live.frag"),
        };
        seed_file(&options.vertex, LIVE_VERTEX_GLSL)?;
        seed_file(&options.fragment, LIVE_FRAGMENT_GLSL)?;
        Ok(options)
    }
}

#[cfg(test)]
impl AppPaths {
    pub fn from_raw(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            config_dir,
            data_dir,
        }
    }
}

fn seed_file(path: &Path, contents: &str) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "seeded live edit shader");
    Ok(())
}

fn resolve_dir(env_var: &str, default: &Path) -> PathBuf {
    env_override(env_var).unwrap_or_else(|| default.to_path_buf())
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.as_os_str().is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}

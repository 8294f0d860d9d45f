//! Live reload of vertex/fragment pairs.
//!
//! The notify backend runs on its own thread and only forwards changed paths
//! into a channel. Everything else, reading files and compiling included,
//! happens on the caller's thread inside [`ShaderWatcher::poll`], so the
//! watcher thread never touches GPU state.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::CompileError;
use crate::gpu::{ShaderCompiler, VertexLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(usize);

/// Injects change notifications without a file system watcher.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: Sender<PathBuf>,
}

impl ChangeFeed {
    pub fn notify(&self, path: impl Into<PathBuf>) {
        let _ = self.tx.send(path.into());
    }
}

#[derive(Debug)]
struct WatchedUnit {
    label: String,
    vertex_path: PathBuf,
    fragment_path: PathBuf,
    vertex_key: PathBuf,
    fragment_key: PathBuf,
    layout: VertexLayout,
    /// Last sources that compiled. `None` until the first success.
    vertex_source: Option<String>,
    fragment_source: Option<String>,
    failed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Changed {
    Vertex,
    Fragment,
    Both,
}

pub struct ShaderWatcher {
    units: Vec<Option<WatchedUnit>>,
    changes: Receiver<PathBuf>,
    pending: VecDeque<(WatchId, Changed)>,
    feed: Option<ChangeFeed>,
    backend: Option<RecommendedWatcher>,
    watched_dirs: Vec<PathBuf>,
}

impl ShaderWatcher {
    /// Watcher backed by OS file notifications.
    pub fn new() -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let backend = notify::recommended_watcher(move |result: notify::Result<Event>| match result {
            Ok(event) => {
                if matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    for path in event.paths {
                        let _ = tx.send(path);
                    }
                }
            }
            Err(err) => tracing::warn!(error = %err, "shader file watcher error"),
        })
        .context("failed to create shader file watcher")?;
        Ok(Self::with_parts(rx, None, Some(backend)))
    }

    /// Watcher fed only through the returned [`ChangeFeed`].
    pub fn detached() -> (Self, ChangeFeed) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let feed = ChangeFeed { tx };
        (Self::with_parts(rx, Some(feed.clone()), None), feed)
    }

    fn with_parts(
        changes: Receiver<PathBuf>,
        feed: Option<ChangeFeed>,
        backend: Option<RecommendedWatcher>,
    ) -> Self {
        Self {
            units: Vec::new(),
            changes,
            pending: VecDeque::new(),
            feed,
            backend,
            watched_dirs: Vec::new(),
        }
    }

    /// Feed for injecting changes by hand, present on detached watchers.
    pub fn feed(&self) -> Option<&ChangeFeed> {
        self.feed.as_ref()
    }

    /// Starts watching a pair and makes a first compile attempt.
    ///
    /// Returns `None` when either file cannot be read yet; the unit stays
    /// registered and compiles on the first change.
    pub fn register<C: ShaderCompiler>(
        &mut self,
        compiler: &C,
        label: &str,
        vertex_path: impl AsRef<Path>,
        fragment_path: impl AsRef<Path>,
        layout: &VertexLayout,
    ) -> (WatchId, Option<Result<C::Output, CompileError>>) {
        let vertex_path = vertex_path.as_ref().to_path_buf();
        let fragment_path = fragment_path.as_ref().to_path_buf();
        self.watch_parent(&vertex_path);
        self.watch_parent(&fragment_path);

        let id = WatchId(self.units.len());
        self.units.push(Some(WatchedUnit {
            label: label.to_string(),
            vertex_key: path_key(&vertex_path),
            fragment_key: path_key(&fragment_path),
            vertex_path,
            fragment_path,
            layout: layout.clone(),
            vertex_source: None,
            fragment_source: None,
            failed: true,
        }));

        let result = match self.compile(compiler, id, Changed::Both) {
            Some(Err(CompileError::Io { path, message })) => {
                tracing::warn!(
                    program = label,
                    path = %path.display(),
                    %message,
                    "shader source unavailable at registration"
                );
                None
            }
            other => other,
        };
        (id, result)
    }

    pub fn unregister(&mut self, id: WatchId) {
        if let Some(slot) = self.units.get_mut(id.0) {
            *slot = None;
        }
        self.pending.retain(|(pending, _)| *pending != id);
    }

    /// Handles at most one pending change without blocking.
    pub fn poll<C: ShaderCompiler>(
        &mut self,
        compiler: &C,
    ) -> Option<(WatchId, Result<C::Output, CompileError>)> {
        if self.pending.is_empty() {
            match self.changes.try_recv() {
                Ok(path) => self.route(&path),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return None,
            }
        }
        while let Some((id, changed)) = self.pending.pop_front() {
            if let Some(result) = self.compile(compiler, id, changed) {
                return Some((id, result));
            }
        }
        None
    }

    /// True while the unit's latest compile attempt failed.
    pub fn is_failed(&self, id: WatchId) -> bool {
        self.unit(id).map(|unit| unit.failed).unwrap_or(false)
    }

    /// Last sources that compiled successfully.
    pub fn sources(&self, id: WatchId) -> Option<(&str, &str)> {
        let unit = self.unit(id)?;
        Some((unit.vertex_source.as_deref()?, unit.fragment_source.as_deref()?))
    }

    pub fn paths(&self, id: WatchId) -> Option<(&Path, &Path)> {
        self.unit(id)
            .map(|unit| (unit.vertex_path.as_path(), unit.fragment_path.as_path()))
    }

    fn unit(&self, id: WatchId) -> Option<&WatchedUnit> {
        self.units.get(id.0).and_then(|slot| slot.as_ref())
    }

    fn route(&mut self, path: &Path) {
        let key = path_key(path);
        for (index, slot) in self.units.iter().enumerate() {
            let Some(unit) = slot else { continue };
            let changed = match (unit.vertex_key == key, unit.fragment_key == key) {
                (true, true) => Changed::Both,
                (true, false) => Changed::Vertex,
                (false, true) => Changed::Fragment,
                (false, false) => continue,
            };
            tracing::debug!(program = %unit.label, path = %path.display(), "shader source changed");
            self.pending.push_back((WatchId(index), changed));
        }
    }

    fn compile<C: ShaderCompiler>(
        &mut self,
        compiler: &C,
        id: WatchId,
        changed: Changed,
    ) -> Option<Result<C::Output, CompileError>> {
        let unit = self.units.get_mut(id.0)?.as_mut()?;

        // The changed side is read fresh; the other side reuses the last
        // source that compiled, or the disk when there is none yet.
        let vertex = match (changed, &unit.vertex_source) {
            (Changed::Fragment, Some(source)) => Ok(source.clone()),
            _ => read_source(&unit.vertex_path),
        };
        let fragment = match (changed, &unit.fragment_source) {
            (Changed::Vertex, Some(source)) => Ok(source.clone()),
            _ => read_source(&unit.fragment_path),
        };
        let (vertex, fragment) = match (vertex, fragment) {
            (Ok(vertex), Ok(fragment)) => (vertex, fragment),
            (Err(err), _) | (_, Err(err)) => {
                unit.failed = true;
                return Some(Err(err));
            }
        };

        let result = compiler.compile_program(&unit.label, &vertex, &fragment, &unit.layout);
        match &result {
            Ok(_) => {
                if unit.failed && unit.vertex_source.is_some() {
                    tracing::info!(program = %unit.label, "shader recompiled; resuming");
                }
                unit.vertex_source = Some(vertex);
                unit.fragment_source = Some(fragment);
                unit.failed = false;
            }
            Err(err) => {
                tracing::error!(program = %unit.label, error = %err, "shader recompile failed");
                unit.failed = true;
            }
        }
        Some(result)
    }

    fn watch_parent(&mut self, path: &Path) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let dir = fs::canonicalize(&dir).unwrap_or(dir);
        if self.watched_dirs.contains(&dir) {
            return;
        }
        match backend.watch(&dir, RecursiveMode::NonRecursive) {
            Ok(()) => {
                tracing::debug!(dir = %dir.display(), "watching shader directory");
                self.watched_dirs.push(dir);
            }
            Err(err) => {
                tracing::warn!(dir = %dir.display(), error = %err, "failed to watch shader directory");
            }
        }
    }
}

fn read_source(path: &Path) -> Result<String, CompileError> {
    fs::read_to_string(path).map_err(|err| CompileError::io(path, &err))
}

/// Comparable form of a path: canonical when the file exists, otherwise the
/// canonical parent joined with the file name.
fn path_key(path: &Path) -> PathBuf {
    if let Ok(canonical) = fs::canonicalize(path) {
        return canonical;
    }
    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => {
            let parent = if parent.as_os_str().is_empty() {
                Path::new(".")
            } else {
                parent
            };
            fs::canonicalize(parent)
                .map(|parent| parent.join(name))
                .unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}

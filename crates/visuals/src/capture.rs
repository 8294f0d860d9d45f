//! Writes screenshots and GIF recordings delivered by the window thread.
//!
//! Screenshots land in `<dir>/<timestamp>.png`. Recordings collect frames
//! until the window stops recording or `max_duration` elapses, then encode
//! to `<dir>/gifs/<timestamp>.gif` on a worker thread so the signal loop
//! keeps draining.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use image::codecs::gif::{GifEncoder, Repeat};
use image::imageops::{self, FilterType};
use image::{Delay, Frame, ImageFormat, RgbaImage};

/// Recorded frames wider than this are scaled down before they are kept.
pub const GIF_MAX_WIDTH: u32 = 640;
/// Frames arriving sooner than this after the last kept one are dropped.
pub const GIF_FRAME_INTERVAL: Duration = Duration::from_millis(40);

struct Recording {
    started: Instant,
    frames: Vec<(Instant, RgbaImage)>,
    full: bool,
}

pub struct CaptureSink {
    directory: PathBuf,
    max_duration: Duration,
    recording: Option<Recording>,
    encoders: Vec<JoinHandle<Result<PathBuf>>>,
}

impl CaptureSink {
    pub fn new(directory: impl Into<PathBuf>, max_duration: Duration) -> Self {
        Self {
            directory: directory.into(),
            max_duration,
            recording: None,
            encoders: Vec::new(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    pub fn screenshot(&self, image: &RgbaImage) -> Result<PathBuf> {
        fs::create_dir_all(&self.directory)
            .with_context(|| format!("failed to create {}", self.directory.display()))?;
        let path = unique_path(&self.directory, &timestamp(), "png");
        image
            .save_with_format(&path, ImageFormat::Png)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "saved screenshot");
        Ok(path)
    }

    pub fn start_recording(&mut self, at: Instant) {
        if self.recording.is_some() {
            tracing::debug!("recording already in progress");
            return;
        }
        self.recording = Some(Recording {
            started: at,
            frames: Vec::new(),
            full: false,
        });
        tracing::info!(limit = ?self.max_duration, "recording started");
    }

    /// Keeps `image` when a recording is running, it is inside the time
    /// limit and it is far enough from the previous frame.
    pub fn record_frame(&mut self, image: RgbaImage, at: Instant) {
        let max_duration = self.max_duration;
        let Some(recording) = self.recording.as_mut() else {
            return;
        };
        if at.saturating_duration_since(recording.started) > max_duration {
            if !recording.full {
                recording.full = true;
                tracing::warn!(limit = ?max_duration, "recording reached its length limit");
            }
            return;
        }
        if let Some((last, _)) = recording.frames.last() {
            if at.saturating_duration_since(*last) < GIF_FRAME_INTERVAL {
                return;
            }
        }
        recording.frames.push((at, shrink(image)));
    }

    /// Hands the collected frames to an encoder thread. Returns the target
    /// path, or `None` when nothing was recorded.
    pub fn stop_recording(&mut self) -> Result<Option<PathBuf>> {
        let Some(recording) = self.recording.take() else {
            return Ok(None);
        };
        if recording.frames.is_empty() {
            tracing::warn!("recording stopped without frames");
            return Ok(None);
        }

        let dir = self.directory.join("gifs");
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        let path = unique_path(&dir, &timestamp(), "gif");
        let frames = gif_frames(recording.frames);
        tracing::info!(frames = frames.len(), path = %path.display(), "encoding recording");

        let target = path.clone();
        let handle = thread::Builder::new()
            .name("visuals-gif".into())
            .spawn(move || encode_gif(&target, frames).map(|()| target))
            .map_err(|err| anyhow!("failed to spawn gif encoder: {err}"))?;
        self.encoders.push(handle);
        Ok(Some(path))
    }

    /// Stops any running recording and waits for every encoder.
    pub fn finish(mut self) -> Result<Vec<PathBuf>> {
        self.stop_recording()?;
        let mut written = Vec::new();
        for handle in self.encoders.drain(..) {
            let path = handle
                .join()
                .map_err(|err| anyhow!("gif encoder panicked: {err:?}"))??;
            tracing::info!(path = %path.display(), "saved recording");
            written.push(path);
        }
        Ok(written)
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d%H%M%S").to_string()
}

/// `<dir>/<stem>.<ext>`, suffixed with `-N` while the name is taken.
fn unique_path(dir: &Path, stem: &str, extension: &str) -> PathBuf {
    let mut path = dir.join(format!("{stem}.{extension}"));
    let mut counter = 1;
    while path.exists() {
        path = dir.join(format!("{stem}-{counter}.{extension}"));
        counter += 1;
    }
    path
}

fn shrink(image: RgbaImage) -> RgbaImage {
    if image.width() <= GIF_MAX_WIDTH {
        return image;
    }
    let height = (u64::from(image.height()) * u64::from(GIF_MAX_WIDTH) / u64::from(image.width()))
        .max(1) as u32;
    imageops::resize(&image, GIF_MAX_WIDTH, height, FilterType::Nearest)
}

/// Each frame is shown until the next one arrived; the last one for a
/// single interval.
fn gif_frames(frames: Vec<(Instant, RgbaImage)>) -> Vec<Frame> {
    let arrivals: Vec<Instant> = frames.iter().map(|(at, _)| *at).collect();
    frames
        .into_iter()
        .enumerate()
        .map(|(index, (at, image))| {
            let shown = arrivals
                .get(index + 1)
                .map(|next| next.saturating_duration_since(at))
                .unwrap_or(GIF_FRAME_INTERVAL);
            Frame::from_parts(image, 0, 0, Delay::from_saturating_duration(shown))
        })
        .collect()
}

fn encode_gif(path: &Path, frames: Vec<Frame>) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut encoder = GifEncoder::new(BufWriter::new(file));
    encoder.set_repeat(Repeat::Infinite)?;
    encoder
        .encode_frames(frames)
        .with_context(|| format!("failed to encode {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    fn solid(width: u32, height: u32, value: u8) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([value, 0, 0, 255]))
    }

    #[test]
    fn screenshot_writes_png() {
        let dir = TempDir::new().unwrap();
        let sink = CaptureSink::new(dir.path().join("shots"), Duration::from_secs(1));
        let first = sink.screenshot(&solid(8, 4, 200)).unwrap();
        let second = sink.screenshot(&solid(8, 4, 100)).unwrap();
        assert_ne!(first, second);

        let decoded = image::open(&first).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (8, 4));
        assert_eq!(decoded.get_pixel(3, 2), &Rgba([200, 0, 0, 255]));
    }

    #[test]
    fn recording_respects_interval_and_limit() {
        let dir = TempDir::new().unwrap();
        let mut sink = CaptureSink::new(dir.path(), Duration::from_millis(200));
        let start = Instant::now();
        sink.record_frame(solid(4, 4, 1), start);
        assert!(!sink.is_recording());

        sink.start_recording(start);
        for step in 0..20u64 {
            sink.record_frame(solid(4, 4, step as u8), start + Duration::from_millis(step * 20));
        }
        let kept = sink.recording.as_ref().unwrap().frames.len();
        // 0, 40, .., 200 ms
        assert_eq!(kept, 6);

        let path = sink.stop_recording().unwrap().unwrap();
        assert!(path.starts_with(dir.path().join("gifs")));
        let written = sink.finish().unwrap();
        assert_eq!(written, vec![path.clone()]);
        assert!(fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn empty_recording_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut sink = CaptureSink::new(dir.path(), Duration::from_secs(1));
        sink.start_recording(Instant::now());
        assert_eq!(sink.stop_recording().unwrap(), None);
        assert!(sink.finish().unwrap().is_empty());
        assert!(!dir.path().join("gifs").exists());
    }

    #[test]
    fn wide_frames_shrink() {
        let shrunk = shrink(solid(1280, 720, 9));
        assert_eq!(shrunk.dimensions(), (GIF_MAX_WIDTH, 360));
        assert_eq!(shrink(solid(320, 200, 9)).dimensions(), (320, 200));
    }
}

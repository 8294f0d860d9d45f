use std::time::{Duration, Instant};

use crate::types::{CursorState, Size};

/// Values handed to a program for one rendered frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Seconds since the program was loaded.
    pub seconds: f32,
    /// Rendered frames since the program was loaded; command frames do not
    /// count.
    pub frame: u64,
    pub cursor: CursorState,
    pub size: Size,
}

/// Monotonic time plus the frame counter for the running program.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    origin: Instant,
    frame: u64,
}

impl FrameClock {
    pub fn new(now: Instant) -> Self {
        Self {
            origin: now,
            frame: 0,
        }
    }

    pub fn reset(&mut self, now: Instant) {
        self.origin = now;
        self.frame = 0;
    }

    pub fn seconds(&self, now: Instant) -> f32 {
        now.saturating_duration_since(self.origin).as_secs_f32()
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Counts one rendered frame.
    pub fn advance(&mut self) {
        self.frame = self.frame.saturating_add(1);
    }
}

/// How the render loop paces frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingMode {
    /// One frame per refresh interval, presented with vsync.
    Locked,
    /// Render as fast as the loop spins.
    Unlocked,
}

/// Decides when the next frame is due.
#[derive(Debug, Clone)]
pub struct FramePacer {
    mode: PacingMode,
    interval: Duration,
    last: Option<Instant>,
}

impl FramePacer {
    /// Pacer for a display refreshing at `fps` frames per second.
    pub fn new(fps: f32, mode: PacingMode) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 60.0 };
        Self {
            mode,
            interval: Duration::from_secs_f32(1.0 / fps),
            last: None,
        }
    }

    pub fn mode(&self) -> PacingMode {
        self.mode
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_mode(&mut self, mode: PacingMode) {
        self.mode = mode;
    }

    /// Flips between locked and unlocked pacing, returning the new mode.
    pub fn toggle(&mut self) -> PacingMode {
        self.mode = match self.mode {
            PacingMode::Locked => PacingMode::Unlocked,
            PacingMode::Unlocked => PacingMode::Locked,
        };
        self.mode
    }

    pub fn ready_for_frame(&self, now: Instant) -> bool {
        match (self.mode, self.last) {
            (PacingMode::Unlocked, _) | (PacingMode::Locked, None) => true,
            (PacingMode::Locked, Some(last)) => now >= last + self.interval,
        }
    }

    pub fn mark_rendered(&mut self, now: Instant) {
        self.last = Some(now);
    }

    /// When the next locked frame is due; `None` while unlocked.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.mode {
            PacingMode::Locked => self.last.map(|last| last + self.interval),
            PacingMode::Unlocked => None,
        }
    }
}

/// Rolling frames-per-second counter, reporting about once a second.
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    window_start: Option<Instant>,
    frames: u32,
    total: u64,
    fps: Option<f32>,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a presented frame. Returns the fresh fps value when a full
    /// second has passed since the last report.
    pub fn record(&mut self, now: Instant) -> Option<f32> {
        self.total = self.total.saturating_add(1);
        let start = *self.window_start.get_or_insert(now);
        self.frames += 1;
        let elapsed = now.saturating_duration_since(start);
        if elapsed < Duration::from_secs(1) {
            return None;
        }
        let fps = self.frames as f32 / elapsed.as_secs_f32();
        self.fps = Some(fps);
        self.frames = 0;
        self.window_start = Some(now);
        Some(fps)
    }

    pub fn fps(&self) -> Option<f32> {
        self.fps
    }

    pub fn total_frames(&self) -> u64 {
        self.total
    }

    pub fn title(fps: f32, size: Size) -> String {
        format!("{fps:.2} FPS @ {size}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_pacer_waits_for_interval() {
        let start = Instant::now();
        let mut pacer = FramePacer::new(50.0, PacingMode::Locked);
        assert!(pacer.ready_for_frame(start));
        pacer.mark_rendered(start);
        assert!(!pacer.ready_for_frame(start + Duration::from_millis(5)));
        assert!(pacer.ready_for_frame(start + Duration::from_millis(20)));
        assert_eq!(pacer.next_deadline(), Some(start + pacer.interval()));
    }

    #[test]
    fn unlocked_pacer_is_always_ready() {
        let start = Instant::now();
        let mut pacer = FramePacer::new(60.0, PacingMode::Locked);
        pacer.mark_rendered(start);
        assert_eq!(pacer.toggle(), PacingMode::Unlocked);
        assert!(pacer.ready_for_frame(start));
        assert_eq!(pacer.next_deadline(), None);
    }

    #[test]
    fn invalid_refresh_rate_falls_back_to_sixty() {
        let pacer = FramePacer::new(0.0, PacingMode::Locked);
        assert_eq!(pacer.interval(), Duration::from_secs_f32(1.0 / 60.0));
    }

    #[test]
    fn stats_report_once_per_second() {
        let start = Instant::now();
        let mut stats = FrameStats::new();
        for i in 0..30 {
            assert!(stats.record(start + Duration::from_millis(i * 30)).is_none());
        }
        let fps = stats.record(start + Duration::from_millis(1000)).unwrap();
        assert!((fps - 31.0).abs() < 0.01, "{fps}");
        assert_eq!(stats.total_frames(), 31);
        assert_eq!(FrameStats::title(59.94, Size::new(800, 600)), "59.94 FPS @ 800x600");
    }

    #[test]
    fn clock_counts_frames_and_resets() {
        let start = Instant::now();
        let mut clock = FrameClock::new(start);
        clock.advance();
        clock.advance();
        assert_eq!(clock.frame(), 2);
        assert!((clock.seconds(start + Duration::from_millis(1500)) - 1.5).abs() < 1e-3);
        clock.reset(start);
        assert_eq!(clock.frame(), 0);
    }
}

//! Arrangement timeline, the piano roll's sibling on the shared time axis.
//!
//! Timeline positions are in seconds. The panel keeps its own zoom but takes
//! its scroll offset from the [`ScrollSync`](crate::scroll::ScrollSync)
//! owner like every other panel.

use crate::scroll::{ScrollOffset, ScrollPort};

pub const PIXELS_PER_SECOND_BASE: f32 = 50.0;
pub const DEFAULT_TOTAL_DURATION: f64 = 32.0;
pub const MIN_ZOOM: f32 = 0.1;
pub const MAX_ZOOM: f32 = 3.0;
pub const ZOOM_STEP: f32 = 0.1;
pub const FRAMES_PER_SECOND: u32 = 30;
pub const BEAT_SUBDIVISIONS: u32 = 4;
pub const CLIP_MIN_DURATION: f64 = 0.1;

/// `MM:SS:FF` at 30 frames per second.
pub fn format_time(seconds: f64) -> String {
    let seconds = if seconds.is_finite() {
        seconds.max(0.0)
    } else {
        0.0
    };
    let minutes = (seconds / 60.0).floor() as u64;
    let secs = (seconds % 60.0).floor() as u64;
    let frames = ((seconds % 1.0) * f64::from(FRAMES_PER_SECOND)).floor() as u64;
    format!("{minutes:02}:{secs:02}:{frames:02}")
}

pub fn clamp_time(time: f64, min: f64, max: Option<f64>) -> f64 {
    let time = time.max(min);
    match max {
        Some(max) => time.min(max),
        None => time,
    }
}

pub fn clamp_duration(duration: f64, min: f64, max: Option<f64>) -> f64 {
    clamp_time(duration, min, max)
}

#[derive(Debug)]
pub struct TimelineView {
    zoom: f32,
    total_duration: f64,
    snap_to_grid: bool,
    beats_per_second: f64,
    scroll: ScrollOffset,
    port: Option<ScrollPort>,
}

impl Default for TimelineView {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            total_duration: DEFAULT_TOTAL_DURATION,
            snap_to_grid: true,
            beats_per_second: 1.0,
            scroll: ScrollOffset::ZERO,
            port: None,
        }
    }
}

impl TimelineView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_port(mut self, port: ScrollPort) -> Self {
        self.scroll = port.offset();
        self.port = Some(port);
        self
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        self.zoom = if zoom.is_finite() {
            zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            1.0
        };
        self.zoom
    }

    pub fn zoom_in(&mut self) -> f32 {
        self.set_zoom(self.zoom + ZOOM_STEP)
    }

    pub fn zoom_out(&mut self) -> f32 {
        self.set_zoom(self.zoom - ZOOM_STEP)
    }

    pub fn pixels_per_second(&self) -> f32 {
        PIXELS_PER_SECOND_BASE * self.zoom
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn set_total_duration(&mut self, seconds: f64) {
        if seconds.is_finite() && seconds > 0.0 {
            self.total_duration = seconds;
        }
    }

    pub fn content_width(&self) -> f32 {
        (self.total_duration * f64::from(self.pixels_per_second())) as f32
    }

    pub fn snap_to_grid(&self) -> bool {
        self.snap_to_grid
    }

    pub fn set_snap_to_grid(&mut self, enabled: bool) {
        self.snap_to_grid = enabled;
    }

    pub fn set_beats_per_second(&mut self, beats_per_second: f64) {
        if beats_per_second.is_finite() && beats_per_second > 0.0 {
            self.beats_per_second = beats_per_second;
        }
    }

    /// Round to a quarter of a beat when snapping is on.
    pub fn snap(&self, seconds: f64) -> f64 {
        if !self.snap_to_grid {
            return seconds;
        }
        let subdivision = 1.0 / self.beats_per_second / f64::from(BEAT_SUBDIVISIONS);
        (seconds / subdivision).round() * subdivision
    }

    pub fn time_from_x(&self, x: f32) -> f64 {
        let seconds = f64::from(x + self.scroll.x) / f64::from(self.pixels_per_second());
        clamp_time(seconds, 0.0, Some(self.total_duration))
    }

    pub fn x_from_time(&self, seconds: f64) -> f32 {
        (seconds * f64::from(self.pixels_per_second())) as f32 - self.scroll.x
    }

    pub fn scroll(&self) -> ScrollOffset {
        self.scroll
    }

    /// Follow the shared scroll offset. Returns `true` if the view moved.
    pub fn sync_scroll(&mut self) -> bool {
        let Some(port) = self.port.as_mut() else {
            return false;
        };
        match port.pull() {
            Some(offset) => {
                self.scroll = offset;
                true
            }
            None => false,
        }
    }

    /// The user scrolled the timeline itself.
    pub fn on_user_scroll(&mut self, offset: ScrollOffset) {
        self.scroll = offset.clamped();
        if let Some(port) = self.port.as_mut() {
            port.emit(self.scroll);
        }
    }
}

use egui::{vec2, Vec2};

use crate::config::{EditorConfig, ZoomRange};
use crate::mapper::CoordinateMapper;
use crate::scroll::ScrollOffset;

/// Zoom, scroll and size of the piano roll panel.
///
/// Mutated only through the setters; every setter clamps.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    zoom: f32,
    range: ZoomRange,
    scroll: ScrollOffset,
    size: Vec2,
    width_percent: f32,
    height_percent: f32,
}

impl Viewport {
    pub fn new(range: ZoomRange) -> Self {
        Self {
            zoom: range.clamp(range.default),
            range,
            scroll: ScrollOffset::ZERO,
            size: Vec2::ZERO,
            width_percent: 50.0,
            height_percent: 100.0,
        }
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn zoom_range(&self) -> ZoomRange {
        self.range
    }

    /// Returns the zoom actually applied.
    pub fn set_zoom(&mut self, zoom: f32) -> f32 {
        self.zoom = self.range.clamp(zoom);
        self.zoom
    }

    pub fn zoom_in(&mut self) -> f32 {
        self.step_zoom(1.0)
    }

    pub fn zoom_out(&mut self) -> f32 {
        self.step_zoom(-1.0)
    }

    fn step_zoom(&mut self, direction: f32) -> f32 {
        let step = self.range.step;
        if step <= 0.0 || !step.is_finite() {
            return self.zoom;
        }
        let steps = (self.zoom / step).round() + direction;
        self.set_zoom(steps * step)
    }

    pub fn scroll(&self) -> ScrollOffset {
        self.scroll
    }

    pub fn set_scroll(&mut self, offset: ScrollOffset) {
        self.scroll = offset.clamped();
    }

    /// Pixel size of the panel.
    pub fn size(&self) -> Vec2 {
        self.size
    }

    pub fn set_size(&mut self, width: f32, height: f32) {
        self.size = vec2(width.max(0.0), height.max(0.0));
    }

    pub fn width_percent(&self) -> f32 {
        self.width_percent
    }

    pub fn height_percent(&self) -> f32 {
        self.height_percent
    }

    /// Presentational only; the gesture logic never reads these.
    pub fn set_percent(&mut self, width: f32, height: f32) {
        self.width_percent = width.clamp(0.0, 100.0);
        self.height_percent = height.clamp(0.0, 100.0);
    }

    pub fn mapper(&self, config: &EditorConfig) -> CoordinateMapper {
        CoordinateMapper::from_config(config, self.zoom, self.scroll.x)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ZoomRange::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zoom_steps_and_clamps() {
        let mut viewport = Viewport::default();
        assert_eq!(viewport.zoom(), 1.0);
        assert!((viewport.zoom_in() - 1.1).abs() < 1e-5);
        assert_eq!(viewport.set_zoom(7.0), 3.0);
        assert_eq!(viewport.zoom_in(), 3.0);
        assert_eq!(viewport.set_zoom(0.5), 0.5);
        assert_eq!(viewport.zoom_out(), 0.5);
    }

    #[test]
    fn mapper_follows_zoom_and_scroll() {
        let config = EditorConfig::default();
        let mut viewport = Viewport::default();
        viewport.set_zoom(2.0);
        viewport.set_scroll(ScrollOffset::new(60.0, 0.0));
        let mapper = viewport.mapper(&config);
        assert_eq!(mapper.beat_width(), 120.0);
        assert_eq!(mapper.time_from_x(60.0), 1.0);
    }

    #[test]
    fn scroll_is_never_negative() {
        let mut viewport = Viewport::default();
        viewport.set_scroll(ScrollOffset::new(-10.0, -1.0));
        assert_eq!(viewport.scroll(), ScrollOffset::ZERO);
    }
}

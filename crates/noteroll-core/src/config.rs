use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::pacing::DragUpdates;
use crate::store::FailurePolicy;

/// Allowed zoom range of the piano roll.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub default: f32,
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl Default for ZoomRange {
    fn default() -> Self {
        Self {
            default: 1.0,
            min: 0.5,
            max: 3.0,
            step: 0.1,
        }
    }
}

impl ZoomRange {
    pub fn clamp(&self, zoom: f32) -> f32 {
        if !zoom.is_finite() {
            return self.default.clamp(self.min, self.max);
        }
        zoom.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub note_height: f32,
    pub base_beat_width: f32,
    pub piano_width: f32,
    pub visible_beats: u32,
    pub snap_division: u32,
    pub min_duration: f64,
    pub default_velocity: u8,
    pub zoom: ZoomRange,
    pub drag_updates: DragUpdates,
    pub failure_policy: FailurePolicy,
    pub engine_queue_capacity: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            note_height: 20.0,
            base_beat_width: 60.0,
            piano_width: 80.0,
            visible_beats: 32,
            snap_division: 4,
            min_duration: 0.25,
            default_velocity: 100,
            zoom: ZoomRange::default(),
            drag_updates: DragUpdates::PerFrame,
            failure_policy: FailurePolicy::Ignore,
            engine_queue_capacity: 256,
        }
    }
}

impl EditorConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: EditorConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.note_height > 0.0 && self.note_height.is_finite()) {
            return Err(ConfigError::Invalid("note_height must be positive"));
        }
        if !(self.base_beat_width > 0.0 && self.base_beat_width.is_finite()) {
            return Err(ConfigError::Invalid("base_beat_width must be positive"));
        }
        if !(self.min_duration > 0.0 && self.min_duration.is_finite()) {
            return Err(ConfigError::Invalid("min_duration must be positive"));
        }
        if !(self.piano_width >= 0.0 && self.piano_width.is_finite()) {
            return Err(ConfigError::Invalid("piano_width must not be negative"));
        }
        if self.snap_division == 0 {
            return Err(ConfigError::Invalid("snap_division must be at least 1"));
        }
        let zoom = &self.zoom;
        if !(zoom.min > 0.0 && zoom.min <= zoom.max && zoom.max.is_finite()) {
            return Err(ConfigError::Invalid("zoom range is empty"));
        }
        if self.engine_queue_capacity == 0 {
            return Err(ConfigError::Invalid("engine_queue_capacity must be non-zero"));
        }
        Ok(())
    }

    pub fn with_snap_division(mut self, division: u32) -> Self {
        self.snap_division = division;
        self
    }

    pub fn with_drag_updates(mut self, mode: DragUpdates) -> Self {
        self.drag_updates = mode;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_min_duration(mut self, beats: f64) -> Self {
        self.min_duration = beats;
        self
    }
}

//! Split layout hosting the piano roll, the timeline and the property panel.
//!
//! The piano roll sits on the left; the timeline and property panel share the
//! right column. Both gaps can be dragged, and a press close to where they
//! meet drags both at once.

use egui::{Pos2, Rect};

pub const MIN_SPLIT: f32 = 20.0;
pub const MAX_SPLIT: f32 = 80.0;
/// Distance from the other gap, in pixels, that starts a dual drag.
pub const DUAL_DRAG_THRESHOLD: f32 = 20.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gap {
    /// Between the piano roll and the right column.
    Vertical,
    /// Between the timeline and the property panel.
    Horizontal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorHint {
    ColResize,
    RowResize,
    Move,
}

/// Screen rectangles the split percentages refer to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutArea {
    /// The whole split area below the status bar.
    pub bottom: Rect,
    /// The right column.
    pub right: Rect,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Dragging {
    vertical: bool,
    horizontal: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PanelLayout {
    left_width: f32,
    right_top_height: f32,
    dragging: Dragging,
}

impl Default for PanelLayout {
    fn default() -> Self {
        Self {
            left_width: 50.0,
            right_top_height: 50.0,
            dragging: Dragging::default(),
        }
    }
}

fn clamp_split(percent: f32) -> f32 {
    if percent.is_nan() {
        return 50.0;
    }
    percent.clamp(MIN_SPLIT, MAX_SPLIT)
}

impl PanelLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Width of the piano roll, in percent.
    pub fn left_width(&self) -> f32 {
        self.left_width
    }

    /// Height of the timeline within the right column, in percent.
    pub fn right_top_height(&self) -> f32 {
        self.right_top_height
    }

    pub fn property_height(&self) -> f32 {
        100.0 - self.right_top_height
    }

    pub fn set_left_width(&mut self, percent: f32) {
        self.left_width = clamp_split(percent);
    }

    pub fn set_right_top_height(&mut self, percent: f32) {
        self.right_top_height = clamp_split(percent);
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging.vertical || self.dragging.horizontal
    }

    fn vertical_gap_x(&self, area: &LayoutArea) -> f32 {
        area.bottom.left() + area.bottom.width() * self.left_width / 100.0
    }

    fn horizontal_gap_y(&self, area: &LayoutArea) -> f32 {
        area.right.top() + area.right.height() * self.right_top_height / 100.0
    }

    fn near_other_gap(&self, gap: Gap, pointer: Pos2, area: &LayoutArea) -> bool {
        match gap {
            Gap::Vertical => (pointer.y - self.horizontal_gap_y(area)).abs() <= DUAL_DRAG_THRESHOLD,
            Gap::Horizontal => (pointer.x - self.vertical_gap_x(area)).abs() <= DUAL_DRAG_THRESHOLD,
        }
    }

    /// Cursor to show while hovering `gap`.
    pub fn cursor(&self, gap: Gap, pointer: Pos2, area: &LayoutArea) -> CursorHint {
        if self.near_other_gap(gap, pointer, area) {
            CursorHint::Move
        } else {
            match gap {
                Gap::Vertical => CursorHint::ColResize,
                Gap::Horizontal => CursorHint::RowResize,
            }
        }
    }

    pub fn gap_pointer_down(&mut self, gap: Gap, pointer: Pos2, area: &LayoutArea) {
        self.dragging = if self.near_other_gap(gap, pointer, area) {
            Dragging {
                vertical: true,
                horizontal: true,
            }
        } else {
            Dragging {
                vertical: gap == Gap::Vertical,
                horizontal: gap == Gap::Horizontal,
            }
        };
    }

    pub fn pointer_move(&mut self, pointer: Pos2, area: &LayoutArea) {
        if self.dragging.vertical && area.bottom.width() > 0.0 {
            self.set_left_width((pointer.x - area.bottom.left()) / area.bottom.width() * 100.0);
        }
        if self.dragging.horizontal && area.right.height() > 0.0 {
            self.set_right_top_height((pointer.y - area.right.top()) / area.right.height() * 100.0);
        }
    }

    pub fn pointer_up(&mut self) {
        self.dragging = Dragging::default();
    }
}

//! Floating gap sensor: covers the margin between a floating view and its
//! screen edge, and confirms the pointer really left before the view hides.

use std::time::{Duration, Instant};

use tracing::trace;

use super::sensor::{SensorInput, SensorSurface};
use crate::common::coalesce::CoalescingTrigger;
use crate::sys::geometry::{Edge, FormFactor, Rect};
use crate::sys::window_manager::{SensorKind, WindowManager};

/// The gap between `view` and the output edge, `margin + 1` deep and as long
/// as the view.
pub fn floating_gap_geometry(view: Rect, output: Rect, edge: Edge, margin: i32) -> Rect {
    let depth = margin.max(0) + 1;
    let len = view.length(edge.form_factor()).max(1);
    match edge.form_factor() {
        FormFactor::Horizontal => {
            let x = view.x.max(output.x);
            let y = match edge {
                Edge::Top => output.y,
                _ => output.max_y() - depth,
            };
            Rect::new(x, y, len, depth)
        }
        FormFactor::Vertical => {
            let y = view.y.max(output.y);
            let x = match edge {
                Edge::Left => output.x,
                _ => output.max_x() - depth,
            };
            Rect::new(x, y, depth, len)
        }
    }
}

#[derive(Debug)]
pub struct FloatingGapSensor {
    surface: SensorSurface,
    margin: i32,
    contains_mouse: bool,
    checking: bool,
    check: CoalescingTrigger,
}

impl FloatingGapSensor {
    pub fn new(margin: i32, check_interval: Duration) -> Self {
        Self {
            surface: SensorSurface::new(SensorKind::FloatingGap),
            margin,
            contains_mouse: false,
            checking: false,
            check: CoalescingTrigger::new(check_interval),
        }
    }

    pub fn surface(&self) -> &SensorSurface { &self.surface }

    pub fn is_checking(&self) -> bool { self.checking }

    pub fn set_margin(&mut self, margin: i32) { self.margin = margin; }

    pub fn update_geometry(
        &mut self,
        wm: &dyn WindowManager,
        view: Rect,
        output: Rect,
        edge: Edge,
        sliding: bool,
    ) {
        if sliding {
            return;
        }
        let geometry = floating_gap_geometry(view, output, edge, self.margin);
        self.surface.set_geometry(wm, geometry);
    }

    /// Shows the gap window and waits to see whether the pointer turns up
    /// in it.
    pub fn begin_check(&mut self, wm: &dyn WindowManager, now: Instant) {
        trace!("checking floating gap for the pointer");
        self.checking = true;
        self.check.schedule(now);
        self.surface.set_visible(wm, true);
    }

    /// Feeds pointer input. While a check runs, returns its outcome as
    /// "pointer gone".
    pub fn handle_input(&mut self, wm: &dyn WindowManager, input: SensorInput) -> Option<bool> {
        match input {
            SensorInput::Entered | SensorInput::DragEntered => {
                self.contains_mouse = true;
                self.finish(wm, false)
            }
            SensorInput::Left | SensorInput::DragLeft => {
                self.contains_mouse = false;
                self.finish(wm, true)
            }
        }
    }

    pub fn poll(&mut self, wm: &dyn WindowManager, now: Instant) -> Option<bool> {
        if !self.check.poll(now) || self.contains_mouse {
            return None;
        }
        self.finish(wm, true)
    }

    pub fn next_deadline(&self) -> Option<Instant> { self.check.deadline() }

    pub fn surface_lost(&mut self, wm: &dyn WindowManager) {
        self.surface.lost(wm);
        self.surface.ensure(wm);
    }

    pub fn destroy(&mut self, wm: &dyn WindowManager) {
        self.check.stop();
        self.checking = false;
        self.surface.destroy(wm);
    }

    fn finish(&mut self, wm: &dyn WindowManager, pointer_gone: bool) -> Option<bool> {
        if !self.checking {
            return None;
        }
        self.checking = false;
        self.check.stop();
        self.surface.set_visible(wm, false);
        Some(pointer_gone)
    }
}

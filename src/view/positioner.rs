//! Computes where a view window goes.
//!
//! Lengths along the edge are fractions of the output (or, for vertical
//! panels, of the largest strip left free by other views' struts). A panel
//! view is sized to `max_length` and aligned; a dock view spans the whole
//! edge and masks its content instead.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::common::coalesce::{CoalescingTrigger, earliest};
use crate::common::config::ViewConfig;
use crate::model::view::Alignment;
use crate::sys::geometry::{Edge, Rect, subtract_all};

/// Everything a geometry computation reads.
#[derive(Debug, Clone, Copy)]
pub struct Placement<'a> {
    pub output: Rect,
    pub edge: Edge,
    pub alignment: Alignment,
    /// Fraction, `0.0..=1.0`.
    pub max_length: f64,
    /// Fraction, `-1.0..=1.0`.
    pub offset: f64,
    pub thickness: i32,
    pub screen_edge_margin: i32,
    pub behave_as_panel: bool,
    /// Struts of other views on the same output.
    pub reserved: &'a [Rect],
}

impl<'a> Placement<'a> {
    pub fn for_view(config: &ViewConfig, output: Rect, reserved: &'a [Rect]) -> Self {
        let descriptor = config.descriptor();
        Self {
            output,
            edge: descriptor.edge,
            alignment: descriptor.alignment,
            max_length: descriptor.max_length,
            offset: descriptor.offset,
            thickness: descriptor.thickness,
            screen_edge_margin: config.screen_edge_margin,
            behave_as_panel: config.behave_as_panel,
            reserved,
        }
    }

    /// The region the view is laid out in.
    pub fn layout_area(&self) -> Rect {
        if self.edge.is_horizontal() || !self.behave_as_panel {
            return self.output;
        }
        let depth = self.thickness.max(1) + self.screen_edge_margin.max(0);
        let strip = match self.edge {
            Edge::Right => {
                Rect::new(self.output.max_x() - depth, self.output.y, depth, self.output.height)
            }
            _ => Rect::new(self.output.x, self.output.y, depth, self.output.height),
        };
        let best = subtract_all(strip, self.reserved).into_iter().max_by_key(Rect::area);
        match best {
            Some(free) => Rect::new(self.output.x, free.y, self.output.width, free.height),
            None => self.output,
        }
    }
}

/// Resting geometry of the view, before any slide.
pub fn compute_geometry(placement: &Placement) -> Rect {
    let area = placement.layout_area();
    let len = area.length(placement.edge.form_factor());
    let len_f = len as f64;
    let thickness = placement.thickness.max(1);
    let margin = placement.screen_edge_margin.max(0);

    let (main_start, main_len, depth, inset) = if placement.behave_as_panel {
        let main_len = ((len_f * placement.max_length) as i32).clamp(1, len.max(1));
        let gap = (len_f * placement.offset) as i32;
        let start = match placement.alignment {
            Alignment::Start => gap,
            Alignment::End => len - main_len - gap,
            Alignment::Center | Alignment::Justify => {
                (len_f * (1.0 - placement.max_length) / 2.0 + len_f * placement.offset) as i32
            }
        };
        (start, main_len, thickness, margin)
    } else {
        (0, len.max(1), thickness + margin, 0)
    };

    match placement.edge {
        Edge::Top => Rect::new(area.x + main_start, area.y + inset, main_len, depth),
        Edge::Bottom => {
            Rect::new(area.x + main_start, area.max_y() - depth - inset, main_len, depth)
        }
        Edge::Left => Rect::new(area.x + inset, area.y + main_start, depth, main_len),
        Edge::Right => {
            Rect::new(area.max_x() - depth - inset, area.y + main_start, depth, main_len)
        }
    }
}

/// Moves `rest` toward its edge by `|slide|`, keeping at least one pixel on
/// the output.
pub fn apply_slide(rest: Rect, edge: Edge, output: Rect, slide: i32) -> Rect {
    let s = slide.abs();
    match edge {
        Edge::Top => Rect { y: (rest.y - s).max(output.y - rest.height + 1), ..rest },
        Edge::Bottom => Rect { y: (rest.y + s).min(output.max_y() - 1), ..rest },
        Edge::Left => Rect { x: (rest.x - s).max(output.x - rest.width + 1), ..rest },
        Edge::Right => Rect { x: (rest.x + s).min(output.max_x() - 1), ..rest },
    }
}

#[derive(Debug)]
pub struct Positioner {
    rest: Option<Rect>,
    valid: Option<Rect>,
    output: Option<Rect>,
    edge: Edge,
    slide_offset: i32,
    observed: Option<Rect>,
    sync: CoalescingTrigger,
    validation: CoalescingTrigger,
}

impl Positioner {
    pub fn new(edge: Edge, sync_debounce: Duration, validation_interval: Duration) -> Self {
        Self {
            rest: None,
            valid: None,
            output: None,
            edge,
            slide_offset: 0,
            observed: None,
            sync: CoalescingTrigger::new(sync_debounce),
            validation: CoalescingTrigger::new(validation_interval),
        }
    }

    /// The geometry the view should have right now, slide included.
    pub fn geometry(&self) -> Option<Rect> { self.valid }

    /// The geometry the view has when fully shown.
    pub fn rest_geometry(&self) -> Option<Rect> { self.rest }

    pub fn slide_offset(&self) -> i32 { self.slide_offset }

    pub fn is_sliding(&self) -> bool { self.slide_offset != 0 }

    /// Coalesces geometry-affecting changes into one later [`Positioner::sync`].
    pub fn request_sync(&mut self, now: Instant) { self.sync.schedule(now); }

    pub fn sync_due(&mut self, now: Instant) -> bool { self.sync.poll(now) }

    /// Recomputes the geometry. Without a connected output there is nothing
    /// to compute and the view has no geometry.
    pub fn sync(&mut self, placement: Option<&Placement>) -> Option<Rect> {
        self.sync.stop();
        let Some(placement) = placement else {
            debug!("output not connected, dropping geometry");
            self.rest = None;
            self.valid = None;
            self.output = None;
            self.validation.stop();
            return None;
        };
        self.edge = placement.edge;
        self.output = Some(placement.output);
        let rest = compute_geometry(placement);
        self.rest = Some(rest);
        self.valid = Some(apply_slide(rest, self.edge, placement.output, self.slide_offset));
        trace!(?rest, valid = ?self.valid, "synced geometry");
        self.valid
    }

    /// Returns the new geometry when the offset changed anything.
    pub fn set_slide_offset(&mut self, offset: i32) -> Option<Rect> {
        if self.slide_offset == offset {
            return None;
        }
        self.slide_offset = offset;
        let (rest, output) = (self.rest?, self.output?);
        self.valid = Some(apply_slide(rest, self.edge, output, offset));
        self.valid
    }

    /// Reports the geometry the window manager says the window has.
    pub fn observe(&mut self, actual: Rect, now: Instant) {
        self.observed = Some(actual);
        if self.valid.is_some_and(|valid| valid != actual) {
            self.validation.start_if_idle(now);
        } else {
            self.validation.stop();
        }
    }

    /// When the validation period elapses with the window still off its
    /// computed geometry, returns the geometry to re-apply.
    pub fn poll_validation(&mut self, now: Instant) -> Option<Rect> {
        if !self.validation.poll(now) {
            return None;
        }
        let valid = self.valid?;
        if self.observed == Some(valid) {
            return None;
        }
        debug!(observed = ?self.observed, ?valid, "window drifted, re-applying geometry");
        self.observed = Some(valid);
        Some(valid)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([self.sync.deadline(), self.validation.deadline()])
    }
}

//! Show/hide state machine for one view.
//!
//! The mode only chooses the predicate ("should the view be shown given the
//! windows around it and the pointer?"); the timers, hiding blocks, drag
//! handling and temporary raises are shared by every mode. The engine never
//! touches the window directly: it queues [`VisibilityAction`]s that the dock
//! actor drains and applies.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::tracker::WindowState;
use crate::common::coalesce::{CoalescingTrigger, earliest};
use crate::common::collections::BTreeSet;
use crate::common::config::VisibilitySettings;
use crate::sys::geometry::{Edge, Rect};
use crate::sys::window_manager::StackLayer;

const TEMPORARY_RAISE_MIN: Duration = Duration::from_millis(1800);
const TEMPORARY_RAISE_MAX: Duration = Duration::from_millis(3000);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityMode {
    /// Never hidden; reserves its edge with a strut.
    AlwaysVisible,
    /// Hidden unless the pointer is on the view or its edge sensor.
    AutoHide,
    /// Hidden while the active window overlaps the view.
    #[default]
    DodgeActive,
    /// Hidden while the active window is maximized across the view.
    DodgeMaximized,
    /// Hidden while any window overlaps the view or one is fullscreen.
    DodgeAllWindows,
    /// Always shown, stacked below normal windows.
    WindowsGoBelow,
    /// Always shown at normal stacking; raised while the pointer is on it.
    WindowsCanCover,
}

impl VisibilityMode {
    /// Modes in which the view can actually be hidden.
    pub fn hides(self) -> bool {
        matches!(
            self,
            VisibilityMode::AutoHide
                | VisibilityMode::DodgeActive
                | VisibilityMode::DodgeMaximized
                | VisibilityMode::DodgeAllWindows
        )
    }

    pub fn should_show(self, windows: &WindowState, pointer_inside: bool) -> bool {
        if pointer_inside {
            return true;
        }
        match self {
            VisibilityMode::AlwaysVisible
            | VisibilityMode::WindowsGoBelow
            | VisibilityMode::WindowsCanCover => true,
            VisibilityMode::AutoHide => false,
            VisibilityMode::DodgeActive => !windows.active_touching,
            VisibilityMode::DodgeMaximized => !windows.active_maximized,
            VisibilityMode::DodgeAllWindows => {
                !(windows.active_touching || windows.exists_touching || windows.fullscreen)
            }
        }
    }

    pub fn wants_edge_sensor(self, edge_sensor_enabled: bool) -> bool {
        match self {
            VisibilityMode::WindowsCanCover => true,
            mode => mode.hides() && edge_sensor_enabled,
        }
    }

    fn resting_layer(self) -> StackLayer {
        match self {
            VisibilityMode::WindowsGoBelow => StackLayer::Below,
            VisibilityMode::WindowsCanCover => StackLayer::Normal,
            _ => StackLayer::Above,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityAction {
    MustBeShown,
    MustBeHidden,
    SetStrut(Option<Rect>),
    SetLayer(StackLayer),
    /// A hide is pending; confirm through the floating gap sensor that the
    /// pointer really left before it happens.
    VerifyPointerGone,
}

/// What a strut decision reads about the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrutContext {
    pub view: Rect,
    pub output: Rect,
    pub edge: Edge,
    pub thickness: i32,
    pub on_screen: bool,
    pub layout_current: bool,
}

/// The reserved region for a view: its span along the edge, `thickness`
/// deep, flush with the output edge.
pub fn acceptable_strut(ctx: &StrutContext) -> Rect {
    let (view, output, t) = (ctx.view, ctx.output, ctx.thickness);
    match ctx.edge {
        Edge::Top => Rect::new(view.x, output.y, view.width, t),
        Edge::Bottom => Rect::new(view.x, output.max_y() - t, view.width, t),
        Edge::Left => Rect::new(output.x, view.y, t, view.height),
        Edge::Right => Rect::new(output.max_x() - t, view.y, t, view.height),
    }
}

#[derive(Debug)]
pub struct VisibilityEngine {
    mode: VisibilityMode,
    raise_on_desktop: bool,
    raise_on_activity: bool,

    is_hidden: bool,
    contains_mouse: bool,
    sensor_contains_mouse: bool,
    drag_enter: bool,
    raise_temporarily: bool,
    hide_now: bool,
    verifying_pointer: bool,
    floating_gap: bool,
    block_hiding: BTreeSet<String>,
    windows: WindowState,
    layer: Option<StackLayer>,

    show: CoalescingTrigger,
    hide: CoalescingTrigger,
    temporary: CoalescingTrigger,
    strut_throttle: CoalescingTrigger,
    strut_applied: Option<Rect>,
    strut_pending: Option<Option<Rect>>,

    actions: Vec<VisibilityAction>,
}

impl VisibilityEngine {
    pub fn new(settings: &VisibilitySettings, strut_throttle: Duration, now: Instant) -> Self {
        let mut engine = VisibilityEngine {
            mode: settings.mode,
            raise_on_desktop: settings.raise_on_desktop_change,
            raise_on_activity: settings.raise_on_activity_change,
            is_hidden: false,
            contains_mouse: false,
            sensor_contains_mouse: false,
            drag_enter: false,
            raise_temporarily: false,
            hide_now: false,
            verifying_pointer: false,
            floating_gap: false,
            block_hiding: BTreeSet::new(),
            windows: WindowState::default(),
            layer: None,
            show: CoalescingTrigger::new(settings.timer_show),
            hide: CoalescingTrigger::new(settings.timer_hide),
            temporary: CoalescingTrigger::new(temporary_raise_interval(settings.timer_hide)),
            strut_throttle: CoalescingTrigger::new(strut_throttle),
            strut_applied: None,
            strut_pending: None,
            actions: Vec::new(),
        };
        engine.set_layer(settings.mode.resting_layer());
        engine.update_hidden_state(now);
        engine.poll(now);
        engine
    }

    pub fn mode(&self) -> VisibilityMode { self.mode }

    pub fn is_hidden(&self) -> bool { self.is_hidden }

    pub fn is_blocked(&self) -> bool { !self.block_hiding.is_empty() }

    pub fn contains_mouse(&self) -> bool { self.contains_mouse }

    pub fn drag_active(&self) -> bool { self.drag_enter }

    pub fn raising_temporarily(&self) -> bool { self.raise_temporarily }

    pub fn strut(&self) -> Option<Rect> { self.strut_applied }

    /// Whether the edge sensor should accept edge activation right now.
    pub fn wants_edge_activation(&self) -> bool {
        let waiting = match self.mode {
            VisibilityMode::WindowsCanCover => !self.contains_mouse,
            _ => self.is_hidden,
        };
        waiting && !self.sensor_contains_mouse
    }

    pub fn take_actions(&mut self) -> Vec<VisibilityAction> { std::mem::take(&mut self.actions) }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.show.deadline(),
            self.hide.deadline(),
            self.temporary.deadline(),
            self.strut_throttle.deadline(),
        ])
    }

    pub fn configure(&mut self, settings: &VisibilitySettings, now: Instant) {
        self.show.set_interval(settings.timer_show);
        self.hide.set_interval(settings.timer_hide);
        self.temporary.set_interval(temporary_raise_interval(settings.timer_hide));
        self.raise_on_desktop = settings.raise_on_desktop_change;
        self.raise_on_activity = settings.raise_on_activity_change;
        self.set_mode(settings.mode, now);
    }

    pub fn set_mode(&mut self, mode: VisibilityMode, now: Instant) {
        if mode == self.mode {
            return;
        }
        debug!(from = ?self.mode, to = ?mode, "visibility mode changed");
        let old = std::mem::replace(&mut self.mode, mode);

        self.show.stop();
        self.hide.stop();
        self.temporary.stop();
        self.raise_temporarily = false;
        self.hide_now = false;
        self.verifying_pointer = false;

        if old == VisibilityMode::AlwaysVisible {
            self.request_strut(None, now);
        }
        self.set_layer(mode.resting_layer());
        if !mode.hides() && self.is_hidden {
            self.show_now();
        }
        self.update_hidden_state(now);
        self.poll(now);
    }

    pub fn set_floating_gap(&mut self, enabled: bool) {
        self.floating_gap = enabled;
        if !enabled {
            self.verifying_pointer = false;
        }
    }

    pub fn set_window_state(&mut self, windows: WindowState, now: Instant) {
        self.windows = windows;
        self.update_hidden_state(now);
        self.poll(now);
    }

    pub fn pointer_entered(&mut self, now: Instant) {
        self.contains_mouse = true;
        self.update_hidden_state(now);
        self.poll(now);
    }

    pub fn pointer_left(&mut self, now: Instant) {
        self.contains_mouse = false;
        self.drag_enter = false;
        self.update_hidden_state(now);
        self.poll(now);
    }

    /// The edge sensor settled into or out of containing the pointer.
    pub fn sensor_pointer(&mut self, inside: bool, now: Instant) {
        self.sensor_contains_mouse = inside;
        self.update_hidden_state(now);
        self.poll(now);
    }

    /// A drag entered the view or its sensor: show at once, and stay shown
    /// until the drag leaves.
    pub fn drag_entered(&mut self, now: Instant) {
        self.drag_enter = true;
        self.hide.stop();
        self.show.stop();
        self.verifying_pointer = false;
        if self.is_hidden {
            self.show_now();
        }
        self.poll(now);
    }

    pub fn drag_left(&mut self, now: Instant) {
        self.drag_enter = false;
        self.update_hidden_state(now);
        self.poll(now);
    }

    pub fn dropped(&mut self, now: Instant) { self.drag_left(now); }

    /// Keeps the view shown while `reason` is held. Reasons are a set, so
    /// holding the same one twice needs one release.
    pub fn block_hiding(&mut self, reason: &str, now: Instant) {
        let was_blocked = self.is_blocked();
        if !self.block_hiding.insert(reason.to_string()) || was_blocked {
            return;
        }
        debug!(reason, "hiding blocked");
        self.hide.stop();
        self.verifying_pointer = false;
        self.is_hidden = false;
        self.actions.push(VisibilityAction::MustBeShown);
        self.poll(now);
    }

    pub fn release_hiding(&mut self, reason: &str, now: Instant) {
        if !self.block_hiding.remove(reason) || self.is_blocked() {
            return;
        }
        debug!(reason, "hiding unblocked");
        self.update_hidden_state(now);
        self.poll(now);
    }

    /// Shows the view for a bounded period regardless of the windows around
    /// it. Calls while a temporary raise is running are ignored.
    pub fn raise_temporarily(&mut self, now: Instant) {
        if self.raise_temporarily || !self.mode.hides() {
            return;
        }
        trace!("raising temporarily");
        self.raise_temporarily = true;
        self.hide.stop();
        self.show.stop();
        self.verifying_pointer = false;
        if self.is_hidden {
            self.show_now();
        }
        self.temporary.schedule(now);
    }

    pub fn desktop_changed(&mut self, now: Instant) {
        if self.raise_on_desktop {
            self.raise_temporarily(now);
        }
        self.update_hidden_state(now);
        self.poll(now);
    }

    pub fn activity_changed(&mut self, now: Instant) {
        if self.raise_on_activity {
            self.raise_temporarily(now);
        }
        self.update_hidden_state(now);
        self.poll(now);
    }

    /// Result of a [`VisibilityAction::VerifyPointerGone`] request.
    pub fn pointer_check_finished(&mut self, pointer_gone: bool, now: Instant) {
        if !std::mem::take(&mut self.verifying_pointer) {
            return;
        }
        if pointer_gone && !self.mode.should_show(&self.windows, self.pointer_inside()) {
            self.hide_view();
        }
        self.poll(now);
    }

    /// Re-decides the strut. `None` means the view has no geometry.
    pub fn update_struts(&mut self, ctx: Option<&StrutContext>, now: Instant) {
        let desired = ctx
            .filter(|ctx| {
                self.mode == VisibilityMode::AlwaysVisible
                    && ctx.thickness > 0
                    && ctx.on_screen
                    && ctx.layout_current
            })
            .map(acceptable_strut);
        self.request_strut(desired, now);
    }

    /// Fires every timer whose deadline has passed.
    pub fn poll(&mut self, now: Instant) {
        if self.show.poll(now) && self.is_hidden {
            self.show_now();
        }
        if self.hide.poll(now) {
            self.on_hide_timer();
        }
        if self.temporary.poll(now) {
            trace!("temporary raise expired");
            self.raise_temporarily = false;
            self.hide_now = true;
            self.update_hidden_state(now);
            // A zero show delay may have been armed above.
            if self.show.poll(now) && self.is_hidden {
                self.show_now();
            }
        }
        if self.strut_throttle.poll(now) {
            if let Some(pending) = self.strut_pending.take() {
                self.apply_strut(pending, now);
            }
        }
    }

    fn pointer_inside(&self) -> bool { self.contains_mouse || self.sensor_contains_mouse }

    fn update_hidden_state(&mut self, now: Instant) {
        if self.drag_enter {
            return;
        }
        match self.mode {
            VisibilityMode::AlwaysVisible | VisibilityMode::WindowsGoBelow => {}
            VisibilityMode::WindowsCanCover => {
                let layer =
                    if self.pointer_inside() { StackLayer::Above } else { StackLayer::Normal };
                self.set_layer(layer);
            }
            mode => {
                if self.raise_temporarily {
                    return;
                }
                let show = mode.should_show(&self.windows, self.pointer_inside());
                self.raise_view(show, now);
            }
        }
    }

    fn raise_view(&mut self, raise: bool, now: Instant) {
        if raise {
            self.hide.stop();
            self.verifying_pointer = false;
            self.show.start_if_idle(now);
        } else if !self.drag_enter && !self.is_blocked() && !self.raise_temporarily {
            self.show.stop();
            if std::mem::take(&mut self.hide_now) {
                self.hide_view();
            } else {
                self.hide.start_if_idle(now);
            }
        }
    }

    fn on_hide_timer(&mut self) {
        if self.is_blocked() || self.is_hidden || self.drag_enter || self.raise_temporarily {
            return;
        }
        if self.floating_gap && !self.verifying_pointer {
            self.verifying_pointer = true;
            self.actions.push(VisibilityAction::VerifyPointerGone);
            return;
        }
        self.hide_view();
    }

    fn hide_view(&mut self) {
        if !self.mode.hides()
            || self.is_blocked()
            || self.is_hidden
            || self.drag_enter
            || self.raise_temporarily
        {
            return;
        }
        debug!(mode = ?self.mode, "hiding view");
        self.is_hidden = true;
        self.actions.push(VisibilityAction::MustBeHidden);
    }

    fn show_now(&mut self) {
        debug!(mode = ?self.mode, "showing view");
        self.is_hidden = false;
        self.actions.push(VisibilityAction::MustBeShown);
    }

    fn set_layer(&mut self, layer: StackLayer) {
        if self.layer != Some(layer) {
            self.layer = Some(layer);
            self.actions.push(VisibilityAction::SetLayer(layer));
        }
    }

    fn request_strut(&mut self, desired: Option<Rect>, now: Instant) {
        // Removal is never throttled.
        if desired.is_none() {
            self.strut_pending = None;
            if self.strut_applied.is_some() {
                self.strut_applied = None;
                self.actions.push(VisibilityAction::SetStrut(None));
            }
            return;
        }
        if self.strut_throttle.is_active() {
            self.strut_pending = (desired != self.strut_applied).then_some(desired);
            return;
        }
        self.apply_strut(desired, now);
    }

    fn apply_strut(&mut self, strut: Option<Rect>, now: Instant) {
        if strut == self.strut_applied {
            return;
        }
        self.strut_applied = strut;
        self.actions.push(VisibilityAction::SetStrut(strut));
        self.strut_throttle.schedule(now);
    }
}

fn temporary_raise_interval(timer_hide: Duration) -> Duration {
    (timer_hide * 2).clamp(TEMPORARY_RAISE_MIN, TEMPORARY_RAISE_MAX)
}

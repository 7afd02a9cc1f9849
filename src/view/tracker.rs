//! The foreign-window picture every view consults.
//!
//! One tracker is shared by all views; it is written only by the dock host
//! when window-manager notifications arrive and read by views when they
//! re-evaluate their dodge predicates.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::common::collections::{BTreeMap, HashSet};
use crate::sys::geometry::{Edge, FormFactor, Point, Rect};
use crate::sys::window_manager::{TrackedWindow, WindowFlags, WindowId, WmEvent};

pub type SharedTracker = Arc<RwLock<WindowsTracker>>;

/// Where a view sits, in absolute coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewArea {
    pub view: Rect,
    pub output: Rect,
    /// The output minus every strut on it.
    pub available: Rect,
    pub edge: Edge,
}

/// Facts about foreign windows the visibility modes decide on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowState {
    pub active_touching: bool,
    pub active_edge_touching: bool,
    /// The active window is maximized across the view's thickness axis on
    /// the view's output.
    pub active_maximized: bool,
    pub exists_touching: bool,
    pub fullscreen: bool,
}

/// Facts used to color the view after the windows around it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackgroundState {
    pub exists_maximized: bool,
    pub exists_snapped: bool,
    /// The window whose color scheme the view should follow.
    pub scheme_window: Option<WindowId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerChange {
    Windows,
    Desktop,
    Activity,
}

/// Half-screen and quadrant rectangles of an available area.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapZones {
    available: Rect,
    zones: Vec<Rect>,
}

impl SnapZones {
    /// Recomputes the zones if `available` changed. Returns whether it did.
    pub fn update(&mut self, available: Rect) -> bool {
        if available == self.available && !self.zones.is_empty() {
            return false;
        }
        self.available = available;
        let Rect { x, y, width, height } = available;
        let (half_w, half_h) = (width / 2, height / 2);
        let (rest_w, rest_h) = (width - half_w, height - half_h);
        self.zones = vec![
            Rect::new(x, y, half_w, height),
            Rect::new(x + half_w, y, rest_w, height),
            Rect::new(x, y, half_w, half_h),
            Rect::new(x + half_w, y, rest_w, half_h),
            Rect::new(x, y + half_h, half_w, rest_h),
            Rect::new(x + half_w, y + half_h, rest_w, rest_h),
        ];
        trace!(?available, "recomputed snap zones");
        true
    }

    pub fn zones(&self) -> &[Rect] { &self.zones }

    pub fn is_snapped(&self, geometry: &Rect) -> bool { self.zones.contains(geometry) }
}

#[derive(Debug, Default)]
pub struct WindowsTracker {
    windows: BTreeMap<WindowId, TrackedWindow>,
    active: Option<WindowId>,
    desktop: Option<String>,
    activity: Option<String>,
    ignored: HashSet<WindowId>,
}

impl WindowsTracker {
    pub fn new(
        windows: Vec<TrackedWindow>,
        active: Option<WindowId>,
        desktop: Option<String>,
        activity: Option<String>,
    ) -> Self {
        let mut tracker = WindowsTracker { active, desktop, activity, ..Default::default() };
        for window in windows {
            tracker.upsert(window);
        }
        tracker
    }

    pub fn len(&self) -> usize { self.windows.len() }

    pub fn is_empty(&self) -> bool { self.windows.is_empty() }

    pub fn window(&self, id: WindowId) -> Option<&TrackedWindow> { self.windows.get(&id) }

    pub fn active_window(&self) -> Option<WindowId> { self.active }

    pub fn current_desktop(&self) -> Option<&str> { self.desktop.as_deref() }

    pub fn current_activity(&self) -> Option<&str> { self.activity.as_deref() }

    pub fn handle_event(&mut self, event: &WmEvent) -> TrackerChange {
        match event {
            WmEvent::ActiveWindowChanged(id) => {
                self.active = *id;
                TrackerChange::Windows
            }
            WmEvent::WindowAdded(window) | WmEvent::WindowChanged(window) => {
                self.upsert(window.clone());
                TrackerChange::Windows
            }
            WmEvent::WindowRemoved(id) => {
                self.windows.remove(id);
                if self.active == Some(*id) {
                    self.active = None;
                }
                TrackerChange::Windows
            }
            WmEvent::CurrentDesktopChanged(desktop) => {
                self.desktop = desktop.clone();
                TrackerChange::Desktop
            }
            WmEvent::CurrentActivityChanged(activity) => {
                self.activity = activity.clone();
                TrackerChange::Activity
            }
        }
    }

    fn upsert(&mut self, window: TrackedWindow) {
        if self.ignored.contains(&window.id) {
            return;
        }
        if window.is_garbage() {
            debug!(id = window.id.get(), "dropping garbage window");
            self.windows.remove(&window.id);
            return;
        }
        self.windows.insert(window.id, window);
    }

    /// Sensor windows register here so they never count as foreign windows.
    pub fn set_ignored(&mut self, id: WindowId, ignored: bool) {
        if ignored {
            self.ignored.insert(id);
            self.windows.remove(&id);
        } else {
            self.ignored.remove(&id);
        }
    }

    pub fn is_ignored(&self, id: WindowId) -> bool { self.ignored.contains(&id) }

    /// Drops entries the compositor left behind with degenerate geometry.
    pub fn purge_garbage(&mut self) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| !w.is_garbage());
        let purged = before - self.windows.len();
        if purged > 0 {
            debug!(purged, "purged garbage windows");
        }
        purged
    }

    fn is_visible(&self, window: &TrackedWindow) -> bool {
        !window.is_minimized()
            && !window.is_shaded()
            && window.on_desktop(self.desktop.as_deref())
            && window.on_activity(self.activity.as_deref())
    }

    /// The active window and its transient parent and children.
    fn in_active_group(&self, window: &TrackedWindow) -> bool {
        let Some(active) = self.active else {
            return window.flags.contains(WindowFlags::ACTIVE);
        };
        if window.id == active || window.parent == Some(active) {
            return true;
        }
        self.windows.get(&active).and_then(|a| a.parent) == Some(window.id)
    }

    fn visible_windows(&self) -> impl Iterator<Item = &TrackedWindow> {
        self.windows.values().filter(|w| self.is_visible(w))
    }

    pub fn window_state(&self, area: &ViewArea) -> WindowState {
        let mut state = WindowState::default();
        for window in self.visible_windows() {
            let touching = window.geometry.intersects(&area.view);
            let edge_touching = touches_view_edge(area, &window.geometry);
            let active = self.in_active_group(window);

            state.exists_touching |= touching;
            state.fullscreen |= window.is_fullscreen() && window.geometry.intersects(&area.output);
            if active {
                state.active_touching |= touching;
                state.active_edge_touching |= edge_touching;
                state.active_maximized |= maximized_for(area, window);
            }
        }
        state
    }

    /// Picks the window the view should take its colors from, preferring
    /// active touching, then active edge-touching, then maximized, then any
    /// touching and finally any edge-touching window.
    pub fn background_state(&self, area: &ViewArea, zones: &SnapZones) -> BackgroundState {
        let mut ranked: [Option<WindowId>; 5] = [None; 5];
        let mut state = BackgroundState::default();

        for window in self.visible_windows() {
            let touching = window.geometry.intersects(&area.view);
            let edge_touching = touches_view_edge(area, &window.geometry);
            let maximized = window.is_maximized() && in_output(area, &window.geometry);
            let active = self.in_active_group(window);

            state.exists_maximized |= maximized;
            state.exists_snapped |=
                zones.is_snapped(&window.geometry) && (touching || edge_touching);

            let rank = match (active, touching, edge_touching, maximized) {
                (true, true, _, _) => Some(0),
                (true, false, true, _) => Some(1),
                (_, _, _, true) => Some(2),
                (false, true, _, _) => Some(3),
                (false, false, true, _) => Some(4),
                _ => None,
            };
            if let Some(rank) = rank {
                // Active windows win within a rank.
                if ranked[rank].is_none() || active {
                    ranked[rank] = Some(window.id);
                }
            }
        }
        state.scheme_window = ranked.into_iter().flatten().next();
        state
    }
}

fn in_output(area: &ViewArea, geometry: &Rect) -> bool {
    let bottom_right = Point::new(geometry.max_x() - 1, geometry.max_y() - 1);
    area.output.contains(geometry.origin()) || area.output.contains(bottom_right)
}

fn maximized_for(area: &ViewArea, window: &TrackedWindow) -> bool {
    let axis = match area.edge.form_factor() {
        FormFactor::Horizontal => WindowFlags::MAXIMIZED_V,
        FormFactor::Vertical => WindowFlags::MAXIMIZED_H,
    };
    window.flags.contains(axis) && window.geometry.intersects(&area.output)
}

/// Whether the window sits flush against the inner side of the view and
/// overlaps it along the edge.
fn touches_view_edge(area: &ViewArea, geometry: &Rect) -> bool {
    if !in_output(area, geometry) {
        return false;
    }
    let view = &area.view;
    let flush = match area.edge {
        Edge::Top => geometry.y == view.max_y(),
        Edge::Bottom => geometry.max_y() == view.y,
        Edge::Left => geometry.x == view.max_x(),
        Edge::Right => geometry.max_x() == view.x,
    };
    let overlaps = if area.edge.is_horizontal() {
        geometry.x < view.max_x() && geometry.max_x() > view.x
    } else {
        geometry.y < view.max_y() && geometry.max_y() > view.y
    };
    flush && overlaps
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    const OUTPUT: Rect = Rect::new(0, 0, 1920, 1080);

    fn bottom_view() -> ViewArea {
        ViewArea {
            view: Rect::new(480, 1032, 960, 48),
            output: OUTPUT,
            available: OUTPUT,
            edge: Edge::Bottom,
        }
    }

    fn window(id: u64, geometry: Rect) -> TrackedWindow { TrackedWindow::new(id, geometry) }

    fn tracker(windows: Vec<TrackedWindow>, active: Option<u64>) -> WindowsTracker {
        WindowsTracker::new(windows, active.map(WindowId::new), None, None)
    }

    #[test]
    fn active_window_over_the_view_is_touching() {
        let t = tracker(
            vec![window(1, Rect::new(600, 900, 400, 200)), window(2, Rect::new(0, 0, 300, 300))],
            Some(1),
        );
        let state = t.window_state(&bottom_view());
        assert!(state.active_touching);
        assert!(state.exists_touching);
        assert!(!state.active_maximized);
    }

    #[test]
    fn minimized_and_shaded_windows_do_not_count() {
        let overlapping = Rect::new(600, 900, 400, 200);
        let t = tracker(
            vec![
                window(1, overlapping).with_flags(WindowFlags::MINIMIZED),
                window(2, overlapping).with_flags(WindowFlags::SHADED),
            ],
            Some(1),
        );
        assert_eq!(t.window_state(&bottom_view()), WindowState::default());
    }

    #[test]
    fn windows_on_other_desktops_do_not_count() {
        let mut w = window(1, Rect::new(600, 900, 400, 200));
        w.desktop = Some("2".into());
        let t = WindowsTracker::new(vec![w], None, Some("1".into()), None);
        assert!(!t.window_state(&bottom_view()).exists_touching);
    }

    #[test]
    fn maximization_is_matched_to_the_view_form_factor() {
        let full_height = Rect::new(0, 0, 960, 1080);
        let t = tracker(
            vec![window(1, full_height).with_flags(WindowFlags::MAXIMIZED_V)],
            Some(1),
        );
        assert!(t.window_state(&bottom_view()).active_maximized);

        let left = ViewArea {
            view: Rect::new(0, 0, 48, 1080),
            edge: Edge::Left,
            ..bottom_view()
        };
        assert!(!t.window_state(&left).active_maximized);
    }

    #[test]
    fn transient_dialog_of_the_active_window_counts_as_active() {
        let mut dialog = window(2, Rect::new(700, 1000, 200, 60));
        dialog.parent = Some(WindowId::new(1));
        let t = tracker(vec![window(1, Rect::new(0, 0, 500, 500)), dialog], Some(1));
        assert!(t.window_state(&bottom_view()).active_touching);
    }

    #[test]
    fn edge_touching_requires_a_flush_side() {
        let t = tracker(vec![window(1, Rect::new(500, 32, 800, 1000))], Some(1));
        let state = t.window_state(&bottom_view());
        assert!(state.active_edge_touching);
        assert!(!state.active_touching);

        let t = tracker(vec![window(1, Rect::new(500, 30, 800, 1000))], Some(1));
        assert!(!t.window_state(&bottom_view()).active_edge_touching);
    }

    #[test]
    fn fullscreen_anywhere_on_the_output_is_reported() {
        let t = tracker(
            vec![window(5, Rect::new(0, 0, 1920, 1080)).with_flags(WindowFlags::FULLSCREEN)],
            None,
        );
        assert!(t.window_state(&bottom_view()).fullscreen);
    }

    #[test]
    fn garbage_windows_are_never_tracked_and_can_be_purged() {
        let mut t = tracker(vec![window(1, Rect::new(0, 0, 0, 0))], None);
        assert!(t.is_empty());

        t.windows.insert(WindowId::new(3), window(3, Rect::new(5, 5, 0, 0)));
        t.handle_event(&WmEvent::WindowAdded(window(4, Rect::new(0, 0, 10, 10))));
        assert_eq!(t.purge_garbage(), 1);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn ignored_windows_stay_out() {
        let mut t = tracker(vec![], None);
        t.set_ignored(WindowId::new(9), true);
        t.handle_event(&WmEvent::WindowAdded(window(9, Rect::new(0, 1074, 1920, 6))));
        assert!(t.window(WindowId::new(9)).is_none());
    }

    #[test]
    fn removing_the_active_window_clears_it() {
        let mut t = tracker(vec![window(1, Rect::new(0, 0, 10, 10))], Some(1));
        t.handle_event(&WmEvent::WindowRemoved(WindowId::new(1)));
        assert_eq!(t.active_window(), None);
    }

    #[test]
    fn scheme_window_prefers_the_active_touching_window() {
        let t = tracker(
            vec![
                window(1, Rect::new(600, 900, 400, 200)),
                window(2, Rect::new(0, 0, 1920, 1080)).with_flags(WindowFlags::MAXIMIZED),
                window(3, Rect::new(700, 1000, 100, 100)),
            ],
            Some(3),
        );
        let mut zones = SnapZones::default();
        zones.update(OUTPUT);
        let state = t.background_state(&bottom_view(), &zones);
        assert_eq!(state.scheme_window, Some(WindowId::new(3)));
        assert!(state.exists_maximized);

        let t = tracker(
            vec![
                window(1, Rect::new(600, 900, 400, 200)),
                window(2, Rect::new(0, 0, 1920, 1080)).with_flags(WindowFlags::MAXIMIZED),
            ],
            None,
        );
        assert_eq!(t.background_state(&bottom_view(), &zones).scheme_window, Some(WindowId::new(2)));
    }

    #[test]
    fn snap_zones_cover_halves_and_quadrants() {
        let mut zones = SnapZones::default();
        assert!(zones.update(Rect::new(0, 0, 1920, 1032)));
        assert!(!zones.update(Rect::new(0, 0, 1920, 1032)));
        assert_eq!(zones.zones().len(), 6);
        assert!(zones.is_snapped(&Rect::new(960, 0, 960, 1032)));
        assert!(zones.is_snapped(&Rect::new(0, 516, 960, 516)));

        let t = tracker(vec![window(1, Rect::new(0, 0, 960, 1032))], Some(1));
        let state = t.background_state(&bottom_view(), &zones);
        assert!(state.exists_snapped);
    }
}

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::geometry::Rect;
use crate::model::view::ViewId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(u64);

impl WindowId {
    pub const fn new(id: u64) -> WindowId { WindowId(id) }

    pub fn get(&self) -> u64 { self.0 }
}

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct WindowFlags: u32 {
        const MINIMIZED       = 1 << 0;
        const MAXIMIZED_H     = 1 << 1;
        const MAXIMIZED_V     = 1 << 2;
        const SHADED          = 1 << 3;
        const ACTIVE          = 1 << 4;
        const FULLSCREEN      = 1 << 5;
        const KEEP_ABOVE      = 1 << 6;
        const ON_ALL_DESKTOPS = 1 << 7;
        const ON_ALL_ACTIVITIES = 1 << 8;

        const MAXIMIZED = Self::MAXIMIZED_H.bits() | Self::MAXIMIZED_V.bits();
    }
}

/// A foreign top-level window as last reported by the window manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedWindow {
    pub id: WindowId,
    pub geometry: Rect,
    #[serde(default)]
    pub flags: WindowFlags,
    #[serde(default)]
    pub desktop: Option<String>,
    #[serde(default)]
    pub activities: Vec<String>,
    /// Transient parent, for dialogs.
    #[serde(default)]
    pub parent: Option<WindowId>,
}

impl TrackedWindow {
    pub fn new(id: u64, geometry: Rect) -> Self {
        Self {
            id: WindowId::new(id),
            geometry,
            flags: WindowFlags::empty(),
            desktop: None,
            activities: Vec::new(),
            parent: None,
        }
    }

    pub fn with_flags(mut self, flags: WindowFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_minimized(&self) -> bool { self.flags.contains(WindowFlags::MINIMIZED) }

    pub fn is_shaded(&self) -> bool { self.flags.contains(WindowFlags::SHADED) }

    pub fn is_fullscreen(&self) -> bool { self.flags.contains(WindowFlags::FULLSCREEN) }

    pub fn is_maximized(&self) -> bool { self.flags.contains(WindowFlags::MAXIMIZED) }

    /// Known compositor defect: ghost entries with no id or no size.
    pub fn is_garbage(&self) -> bool {
        self.id.get() == 0 || (self.geometry.width == 0 && self.geometry.height == 0)
    }

    pub fn on_desktop(&self, desktop: Option<&str>) -> bool {
        if self.flags.contains(WindowFlags::ON_ALL_DESKTOPS) {
            return true;
        }
        match (self.desktop.as_deref(), desktop) {
            (None, _) | (_, None) => true,
            (Some(mine), Some(current)) => mine == current,
        }
    }

    pub fn on_activity(&self, activity: Option<&str>) -> bool {
        if self.flags.contains(WindowFlags::ON_ALL_ACTIVITIES) || self.activities.is_empty() {
            return true;
        }
        activity.is_none_or(|current| self.activities.iter().any(|a| a == current))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WmEvent {
    ActiveWindowChanged(Option<WindowId>),
    WindowAdded(TrackedWindow),
    WindowChanged(TrackedWindow),
    WindowRemoved(WindowId),
    CurrentDesktopChanged(Option<String>),
    CurrentActivityChanged(Option<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackLayer {
    /// Dock layer, above normal windows.
    Above,
    Normal,
    Below,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Edge,
    FloatingGap,
}

/// Requests the core issues to the window manager. Implementations are
/// shared by every view, so all methods take `&self`.
pub trait WindowManager: Send + Sync {
    fn windows(&self) -> Vec<TrackedWindow>;
    fn active_window(&self) -> Option<WindowId>;
    fn current_desktop(&self) -> Option<String>;
    fn current_activity(&self) -> Option<String>;

    fn set_view_geometry(&self, view: ViewId, geometry: Rect);
    /// Masks the view window down to nothing, or restores it.
    fn set_view_hidden(&self, view: ViewId, hidden: bool);
    fn set_strut(&self, view: ViewId, strut: Option<Rect>);
    fn set_layer(&self, view: ViewId, layer: StackLayer);

    /// Creates a near-invisible input-only window and returns its id.
    fn create_sensor(&self, kind: SensorKind, geometry: Rect) -> WindowId;
    fn set_sensor_geometry(&self, sensor: WindowId, geometry: Rect);
    fn set_sensor_visible(&self, sensor: WindowId, visible: bool);
    fn destroy_sensor(&self, sensor: WindowId);
    /// Excludes a window from [`WindowManager::windows`] and change events.
    fn set_ignored(&self, window: WindowId, ignored: bool);
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn zero_sized_or_unnumbered_windows_are_garbage() {
        assert!(TrackedWindow::new(0, Rect::new(0, 0, 10, 10)).is_garbage());
        assert!(TrackedWindow::new(4, Rect::new(30, 30, 0, 0)).is_garbage());
        assert!(!TrackedWindow::new(4, Rect::new(30, 30, 0, 10)).is_garbage());
    }

    #[test]
    fn desktop_membership_respects_sticky_windows() {
        let mut window = TrackedWindow::new(1, Rect::new(0, 0, 10, 10));
        window.desktop = Some("2".into());
        assert!(!window.on_desktop(Some("1")));
        window.flags |= WindowFlags::ON_ALL_DESKTOPS;
        assert!(window.on_desktop(Some("1")));
    }

    #[test]
    fn activity_membership() {
        let mut window = TrackedWindow::new(1, Rect::new(0, 0, 10, 10));
        assert!(window.on_activity(Some("work")));
        window.activities = vec!["home".into()];
        assert!(!window.on_activity(Some("work")));
        assert!(window.on_activity(Some("home")));
    }
}

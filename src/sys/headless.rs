//! A window manager with no display behind it. Every request is logged and
//! remembered, which is enough to watch the core react to output and config
//! changes from the command line.

use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use super::geometry::Rect;
use super::window_manager::{SensorKind, StackLayer, TrackedWindow, WindowId, WindowManager};
use crate::common::collections::BTreeMap;
use crate::model::view::ViewId;

/// Last requested state of one view window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ViewSurface {
    pub geometry: Option<Rect>,
    pub hidden: bool,
    pub strut: Option<Rect>,
    pub layer: Option<StackLayer>,
}

#[derive(Default)]
struct State {
    views: BTreeMap<ViewId, ViewSurface>,
    sensors: BTreeMap<WindowId, (SensorKind, Rect, bool)>,
    next_sensor: u64,
}

#[derive(Default)]
pub struct HeadlessWm {
    state: Mutex<State>,
}

impl HeadlessWm {
    pub fn view(&self, view: ViewId) -> Option<ViewSurface> {
        self.state.lock().views.get(&view).cloned()
    }

    pub fn sensor_count(&self) -> usize { self.state.lock().sensors.len() }

    fn with_view(&self, view: ViewId, f: impl FnOnce(&mut ViewSurface)) {
        f(self.state.lock().views.entry(view).or_default());
    }
}

impl WindowManager for HeadlessWm {
    fn windows(&self) -> Vec<TrackedWindow> { Vec::new() }

    fn active_window(&self) -> Option<WindowId> { None }

    fn current_desktop(&self) -> Option<String> { None }

    fn current_activity(&self) -> Option<String> { None }

    fn set_view_geometry(&self, view: ViewId, geometry: Rect) {
        info!(%view, ?geometry, "view geometry");
        self.with_view(view, |s| s.geometry = Some(geometry));
    }

    fn set_view_hidden(&self, view: ViewId, hidden: bool) {
        info!(%view, hidden, "view visibility");
        self.with_view(view, |s| s.hidden = hidden);
    }

    fn set_strut(&self, view: ViewId, strut: Option<Rect>) {
        info!(%view, ?strut, "view strut");
        self.with_view(view, |s| s.strut = strut);
    }

    fn set_layer(&self, view: ViewId, layer: StackLayer) {
        info!(%view, ?layer, "view layer");
        self.with_view(view, |s| s.layer = Some(layer));
    }

    fn create_sensor(&self, kind: SensorKind, geometry: Rect) -> WindowId {
        let mut state = self.state.lock();
        state.next_sensor += 1;
        let id = WindowId::new(u64::from(u32::MAX) + state.next_sensor);
        state.sensors.insert(id, (kind, geometry, false));
        info!(?kind, ?id, ?geometry, "sensor created");
        id
    }

    fn set_sensor_geometry(&self, sensor: WindowId, geometry: Rect) {
        if let Some(entry) = self.state.lock().sensors.get_mut(&sensor) {
            entry.1 = geometry;
        }
    }

    fn set_sensor_visible(&self, sensor: WindowId, visible: bool) {
        if let Some(entry) = self.state.lock().sensors.get_mut(&sensor) {
            entry.2 = visible;
        }
    }

    fn destroy_sensor(&self, sensor: WindowId) {
        self.state.lock().sensors.remove(&sensor);
    }

    fn set_ignored(&self, _window: WindowId, _ignored: bool) {}
}

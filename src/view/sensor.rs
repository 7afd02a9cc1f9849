//! Edge sensor: a near-invisible window on the screen edge that keeps
//! receiving enter/leave events while its view is hidden.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::common::coalesce::CoalescingTrigger;
use crate::sys::geometry::{Edge, FormFactor, Rect};
use crate::sys::window_manager::{SensorKind, WindowId, WindowManager};

pub const COMPOSITED_THICKNESS: i32 = 6;
pub const PLAIN_THICKNESS: i32 = 2;

/// Input the window manager delivers to a sensor window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorInput {
    Entered,
    Left,
    DragEntered,
    DragLeft,
}

/// What a sensor reports back to its view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorChange {
    ContainsMouse(bool),
    DragEntered,
    DragLeft,
}

/// The native side of a sensor. Owns at most one window and recreates it on
/// demand after it was lost.
#[derive(Debug)]
pub struct SensorSurface {
    kind: SensorKind,
    window: Option<WindowId>,
    geometry: Option<Rect>,
    visible: bool,
}

impl SensorSurface {
    pub fn new(kind: SensorKind) -> Self {
        Self { kind, window: None, geometry: None, visible: false }
    }

    pub fn window(&self) -> Option<WindowId> { self.window }

    pub fn geometry(&self) -> Option<Rect> { self.geometry }

    pub fn is_visible(&self) -> bool { self.visible }

    /// Creates the window if needed and pushes the current state to it.
    /// A new window id is registered as ignored so the sensor never takes
    /// part in window tracking.
    pub fn ensure(&mut self, wm: &dyn WindowManager) -> Option<WindowId> {
        let geometry = self.geometry?;
        if let Some(window) = self.window {
            return Some(window);
        }
        let window = wm.create_sensor(self.kind, geometry);
        debug!(kind = ?self.kind, ?window, "sensor surface created");
        wm.set_ignored(window, true);
        wm.set_sensor_visible(window, self.visible);
        self.window = Some(window);
        Some(window)
    }

    pub fn set_geometry(&mut self, wm: &dyn WindowManager, geometry: Rect) {
        if self.geometry == Some(geometry) {
            return;
        }
        self.geometry = Some(geometry);
        match self.window {
            Some(window) => wm.set_sensor_geometry(window, geometry),
            None => {
                self.ensure(wm);
            }
        }
    }

    pub fn set_visible(&mut self, wm: &dyn WindowManager, visible: bool) {
        if self.visible == visible && self.window.is_some() {
            return;
        }
        self.visible = visible;
        if let Some(window) = self.ensure(wm) {
            wm.set_sensor_visible(window, visible);
        }
    }

    /// The native window went away underneath us; forget it so the next
    /// [`SensorSurface::ensure`] builds a fresh one.
    pub fn lost(&mut self, wm: &dyn WindowManager) {
        if let Some(window) = self.window.take() {
            debug!(kind = ?self.kind, ?window, "sensor surface lost");
            wm.set_ignored(window, false);
        }
    }

    pub fn destroy(&mut self, wm: &dyn WindowManager) {
        if let Some(window) = self.window.take() {
            wm.set_ignored(window, false);
            wm.destroy_sensor(window);
        }
    }
}

/// Where the edge sensor goes for a view: flush with the output edge,
/// `thickness + 1` deep, at least a quarter of the output long and centered
/// on the view.
pub fn edge_sensor_geometry(view: Rect, output: Rect, edge: Edge, compositing: bool) -> Rect {
    let thickness = if compositing { COMPOSITED_THICKNESS } else { PLAIN_THICKNESS };
    let depth = thickness + 1;
    let form = edge.form_factor();
    let out_len = output.length(form);
    let view_len = view.length(form);
    let len = (out_len / 4).max(view_len.min(out_len - 1));
    let grow = (len - view_len).max(0) / 2;

    let (start, end) = match form {
        FormFactor::Horizontal => (output.x, output.max_x()),
        FormFactor::Vertical => (output.y, output.max_y()),
    };
    let view_start = match form {
        FormFactor::Horizontal => view.x,
        FormFactor::Vertical => view.y,
    };
    let from = (view_start - grow).max(start);
    let to = (view_start + view_len + grow).min(end).max(start);
    let span = (to - from).max(1);

    match edge {
        Edge::Top => Rect::new(from, output.y, span, depth),
        Edge::Bottom => Rect::new(from, output.max_y() - depth, span, depth),
        Edge::Left => Rect::new(output.x, from, depth, span),
        Edge::Right => Rect::new(output.max_x() - depth, from, depth, span),
    }
}

#[derive(Debug)]
pub struct EdgeSensor {
    surface: SensorSurface,
    compositing: bool,
    contains_mouse: bool,
    pending_contains: bool,
    settle: CoalescingTrigger,
}

impl EdgeSensor {
    pub fn new(compositing: bool, settle: Duration) -> Self {
        Self {
            surface: SensorSurface::new(SensorKind::Edge),
            compositing,
            contains_mouse: false,
            pending_contains: false,
            settle: CoalescingTrigger::new(settle),
        }
    }

    pub fn surface(&self) -> &SensorSurface { &self.surface }

    pub fn contains_mouse(&self) -> bool { self.contains_mouse }

    pub fn set_compositing(&mut self, compositing: bool) { self.compositing = compositing; }

    /// Follows the view. Ignored while the view is sliding so the sensor
    /// keeps the resting position.
    pub fn update_geometry(
        &mut self,
        wm: &dyn WindowManager,
        view: Rect,
        output: Rect,
        edge: Edge,
        sliding: bool,
    ) {
        if sliding {
            trace!("view sliding, keeping sensor geometry");
            return;
        }
        let geometry = edge_sensor_geometry(view, output, edge, self.compositing);
        self.surface.set_geometry(wm, geometry);
    }

    /// Accepts edge activation (visible) or stays masked.
    pub fn set_active(&mut self, wm: &dyn WindowManager, active: bool) {
        self.surface.set_visible(wm, active);
    }

    pub fn handle_input(&mut self, input: SensorInput, now: Instant) -> Option<SensorChange> {
        match input {
            SensorInput::DragEntered => {
                self.settle.stop();
                self.pending_contains = true;
                self.contains_mouse = true;
                Some(SensorChange::DragEntered)
            }
            SensorInput::DragLeft => {
                self.pending_contains = false;
                self.settle.start_if_idle(now);
                Some(SensorChange::DragLeft)
            }
            SensorInput::Entered => {
                self.pending_contains = true;
                self.settle.start_if_idle(now);
                None
            }
            SensorInput::Left => {
                self.pending_contains = false;
                self.settle.start_if_idle(now);
                None
            }
        }
    }

    /// Reports the settled pointer state once the settle delay elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<SensorChange> {
        if !self.settle.poll(now) || self.pending_contains == self.contains_mouse {
            return None;
        }
        self.contains_mouse = self.pending_contains;
        Some(SensorChange::ContainsMouse(self.contains_mouse))
    }

    pub fn next_deadline(&self) -> Option<Instant> { self.settle.deadline() }

    pub fn surface_lost(&mut self, wm: &dyn WindowManager) {
        self.surface.lost(wm);
        self.surface.ensure(wm);
    }

    pub fn destroy(&mut self, wm: &dyn WindowManager) { self.surface.destroy(wm); }
}

#[cfg(test)]
pub(crate) mod tests {
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::model::view::ViewId;
    use crate::sys::window_manager::{StackLayer, TrackedWindow};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        ViewGeometry(ViewId, Rect),
        ViewHidden(ViewId, bool),
        Strut(ViewId, Option<Rect>),
        Layer(ViewId, StackLayer),
        CreateSensor(SensorKind, Rect),
        SensorGeometry(WindowId, Rect),
        SensorVisible(WindowId, bool),
        DestroySensor(WindowId),
        Ignored(WindowId, bool),
    }

    /// Records every request and hands out increasing sensor ids.
    #[derive(Default)]
    pub struct RecordingWm {
        pub calls: Mutex<Vec<Call>>,
        next_id: Mutex<u64>,
    }

    impl RecordingWm {
        pub fn take(&self) -> Vec<Call> { std::mem::take(&mut *self.calls.lock()) }

        fn push(&self, call: Call) { self.calls.lock().push(call); }
    }

    impl WindowManager for RecordingWm {
        fn windows(&self) -> Vec<TrackedWindow> { Vec::new() }

        fn active_window(&self) -> Option<WindowId> { None }

        fn current_desktop(&self) -> Option<String> { None }

        fn current_activity(&self) -> Option<String> { None }

        fn set_view_geometry(&self, view: ViewId, geometry: Rect) {
            self.push(Call::ViewGeometry(view, geometry));
        }

        fn set_view_hidden(&self, view: ViewId, hidden: bool) {
            self.push(Call::ViewHidden(view, hidden));
        }

        fn set_strut(&self, view: ViewId, strut: Option<Rect>) {
            self.push(Call::Strut(view, strut));
        }

        fn set_layer(&self, view: ViewId, layer: StackLayer) {
            self.push(Call::Layer(view, layer));
        }

        fn create_sensor(&self, kind: SensorKind, geometry: Rect) -> WindowId {
            self.push(Call::CreateSensor(kind, geometry));
            let mut next = self.next_id.lock();
            *next += 1;
            WindowId::new(1000 + *next)
        }

        fn set_sensor_geometry(&self, sensor: WindowId, geometry: Rect) {
            self.push(Call::SensorGeometry(sensor, geometry));
        }

        fn set_sensor_visible(&self, sensor: WindowId, visible: bool) {
            self.push(Call::SensorVisible(sensor, visible));
        }

        fn destroy_sensor(&self, sensor: WindowId) { self.push(Call::DestroySensor(sensor)); }

        fn set_ignored(&self, window: WindowId, ignored: bool) {
            self.push(Call::Ignored(window, ignored));
        }
    }

    const SCREEN: Rect = Rect::new(0, 0, 1920, 1080);

    #[test]
    fn small_views_get_a_quarter_of_the_edge() {
        let view = Rect::new(900, 1032, 120, 48);
        let sensor = edge_sensor_geometry(view, SCREEN, Edge::Bottom, true);
        assert_eq!(sensor, Rect::new(720, 1073, 480, 7));
    }

    #[test]
    fn full_width_views_keep_their_length() {
        let view = Rect::new(0, 0, 1920, 32);
        let sensor = edge_sensor_geometry(view, SCREEN, Edge::Top, false);
        assert_eq!(sensor, Rect::new(0, 0, 1920, 3));
    }

    #[test]
    fn sensor_is_clamped_into_the_output() {
        let view = Rect::new(0, 20, 48, 100);
        let sensor = edge_sensor_geometry(view, SCREEN, Edge::Left, true);
        assert_eq!(sensor, Rect::new(0, 0, 7, 205));

        let right = Rect::new(1872, 400, 48, 600);
        let sensor = edge_sensor_geometry(right, SCREEN, Edge::Right, true);
        assert_eq!(sensor, Rect::new(1913, 400, 7, 600));
    }

    #[test]
    fn enter_and_leave_are_settled() {
        let t0 = Instant::now();
        let mut sensor = EdgeSensor::new(true, Duration::from_millis(50));
        assert_eq!(sensor.handle_input(SensorInput::Entered, t0), None);
        assert_eq!(sensor.poll(t0 + Duration::from_millis(49)), None);
        assert_eq!(
            sensor.poll(t0 + Duration::from_millis(50)),
            Some(SensorChange::ContainsMouse(true))
        );

        // A leave and re-enter inside the settle window cancel out.
        let t1 = t0 + Duration::from_millis(100);
        sensor.handle_input(SensorInput::Left, t1);
        sensor.handle_input(SensorInput::Entered, t1 + Duration::from_millis(10));
        assert_eq!(sensor.poll(t1 + Duration::from_millis(50)), None);
        assert!(sensor.contains_mouse());
    }

    #[test]
    fn drag_enter_skips_the_settle_delay() {
        let t0 = Instant::now();
        let mut sensor = EdgeSensor::new(true, Duration::from_millis(50));
        sensor.handle_input(SensorInput::Entered, t0);
        assert_eq!(
            sensor.handle_input(SensorInput::DragEntered, t0 + Duration::from_millis(5)),
            Some(SensorChange::DragEntered)
        );
        assert!(sensor.contains_mouse());
        assert_eq!(sensor.next_deadline(), None);
    }

    #[test]
    fn geometry_is_frozen_while_sliding() {
        let wm = RecordingWm::default();
        let mut sensor = EdgeSensor::new(true, Duration::from_millis(50));
        let view = Rect::new(0, 1032, 1920, 48);
        sensor.update_geometry(&wm, view, SCREEN, Edge::Bottom, false);
        let rest = sensor.surface().geometry();

        sensor.update_geometry(&wm, Rect { y: 1060, ..view }, SCREEN, Edge::Bottom, true);
        assert_eq!(sensor.surface().geometry(), rest);
    }

    #[test]
    fn lost_surfaces_are_recreated_and_reignored() {
        let wm = RecordingWm::default();
        let mut sensor = EdgeSensor::new(true, Duration::from_millis(50));
        sensor.update_geometry(&wm, Rect::new(0, 1032, 1920, 48), SCREEN, Edge::Bottom, false);
        let geometry = Rect::new(0, 1073, 1920, 7);
        assert_eq!(
            wm.take(),
            vec![
                Call::CreateSensor(SensorKind::Edge, geometry),
                Call::Ignored(WindowId::new(1001), true),
                Call::SensorVisible(WindowId::new(1001), false),
            ]
        );

        sensor.surface_lost(&wm);
        assert_eq!(
            wm.take(),
            vec![
                Call::Ignored(WindowId::new(1001), false),
                Call::CreateSensor(SensorKind::Edge, geometry),
                Call::Ignored(WindowId::new(1002), true),
                Call::SensorVisible(WindowId::new(1002), false),
            ]
        );
        assert_eq!(sensor.surface().window(), Some(WindowId::new(1002)));

        sensor.destroy(&wm);
        assert_eq!(
            wm.take(),
            vec![
                Call::Ignored(WindowId::new(1002), false),
                Call::DestroySensor(WindowId::new(1002)),
            ]
        );
    }
}

//! Per-view runtime.
//!
//! Each live view is a [`Dock`] actor owning its visibility engine, its
//! positioner and zero or one of each sensor. Docks never touch each other
//! directly: window-manager changes arrive through the [`DockHost`], and
//! strut changes are announced to the other docks through the shared
//! [`Directory`].

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info_span, instrument, trace};

use crate::actor::broadcast::{BroadcastEvent, BroadcastSender};
use crate::actor::layout_sync::ViewHost;
use crate::actor::{self, now, sleep_until};
use crate::common::coalesce::earliest;
use crate::common::collections::BTreeMap;
use crate::common::config::{Settings, ViewConfig};
use crate::model::output_registry::Output;
use crate::model::struts::{SharedStruts, StrutEntry};
use crate::model::view::ViewId;
use crate::sys::geometry::{Edge, Rect};
use crate::sys::window_manager::{SensorKind, WindowId, WindowManager, WmEvent};
use crate::view::floating_gap::FloatingGapSensor;
use crate::view::positioner::{Placement, Positioner};
use crate::view::sensor::{EdgeSensor, SensorChange, SensorInput};
use crate::view::tracker::{
    BackgroundState, SharedTracker, SnapZones, TrackerChange, ViewArea, WindowsTracker,
};
use crate::view::visibility::{StrutContext, VisibilityAction, VisibilityEngine};

/// Pointer input on the view window itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Entered,
    Left,
    DragEntered,
    DragLeft,
    Dropped,
}

#[derive(Debug)]
pub enum Event {
    /// The view keeps its slot; adopt a possibly changed config and output.
    Rebind { config: Box<ViewConfig>, output: Output },
    Settings(Box<Settings>),
    /// The shared tracker was updated.
    Windows(TrackerChange),
    Pointer(PointerEvent),
    Sensor(SensorInput),
    Gap(SensorInput),
    SensorLost(SensorKind),
    GeometryObserved(Rect),
    BlockHiding { reason: String, blocked: bool },
    RaiseTemporarily,
    SlideOffset(i32),
    /// Another view on the same output changed its strut.
    StrutsChanged,
    Disconnect,
    Shutdown,
}

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;

/// Senders of every live dock, for routing platform input and for docks to
/// notify each other.
pub type Directory = Arc<RwLock<BTreeMap<ViewId, Sender>>>;

/// Shared collaborators of every dock.
#[derive(Clone)]
pub struct DockContext {
    pub wm: Arc<dyn WindowManager>,
    pub tracker: SharedTracker,
    pub struts: SharedStruts,
    pub directory: Directory,
    pub broadcast: Option<BroadcastSender>,
}

impl DockContext {
    pub fn new(wm: Arc<dyn WindowManager>) -> Self {
        let tracker = WindowsTracker::new(
            wm.windows(),
            wm.active_window(),
            wm.current_desktop(),
            wm.current_activity(),
        );
        Self {
            wm,
            tracker: Arc::new(RwLock::new(tracker)),
            struts: SharedStruts::default(),
            directory: Directory::default(),
            broadcast: None,
        }
    }
}

pub struct Dock {
    id: ViewId,
    config: ViewConfig,
    settings: Settings,
    output: Output,
    connected: bool,
    engine: VisibilityEngine,
    positioner: Positioner,
    sensor: Option<EdgeSensor>,
    gap: Option<FloatingGapSensor>,
    /// Sensor windows currently registered as ignored with the tracker.
    ignored: Vec<WindowId>,
    snap_zones: SnapZones,
    background: BackgroundState,
    hidden: Option<bool>,
    ctx: DockContext,
}

impl Dock {
    pub fn new(
        config: ViewConfig,
        settings: Settings,
        output: Output,
        ctx: DockContext,
        now: Instant,
    ) -> Self {
        let engine = VisibilityEngine::new(&config.visibility, settings.strut_throttle, now);
        let positioner =
            Positioner::new(config.edge, settings.geometry_sync, settings.geometry_validation);
        let mut dock = Dock {
            id: config.id,
            config,
            settings,
            output,
            connected: true,
            engine,
            positioner,
            sensor: None,
            gap: None,
            ignored: Vec::new(),
            snap_zones: SnapZones::default(),
            background: BackgroundState::default(),
            hidden: None,
            ctx,
        };
        dock.ensure_sensors();
        dock.sync_geometry(now);
        dock.apply_actions(now);
        dock
    }

    pub fn id(&self) -> ViewId { self.id }

    pub fn engine(&self) -> &VisibilityEngine { &self.engine }

    pub fn positioner(&self) -> &Positioner { &self.positioner }

    pub fn edge_sensor(&self) -> Option<&EdgeSensor> { self.sensor.as_ref() }

    pub fn floating_gap(&self) -> Option<&FloatingGapSensor> { self.gap.as_ref() }

    pub fn is_connected(&self) -> bool { self.connected }

    pub async fn run(mut self, mut rx: Receiver) {
        loop {
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some((span, Event::Shutdown)) => {
                        let _guard = span.enter();
                        break;
                    }
                    Some((span, event)) => {
                        let _guard = span.enter();
                        self.handle_event(event, now());
                    }
                    None => break,
                },
                _ = sleep_until(self.next_deadline()) => self.poll(now()),
            }
        }
        self.teardown();
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.connected {
            return None;
        }
        earliest([
            self.engine.next_deadline(),
            self.positioner.next_deadline(),
            self.sensor.as_ref().and_then(EdgeSensor::next_deadline),
            self.gap.as_ref().and_then(FloatingGapSensor::next_deadline),
        ])
    }

    #[instrument(name = "dock::handle_event", skip(self), fields(view = %self.id))]
    pub fn handle_event(&mut self, event: Event, now: Instant) {
        if !self.connected && !matches!(event, Event::Shutdown) {
            trace!("disconnected, dropping event");
            return;
        }
        match event {
            Event::Rebind { config, output } => self.rebind(*config, output, now),
            Event::Settings(settings) => {
                self.settings = *settings;
                if let Some(sensor) = &mut self.sensor {
                    sensor.set_compositing(self.settings.compositing);
                }
                self.positioner.request_sync(now);
            }
            Event::Windows(change) => {
                match change {
                    TrackerChange::Desktop => self.engine.desktop_changed(now),
                    TrackerChange::Activity => self.engine.activity_changed(now),
                    TrackerChange::Windows => {}
                }
                self.refresh_windows(now);
            }
            Event::Pointer(pointer) => match pointer {
                PointerEvent::Entered => self.engine.pointer_entered(now),
                PointerEvent::Left => self.engine.pointer_left(now),
                PointerEvent::DragEntered => self.engine.drag_entered(now),
                PointerEvent::DragLeft => self.engine.drag_left(now),
                PointerEvent::Dropped => self.engine.dropped(now),
            },
            Event::Sensor(input) => {
                let change = self.sensor.as_mut().and_then(|s| s.handle_input(input, now));
                if let Some(change) = change {
                    self.apply_sensor_change(change, now);
                }
            }
            Event::Gap(input) => {
                let wm = self.ctx.wm.clone();
                let finished = self.gap.as_mut().and_then(|g| g.handle_input(&*wm, input));
                if let Some(pointer_gone) = finished {
                    self.engine.pointer_check_finished(pointer_gone, now);
                }
            }
            Event::SensorLost(kind) => {
                let wm = self.ctx.wm.clone();
                match kind {
                    SensorKind::Edge => {
                        if let Some(sensor) = &mut self.sensor {
                            sensor.surface_lost(&*wm);
                        }
                    }
                    SensorKind::FloatingGap => {
                        if let Some(gap) = &mut self.gap {
                            gap.surface_lost(&*wm);
                        }
                    }
                }
            }
            Event::GeometryObserved(rect) => self.positioner.observe(rect, now),
            Event::BlockHiding { reason, blocked } => {
                if blocked {
                    self.engine.block_hiding(&reason, now);
                } else {
                    self.engine.release_hiding(&reason, now);
                }
            }
            Event::RaiseTemporarily => self.engine.raise_temporarily(now),
            Event::SlideOffset(offset) => {
                if let Some(rect) = self.positioner.set_slide_offset(offset) {
                    self.ctx.wm.set_view_geometry(self.id, rect);
                    if !self.positioner.is_sliding() {
                        self.update_sensor_geometry();
                    }
                }
            }
            Event::StrutsChanged => {
                self.positioner.request_sync(now);
                self.refresh_windows(now);
            }
            Event::Disconnect => {
                debug!("disconnecting");
                self.connected = false;
                return;
            }
            Event::Shutdown => {
                self.teardown();
                return;
            }
        }
        self.apply_actions(now);
    }

    pub fn poll(&mut self, now: Instant) {
        if !self.connected {
            return;
        }
        self.engine.poll(now);
        if let Some(change) = self.sensor.as_mut().and_then(|s| s.poll(now)) {
            self.apply_sensor_change(change, now);
        }
        let wm = self.ctx.wm.clone();
        if let Some(pointer_gone) = self.gap.as_mut().and_then(|g| g.poll(&*wm, now)) {
            self.engine.pointer_check_finished(pointer_gone, now);
        }
        if self.positioner.sync_due(now) {
            self.sync_geometry(now);
        }
        if let Some(rect) = self.positioner.poll_validation(now) {
            self.ctx.wm.set_view_geometry(self.id, rect);
        }
        self.apply_actions(now);
    }

    /// Removes everything this view put on screen.
    pub fn teardown(&mut self) {
        let wm = self.ctx.wm.clone();
        if let Some(mut sensor) = self.sensor.take() {
            sensor.destroy(&*wm);
        }
        if let Some(mut gap) = self.gap.take() {
            gap.destroy(&*wm);
        }
        self.sync_ignored();
        if self.ctx.struts.write().set(self.id, None) {
            wm.set_strut(self.id, None);
            self.announce_struts();
        }
        self.connected = false;
    }

    fn rebind(&mut self, config: ViewConfig, output: Output, now: Instant) {
        let moved = config.edge != self.config.edge || output.name != self.output.name;
        trace!(output = output.name, edge = %config.edge, moved, "rebinding");
        self.engine.configure(&config.visibility, now);
        self.config = config;
        self.output = output;
        self.ensure_sensors();
        self.sync_geometry(now);
    }

    fn apply_sensor_change(&mut self, change: SensorChange, now: Instant) {
        match change {
            SensorChange::ContainsMouse(inside) => self.engine.sensor_pointer(inside, now),
            SensorChange::DragEntered => self.engine.drag_entered(now),
            SensorChange::DragLeft => self.engine.drag_left(now),
        }
    }

    /// Creates or drops the sensors this view's mode and margin call for.
    fn ensure_sensors(&mut self) {
        let wm = self.ctx.wm.clone();
        let visibility = &self.config.visibility;

        let wants_sensor = self.engine.mode().wants_edge_sensor(visibility.enable_edge_sensor);
        match (&mut self.sensor, wants_sensor) {
            (None, true) => {
                self.sensor =
                    Some(EdgeSensor::new(self.settings.compositing, self.settings.sensor_settle));
            }
            (Some(sensor), false) => {
                sensor.destroy(&*wm);
                self.sensor = None;
            }
            _ => {}
        }

        let wants_gap = self.config.screen_edge_margin > 0 && self.engine.mode().hides();
        match (&mut self.gap, wants_gap) {
            (None, true) => {
                self.gap = Some(FloatingGapSensor::new(
                    self.config.screen_edge_margin,
                    self.settings.floating_gap_check,
                ));
            }
            (Some(gap), true) => gap.set_margin(self.config.screen_edge_margin),
            (Some(gap), false) => {
                gap.destroy(&*wm);
                self.gap = None;
            }
            (None, false) => {}
        }
        self.engine.set_floating_gap(self.gap.is_some());
    }

    fn sync_geometry(&mut self, now: Instant) {
        let reserved = self.ctx.struts.read().reserved_on(&self.output.name, Some(self.id));
        let placement = Placement::for_view(&self.config, self.output.geometry, &reserved);
        let geometry = self.positioner.sync(self.connected.then_some(&placement));
        if let Some(rect) = geometry {
            self.ctx.wm.set_view_geometry(self.id, rect);
        }
        self.update_sensor_geometry();
        self.update_struts(now);
        self.refresh_windows(now);
    }

    fn update_sensor_geometry(&mut self) {
        let Some(view) = self.positioner.geometry() else { return };
        let wm = self.ctx.wm.clone();
        let (output, edge, sliding) =
            (self.output.geometry, self.config.edge, self.positioner.is_sliding());
        if let Some(sensor) = &mut self.sensor {
            sensor.update_geometry(&*wm, view, output, edge, sliding);
        }
        if let Some(gap) = &mut self.gap {
            gap.update_geometry(&*wm, view, output, edge, sliding);
        }
        self.sync_ignored();
    }

    fn update_struts(&mut self, now: Instant) {
        let ctx = self.positioner.rest_geometry().map(|view| StrutContext {
            view,
            output: self.output.geometry,
            edge: self.config.edge,
            thickness: self.config.thickness + self.config.screen_edge_margin.max(0),
            on_screen: self.connected && view.intersects(&self.output.geometry),
            layout_current: self.settings.is_view_current(&self.config),
        });
        self.engine.update_struts(ctx.as_ref(), now);
    }

    fn area(&self) -> Option<ViewArea> {
        let view = self.positioner.rest_geometry()?;
        let available =
            self.ctx.struts.read().available_rect(&self.output.name, self.output.geometry);
        Some(ViewArea { view, output: self.output.geometry, available, edge: self.config.edge })
    }

    fn refresh_windows(&mut self, now: Instant) {
        let Some(area) = self.area() else { return };
        self.snap_zones.update(area.available);
        let (state, background) = {
            let tracker = self.ctx.tracker.read();
            (tracker.window_state(&area), tracker.background_state(&area, &self.snap_zones))
        };
        self.engine.set_window_state(state, now);

        if background != self.background {
            self.background = background;
            if let Some(broadcast) = &self.ctx.broadcast {
                broadcast.send(BroadcastEvent::ViewBackgroundChanged {
                    view: self.id,
                    scheme_window: background.scheme_window,
                    maximized: background.exists_maximized,
                });
            }
        }
    }

    /// Carries out what the visibility engine asked for.
    fn apply_actions(&mut self, now: Instant) {
        let wm = self.ctx.wm.clone();
        loop {
            let actions = self.engine.take_actions();
            if actions.is_empty() {
                break;
            }
            for action in actions {
                trace!(?action, "applying");
                match action {
                    VisibilityAction::MustBeShown => self.set_hidden(false),
                    VisibilityAction::MustBeHidden => self.set_hidden(true),
                    VisibilityAction::SetStrut(strut) => self.apply_strut(strut),
                    VisibilityAction::SetLayer(layer) => wm.set_layer(self.id, layer),
                    VisibilityAction::VerifyPointerGone => match &mut self.gap {
                        Some(gap) => gap.begin_check(&*wm, now),
                        None => self.engine.pointer_check_finished(true, now),
                    },
                }
            }
        }
        if let Some(sensor) = &mut self.sensor {
            sensor.set_active(&*wm, self.engine.wants_edge_activation());
        }
        self.sync_ignored();
    }

    fn set_hidden(&mut self, hidden: bool) {
        if self.hidden == Some(hidden) {
            return;
        }
        self.hidden = Some(hidden);
        self.ctx.wm.set_view_hidden(self.id, hidden);
    }

    fn apply_strut(&mut self, strut: Option<Rect>) {
        self.ctx.wm.set_strut(self.id, strut);
        let entry = strut.map(|rect| StrutEntry {
            output: self.output.name.clone(),
            edge: self.config.edge,
            rect,
        });
        let changed = self.ctx.struts.write().set(self.id, entry);
        if changed {
            self.announce_struts();
        }
    }

    fn announce_struts(&self) {
        let available =
            self.ctx.struts.read().available_rect(&self.output.name, self.output.geometry);
        if let Some(broadcast) = &self.ctx.broadcast {
            broadcast.send(BroadcastEvent::AvailableScreenRectChanged {
                output: self.output.name.clone(),
                rect: available,
            });
        }
        for (id, tx) in self.ctx.directory.read().iter() {
            if *id != self.id {
                tx.send(Event::StrutsChanged);
            }
        }
    }

    /// Keeps the tracker's ignore list in step with our sensor windows.
    fn sync_ignored(&mut self) {
        let current: Vec<WindowId> = self
            .sensor
            .as_ref()
            .and_then(|s| s.surface().window())
            .into_iter()
            .chain(self.gap.as_ref().and_then(|g| g.surface().window()))
            .collect();
        if current == self.ignored {
            return;
        }
        let mut tracker = self.ctx.tracker.write();
        for old in self.ignored.iter().filter(|w| !current.contains(w)) {
            tracker.set_ignored(*old, false);
        }
        for new in current.iter().filter(|w| !self.ignored.contains(w)) {
            tracker.set_ignored(*new, true);
        }
        drop(tracker);
        self.ignored = current;
    }
}

/// Runs one [`Dock`] actor per live view.
pub struct DockHost {
    ctx: DockContext,
    settings: Settings,
    tasks: BTreeMap<ViewId, JoinHandle<()>>,
}

impl DockHost {
    pub fn new(ctx: DockContext, settings: Settings) -> Self {
        Self { ctx, settings, tasks: BTreeMap::new() }
    }

    pub fn directory(&self) -> &Directory { &self.ctx.directory }

    pub fn sender(&self, view: ViewId) -> Option<Sender> {
        self.ctx.directory.read().get(&view).cloned()
    }

    /// Views with a running dock.
    pub fn len(&self) -> usize { self.ctx.directory.read().len() }

    pub fn is_empty(&self) -> bool { self.ctx.directory.read().is_empty() }

    /// Waits for every dock task to finish after shutdown.
    pub async fn join(&mut self) {
        for (_, task) in std::mem::take(&mut self.tasks) {
            _ = task.await;
        }
    }

    fn send(&self, view: ViewId, event: Event) {
        if let Some(tx) = self.ctx.directory.read().get(&view) {
            tx.send(event);
        }
    }
}

impl ViewHost for DockHost {
    /// Spawns the dock for `view`. A previous dock of the same view, usually
    /// one just destroyed by a move, finishes its teardown first: sensors,
    /// struts and ignore registrations are keyed by view, so the new dock is
    /// only built once the old one has removed its own.
    fn create(&mut self, view: &ViewConfig, output: &Output, edge: Edge) {
        if let Some(stale) = self.ctx.directory.write().remove(&view.id) {
            debug!(view = %view.id, "replacing a running dock");
            stale.send(Event::Shutdown);
        }
        let previous = self.tasks.remove(&view.id);

        let config = ViewConfig { edge, ..view.clone() };
        let (settings, output, ctx) = (self.settings.clone(), output.clone(), self.ctx.clone());
        let (tx, rx) = actor::channel();
        self.ctx.directory.write().insert(view.id, tx);

        let span = info_span!("dock", view = %view.id);
        let task = tokio::spawn(
            async move {
                if let Some(previous) = previous {
                    _ = previous.await;
                }
                Dock::new(config, settings, output, ctx, now()).run(rx).await;
            }
            .instrument(span),
        );
        self.tasks.insert(view.id, task);
    }

    fn disconnect(&mut self, view: ViewId) { self.send(view, Event::Disconnect); }

    fn destroy(&mut self, view: ViewId) {
        if let Some(tx) = self.ctx.directory.write().remove(&view) {
            tx.send(Event::Shutdown);
        }
    }

    fn revalidate(&mut self, view: &ViewConfig, output: &Output, edge: Edge) {
        let config = ViewConfig { edge, ..view.clone() };
        self.send(view.id, Event::Rebind { config: Box::new(config), output: output.clone() });
    }

    fn window_event(&mut self, event: &WmEvent) {
        let change = {
            let mut tracker = self.ctx.tracker.write();
            let change = tracker.handle_event(event);
            tracker.purge_garbage();
            change
        };
        for tx in self.ctx.directory.read().values() {
            tx.send(Event::Windows(change));
        }
    }

    fn settings_changed(&mut self, settings: &Settings) {
        self.settings = settings.clone();
        for tx in self.ctx.directory.read().values() {
            tx.send(Event::Settings(Box::new(settings.clone())));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;
    use crate::model::output_registry::OutputId;
    use crate::sys::window_manager::{StackLayer, TrackedWindow, WindowFlags};
    use crate::view::sensor::tests::{Call, RecordingWm};
    use crate::view::visibility::VisibilityMode;

    const SCREEN: Rect = Rect::new(0, 0, 1920, 1080);

    fn ms(n: u64) -> Duration { Duration::from_millis(n) }

    fn output() -> Output {
        Output { id: OutputId::new(10), name: "eDP-1".into(), geometry: SCREEN, primary: true }
    }

    fn view(id: u32, mode: VisibilityMode) -> ViewConfig {
        let mut config = ViewConfig::new(id);
        config.visibility.mode = mode;
        config
    }

    fn context() -> (Arc<RecordingWm>, DockContext) {
        let wm = Arc::new(RecordingWm::default());
        let ctx = DockContext::new(wm.clone());
        (wm, ctx)
    }

    fn dock(config: ViewConfig, ctx: &DockContext, now: Instant) -> Dock {
        Dock::new(config, Settings::default(), output(), ctx.clone(), now)
    }

    fn add_window(ctx: &DockContext, window: TrackedWindow) -> TrackerChange {
        let mut tracker = ctx.tracker.write();
        tracker.handle_event(&WmEvent::WindowAdded(window.clone()));
        tracker.handle_event(&WmEvent::ActiveWindowChanged(Some(window.id)))
    }

    fn hidden_calls(calls: &[Call]) -> Vec<bool> {
        calls
            .iter()
            .filter_map(|c| match c {
                Call::ViewHidden(_, hidden) => Some(*hidden),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn new_dock_places_the_view_and_its_sensor() {
        let t0 = Instant::now();
        let (wm, ctx) = context();
        let dock = dock(view(1, VisibilityMode::DodgeActive), &ctx, t0);

        let calls = wm.take();
        let geometry = Rect::new(0, 1032, 1920, 48);
        assert!(calls.contains(&Call::ViewGeometry(ViewId::new(1), geometry)));
        assert!(calls.contains(&Call::Layer(ViewId::new(1), StackLayer::Above)));
        assert!(calls.contains(&Call::CreateSensor(SensorKind::Edge, Rect::new(0, 1073, 1920, 7))));
        assert_eq!(dock.positioner().geometry(), Some(geometry));

        let sensor = dock.edge_sensor().and_then(|s| s.surface().window()).unwrap();
        assert!(ctx.tracker.read().is_ignored(sensor));
    }

    #[test]
    fn dodging_the_active_window() {
        let t0 = Instant::now();
        let (wm, ctx) = context();
        let mut dock = dock(view(1, VisibilityMode::DodgeActive), &ctx, t0);
        wm.take();

        let change = add_window(&ctx, TrackedWindow::new(7, Rect::new(200, 600, 800, 450)));
        dock.handle_event(Event::Windows(change), t0);
        dock.poll(t0 + ms(699));
        assert_eq!(hidden_calls(&wm.take()), vec![]);

        dock.poll(t0 + ms(700));
        let calls = wm.take();
        assert_eq!(hidden_calls(&calls), vec![true]);
        let sensor = dock.edge_sensor().and_then(|s| s.surface().window()).unwrap();
        assert!(calls.contains(&Call::SensorVisible(sensor, true)));

        // The pointer reaches the edge sensor and settles there.
        let t1 = t0 + ms(1000);
        dock.handle_event(Event::Sensor(SensorInput::Entered), t1);
        dock.poll(t1 + ms(50));
        let calls = wm.take();
        assert_eq!(hidden_calls(&calls), vec![false]);
        assert!(calls.contains(&Call::SensorVisible(sensor, false)));
    }

    #[test]
    fn always_visible_reserves_and_releases_its_edge() {
        let t0 = Instant::now();
        let (wm, ctx) = context();
        let mut config = view(1, VisibilityMode::AlwaysVisible);
        config.edge = Edge::Top;
        config.thickness = 32;
        let mut dock = dock(config, &ctx, t0);

        let strut = Rect::new(0, 0, 1920, 32);
        assert!(wm.take().contains(&Call::Strut(ViewId::new(1), Some(strut))));
        assert_eq!(ctx.struts.read().available_rect("eDP-1", SCREEN), Rect::new(0, 32, 1920, 1048));
        assert!(dock.edge_sensor().is_none());

        dock.handle_event(Event::Shutdown, t0 + ms(10));
        assert!(wm.take().contains(&Call::Strut(ViewId::new(1), None)));
        assert_eq!(ctx.struts.read().available_rect("eDP-1", SCREEN), SCREEN);
    }

    #[test]
    fn drifted_geometry_is_reapplied() {
        let t0 = Instant::now();
        let (wm, ctx) = context();
        let mut dock = dock(view(1, VisibilityMode::AlwaysVisible), &ctx, t0);
        wm.take();

        dock.handle_event(Event::GeometryObserved(Rect::new(0, 1000, 1920, 48)), t0);
        dock.poll(t0 + ms(499));
        assert_eq!(wm.take(), vec![]);
        dock.poll(t0 + ms(500));
        assert_eq!(wm.take(), vec![Call::ViewGeometry(ViewId::new(1), Rect::new(0, 1032, 1920, 48))]);
    }

    #[test]
    fn floating_views_check_the_gap_before_hiding() {
        let t0 = Instant::now();
        let (wm, ctx) = context();
        let mut config = view(1, VisibilityMode::DodgeMaximized);
        config.screen_edge_margin = 8;
        let mut dock = dock(config, &ctx, t0);
        let gap = dock.floating_gap().and_then(|g| g.surface().window()).unwrap();
        wm.take();

        let window = TrackedWindow::new(7, SCREEN).with_flags(WindowFlags::MAXIMIZED);
        let change = add_window(&ctx, window);
        dock.handle_event(Event::Windows(change), t0);
        dock.poll(t0 + ms(700));
        let calls = wm.take();
        assert!(calls.contains(&Call::SensorVisible(gap, true)));
        assert_eq!(hidden_calls(&calls), vec![]);

        dock.poll(t0 + ms(900));
        let calls = wm.take();
        assert!(calls.contains(&Call::SensorVisible(gap, false)));
        assert_eq!(hidden_calls(&calls), vec![true]);
    }

    #[test]
    fn disconnected_docks_ignore_input() {
        let t0 = Instant::now();
        let (wm, ctx) = context();
        let mut dock = dock(view(1, VisibilityMode::AutoHide), &ctx, t0);
        wm.take();

        dock.handle_event(Event::Disconnect, t0);
        dock.handle_event(Event::Pointer(PointerEvent::Entered), t0);
        dock.poll(t0 + ms(5000));
        assert_eq!(wm.take(), vec![]);
        assert_eq!(dock.next_deadline(), None);
    }

    #[test(tokio::test(start_paused = true))]
    async fn host_runs_one_actor_per_view() {
        let (wm, ctx) = context();
        let mut host = DockHost::new(ctx, Settings::default());
        host.create(&view(1, VisibilityMode::AlwaysVisible), &output(), Edge::Bottom);
        host.create(&view(2, VisibilityMode::AutoHide), &output(), Edge::Top);
        assert_eq!(host.len(), 2);
        assert!(host.sender(ViewId::new(2)).is_some());

        host.window_event(&WmEvent::CurrentDesktopChanged(Some("2".into())));
        tokio::time::sleep(Duration::from_secs(1)).await;

        host.disconnect(ViewId::new(1));
        host.destroy(ViewId::new(1));
        host.destroy(ViewId::new(2));
        host.join().await;

        assert!(host.directory().read().is_empty());
        let calls = wm.take();
        assert!(calls.contains(&Call::Strut(ViewId::new(1), None)));
        assert!(calls.contains(&Call::ViewHidden(ViewId::new(2), true)));
    }

    fn struts_of(calls: &[Call], view: ViewId) -> Vec<Option<Rect>> {
        calls
            .iter()
            .filter_map(|c| match c {
                Call::Strut(v, strut) if *v == view => Some(*strut),
                _ => None,
            })
            .collect()
    }

    #[test(tokio::test(start_paused = true))]
    async fn moved_view_removes_its_old_sensor_first() {
        let (wm, ctx) = context();
        let mut host = DockHost::new(ctx.clone(), Settings::default());
        host.create(&view(1, VisibilityMode::DodgeActive), &output(), Edge::Bottom);
        tokio::time::sleep(Duration::from_secs(1)).await;
        let old_sensor = WindowId::new(1001);
        assert!(wm.take().contains(&Call::CreateSensor(SensorKind::Edge, Rect::new(0, 1073, 1920, 7))));
        assert!(ctx.tracker.read().is_ignored(old_sensor));

        // Same turn, as a layout pass does it.
        host.destroy(ViewId::new(1));
        host.create(&view(1, VisibilityMode::DodgeActive), &output(), Edge::Top);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let calls = wm.take();
        let destroyed = calls.iter().position(|c| *c == Call::DestroySensor(old_sensor));
        let created = calls.iter().position(|c| matches!(c, Call::CreateSensor(SensorKind::Edge, _)));
        assert!(destroyed.is_some());
        assert!(destroyed < created);
        assert!(!ctx.tracker.read().is_ignored(old_sensor));
        assert!(ctx.tracker.read().is_ignored(WindowId::new(1002)));
        assert_eq!(host.len(), 1);

        host.destroy(ViewId::new(1));
        host.join().await;
    }

    #[test(tokio::test(start_paused = true))]
    async fn moved_view_keeps_exactly_one_strut() {
        let (wm, ctx) = context();
        let mut host = DockHost::new(ctx.clone(), Settings::default());
        let mut config = view(1, VisibilityMode::AlwaysVisible);
        config.thickness = 32;
        host.create(&config, &output(), Edge::Bottom);
        tokio::time::sleep(Duration::from_secs(1)).await;

        host.destroy(ViewId::new(1));
        host.create(&config, &output(), Edge::Top);
        tokio::time::sleep(Duration::from_secs(1)).await;

        let top = Rect::new(0, 0, 1920, 32);
        assert_eq!(
            struts_of(&wm.take(), ViewId::new(1)),
            vec![Some(Rect::new(0, 1048, 1920, 32)), None, Some(top)]
        );
        assert_eq!(ctx.struts.read().reserved_on("eDP-1", None), vec![top]);

        host.destroy(ViewId::new(1));
        host.join().await;
        assert!(ctx.struts.read().reserved_on("eDP-1", None).is_empty());
    }

    #[test]
    fn shared_views_reserve_space_in_any_layout() {
        let t0 = Instant::now();
        let (wm, ctx) = context();
        let mut settings = Settings::default();
        settings.single_layout = false;
        let mut config = view(1, VisibilityMode::AlwaysVisible);
        config.layout = "work".into();
        config.shared = true;
        let _dock = Dock::new(config, settings, output(), ctx, t0);

        assert_eq!(struts_of(&wm.take(), ViewId::new(1)).len(), 1);
    }
}

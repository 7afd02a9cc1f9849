//! Keeps the live view windows consistent with the edge allocation.
//!
//! Output hotplug, primary switches, activity changes and config reloads all
//! funnel into one debounce trigger. When it fires, a reconciliation pass
//! allocates edges and diffs the result against the running views: views
//! that lost their slot are disconnected right away and destroyed on a later
//! turn of the actor loop, and only after that are new views created. This
//! keeps an edge from ever holding two windows.

use std::time::Instant;

use tracing::{debug, info, instrument, trace, warn};

use crate::actor::broadcast::{BroadcastEvent, BroadcastSender};
use crate::actor::{self, now, sleep_until};
use crate::common::coalesce::{CoalescingTrigger, earliest};
use crate::common::collections::{BTreeMap, BTreeSet};
use crate::common::config::{Config, Settings, ViewConfig};
use crate::model::edge_allocator::{AllocationInput, OccupancyMap, Slot, allocate};
use crate::model::output_registry::{Output, OutputChange, OutputRegistry};
use crate::model::view::ViewId;
use crate::sys::geometry::Edge;
use crate::sys::output::{OutputEvent, OutputSource};
use crate::sys::window_manager::WmEvent;

/// Owner of the actual view windows.
pub trait ViewHost {
    /// Materializes a window for `view` on `output` at `edge`.
    fn create(&mut self, view: &ViewConfig, output: &Output, edge: Edge);
    /// Stops the view from reacting to anything. Its window stays until
    /// [`ViewHost::destroy`].
    fn disconnect(&mut self, view: ViewId);
    fn destroy(&mut self, view: ViewId);
    /// The view keeps its slot; rebinds it to `output`, whose geometry or
    /// identity may have changed, and to a possibly reloaded `view` config.
    fn revalidate(&mut self, view: &ViewConfig, output: &Output, edge: Edge);
    /// Window-manager notifications for the running views.
    fn window_event(&mut self, _event: &WmEvent) {}
    /// Global settings were reloaded.
    fn settings_changed(&mut self, _settings: &Settings) {}
}

#[derive(Debug)]
pub enum Event {
    Output(OutputEvent),
    Window(WmEvent),
    ConfigReloaded(Box<Config>),
    /// Second half of a reconciliation pass: destroy what was disconnected,
    /// then create what was assigned.
    FlushDeferred,
    Shutdown,
}

pub type Sender = actor::Sender<Event>;
pub type Receiver = actor::Receiver<Event>;

pub fn channel() -> (Sender, Receiver) { actor::channel() }

pub struct LayoutSynchronizer<S, H> {
    config: Config,
    source: S,
    host: H,
    registry: OutputRegistry,
    active_layouts: BTreeSet<String>,
    live: BTreeMap<ViewId, Slot>,
    /// Views that lost their window only because their output went away.
    orphaned: BTreeSet<ViewId>,
    deferred: Vec<ViewId>,
    pending: Option<OccupancyMap>,
    trigger: CoalescingTrigger,
    passes: u64,
    /// Live view count as of the last completed pass.
    reported_count: usize,
    broadcast: Option<BroadcastSender>,
}

impl<S: OutputSource, H: ViewHost> LayoutSynchronizer<S, H> {
    pub fn new(config: Config, source: S, host: H, registry: OutputRegistry) -> Self {
        let active_layouts = config.settings.active_layouts();
        let trigger = CoalescingTrigger::new(config.settings.sync_debounce);
        Self {
            config,
            source,
            host,
            registry,
            active_layouts,
            live: BTreeMap::new(),
            orphaned: BTreeSet::new(),
            deferred: Vec::new(),
            pending: None,
            trigger,
            passes: 0,
            reported_count: 0,
            broadcast: None,
        }
    }

    pub fn with_broadcast(mut self, broadcast: BroadcastSender) -> Self {
        self.broadcast = Some(broadcast);
        self
    }

    pub fn host(&self) -> &H { &self.host }

    pub fn host_mut(&mut self) -> &mut H { &mut self.host }

    pub fn registry(&self) -> &OutputRegistry { &self.registry }

    pub fn live_views(&self) -> &BTreeMap<ViewId, Slot> { &self.live }

    /// Completed reconciliation passes.
    pub fn passes(&self) -> u64 { self.passes }

    pub fn flush_pending(&self) -> bool { self.pending.is_some() }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([self.trigger.deadline(), self.registry.next_deadline()])
    }

    /// Runs until [`Event::Shutdown`], then hands back the host so the caller
    /// can wait for the views to finish tearing down.
    pub async fn run(mut self, tx: Sender, mut rx: Receiver) -> H {
        // The first pass runs at once; there is nothing to coalesce yet.
        self.refresh_outputs(now());
        if self.reconcile() {
            tx.send(Event::FlushDeferred);
        }

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
                _ = sleep_until(self.next_deadline()) => {
                    if self.poll(now()) {
                        tx.send(Event::FlushDeferred);
                    }
                }
            }
        }

        self.shutdown();
        self.host
    }

    #[instrument(name = "layout_sync::handle_event", skip(self))]
    pub fn handle_event(&mut self, event: Event, now: Instant) {
        match event {
            Event::Output(event) => {
                trace!(?event, "output event");
                self.refresh_outputs(now);
            }
            Event::Window(event) => {
                if matches!(event, WmEvent::CurrentActivityChanged(_)) {
                    self.schedule(now);
                }
                self.host.window_event(&event);
            }
            Event::ConfigReloaded(config) => self.apply_config(*config, now),
            Event::FlushDeferred => self.flush_deferred(),
            Event::Shutdown => self.shutdown(),
        }
    }

    /// Re-reads the output set. Hotplug and primary switches are debounced;
    /// geometry changes go straight to the views on that output.
    pub fn refresh_outputs(&mut self, now: Instant) {
        let changes = self.registry.update(self.source.outputs(), now);
        for change in changes {
            match change {
                OutputChange::GeometryChanged { id, .. } => {
                    let Some(output) = self.registry.outputs().iter().find(|o| o.id == id) else {
                        continue;
                    };
                    let output = output.clone();
                    self.revalidate_on(&output);
                }
                change => {
                    debug!(?change, "output set changed");
                    self.schedule(now);
                }
            }
        }
    }

    pub fn schedule(&mut self, now: Instant) { self.trigger.schedule(now); }

    /// Runs a pass once the debounce has elapsed. Returns whether a
    /// [`Event::FlushDeferred`] must follow.
    pub fn poll(&mut self, now: Instant) -> bool {
        if let Err(err) = self.registry.poll_save(now) {
            warn!("failed to save output table: {err:#}");
        }
        if !self.trigger.poll(now) {
            return false;
        }
        self.reconcile()
    }

    /// First half of a pass. Allocates, disconnects the views that lost
    /// their slot and remembers the new map. Returns whether destruction is
    /// pending, in which case creation waits for [`Self::flush_deferred`].
    pub fn reconcile(&mut self) -> bool {
        self.trigger.stop();
        let views = self.config.descriptors();
        let incumbents: BTreeSet<ViewId> =
            self.live.keys().chain(self.orphaned.iter()).copied().collect();
        let map = allocate(&AllocationInput {
            views: &views,
            outputs: self.registry.outputs(),
            active_layouts: &self.active_layouts,
            incumbents: &incumbents,
        });
        debug!(assigned = map.len(), live = self.live.len(), "reconciling views");

        let removed: Vec<ViewId> = self
            .live
            .iter()
            .filter(|(id, slot)| map.slot_of(**id).as_ref() != Some(*slot))
            .map(|(id, _)| *id)
            .collect();
        for id in removed {
            let Some(slot) = self.live.remove(&id) else { continue };
            let output_gone = self.registry.by_name(&slot.output).is_none();
            if output_gone && self.config.view(id).is_some() {
                self.orphaned.insert(id);
            }
            debug!(%id, output = slot.output, edge = %slot.edge, "disconnecting view");
            self.host.disconnect(id);
            self.deferred.push(id);
        }
        self.orphaned.retain(|id| self.config.view(*id).is_some());

        self.pending = Some(map);
        if self.deferred.is_empty() {
            self.flush_deferred();
            false
        } else {
            true
        }
    }

    /// Second half of a pass: destroys disconnected views, then creates and
    /// revalidates according to the pending map.
    pub fn flush_deferred(&mut self) {
        for id in self.deferred.drain(..) {
            debug!(%id, "destroying view");
            self.host.destroy(id);
        }
        let Some(map) = self.pending.take() else { return };

        let mut moved = Vec::new();
        for (slot, id) in map.iter() {
            let (Some(view), Some(output)) =
                (self.config.view(id), self.registry.by_name(&slot.output))
            else {
                continue;
            };
            match self.live.get(&id) {
                Some(current) if *current == slot => {
                    self.host.revalidate(view, output, slot.edge);
                }
                _ => {
                    info!(%id, output = slot.output, edge = %slot.edge, "creating view");
                    self.host.create(view, output, slot.edge);
                    self.orphaned.remove(&id);
                    self.live.insert(id, slot.clone());
                    moved.push((id, slot));
                }
            }
        }
        self.passes += 1;

        let count = self.live.len();
        let count_changed = count != self.reported_count;
        self.reported_count = count;
        if let Some(broadcast) = &self.broadcast {
            for (view, slot) in moved {
                broadcast.send(BroadcastEvent::ViewEdgeChanged {
                    view,
                    output: slot.output,
                    edge: slot.edge,
                });
            }
            if count_changed {
                broadcast.send(BroadcastEvent::ViewsCountChanged { count });
            }
        }
    }

    pub fn apply_config(&mut self, config: Config, now: Instant) {
        info!(views = config.views.len(), "applying reloaded config");
        self.trigger.set_interval(config.settings.sync_debounce);
        self.active_layouts = config.settings.active_layouts();
        self.config = config;
        self.host.settings_changed(&self.config.settings);
        for (id, slot) in &self.live {
            if let (Some(view), Some(output)) =
                (self.config.view(*id), self.registry.by_name(&slot.output))
            {
                self.host.revalidate(view, output, slot.edge);
            }
        }
        self.schedule(now);
    }

    pub fn shutdown(&mut self) {
        info!(views = self.live.len(), "shutting down views");
        self.pending = None;
        let ids: Vec<ViewId> = self.live.keys().copied().collect();
        for id in ids.iter().chain(self.deferred.iter()) {
            self.host.disconnect(*id);
        }
        for id in ids.into_iter().chain(self.deferred.drain(..)) {
            self.host.destroy(id);
        }
        self.live.clear();
        if self.reported_count != 0 {
            self.reported_count = 0;
            if let Some(broadcast) = &self.broadcast {
                broadcast.send(BroadcastEvent::ViewsCountChanged { count: 0 });
            }
        }
        if let Err(err) = self.registry.flush() {
            warn!("failed to save output table: {err:#}");
        }
    }

    fn revalidate_on(&mut self, output: &Output) {
        for (id, slot) in &self.live {
            if slot.output != output.name {
                continue;
            }
            if let Some(view) = self.config.view(*id) {
                self.host.revalidate(view, output, slot.edge);
            }
        }
    }
}

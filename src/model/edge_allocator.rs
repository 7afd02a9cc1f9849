//! Decides which view occupies each edge of each output.
//!
//! Allocation is a pure function of an [`AllocationInput`] snapshot. Views
//! are placed strongest class first (shared, then primary-pinned, then
//! explicitly pinned); within a class, views that already hold a window go
//! before newcomers and ties fall back to the view id. A view whose output is
//! not connected, or whose edge is already taken, is left out of the map.

use serde::Serialize;
use strum::IntoEnumIterator;
use tracing::debug;

use super::output_registry::Output;
use super::view::{ScreenPin, ViewDescriptor, ViewId};
use crate::common::collections::{BTreeMap, BTreeSet};
use crate::sys::geometry::Edge;

pub struct AllocationInput<'a> {
    pub views: &'a [ViewDescriptor],
    /// Connected outputs only.
    pub outputs: &'a [Output],
    pub active_layouts: &'a BTreeSet<String>,
    /// Views that currently hold a window or are waiting for their last
    /// output to come back. They win ties against newcomers.
    pub incumbents: &'a BTreeSet<ViewId>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Slot {
    pub output: String,
    pub edge: Edge,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct OccupancyMap {
    outputs: BTreeMap<String, BTreeMap<Edge, ViewId>>,
}

impl OccupancyMap {
    pub fn occupant(&self, output: &str, edge: Edge) -> Option<ViewId> {
        self.outputs.get(output)?.get(&edge).copied()
    }

    pub fn slot_of(&self, view: ViewId) -> Option<Slot> {
        self.iter().find(|(_, id)| *id == view).map(|(slot, _)| slot)
    }

    pub fn contains(&self, view: ViewId) -> bool { self.slot_of(view).is_some() }

    pub fn iter(&self) -> impl Iterator<Item = (Slot, ViewId)> + '_ {
        self.outputs.iter().flat_map(|(output, edges)| {
            edges.iter().map(move |(edge, id)| {
                (Slot { output: output.clone(), edge: *edge }, *id)
            })
        })
    }

    pub fn len(&self) -> usize { self.outputs.values().map(BTreeMap::len).sum() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Edges of `output` nobody occupies.
    pub fn free_edges(&self, output: &str) -> Vec<Edge> {
        Edge::iter().filter(|edge| self.occupant(output, *edge).is_none()).collect()
    }

    fn claim(&mut self, output: &str, edge: Edge, view: ViewId) -> bool {
        let edges = self.outputs.entry(output.to_string()).or_default();
        if edges.contains_key(&edge) {
            return false;
        }
        edges.insert(edge, view);
        true
    }
}

pub fn allocate(input: &AllocationInput) -> OccupancyMap {
    let primary = input.outputs.iter().find(|o| o.primary);

    let mut candidates: Vec<&ViewDescriptor> = input
        .views
        .iter()
        .filter(|view| {
            if view.shared {
                !input.active_layouts.is_empty()
            } else {
                input.active_layouts.contains(&view.layout)
            }
        })
        .collect();
    candidates.sort_by_key(|view| (view.priority(), !input.incumbents.contains(&view.id), view.id));

    let mut map = OccupancyMap::default();
    let mut placed = BTreeSet::new();
    for view in candidates {
        if !placed.insert(view.id) {
            continue;
        }
        let target = match view.pin {
            ScreenPin::Primary => primary,
            ScreenPin::Explicit(id) => input.outputs.iter().find(|o| o.id == id),
        };
        let Some(output) = target else {
            debug!(view = %view.id, pin = ?view.pin, "unassigned: output not connected");
            continue;
        };
        if !map.claim(&output.name, view.edge, view.id) {
            debug!(
                view = %view.id,
                output = output.name,
                edge = %view.edge,
                "unassigned: edge already occupied"
            );
        }
    }
    map
}

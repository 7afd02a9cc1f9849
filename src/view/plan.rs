//! One-shot placement of every view for a given output set, without any
//! window manager. Shows what the running core would do.

use serde::Serialize;

use super::positioner::{Placement, compute_geometry};
use super::visibility::{StrutContext, VisibilityMode, acceptable_strut};
use crate::common::collections::BTreeSet;
use crate::common::config::Config;
use crate::model::edge_allocator::{AllocationInput, OccupancyMap, allocate};
use crate::model::output_registry::OutputRegistry;
use crate::model::struts::{StrutEntry, StrutRegistry};
use crate::model::view::ViewId;
use crate::sys::geometry::{Edge, Rect};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedView {
    pub view: ViewId,
    pub output: String,
    pub edge: Edge,
    pub geometry: Rect,
    pub strut: Option<Rect>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub occupancy: OccupancyMap,
    pub views: Vec<PlannedView>,
    /// Views in an active layout that got no edge.
    pub unassigned: Vec<ViewId>,
}

/// Allocates edges over the registry's live outputs and places each view.
/// Struts are settled first so panels on vertical edges see the space the
/// horizontal ones reserve.
pub fn plan(config: &Config, registry: &OutputRegistry) -> Plan {
    let descriptors = config.descriptors();
    let active_layouts = config.settings.active_layouts();
    let occupancy = allocate(&AllocationInput {
        views: &descriptors,
        outputs: registry.outputs(),
        active_layouts: &active_layouts,
        incumbents: &BTreeSet::new(),
    });

    let mut struts = StrutRegistry::default();
    let mut views = Vec::new();
    for reserve in [true, false] {
        views.clear();
        for (slot, id) in occupancy.iter() {
            let (Some(view), Some(output)) = (config.view(id), registry.by_name(&slot.output))
            else {
                continue;
            };
            let reserved = struts.reserved_on(&output.name, Some(id));
            let placement = Placement::for_view(view, output.geometry, &reserved);
            let geometry = compute_geometry(&placement);
            let strut = (view.visibility.mode == VisibilityMode::AlwaysVisible
                && view.thickness > 0
                && config.settings.is_view_current(view))
            .then(|| {
                acceptable_strut(&StrutContext {
                    view: geometry,
                    output: output.geometry,
                    edge: slot.edge,
                    thickness: view.thickness + view.screen_edge_margin.max(0),
                    on_screen: true,
                    layout_current: true,
                })
            });
            if reserve {
                let entry =
                    strut.map(|rect| StrutEntry { output: output.name.clone(), edge: slot.edge, rect });
                struts.set(id, entry);
            }
            views.push(PlannedView { view: id, output: slot.output, edge: slot.edge, geometry, strut });
        }
    }

    let unassigned = descriptors
        .iter()
        .filter(|d| (d.shared || active_layouts.contains(&d.layout)) && !occupancy.contains(d.id))
        .map(|d| d.id)
        .collect();

    Plan { occupancy, views, unassigned }
}

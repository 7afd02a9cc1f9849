//! Placement data and the pure algorithms over it.

pub mod edge_allocator;
pub mod output_registry;
pub mod struts;
pub mod view;

pub use edge_allocator::{AllocationInput, OccupancyMap, Slot};
pub use output_registry::{Output, OutputChange, OutputId, OutputRegistry};
pub use view::{Alignment, PriorityClass, ScreenPin, ViewDescriptor, ViewId};

//! Per-view runtime logic. Everything here is synchronous and driven by
//! explicit `Instant`s; the actor in [`crate::actor::dock`] owns the clock.

pub mod floating_gap;
pub mod plan;
pub mod positioner;
pub mod sensor;
pub mod tracker;
pub mod visibility;

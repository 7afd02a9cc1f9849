use std::fmt;

use serde::{Deserialize, Serialize};

use super::output_registry::OutputId;
use crate::sys::geometry::Edge;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewId(u32);

impl ViewId {
    pub const fn new(id: u32) -> ViewId { ViewId(id) }

    pub fn get(&self) -> u32 { self.0 }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "view#{}", self.0) }
}

/// Which output a view follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenPin {
    /// Whatever output is primary right now.
    #[default]
    Primary,
    Explicit(OutputId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    /// Left for horizontal views, top for vertical ones.
    Start,
    #[default]
    Center,
    /// Right for horizontal views, bottom for vertical ones.
    End,
    Justify,
}

/// Allocation precedence, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityClass {
    Shared,
    Primary,
    Explicit,
}

/// The placement-relevant part of a view's configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewDescriptor {
    pub id: ViewId,
    pub layout: String,
    pub pin: ScreenPin,
    pub edge: Edge,
    pub alignment: Alignment,
    /// Fraction of the output length, `0.0..=1.0`.
    pub max_length: f64,
    /// Fraction of the output length, `-1.0..=1.0`.
    pub offset: f64,
    pub thickness: i32,
    /// Hosted identically by every active layout (e.g. a systray host).
    pub shared: bool,
}

impl ViewDescriptor {
    pub fn priority(&self) -> PriorityClass {
        match (self.shared, self.pin) {
            (true, _) => PriorityClass::Shared,
            (false, ScreenPin::Primary) => PriorityClass::Primary,
            (false, ScreenPin::Explicit(_)) => PriorityClass::Explicit,
        }
    }
}

use serde::{Deserialize, Serialize};

use super::geometry::Rect;

/// An output as the display server reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputInfo {
    /// Connector name, e.g. `HDMI-1`.
    pub name: String,
    pub geometry: Rect,
    #[serde(default)]
    pub primary: bool,
}

/// Hotplug notifications. Receivers re-query [`OutputSource::outputs`] for
/// the full picture; the payload is informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputEvent {
    Added(String),
    Removed(String),
    PrimaryChanged(Option<String>),
    GeometryChanged(String),
}

pub trait OutputSource {
    /// Currently connected outputs. At most one is primary.
    fn outputs(&self) -> Vec<OutputInfo>;
}

/// A fixed output list, used by the `plan` command and in tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticOutputs(pub Vec<OutputInfo>);

impl OutputSource for StaticOutputs {
    fn outputs(&self) -> Vec<OutputInfo> { self.0.clone() }
}

impl StaticOutputs {
    pub fn read(path: &std::path::Path) -> anyhow::Result<Self> {
        let buf = std::fs::read_to_string(path)?;
        Ok(ron::from_str(&buf)?)
    }
}

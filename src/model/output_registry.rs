//! Stable ids for outputs.
//!
//! A connector keeps its id for as long as the table on disk survives, so
//! view configuration can name an output across hotplugs and restarts.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::common::coalesce::CoalescingTrigger;
use crate::common::collections::BTreeMap;
use crate::sys::geometry::Rect;
use crate::sys::output::OutputInfo;

pub const FIRST_OUTPUT_ID: u32 = 10;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutputId(u32);

impl OutputId {
    /// Pseudo id standing for "whichever output is primary".
    pub const PRIMARY: OutputId = OutputId(0);

    pub const fn new(id: u32) -> OutputId { OutputId(id) }

    pub fn get(&self) -> u32 { self.0 }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("connector name {0:?} is reserved")]
    ReservedName(String),
    #[error("connector name must not be empty")]
    EmptyName,
}

/// A connected output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Output {
    pub id: OutputId,
    pub name: String,
    pub geometry: Rect,
    pub primary: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputChange {
    Added(Output),
    Removed { id: OutputId, name: String },
    PrimaryChanged { from: Option<String>, to: Option<String> },
    GeometryChanged { id: OutputId, geometry: Rect },
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ConnectorTable {
    connectors: BTreeMap<u32, String>,
}

#[derive(Debug)]
pub struct OutputRegistry {
    connectors: BTreeMap<OutputId, String>,
    live: Vec<Output>,
    store: Option<PathBuf>,
    dirty: bool,
    save: CoalescingTrigger,
}

impl Default for OutputRegistry {
    fn default() -> Self { Self::new(None, Duration::from_secs(10)) }
}

impl OutputRegistry {
    pub fn new(store: Option<PathBuf>, save_debounce: Duration) -> Self {
        Self {
            connectors: BTreeMap::new(),
            live: Vec::new(),
            store,
            dirty: false,
            save: CoalescingTrigger::new(save_debounce),
        }
    }

    /// Opens the table at `path`, starting empty if it does not exist yet.
    pub fn load(path: PathBuf, save_debounce: Duration) -> anyhow::Result<Self> {
        let mut registry = Self::new(Some(path.clone()), save_debounce);
        if path.exists() {
            let buf = std::fs::read_to_string(&path)?;
            let table: ConnectorTable = ron::from_str(&buf)?;
            for (id, name) in table.connectors {
                if id < FIRST_OUTPUT_ID || name.is_empty() || name.starts_with(':') {
                    warn!(id, name, "dropping invalid connector entry");
                    continue;
                }
                registry.connectors.insert(OutputId(id), name);
            }
            info!(count = registry.connectors.len(), ?path, "loaded connector table");
        }
        Ok(registry)
    }

    pub fn id_for(&self, name: &str) -> Option<OutputId> {
        self.connectors.iter().find(|(_, n)| n.as_str() == name).map(|(id, _)| *id)
    }

    pub fn name_for(&self, id: OutputId) -> Option<&str> {
        self.connectors.get(&id).map(String::as_str)
    }

    pub fn known_ids(&self) -> impl Iterator<Item = OutputId> + '_ {
        self.connectors.keys().copied()
    }

    /// Returns the id of `name`, assigning the lowest free one if it is new.
    pub fn insert(&mut self, name: &str, now: Instant) -> Result<OutputId, RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if name.starts_with(':') {
            return Err(RegistryError::ReservedName(name.to_string()));
        }
        if let Some(id) = self.id_for(name) {
            return Ok(id);
        }
        let id = (FIRST_OUTPUT_ID..)
            .map(OutputId)
            .find(|id| !self.connectors.contains_key(id))
            .unwrap_or(OutputId(u32::MAX));
        debug!(%id, name, "assigned output id");
        self.connectors.insert(id, name.to_string());
        self.mark_dirty(now);
        Ok(id)
    }

    /// Replaces the live output set with `snapshot` and reports what changed.
    pub fn update(&mut self, snapshot: Vec<OutputInfo>, now: Instant) -> Vec<OutputChange> {
        let mut changes = Vec::new();
        let mut geometry_changed = false;
        let old_primary = self.primary().map(|o| o.name.clone());

        let mut live = Vec::with_capacity(snapshot.len());
        for info in snapshot {
            let id = match self.insert(&info.name, now) {
                Ok(id) => id,
                Err(e) => {
                    warn!(name = info.name, "ignoring output: {e}");
                    continue;
                }
            };
            if live.iter().any(|o: &Output| o.id == id) {
                continue;
            }
            live.push(Output {
                id,
                name: info.name,
                geometry: info.geometry,
                primary: info.primary,
            });
        }
        // Only the first output reported as primary counts.
        let mut seen_primary = false;
        for output in &mut live {
            if output.primary && seen_primary {
                output.primary = false;
            }
            seen_primary |= output.primary;
        }

        for old in &self.live {
            if !live.iter().any(|o| o.id == old.id) {
                changes.push(OutputChange::Removed { id: old.id, name: old.name.clone() });
            }
        }
        for new in &live {
            match self.live.iter().find(|o| o.id == new.id) {
                None => changes.push(OutputChange::Added(new.clone())),
                Some(old) if old.geometry != new.geometry => {
                    changes.push(OutputChange::GeometryChanged {
                        id: new.id,
                        geometry: new.geometry,
                    });
                    geometry_changed = true;
                }
                Some(_) => {}
            }
        }

        self.live = live;
        let new_primary = self.primary().map(|o| o.name.clone());
        if new_primary != old_primary {
            changes.push(OutputChange::PrimaryChanged { from: old_primary, to: new_primary });
        }
        if geometry_changed {
            self.mark_dirty(now);
        }
        changes
    }

    pub fn outputs(&self) -> &[Output] { &self.live }

    pub fn primary(&self) -> Option<&Output> { self.live.iter().find(|o| o.primary) }

    pub fn by_name(&self, name: &str) -> Option<&Output> { self.live.iter().find(|o| o.name == name) }

    pub fn is_active(&self, id: OutputId) -> bool { self.live.iter().any(|o| o.id == id) }

    /// The live output with `id`, falling back to the primary output when it
    /// is not connected.
    pub fn output_or_primary(&self, id: OutputId) -> Option<&Output> {
        self.live.iter().find(|o| o.id == id).or_else(|| self.primary())
    }

    /// Arms the save debounce on the first unsaved change only, so steady
    /// churn cannot postpone the write forever.
    fn mark_dirty(&mut self, now: Instant) {
        self.dirty = true;
        self.save.start_if_idle(now);
    }

    pub fn next_deadline(&self) -> Option<Instant> { self.save.deadline() }

    /// Writes the table once the save debounce has elapsed. Returns whether a
    /// write happened.
    pub fn poll_save(&mut self, now: Instant) -> anyhow::Result<bool> {
        if !self.save.poll(now) {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }

    /// Writes the table immediately if it has unsaved changes.
    pub fn flush(&mut self) -> anyhow::Result<()> {
        self.save.stop();
        if !self.dirty {
            return Ok(());
        }
        if let Some(path) = &self.store {
            write_table(path, &self.connectors)?;
            debug!(?path, "saved connector table");
        }
        self.dirty = false;
        Ok(())
    }
}

fn write_table(path: &Path, connectors: &BTreeMap<OutputId, String>) -> anyhow::Result<()> {
    let table = ConnectorTable {
        connectors: connectors.iter().map(|(id, name)| (id.0, name.clone())).collect(),
    };
    let buf = ron::ser::to_string_pretty(&table, ron::ser::PrettyConfig::default())?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, buf.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    fn info(name: &str, x: i32, primary: bool) -> OutputInfo {
        OutputInfo {
            name: name.to_string(),
            geometry: Rect::new(x, 0, 1920, 1080),
            primary,
        }
    }

    #[test]
    fn ids_start_at_ten_and_reuse_gaps() {
        let now = Instant::now();
        let mut registry = OutputRegistry::default();
        assert_eq!(registry.insert("eDP-1", now), Ok(OutputId::new(10)));
        assert_eq!(registry.insert("HDMI-1", now), Ok(OutputId::new(11)));
        assert_eq!(registry.insert("eDP-1", now), Ok(OutputId::new(10)));

        registry.connectors.remove(&OutputId::new(10));
        assert_eq!(registry.insert("DP-2", now), Ok(OutputId::new(10)));
    }

    #[test]
    fn reserved_names_are_rejected() {
        let mut registry = OutputRegistry::default();
        assert_eq!(
            registry.insert(":0.0", Instant::now()),
            Err(RegistryError::ReservedName(":0.0".into()))
        );
        assert_eq!(registry.insert("", Instant::now()), Err(RegistryError::EmptyName));
    }

    #[test]
    fn update_reports_hotplug_and_primary_changes() {
        let now = Instant::now();
        let mut registry = OutputRegistry::default();

        let changes = registry.update(vec![info("eDP-1", 0, true)], now);
        assert!(matches!(changes[0], OutputChange::Added(ref o) if o.name == "eDP-1"));
        assert_eq!(
            changes.last(),
            Some(&OutputChange::PrimaryChanged { from: None, to: Some("eDP-1".into()) })
        );

        let changes =
            registry.update(vec![info("eDP-1", 0, false), info("HDMI-1", 1920, true)], now);
        assert_eq!(changes.len(), 2);
        assert_eq!(
            changes[1],
            OutputChange::PrimaryChanged {
                from: Some("eDP-1".into()),
                to: Some("HDMI-1".into()),
            }
        );

        let changes = registry.update(vec![info("eDP-1", 0, true)], now);
        assert_eq!(
            changes[0],
            OutputChange::Removed { id: OutputId::new(11), name: "HDMI-1".into() }
        );
        // The id survives the disconnect.
        assert_eq!(registry.id_for("HDMI-1"), Some(OutputId::new(11)));
        assert!(!registry.is_active(OutputId::new(11)));
    }

    #[test]
    fn only_one_output_is_primary() {
        let mut registry = OutputRegistry::default();
        registry.update(vec![info("A", 0, true), info("B", 1920, true)], Instant::now());
        let primaries: Vec<_> =
            registry.outputs().iter().filter(|o| o.primary).map(|o| o.name.as_str()).collect();
        assert_eq!(primaries, vec!["A"]);
    }

    #[test]
    fn disconnected_ids_fall_back_to_primary() {
        let now = Instant::now();
        let mut registry = OutputRegistry::default();
        registry.update(vec![info("eDP-1", 0, true), info("HDMI-1", 1920, false)], now);
        registry.update(vec![info("eDP-1", 0, true)], now);

        let hdmi = registry.id_for("HDMI-1").unwrap();
        assert_eq!(registry.output_or_primary(hdmi).map(|o| o.name.as_str()), Some("eDP-1"));
    }

    #[test]
    fn table_is_saved_after_the_debounce_and_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs.ron");
        let start = Instant::now();
        let debounce = Duration::from_secs(10);

        let mut registry = OutputRegistry::load(path.clone(), debounce).unwrap();
        registry.update(vec![info("eDP-1", 0, true), info("HDMI-1", 1920, false)], start);
        assert!(!registry.poll_save(start + Duration::from_secs(5)).unwrap());
        assert!(!path.exists());
        assert!(registry.poll_save(start + Duration::from_secs(10)).unwrap());

        let reloaded = OutputRegistry::load(path, debounce).unwrap();
        assert_eq!(reloaded.id_for("HDMI-1"), Some(OutputId::new(11)));
        assert_eq!(reloaded.name_for(OutputId::new(10)), Some("eDP-1"));
    }

    #[test]
    fn steady_churn_does_not_postpone_the_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("outputs.ron");
        let start = Instant::now();
        let mut registry = OutputRegistry::load(path.clone(), Duration::from_secs(10)).unwrap();
        registry.update(vec![info("eDP-1", 0, true)], start);

        // A resize every 3s keeps the table dirty without moving the deadline.
        for step in 1..=3 {
            let at = start + Duration::from_secs(3 * step);
            let mut resized = info("eDP-1", 0, true);
            resized.geometry.width += step as i32;
            registry.update(vec![resized], at);
            assert!(!registry.poll_save(at).unwrap());
        }
        assert_eq!(registry.next_deadline(), Some(start + Duration::from_secs(10)));
        assert!(registry.poll_save(start + Duration::from_secs(10)).unwrap());
        assert!(path.exists());
    }
}

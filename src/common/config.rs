use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};

use crate::common::collections::{BTreeSet, HashSet};
use crate::model::output_registry::FIRST_OUTPUT_ID;
use crate::model::view::{Alignment, ScreenPin, ViewDescriptor, ViewId};
use crate::sys::geometry::Edge;
use crate::view::visibility::VisibilityMode;

pub fn data_dir() -> PathBuf { home().join(".edgedock") }
pub fn outputs_file() -> PathBuf { data_dir().join("outputs.ron") }
pub fn config_file() -> PathBuf { home().join(".edgedock.toml") }

fn home() -> PathBuf { dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")) }

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default, rename = "view")]
    pub views: Vec<ViewConfig>,
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Quiet period after output or layout churn before views are reconciled.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_sync_debounce")]
    pub sync_debounce: Duration,
    /// How long a drifted view geometry is tolerated before it is re-applied.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_geometry_validation")]
    pub geometry_validation: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_geometry_sync")]
    pub geometry_sync: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_strut_throttle")]
    pub strut_throttle: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_output_save_debounce")]
    pub output_save_debounce: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_sensor_settle")]
    pub sensor_settle: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_floating_gap_check")]
    pub floating_gap_check: Duration,
    /// Whether a compositor is running; sensors are thinner without one.
    #[serde(default = "yes")]
    pub compositing: bool,
    /// With a single layout every view belongs to `current_layout`.
    #[serde(default = "yes")]
    pub single_layout: bool,
    #[serde(default = "default_layout")]
    pub current_layout: String,
    /// Additional layouts kept alive on other activities. Ignored in
    /// single-layout mode.
    #[serde(default)]
    pub active_layouts: Vec<String>,
}

#[serde_as]
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct VisibilitySettings {
    #[serde(default)]
    pub mode: VisibilityMode,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_timer_show")]
    pub timer_show: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_timer_hide")]
    pub timer_hide: Duration,
    /// Keep an edge sensor so a hidden view can be revealed from the edge.
    #[serde(default = "yes")]
    pub enable_edge_sensor: bool,
    #[serde(default)]
    pub raise_on_desktop_change: bool,
    #[serde(default)]
    pub raise_on_activity_change: bool,
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(deny_unknown_fields)]
pub struct ViewConfig {
    pub id: ViewId,
    #[serde(default = "default_layout")]
    pub layout: String,
    #[serde(default)]
    pub output: ScreenPin,
    #[serde(default = "default_edge")]
    pub edge: Edge,
    #[serde(default)]
    pub alignment: Alignment,
    /// Percent of the output length.
    #[serde(default = "default_max_length")]
    pub max_length: f64,
    /// Percent of the output length, may be negative.
    #[serde(default)]
    pub offset: f64,
    #[serde(default = "default_thickness")]
    pub thickness: i32,
    /// Gap between the view and the screen edge for floating views.
    #[serde(default)]
    pub screen_edge_margin: i32,
    /// Sized to its content and aligned along the edge, rather than spanning
    /// the whole edge with a masked window.
    #[serde(default = "yes")]
    pub behave_as_panel: bool,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub visibility: VisibilitySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sync_debounce: default_sync_debounce(),
            geometry_validation: default_geometry_validation(),
            geometry_sync: default_geometry_sync(),
            strut_throttle: default_strut_throttle(),
            output_save_debounce: default_output_save_debounce(),
            sensor_settle: default_sensor_settle(),
            floating_gap_check: default_floating_gap_check(),
            compositing: true,
            single_layout: true,
            current_layout: default_layout(),
            active_layouts: Vec::new(),
        }
    }
}

impl Default for VisibilitySettings {
    fn default() -> Self {
        Self {
            mode: VisibilityMode::default(),
            timer_show: default_timer_show(),
            timer_hide: default_timer_hide(),
            enable_edge_sensor: true,
            raise_on_desktop_change: false,
            raise_on_activity_change: false,
        }
    }
}

impl Settings {
    pub fn active_layouts(&self) -> BTreeSet<String> {
        let mut layouts = BTreeSet::from([self.current_layout.clone()]);
        if !self.single_layout {
            layouts.extend(self.active_layouts.iter().cloned());
        }
        layouts
    }

    pub fn is_layout_current(&self, layout: &str) -> bool {
        self.single_layout || self.current_layout == layout
    }

    /// Whether `view` belongs on screen right now. Shared views follow every
    /// layout.
    pub fn is_view_current(&self, view: &ViewConfig) -> bool {
        view.shared || self.is_layout_current(&view.layout)
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.sync_debounce > Duration::from_secs(30) {
            issues.push(format!(
                "sync_debounce of {}ms would leave views stale for too long",
                self.sync_debounce.as_millis()
            ));
        }
        if self.geometry_validation.is_zero() {
            issues.push("geometry_validation must be positive".to_string());
        }
        if self.current_layout.is_empty() {
            issues.push("current_layout must not be empty".to_string());
        }

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;

        if self.sync_debounce > Duration::from_secs(30) {
            self.sync_debounce = default_sync_debounce();
            fixes += 1;
        }
        if self.geometry_validation.is_zero() {
            self.geometry_validation = default_geometry_validation();
            fixes += 1;
        }
        if self.current_layout.is_empty() {
            self.current_layout = default_layout();
            fixes += 1;
        }

        fixes
    }
}

impl VisibilitySettings {
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.timer_hide > Duration::from_secs(10) {
            issues.push(format!(
                "timer_hide should not exceed 10000ms, got {}",
                self.timer_hide.as_millis()
            ));
        }
        if self.timer_show > Duration::from_secs(10) {
            issues.push(format!(
                "timer_show should not exceed 10000ms, got {}",
                self.timer_show.as_millis()
            ));
        }
        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;
        if self.timer_hide > Duration::from_secs(10) {
            self.timer_hide = default_timer_hide();
            fixes += 1;
        }
        if self.timer_show > Duration::from_secs(10) {
            self.timer_show = default_timer_show();
            fixes += 1;
        }
        fixes
    }
}

impl ViewConfig {
    pub fn new(id: u32) -> Self {
        Self {
            id: ViewId::new(id),
            layout: default_layout(),
            output: ScreenPin::Primary,
            edge: default_edge(),
            alignment: Alignment::default(),
            max_length: default_max_length(),
            offset: 0.0,
            thickness: default_thickness(),
            screen_edge_margin: 0,
            behave_as_panel: true,
            shared: false,
            visibility: VisibilitySettings::default(),
        }
    }

    pub fn descriptor(&self) -> ViewDescriptor {
        ViewDescriptor {
            id: self.id,
            layout: self.layout.clone(),
            pin: self.output,
            edge: self.edge,
            alignment: self.alignment,
            max_length: self.max_length / 100.0,
            offset: self.offset / 100.0,
            thickness: self.thickness,
            shared: self.shared,
        }
    }

    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let id = self.id;

        if !(self.max_length > 0.0 && self.max_length <= 100.0) {
            issues.push(format!("{id}: max_length must be in (0, 100], got {}", self.max_length));
        }
        if !(-100.0..=100.0).contains(&self.offset) {
            issues.push(format!("{id}: offset must be in [-100, 100], got {}", self.offset));
        }
        if self.thickness < 0 {
            issues.push(format!("{id}: thickness must be non-negative, got {}", self.thickness));
        }
        if self.screen_edge_margin < 0 {
            issues.push(format!(
                "{id}: screen_edge_margin must be non-negative, got {}",
                self.screen_edge_margin
            ));
        }
        if let ScreenPin::Explicit(output) = self.output {
            if output.get() < FIRST_OUTPUT_ID {
                issues.push(format!(
                    "{id}: explicit output ids start at {FIRST_OUTPUT_ID}, got {output}"
                ));
            }
        }
        if self.layout.is_empty() {
            issues.push(format!("{id}: layout must not be empty"));
        }
        issues.extend(self.visibility.validate().into_iter().map(|i| format!("{id}: {i}")));

        issues
    }

    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = 0;

        if !(self.max_length > 0.0 && self.max_length <= 100.0) {
            self.max_length = default_max_length();
            fixes += 1;
        }
        if !(-100.0..=100.0).contains(&self.offset) {
            self.offset = self.offset.clamp(-100.0, 100.0);
            fixes += 1;
        }
        if self.thickness < 0 {
            self.thickness = default_thickness();
            fixes += 1;
        }
        if self.screen_edge_margin < 0 {
            self.screen_edge_margin = 0;
            fixes += 1;
        }
        if let ScreenPin::Explicit(output) = self.output {
            if output.get() < FIRST_OUTPUT_ID {
                self.output = ScreenPin::Primary;
                fixes += 1;
            }
        }
        if self.layout.is_empty() {
            self.layout = default_layout();
            fixes += 1;
        }
        fixes += self.visibility.auto_fix_values();

        fixes
    }
}

fn yes() -> bool { true }

fn default_sync_debounce() -> Duration { Duration::from_millis(2000) }

fn default_geometry_validation() -> Duration { Duration::from_millis(500) }

fn default_geometry_sync() -> Duration { Duration::from_millis(40) }

fn default_strut_throttle() -> Duration { Duration::from_millis(1000) }

fn default_output_save_debounce() -> Duration { Duration::from_secs(10) }

fn default_sensor_settle() -> Duration { Duration::from_millis(50) }

fn default_floating_gap_check() -> Duration { Duration::from_millis(200) }

fn default_timer_show() -> Duration { Duration::ZERO }

fn default_timer_hide() -> Duration { Duration::from_millis(700) }

fn default_layout() -> String { "default".to_string() }

fn default_edge() -> Edge { Edge::Bottom }

fn default_max_length() -> f64 { 100.0 }

fn default_thickness() -> i32 { 48 }

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)?;
        Self::parse(&buf)
    }

    pub fn default() -> Config {
        Self::parse(include_str!("../../edgedock.default.toml"))
            .expect("embedded default config is valid")
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, toml_string.as_bytes())?;
        Ok(())
    }

    pub fn parse(buf: &str) -> anyhow::Result<Config> { Ok(toml::from_str(buf)?) }

    pub fn view(&self, id: ViewId) -> Option<&ViewConfig> { self.views.iter().find(|v| v.id == id) }

    pub fn descriptors(&self) -> Vec<ViewDescriptor> {
        self.views.iter().map(ViewConfig::descriptor).collect()
    }

    /// Validates the entire configuration and returns a list of issues found.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = self.settings.validate();

        let mut seen = HashSet::default();
        for view in &self.views {
            if !seen.insert(view.id) {
                issues.push(format!("duplicate view id {}", view.id.get()));
            }
            issues.extend(view.validate());
        }

        issues
    }

    /// Attempts to fix configuration values automatically.
    /// Returns the number of fixes applied.
    pub fn auto_fix_values(&mut self) -> usize {
        let mut fixes = self.settings.auto_fix_values();
        for view in &mut self.views {
            fixes += view.auto_fix_values();
        }
        fixes
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::output_registry::OutputId;

    #[test]
    fn default_config_parses() { super::Config::default(); }

    #[test]
    fn default_config_is_valid() {
        assert_eq!(Config::default().validate(), Vec::<String>::new());
    }

    #[test]
    fn views_parse_with_defaults() {
        let config = Config::parse(
            r#"
            [settings]
            sync_debounce = 500

            [[view]]
            id = 1

            [[view]]
            id = 2
            output = { explicit = 11 }
            edge = "left"
            alignment = "start"
            max_length = 60.0
            [view.visibility]
            mode = "dodge_all_windows"
            timer_hide = 300
            "#,
        )
        .unwrap();

        assert_eq!(config.settings.sync_debounce, Duration::from_millis(500));
        assert_eq!(config.settings.strut_throttle, Duration::from_millis(1000));
        assert_eq!(config.views.len(), 2);

        let first = &config.views[0];
        assert_eq!(first.output, ScreenPin::Primary);
        assert_eq!(first.edge, Edge::Bottom);
        assert_eq!(first.visibility.mode, VisibilityMode::DodgeActive);
        assert_eq!(first.visibility.timer_hide, Duration::from_millis(700));

        let second = &config.views[1];
        assert_eq!(second.output, ScreenPin::Explicit(OutputId::new(11)));
        assert_eq!(second.visibility.mode, VisibilityMode::DodgeAllWindows);
        let descriptor = second.descriptor();
        assert_eq!(descriptor.max_length, 0.6);
        assert_eq!(descriptor.edge, Edge::Left);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(Config::parse("[settings]\nbogus = 1\n").is_err());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        let mut view = ViewConfig::new(9);
        view.max_length = 0.0;
        view.output = ScreenPin::Explicit(OutputId::new(3));
        config.views.push(view);

        let issues = config.validate();
        assert_eq!(issues.len(), 2);
        assert!(issues[0].contains("max_length"));
        assert!(issues[1].contains("explicit output ids start at 10"));

        let fixes = config.auto_fix_values();
        assert_eq!(fixes, 2);
        assert!(config.validate().is_empty());
        let view = config.view(ViewId::new(9)).unwrap();
        assert_eq!(view.max_length, 100.0);
        assert_eq!(view.output, ScreenPin::Primary);
    }

    #[test]
    fn duplicate_view_ids_are_reported() {
        let mut config = Config::default();
        config.views = vec![ViewConfig::new(1), ViewConfig::new(1)];
        assert_eq!(config.validate(), vec!["duplicate view id 1".to_string()]);
    }

    #[test]
    fn save_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("edgedock.toml");
        let config = Config::default();
        config.save(&path).unwrap();
        assert_eq!(Config::read(&path).unwrap(), config);
    }

    #[test]
    fn multiple_layouts_are_all_active() {
        let mut settings = Settings::default();
        settings.active_layouts = vec!["work".into()];
        assert_eq!(settings.active_layouts().len(), 1);
        settings.single_layout = false;
        assert_eq!(
            settings.active_layouts(),
            BTreeSet::from(["default".to_string(), "work".to_string()])
        );
        assert!(!settings.is_layout_current("work"));
    }

    #[test]
    fn shared_views_are_current_in_every_layout() {
        let mut settings = Settings::default();
        settings.single_layout = false;
        let mut view = ViewConfig::new(1);
        view.layout = "work".into();
        assert!(!settings.is_view_current(&view));
        view.shared = true;
        assert!(settings.is_view_current(&view));
    }
}

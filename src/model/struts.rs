use std::sync::Arc;

use parking_lot::RwLock;

use super::view::ViewId;
use crate::common::collections::BTreeMap;
use crate::sys::geometry::{Edge, Rect};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrutEntry {
    pub output: String,
    pub edge: Edge,
    pub rect: Rect,
}

/// Reserved-space regions currently applied by views.
#[derive(Debug, Default)]
pub struct StrutRegistry {
    entries: BTreeMap<ViewId, StrutEntry>,
}

pub type SharedStruts = Arc<RwLock<StrutRegistry>>;

impl StrutRegistry {
    /// Returns whether anything changed.
    pub fn set(&mut self, view: ViewId, entry: Option<StrutEntry>) -> bool {
        match entry {
            Some(entry) => self.entries.insert(view, entry.clone()).as_ref() != Some(&entry),
            None => self.entries.remove(&view).is_some(),
        }
    }

    pub fn get(&self, view: ViewId) -> Option<&StrutEntry> { self.entries.get(&view) }

    /// Struts on `output` other than `except`'s own.
    pub fn reserved_on(&self, output: &str, except: Option<ViewId>) -> Vec<Rect> {
        self.entries
            .iter()
            .filter(|(id, e)| e.output == output && Some(**id) != except)
            .map(|(_, e)| e.rect)
            .collect()
    }

    /// `geometry` shrunk by every strut on `output`.
    pub fn available_rect(&self, output: &str, geometry: Rect) -> Rect {
        let (mut x0, mut y0) = (geometry.x, geometry.y);
        let (mut x1, mut y1) = (geometry.max_x(), geometry.max_y());
        for entry in self.entries.values().filter(|e| e.output == output) {
            match entry.edge {
                Edge::Top => y0 = y0.max(entry.rect.max_y()),
                Edge::Bottom => y1 = y1.min(entry.rect.y),
                Edge::Left => x0 = x0.max(entry.rect.max_x()),
                Edge::Right => x1 = x1.min(entry.rect.x),
            }
        }
        Rect::new(x0, y0, (x1 - x0).max(0), (y1 - y0).max(0))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_log::test;

    use super::*;

    fn entry(output: &str, edge: Edge, rect: Rect) -> Option<StrutEntry> {
        Some(StrutEntry { output: output.into(), edge, rect })
    }

    #[test]
    fn available_rect_excludes_struts_on_that_output_only() {
        let mut struts = StrutRegistry::default();
        let screen = Rect::new(0, 0, 1920, 1080);
        assert!(struts.set(ViewId::new(1), entry("eDP-1", Edge::Bottom, Rect::new(0, 1032, 1920, 48))));
        assert!(struts.set(ViewId::new(2), entry("eDP-1", Edge::Left, Rect::new(0, 0, 40, 1032))));
        assert!(struts.set(ViewId::new(3), entry("HDMI-1", Edge::Top, Rect::new(0, 0, 1920, 30))));

        assert_eq!(struts.available_rect("eDP-1", screen), Rect::new(40, 0, 1880, 1032));
        assert_eq!(struts.reserved_on("eDP-1", Some(ViewId::new(2))), vec![Rect::new(0, 1032, 1920, 48)]);
    }

    #[test]
    fn setting_the_same_strut_twice_is_not_a_change() {
        let mut struts = StrutRegistry::default();
        let e = entry("eDP-1", Edge::Top, Rect::new(0, 0, 100, 20));
        assert!(struts.set(ViewId::new(1), e.clone()));
        assert!(!struts.set(ViewId::new(1), e));
        assert!(struts.set(ViewId::new(1), None));
        assert!(!struts.set(ViewId::new(1), None));
    }
}

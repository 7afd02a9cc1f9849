use serde::{Deserialize, Serialize};

use crate::model::view::ViewId;
use crate::sys::geometry::{Edge, Rect};
use crate::sys::window_manager::WindowId;

/// Notifications for observers outside the core (applets, status tools).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
#[serde(tag = "type")]
pub enum BroadcastEvent {
    ViewEdgeChanged {
        view: ViewId,
        output: String,
        edge: Edge,
    },
    ViewsCountChanged {
        count: usize,
    },
    AvailableScreenRectChanged {
        output: String,
        rect: Rect,
    },
    ViewBackgroundChanged {
        view: ViewId,
        scheme_window: Option<WindowId>,
        maximized: bool,
    },
}

pub type BroadcastSender = crate::actor::Sender<BroadcastEvent>;
pub type BroadcastReceiver = crate::actor::Receiver<BroadcastEvent>;

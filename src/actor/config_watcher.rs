use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;

use notify::{Config as NotifyConfig, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::actor::layout_sync::{self, Event as SyncEvent};
use crate::common::config::Config;

const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polls the config file and hands every successfully parsed revision to the
/// layout synchronizer.
pub struct ConfigWatcher {
    file: PathBuf,
    file_name: Option<OsString>,
    sync_tx: layout_sync::Sender,
}

impl ConfigWatcher {
    pub fn new(file: PathBuf, sync_tx: layout_sync::Sender) -> Self {
        let file_name = file.file_name().map(OsString::from);
        Self { file, file_name, sync_tx }
    }

    /// Watches until the layout synchronizer goes away.
    pub async fn run(self) -> notify::Result<()> {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<notify::Result<Event>>();
        let mut watcher = PollWatcher::new(
            move |res| {
                _ = tx.send(res);
            },
            NotifyConfig::default().with_poll_interval(POLL_INTERVAL).with_compare_contents(true),
        )?;
        watcher.watch(&self.file, RecursiveMode::NonRecursive)?;
        info!(file = ?self.file, "watching config");

        while let Some(res) = rx.recv().await {
            match res {
                Ok(event) if self.is_relevant(&event) => {
                    debug!(kind = ?event.kind, "config file changed");
                    self.request_reload();
                }
                Ok(_) => {}
                Err(e) => warn!("config watch error: {e:?}"),
            }
            if self.sync_tx.is_closed() {
                break;
            }
        }
        debug!("config watcher exiting");
        Ok(())
    }

    /// A write or re-creation of the config file itself. Removal is not a
    /// reload: the running config stays until a new file appears.
    fn is_relevant(&self, event: &Event) -> bool {
        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            return false;
        }
        let Some(name) = &self.file_name else { return false };
        event.paths.iter().any(|p| p.file_name() == Some(name.as_os_str()))
    }

    fn request_reload(&self) {
        match load(&self.file) {
            Ok(config) => {
                info!(views = config.views.len(), "requesting config reload");
                self.sync_tx.send(SyncEvent::ConfigReloaded(Box::new(config)));
            }
            Err(e) => warn!("keeping previous config: {e:#}"),
        }
    }
}

/// Reads, validates and fixes up a config file.
pub fn load(path: &std::path::Path) -> anyhow::Result<Config> {
    let mut config = Config::read(path)?;
    for issue in config.validate() {
        warn!("config: {issue}");
    }
    let fixes = config.auto_fix_values();
    if fixes > 0 {
        info!(fixes, "adjusted out-of-range config values");
    }
    Ok(config)
}

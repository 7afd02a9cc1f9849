use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use edgedock::actor::broadcast::BroadcastEvent;
use edgedock::actor::config_watcher::{self, ConfigWatcher};
use edgedock::actor::dock::{DockContext, DockHost};
use edgedock::actor::layout_sync::{self, LayoutSynchronizer};
use edgedock::common::config::{self, Config};
use edgedock::common::log;
use edgedock::model::output_registry::OutputRegistry;
use edgedock::sys::headless::HeadlessWm;
use edgedock::sys::output::{OutputSource, StaticOutputs};
use edgedock::view::plan::plan;
use tracing::{error, info};

#[derive(Parser)]
#[command(version, about = "Places docks and panels on screen edges")]
struct Cli {
    /// Config file to use instead of ~/.edgedock.toml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate the configuration and report every problem found.
    Check,
    /// Print, as JSON, where every view would go on the given outputs.
    Plan {
        /// RON list of outputs: `[(name: "eDP-1", geometry: (...), primary: true)]`.
        #[arg(long)]
        outputs: PathBuf,
    },
    /// Run the core against a fixed output list without a display, printing
    /// broadcast events as JSON lines. Config changes are picked up live.
    Watch {
        #[arg(long)]
        outputs: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let opt: Cli = Parser::parse();

    log::init_logging();
    install_panic_hook();

    let config_path = opt.config.clone().unwrap_or_else(config::config_file);
    match opt.command {
        Command::Check => check(&config_path),
        Command::Plan { outputs } => {
            let config = read_config(&config_path)?;
            let mut registry = open_registry(&config)?;
            let outputs = StaticOutputs::read(&outputs)
                .with_context(|| format!("reading outputs from {}", outputs.display()))?;
            registry.update(outputs.outputs(), Instant::now());
            let plan = plan(&config, &registry);
            println!("{}", serde_json::to_string_pretty(&plan)?);
            Ok(())
        }
        Command::Watch { outputs } => {
            let config = read_config(&config_path)?;
            let outputs = StaticOutputs::read(&outputs)
                .with_context(|| format!("reading outputs from {}", outputs.display()))?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(watch(config, config_path, outputs))
        }
    }
}

fn check(path: &Path) -> anyhow::Result<()> {
    let config = Config::read(path).with_context(|| format!("reading {}", path.display()))?;
    let issues = config.validate();
    if issues.is_empty() {
        println!("{}: ok ({} views)", path.display(), config.views.len());
        return Ok(());
    }
    for issue in &issues {
        println!("{}: {issue}", path.display());
    }
    anyhow::bail!("{} problem(s) found", issues.len())
}

fn read_config(path: &Path) -> anyhow::Result<Config> {
    if path.exists() {
        config_watcher::load(path).with_context(|| format!("reading {}", path.display()))
    } else {
        info!("{} not found, using the default config", path.display());
        Ok(Config::default())
    }
}

fn open_registry(config: &Config) -> anyhow::Result<OutputRegistry> {
    OutputRegistry::load(config::outputs_file(), config.settings.output_save_debounce)
}

async fn watch(config: Config, config_path: PathBuf, outputs: StaticOutputs) -> anyhow::Result<()> {
    let registry = open_registry(&config)?;
    let (broadcast_tx, mut broadcast_rx) = edgedock::actor::channel::<BroadcastEvent>();
    let (sync_tx, sync_rx) = layout_sync::channel();

    let mut ctx = DockContext::new(Arc::new(HeadlessWm::default()));
    ctx.broadcast = Some(broadcast_tx.clone());
    let host = DockHost::new(ctx, config.settings.clone());
    let sync = LayoutSynchronizer::new(config, outputs, host, registry).with_broadcast(broadcast_tx);

    tokio::spawn(async move {
        while let Some((_, event)) = broadcast_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => error!("failed to encode broadcast: {e}"),
            }
        }
    });

    let watcher = ConfigWatcher::new(config_path, sync_tx.clone());
    tokio::spawn(async move {
        if let Err(e) = watcher.run().await {
            error!("config watcher stopped: {e:?}");
        }
    });

    let shutdown_tx = sync_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, shutting down");
            shutdown_tx.send(layout_sync::Event::Shutdown);
        }
    });

    let mut host = sync.run(sync_tx, sync_rx).await;
    // Docks remove their sensors and struts on the way out.
    host.join().await;
    Ok(())
}

#[cfg(panic = "unwind")]
fn install_panic_hook() {
    // A panicking actor task would otherwise leave the rest running.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        original_hook(info);
        std::process::abort();
    }));
}

#[cfg(not(panic = "unwind"))]
fn install_panic_hook() {}

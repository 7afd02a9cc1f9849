use once_cell::sync::OnceCell;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};
use tracing_tree::HierarchicalLayer;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_FILTER: &str = "edgedock=info";

/// Installs the global subscriber. Later calls are no-ops.
pub fn init_logging() {
    INIT.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        let tree = HierarchicalLayer::default()
            .with_writer(std::io::stderr)
            .with_indent_lines(true)
            .with_targets(true)
            .with_bracketed_fields(true);
        // Another subscriber may already be installed, e.g. by a test harness.
        let _ = Registry::default().with(filter).with(tree).try_init();
    });
}

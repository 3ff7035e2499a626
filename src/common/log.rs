use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};
use tracing_tree::HierarchicalLayer;
use tracing_tree::time::Uptime;

const DEFAULT_DIRECTIVE: &str = "winswitch=info";

/// Installs the global subscriber. `RUST_LOG` overrides the default level;
/// `verbose` raises it to debug.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "winswitch=debug" } else { DEFAULT_DIRECTIVE })
    });
    let tree = HierarchicalLayer::default()
        .with_writer(std::io::stderr)
        .with_indent_lines(true)
        .with_indent_amount(2)
        .with_targets(true)
        .with_bracketed_fields(true)
        .with_timer(Uptime::default());
    // A second call (e.g. from tests) keeps the first subscriber.
    let _ = Registry::default().with(filter).with(tree).try_init();
}

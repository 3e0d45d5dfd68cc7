pub mod build_info;

use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_FILTER: &str = "tally_core=info,tally_engine=info";

static TRACING_INIT: Once = Once::new();

/// Installs the global subscriber, writing to stderr.
///
/// `RUST_LOG` wins over `filter`; an unparsable directive falls back to the default.
pub fn init_tracing(filter: Option<&str>) {
    TRACING_INIT.call_once(|| {
        let directives = filter.unwrap_or(DEFAULT_FILTER);
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(directives))
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
        // A subscriber installed by an embedding process is kept.
        let _ = fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

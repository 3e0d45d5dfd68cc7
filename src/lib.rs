#![doc(test(attr(deny(warnings))))]

//! Tally turns recurring charge definitions into dated charge instances and
//! invoices. This crate is the facade: it re-exports the workspace crates and
//! hosts the `tally_core_cli` command line.

pub mod cli;
pub mod errors;
pub mod utils;

pub use tally_config as config;
pub use tally_domain as domain;
pub use tally_engine as engine;
pub use tally_storage_json as storage_json;
pub use tally_storage_sqlite as storage_sqlite;

pub use errors::TallyError;

/// Initializes tracing with the default filter.
pub fn init() {
    init_with_filter(None);
}

/// Initializes tracing once; later calls are no-ops.
///
/// `RUST_LOG` takes precedence over `filter`.
pub fn init_with_filter(filter: Option<&str>) {
    utils::init_tracing(filter);
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_is_idempotent() {
        super::init();
        super::init_with_filter(Some("tally_core=debug"));
    }
}

use serde::{Deserialize, Serialize};

pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_INVOICE_PREFIX: &str = "EXP";
pub const DEFAULT_MAX_CYCLES: u32 = 10_000;

/// Values the engine and services read instead of global configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub currency: String,
    pub invoice_prefix: String,
    /// Days past the as-of date that still count as due.
    pub lookahead_days: u32,
    /// Upper bound on cycles materialized for one definition in one run.
    pub max_cycles_per_definition: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            currency: DEFAULT_CURRENCY.into(),
            invoice_prefix: DEFAULT_INVOICE_PREFIX.into(),
            lookahead_days: 0,
            max_cycles_per_definition: DEFAULT_MAX_CYCLES,
        }
    }
}

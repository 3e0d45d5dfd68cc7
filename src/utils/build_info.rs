use serde::Serialize;

/// Build metadata embedded by `build.rs`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BuildMetadata {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub git_status: &'static str,
    pub timestamp: &'static str,
    pub target: &'static str,
    pub profile: &'static str,
    pub rustc: &'static str,
}

pub fn current() -> BuildMetadata {
    BuildMetadata {
        version: env!("CARGO_PKG_VERSION"),
        git_hash: option_env!("TALLY_BUILD_HASH").unwrap_or("unknown"),
        git_status: option_env!("TALLY_BUILD_STATUS").unwrap_or("unknown"),
        timestamp: option_env!("TALLY_BUILD_TIMESTAMP").unwrap_or("unknown"),
        target: option_env!("TALLY_BUILD_TARGET").unwrap_or("unknown"),
        profile: option_env!("TALLY_BUILD_PROFILE").unwrap_or("unknown"),
        rustc: option_env!("TALLY_BUILD_RUSTC").unwrap_or("unknown"),
    }
}

impl BuildMetadata {
    /// One line per field, for `tally_core_cli version`.
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("tally_core_cli {}", self.version),
            format!("commit:  {} ({})", self.git_hash, self.git_status),
            format!("built:   {}", self.timestamp),
            format!("target:  {} [{}]", self.target, self.profile),
            format!("rustc:   {}", self.rustc),
        ]
    }
}

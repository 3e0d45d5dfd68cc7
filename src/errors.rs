use tally_config::ConfigError;
use tally_engine::CoreError;
use thiserror::Error;

/// Errors surfaced by the CLI.
#[derive(Debug, Error)]
pub enum TallyError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Invalid input: {0}")]
    Input(String),
    #[error("{0} definition(s) failed during generation")]
    GenerationFailed(usize),
    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

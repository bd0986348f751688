use rosetta_api::{StoreError, TransformError};
use rosetta_engine::EngineError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("{0}")]
    Transform(#[from] TransformError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

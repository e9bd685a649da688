use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[source] anyhow::Error),

    #[error("Failed to build evaluation graph: {0}")]
    Graph(#[source] anyhow::Error),

    #[error("Failed to prepare output directory: {0}")]
    Io(#[source] std::io::Error),
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed preset input. Nothing has been applied.
    #[error("invalid preset format: {0}")]
    InvalidFormat(String),

    /// The fixed processing topology was built with impossible settings.
    #[error("fatal configuration error: {0}")]
    FatalConfig(String),

    #[error("audio engine is no longer running")]
    Disconnected,

    #[error("engine command queue is full")]
    QueueFull,
}

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TestscopeError>;

#[derive(Debug, Error)]
pub enum TestscopeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration file: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("Invalid test command: {0}")]
    InvalidCommand(String),
}

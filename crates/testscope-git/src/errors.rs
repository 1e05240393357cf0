use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChangeDetectionError>;

#[derive(Debug, Error)]
pub enum ChangeDetectionError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Repository not found at path: {0}")]
    RepoNotFound(String),

    #[error("Diff mode 'range' requires both base and head revisions")]
    MissingRangeRevisions,
}

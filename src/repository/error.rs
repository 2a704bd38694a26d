use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("RepositoryError - SerdeJson: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("RepositoryError - Backend: {0}")]
    Backend(String),
}

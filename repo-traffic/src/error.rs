use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TrafficError {
    /// The credential is missing, or GitHub refused the identity behind it.
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("transport error: {0}")]
    Transport(String),
    /// The repository or its traffic metrics are not visible to us.
    #[error("not found: {0}")]
    NotFound(String),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("invalid resource name: {0}")]
    InvalidResource(String),
}

impl TrafficError {
    /// Only transport-level failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

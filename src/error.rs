use thiserror::Error;

/// Errors produced while building a cluster tree.
#[derive(Debug, Error, PartialEq)]
pub enum ClusterError {
    #[error("need at least 2 stations to find a furthest pair, got {0}")]
    InsufficientPoints(usize),

    #[error("threshold must be a positive number of kilometers, got {0}")]
    InvalidThreshold(f64),
}

pub type ClusterResult<T> = Result<T, ClusterError>;

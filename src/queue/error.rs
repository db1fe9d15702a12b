use thiserror::Error;

/// Errors reported by the queue engine.
///
/// Every variant is a per-call outcome; none of them is fatal to the process.
/// Mutating operations are transactional, so an error means no state changed.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The request is malformed; nothing was touched.
    #[error("{0}")]
    Validation(String),

    /// The referenced job does not exist.
    #[error("job {0} not found")]
    NotFound(i64),

    /// The operation is not legal from the job's current state, or the
    /// caller no longer holds the lease.
    #[error("{0}")]
    Conflict(String),

    /// The store failed; the operation can be retried by the caller.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

impl QueueError {
    pub fn validation(msg: impl Into<String>) -> Self {
        QueueError::Validation(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        QueueError::Conflict(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            QueueError::validation("limit must be between 1 and 10").to_string(),
            "limit must be between 1 and 10"
        );
        assert_eq!(QueueError::NotFound(7).to_string(), "job 7 not found");
        assert_eq!(
            QueueError::conflict("job 7 is completed").to_string(),
            "job 7 is completed"
        );
    }
}

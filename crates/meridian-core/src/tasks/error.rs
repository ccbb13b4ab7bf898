//! Error taxonomy for investigation tasks.
//!
//! None of these escape a task: each is turned into an `error` Finding at
//! the task boundary.

use meridian_state::StoreError;

use crate::reasoning::ReasoningError;

#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("data store unavailable: {0}")]
    DataStoreUnavailable(#[from] StoreError),

    #[error("reasoning engine unavailable after {attempts} attempt(s): {source}")]
    ReasoningUnavailable {
        attempts: u32,
        #[source]
        source: ReasoningError,
    },

    #[error("reasoning response malformed: {0}")]
    ReasoningMalformed(String),

    #[error("task panicked: {0}")]
    TaskInternal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_cause() {
        let err = TaskError::ReasoningUnavailable {
            attempts: 4,
            source: ReasoningError::RateLimited { retry_after: None },
        };
        assert_eq!(
            err.to_string(),
            "reasoning engine unavailable after 4 attempt(s): rate limited by reasoning engine"
        );

        let err: TaskError = StoreError::Connection("refused".into()).into();
        assert_eq!(
            err.to_string(),
            "data store unavailable: Database connection failed: refused"
        );
    }
}

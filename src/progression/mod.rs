//! The progression core: reward calculation, the level progress ledger and
//! the engine facade that ties the transactional chain together.

pub mod engine;
pub mod ledger;
pub mod rewards;

use thiserror::Error;

use crate::storage::DatabaseError;

pub use engine::{
    CompletionOutcome, IslandStatus, ProgressionEngine, TopicStatus, UserProgressReport,
    WorldStats,
};
pub use ledger::{AttemptOutcome, LevelProgress, ProgressStore, Submission};

/// Progression errors surfaced to the route layer.
#[derive(Debug, Error)]
pub enum ProgressionError {
    /// Business rejection, not a fault: the score is under the passing
    /// threshold. The attempt counter still advances on an existing row.
    #[error("Score {score} is below the required {required_score}")]
    ScoreTooLow { score: u32, required_score: u32 },

    #[error("Not found: {0}")]
    NotFound(String),

    /// A concurrent duplicate-key race lost by this transaction. The caller
    /// should retry the read-modify-write, not surface this to the player.
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// The transaction could not begin or commit. Fully retryable; no
    /// partial state was persisted.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl From<DatabaseError> for ProgressionError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound(msg) => ProgressionError::NotFound(msg),
            DatabaseError::ConstraintViolation(msg) => ProgressionError::ConstraintViolation(msg),
            DatabaseError::ConnectionFailed(msg) | DatabaseError::TransactionFailed(msg) => {
                ProgressionError::StoreUnavailable(msg)
            }
            other => ProgressionError::StoreUnavailable(other.to_string()),
        }
    }
}

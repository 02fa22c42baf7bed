//! StemQuest - Progression, Unlock, and Ranking Engine
//!
//! The transactional core of a children's STEM learning game backend.
//! Turns level-completion submissions into durable, monotonic progress and
//! reward deltas, cascades topic/island/world aggregates, evaluates
//! achievements, and maintains global and weekly rankings.

pub mod achievements;
pub mod content;
pub mod leaderboards;
pub mod mastery;
pub mod progression;
pub mod storage;
pub mod users;

// Re-export commonly used types
pub use leaderboards::RankingStore;
pub use progression::{ProgressionEngine, ProgressionError, Submission};
pub use storage::config::EngineConfig;
pub use storage::Database;
pub use users::User;

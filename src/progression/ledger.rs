//! Level progress ledger: best-attempt-wins bookkeeping per (user, level).
//!
//! Every mutation here runs inside the caller's transaction; the uniqueness
//! constraint on (user_id, world_id, level_id) plus SQLite's write locking
//! make concurrent submissions for the same key serialize, so the second
//! writer always observes the first writer's committed row before the
//! comparison rule is applied.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::content::{Level, WORLD_LEVEL_COUNT};
use crate::progression::rewards::{coins_for, stars_for_score, PASSING_SCORE};
use crate::progression::ProgressionError;
use crate::storage::database::DatabaseError;
use crate::users::{User, UserStore};

/// A level-completion submission as received from the route layer.
#[derive(Debug, Clone, Copy)]
pub struct Submission {
    pub score: u32,
    pub time_spent_seconds: u32,
    pub hints_used: u32,
}

/// One ledger row per (user, world, level). Stars and score only move
/// upward; attempts only increase; the row is never deleted.
#[derive(Debug, Clone)]
pub struct LevelProgress {
    /// Rowid; doubles as authoritative insertion order for history queries.
    pub id: i64,
    pub user_id: Uuid,
    pub world_id: u32,
    pub level_id: u32,
    pub topic_id: Option<Uuid>,
    pub level_number: Option<u32>,
    pub stars: u32,
    pub score: u32,
    pub attempts: u32,
    pub time_spent_seconds: u32,
    pub hints_used: u32,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub coins_earned: u32,
    pub xp_earned: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of recording an attempt.
#[derive(Debug, Clone, Copy)]
pub struct AttemptOutcome {
    /// Stars on the ledger row after this call.
    pub stars: u32,
    /// Coins reported for this call, never negative. A strictly better
    /// attempt that used more hints debits the balance by the signed
    /// delta, but the debit never shows here.
    pub coins_earned: u32,
    /// XP credited by this call (first completion only).
    pub xp_earned: u32,
    pub previous_stars: u32,
    pub is_new_completion: bool,
}

/// Ledger row access, borrowing a connection so it works inside and outside
/// a transaction.
pub struct ProgressStore<'a> {
    conn: &'a Connection,
}

impl<'a> ProgressStore<'a> {
    /// Create a new progress store with the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Get the ledger row for a (user, world, level) key.
    pub fn get(
        &self,
        user_id: &Uuid,
        world_id: u32,
        level_id: u32,
    ) -> Result<Option<LevelProgress>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, user_id, world_id, level_id, topic_id, level_number, stars,
                 score, attempts, time_spent_seconds, hints_used, completed, completed_at,
                 coins_earned, xp_earned, created_at, updated_at
                 FROM level_progress WHERE user_id = ?1 AND world_id = ?2 AND level_id = ?3",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut rows = stmt
            .query(params![user_id.to_string(), world_id, level_id])
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if let Some(row) = rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
        {
            Ok(Some(self.row_to_progress(row)?))
        } else {
            Ok(None)
        }
    }

    /// All ledger rows for a user in insertion order.
    pub fn list_for_user(&self, user_id: &Uuid) -> Result<Vec<LevelProgress>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, user_id, world_id, level_id, topic_id, level_number, stars,
                 score, attempts, time_spent_seconds, hints_used, completed, completed_at,
                 coins_earned, xp_earned, created_at, updated_at
                 FROM level_progress WHERE user_id = ?1 ORDER BY id ASC",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut rows = stmt
            .query(params![user_id.to_string()])
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
        {
            out.push(self.row_to_progress(row)?);
        }
        Ok(out)
    }

    /// Completed ledger rows for a (user, topic), the aggregator's input.
    pub fn list_completed_for_topic(
        &self,
        user_id: &Uuid,
        topic_id: &Uuid,
    ) -> Result<Vec<LevelProgress>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, user_id, world_id, level_id, topic_id, level_number, stars,
                 score, attempts, time_spent_seconds, hints_used, completed, completed_at,
                 coins_earned, xp_earned, created_at, updated_at
                 FROM level_progress
                 WHERE user_id = ?1 AND topic_id = ?2 AND completed = 1
                 ORDER BY level_number ASC",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut rows = stmt
            .query(params![user_id.to_string(), topic_id.to_string()])
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
        {
            out.push(self.row_to_progress(row)?);
        }
        Ok(out)
    }

    fn insert(&self, progress: &LevelProgress) -> Result<i64, DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO level_progress (user_id, world_id, level_id, topic_id,
                 level_number, stars, score, attempts, time_spent_seconds, hints_used,
                 completed, completed_at, coins_earned, xp_earned, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
                params![
                    progress.user_id.to_string(),
                    progress.world_id,
                    progress.level_id,
                    progress.topic_id.map(|id| id.to_string()),
                    progress.level_number,
                    progress.stars,
                    progress.score,
                    progress.attempts,
                    progress.time_spent_seconds,
                    progress.hints_used,
                    progress.completed,
                    progress.completed_at.map(|dt| dt.to_rfc3339()),
                    progress.coins_earned,
                    progress.xp_earned,
                    progress.created_at.to_rfc3339(),
                    progress.updated_at.to_rfc3339(),
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(self.conn.last_insert_rowid())
    }

    fn update(&self, progress: &LevelProgress) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "UPDATE level_progress SET stars = ?2, score = ?3, attempts = ?4,
                 time_spent_seconds = ?5, hints_used = ?6, completed = ?7,
                 completed_at = ?8, coins_earned = ?9, updated_at = ?10
                 WHERE id = ?1",
                params![
                    progress.id,
                    progress.stars,
                    progress.score,
                    progress.attempts,
                    progress.time_spent_seconds,
                    progress.hints_used,
                    progress.completed,
                    progress.completed_at.map(|dt| dt.to_rfc3339()),
                    progress.coins_earned,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(())
    }

    /// Advance only the attempt counter (failed-attempt path).
    fn bump_attempts(&self, progress_id: i64) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "UPDATE level_progress SET attempts = attempts + 1, updated_at = ?2
                 WHERE id = ?1",
                params![progress_id, Utc::now().to_rfc3339()],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(())
    }

    fn row_to_progress(&self, row: &rusqlite::Row<'_>) -> Result<LevelProgress, DatabaseError> {
        let user_id_str: String = row
            .get(1)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let topic_id_str: Option<String> = row
            .get(4)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let completed_str: Option<String> = row
            .get(12)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let created_str: String = row
            .get(15)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let updated_str: String = row
            .get(16)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(LevelProgress {
            id: row
                .get(0)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            user_id: Uuid::parse_str(&user_id_str)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            world_id: row
                .get(2)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            level_id: row
                .get(3)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            topic_id: topic_id_str
                .map(|s| {
                    Uuid::parse_str(&s).map_err(|e| DatabaseError::QueryFailed(e.to_string()))
                })
                .transpose()?,
            level_number: row
                .get(5)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            stars: row
                .get(6)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            score: row
                .get(7)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            attempts: row
                .get(8)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            time_spent_seconds: row
                .get(9)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            hints_used: row
                .get(10)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            completed: row
                .get(11)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            completed_at: completed_str
                .map(|s| {
                    DateTime::parse_from_rfc3339(&s)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
                })
                .transpose()?,
            coins_earned: row
                .get(13)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            xp_earned: row
                .get(14)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            created_at: DateTime::parse_from_rfc3339(&created_str)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
                .with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339(&updated_str)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
                .with_timezone(&Utc),
        })
    }
}

/// Record an attempt inside the caller's transaction.
///
/// Mutates the in-memory `user` counters and persists them; a rollback of
/// the surrounding transaction discards both, so the caller must reload the
/// user on error.
pub fn record_attempt(
    conn: &Connection,
    user: &mut User,
    world_id: u32,
    level_id: u32,
    level: Option<&Level>,
    submission: &Submission,
) -> Result<AttemptOutcome, ProgressionError> {
    let stars = stars_for_score(submission.score);
    let coins = coins_for(stars, submission.hints_used);

    let store = ProgressStore::new(conn);
    let existing = store.get(&user.id, world_id, level_id)?;

    if stars == 0 {
        // Failed attempt: count it on an existing row, but never create a
        // row or touch rewards for a failed first try.
        if let Some(row) = &existing {
            store.bump_attempts(row.id)?;
        }
        return Err(ProgressionError::ScoreTooLow {
            score: submission.score,
            required_score: PASSING_SCORE,
        });
    }

    let user_store = UserStore::new(conn);
    let now = Utc::now();

    match existing {
        Some(mut row) => {
            let previous_stars = row.stars;
            let improved =
                stars > row.stars || (stars == row.stars && submission.score > row.score);

            row.attempts += 1;
            row.time_spent_seconds += submission.time_spent_seconds;
            row.hints_used += submission.hints_used;

            if improved {
                let coin_delta = coins as i64 - row.coins_earned as i64;
                let star_delta = stars - row.stars;

                row.stars = stars;
                row.score = submission.score;
                row.completed = true;
                row.completed_at = Some(now);
                row.coins_earned = coins;
                store.update(&row)?;

                user.coins = (user.coins as i64 + coin_delta).max(0) as u32;
                user.total_stars += star_delta;
                user.weekly_stars += star_delta;
                user_store.update_counters(user)?;

                Ok(AttemptOutcome {
                    stars,
                    coins_earned: coin_delta.max(0) as u32,
                    xp_earned: 0,
                    previous_stars,
                    is_new_completion: false,
                })
            } else {
                store.update(&row)?;
                Ok(AttemptOutcome {
                    stars: row.stars,
                    coins_earned: 0,
                    xp_earned: 0,
                    previous_stars,
                    is_new_completion: false,
                })
            }
        }
        None => {
            // XP is static per level and credited exactly once, at first
            // completion; legacy content without an island mapping earns none.
            let xp = level.map(|l| l.xp_reward).unwrap_or(0);

            let row = LevelProgress {
                id: 0,
                user_id: user.id,
                world_id,
                level_id,
                topic_id: level.map(|l| l.topic_id),
                level_number: level.map(|l| l.level_number),
                stars,
                score: submission.score,
                attempts: 1,
                time_spent_seconds: submission.time_spent_seconds,
                hints_used: submission.hints_used,
                completed: true,
                completed_at: Some(now),
                coins_earned: coins,
                xp_earned: xp,
                created_at: now,
                updated_at: now,
            };
            store.insert(&row)?;

            user.coins += coins;
            user.total_stars += stars;
            user.weekly_stars += stars;
            user.total_xp += xp;
            advance_pointer(user, world_id, level_id);
            user_store.update_counters(user)?;

            Ok(AttemptOutcome {
                stars,
                coins_earned: coins,
                xp_earned: xp,
                previous_stars: 0,
                is_new_completion: true,
            })
        }
    }
}

/// Move the (world, level) resume pointer forward, never backward.
fn advance_pointer(user: &mut User, world_id: u32, level_id: u32) {
    let next_level = (level_id + 1).min(WORLD_LEVEL_COUNT);
    if (world_id, next_level) > (user.current_world, user.current_level) {
        user.current_world = world_id;
        user.current_level = next_level;
    }
}

//! Mastery rollups: per-topic and per-island aggregates derived from the
//! level progress ledger, plus the unlock rules that read them.

pub mod rollup;
pub mod unlocks;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::storage::database::DatabaseError;

pub use rollup::{update_rollups, RollupOutcome};
pub use unlocks::{is_island_unlocked, is_topic_unlocked};

/// Average star rating a fully completed rollup needs to rate green (and,
/// for a topic, to earn its badge).
pub const MASTERY_AVERAGE_THRESHOLD: f64 = 2.5;

/// Traffic-light mastery rating for a topic or island.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasteryColor {
    Red,
    Yellow,
    Green,
}

impl MasteryColor {
    pub fn as_str(&self) -> &'static str {
        match self {
            MasteryColor::Red => "red",
            MasteryColor::Yellow => "yellow",
            MasteryColor::Green => "green",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "red" => Some(MasteryColor::Red),
            "yellow" => Some(MasteryColor::Yellow),
            "green" => Some(MasteryColor::Green),
            _ => None,
        }
    }

    /// Rating for a rollup. Green needs full completion at a strong
    /// average; a completed-but-weaker or half-done rollup rates yellow;
    /// anything thinner rates red.
    pub fn rate(levels_completed: u32, total_levels: u32, average_stars: f64) -> Self {
        if total_levels == 0 {
            MasteryColor::Red
        } else if levels_completed >= total_levels {
            if average_stars >= MASTERY_AVERAGE_THRESHOLD {
                MasteryColor::Green
            } else {
                MasteryColor::Yellow
            }
        } else if levels_completed * 2 >= total_levels {
            MasteryColor::Yellow
        } else {
            MasteryColor::Red
        }
    }
}

/// A derived aggregate row. `topic_id` is `Some` for a topic rollup and
/// `None` for the island summary row.
#[derive(Debug, Clone)]
pub struct Rollup {
    pub id: i64,
    pub user_id: Uuid,
    pub island_id: Uuid,
    pub topic_id: Option<Uuid>,
    pub total_xp: u32,
    pub levels_completed: u32,
    pub total_levels: u32,
    pub average_stars: f64,
    pub mastery_color: MasteryColor,
    pub topic_badge_earned: bool,
    pub badge_earned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rollup {
    /// Whether every level the aggregate covers has been completed.
    pub fn is_complete(&self) -> bool {
        self.total_levels > 0 && self.levels_completed >= self.total_levels
    }
}

/// Rollup row access, borrowing a connection so it works inside and outside
/// a transaction.
pub struct RollupStore<'a> {
    conn: &'a Connection,
}

impl<'a> RollupStore<'a> {
    /// Create a new rollup store with the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Get the rollup for a (user, island, topic) key. Pass `None` for the
    /// island summary row.
    pub fn get(
        &self,
        user_id: &Uuid,
        island_id: &Uuid,
        topic_id: Option<&Uuid>,
    ) -> Result<Option<Rollup>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, user_id, island_id, topic_id, total_xp, levels_completed,
                 total_levels, average_stars, mastery_color, topic_badge_earned,
                 badge_earned_at, created_at, updated_at
                 FROM user_island_progress
                 WHERE user_id = ?1 AND island_id = ?2
                   AND COALESCE(topic_id, '') = COALESCE(?3, '')",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut rows = stmt
            .query(params![
                user_id.to_string(),
                island_id.to_string(),
                topic_id.map(|id| id.to_string()),
            ])
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if let Some(row) = rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
        {
            Ok(Some(self.row_to_rollup(row)?))
        } else {
            Ok(None)
        }
    }

    /// List the topic rollups of an island for a user (summary row excluded).
    pub fn list_topic_rollups(
        &self,
        user_id: &Uuid,
        island_id: &Uuid,
    ) -> Result<Vec<Rollup>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, user_id, island_id, topic_id, total_xp, levels_completed,
                 total_levels, average_stars, mastery_color, topic_badge_earned,
                 badge_earned_at, created_at, updated_at
                 FROM user_island_progress
                 WHERE user_id = ?1 AND island_id = ?2 AND topic_id IS NOT NULL",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut rows = stmt
            .query(params![user_id.to_string(), island_id.to_string()])
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
        {
            out.push(self.row_to_rollup(row)?);
        }
        Ok(out)
    }

    /// Insert or update the rollup for its (user, island, topic) key.
    ///
    /// The badge flag is one-way: once earned it survives every later
    /// recompute, even one that lowers the average.
    pub fn upsert(&self, rollup: &Rollup) -> Result<(), DatabaseError> {
        let now = Utc::now().to_rfc3339();
        let updated = self
            .conn
            .execute(
                "UPDATE user_island_progress SET total_xp = ?4, levels_completed = ?5,
                 total_levels = ?6, average_stars = ?7, mastery_color = ?8,
                 topic_badge_earned = MAX(topic_badge_earned, ?9),
                 badge_earned_at = COALESCE(badge_earned_at, ?10),
                 updated_at = ?11
                 WHERE user_id = ?1 AND island_id = ?2
                   AND COALESCE(topic_id, '') = COALESCE(?3, '')",
                params![
                    rollup.user_id.to_string(),
                    rollup.island_id.to_string(),
                    rollup.topic_id.map(|id| id.to_string()),
                    rollup.total_xp,
                    rollup.levels_completed,
                    rollup.total_levels,
                    rollup.average_stars,
                    rollup.mastery_color.as_str(),
                    rollup.topic_badge_earned,
                    rollup
                        .topic_badge_earned
                        .then(|| rollup.badge_earned_at.unwrap_or_else(Utc::now).to_rfc3339()),
                    now,
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;

        if updated == 0 {
            self.conn
                .execute(
                    "INSERT INTO user_island_progress (user_id, island_id, topic_id,
                     total_xp, levels_completed, total_levels, average_stars,
                     mastery_color, topic_badge_earned, badge_earned_at,
                     created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
                    params![
                        rollup.user_id.to_string(),
                        rollup.island_id.to_string(),
                        rollup.topic_id.map(|id| id.to_string()),
                        rollup.total_xp,
                        rollup.levels_completed,
                        rollup.total_levels,
                        rollup.average_stars,
                        rollup.mastery_color.as_str(),
                        rollup.topic_badge_earned,
                        rollup
                            .topic_badge_earned
                            .then(|| {
                                rollup.badge_earned_at.unwrap_or_else(Utc::now).to_rfc3339()
                            }),
                        now,
                    ],
                )
                .map_err(DatabaseError::from_sqlite)?;
        }
        Ok(())
    }

    fn row_to_rollup(&self, row: &rusqlite::Row<'_>) -> Result<Rollup, DatabaseError> {
        let user_id_str: String = row
            .get(1)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let island_id_str: String = row
            .get(2)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let topic_id_str: Option<String> = row
            .get(3)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let color_str: String = row
            .get(8)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let badge_at_str: Option<String> = row
            .get(10)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let created_str: String = row
            .get(11)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let updated_str: String = row
            .get(12)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(Rollup {
            id: row
                .get(0)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            user_id: Uuid::parse_str(&user_id_str)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            island_id: Uuid::parse_str(&island_id_str)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            topic_id: topic_id_str
                .map(|s| {
                    Uuid::parse_str(&s).map_err(|e| DatabaseError::QueryFailed(e.to_string()))
                })
                .transpose()?,
            total_xp: row
                .get(4)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            levels_completed: row
                .get(5)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            total_levels: row
                .get(6)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            average_stars: row
                .get(7)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            mastery_color: MasteryColor::from_str(&color_str).unwrap_or(MasteryColor::Red),
            topic_badge_earned: row
                .get(9)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            badge_earned_at: badge_at_str
                .map(|s| {
                    DateTime::parse_from_rfc3339(&s)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
                })
                .transpose()?,
            created_at: DateTime::parse_from_rfc3339(&created_str)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
                .with_timezone(&Utc),
            updated_at: DateTime::parse_from_rfc3339(&updated_str)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
                .with_timezone(&Utc),
        })
    }
}

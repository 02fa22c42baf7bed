//! Achievement catalog and unlock records.

pub mod definitions;
pub mod evaluator;

use chrono::Utc;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

use crate::storage::database::DatabaseError;

pub use evaluator::evaluate_achievements;

/// Typed unlock criteria, stored in the `requirement_json` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Requirement {
    /// The most recent `count` completions all earned 3 stars.
    ConsecutivePerfect { count: u32 },
    /// Some level was completed after at least `attempts` tries.
    RetrySuccess { attempts: u32 },
    /// Every level of the world earned 3 stars.
    WorldPerfect { world_id: u32 },
    /// Daily login streak of at least `days`.
    LoginStreak { days: u32 },
    /// Lifetime star total of at least `total_stars` (the full-game cap).
    AllWorldsPerfect { total_stars: u32 },
    /// At least `count` levels completed without using a hint.
    NoHints { count: u32 },
    /// Lifetime star total of at least `count`.
    TotalStars { count: u32 },
    /// At least `count` stars earned since the last weekly reset.
    WeeklyStars { count: u32 },
    /// Some level beaten on the first try in `max_seconds` or less.
    SpeedRun { max_seconds: u32 },
}

/// A catalog entry.
#[derive(Debug, Clone)]
pub struct Achievement {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub coin_reward: u32,
    pub requirement: Requirement,
    pub is_active: bool,
}

/// Catalog and unlock-record access, borrowing a connection so it works
/// inside and outside a transaction.
pub struct AchievementStore<'a> {
    conn: &'a Connection,
}

impl<'a> AchievementStore<'a> {
    /// Create a new achievement store with the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Seed the catalog. Entries already present (by code) are left alone,
    /// so re-seeding on startup is safe.
    pub fn seed(&self, catalog: &[Achievement]) -> Result<(), DatabaseError> {
        for achievement in catalog {
            let requirement_json = serde_json::to_string(&achievement.requirement)
                .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO achievements (id, code, name, description,
                     category, coin_reward, requirement_json, is_active)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        achievement.id.to_string(),
                        achievement.code,
                        achievement.name,
                        achievement.description,
                        achievement.category,
                        achievement.coin_reward,
                        requirement_json,
                        achievement.is_active,
                    ],
                )
                .map_err(DatabaseError::from_sqlite)?;
        }
        Ok(())
    }

    /// List the active catalog entries.
    pub fn list_active(&self) -> Result<Vec<Achievement>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, code, name, description, category, coin_reward,
                 requirement_json, is_active
                 FROM achievements WHERE is_active = 1",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut rows = stmt
            .query([])
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
        {
            out.push(self.row_to_achievement(row)?);
        }
        Ok(out)
    }

    /// IDs of the achievements a user has already unlocked.
    pub fn unlocked_ids(&self, user_id: &Uuid) -> Result<HashSet<Uuid>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare("SELECT achievement_id FROM user_achievements WHERE user_id = ?1")
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut rows = stmt
            .query(params![user_id.to_string()])
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut out = HashSet::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
        {
            let id_str: String = row
                .get(0)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
            out.insert(
                Uuid::parse_str(&id_str)
                    .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            );
        }
        Ok(out)
    }

    /// Record an unlock. Returns false when the row already existed, so a
    /// concurrent evaluator that lost the race pays no reward.
    pub fn try_unlock(
        &self,
        user_id: &Uuid,
        achievement_id: &Uuid,
    ) -> Result<bool, DatabaseError> {
        let inserted = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO user_achievements (user_id, achievement_id, unlocked_at)
                 VALUES (?1, ?2, ?3)",
                params![
                    user_id.to_string(),
                    achievement_id.to_string(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(inserted > 0)
    }

    fn row_to_achievement(&self, row: &rusqlite::Row<'_>) -> Result<Achievement, DatabaseError> {
        let id_str: String = row
            .get(0)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let requirement_json: String = row
            .get(6)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(Achievement {
            id: Uuid::parse_str(&id_str)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            code: row
                .get(1)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            name: row
                .get(2)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            description: row
                .get(3)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            category: row
                .get(4)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            coin_reward: row
                .get(5)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            requirement: serde_json::from_str(&requirement_json)
                .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?,
            is_active: row
                .get(7)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use crate::users::{User, UserStore};

    #[test]
    fn test_requirement_json_roundtrip() {
        let req = Requirement::ConsecutivePerfect { count: 5 };
        let json = serde_json::to_string(&req).expect("Failed to serialize");
        assert!(json.contains("consecutive_perfect"));
        let back: Requirement = serde_json::from_str(&json).expect("Failed to deserialize");
        assert_eq!(back, req);
    }

    #[test]
    fn test_seed_is_idempotent() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let store = AchievementStore::new(db.connection());

        let catalog = definitions::default_catalog();
        store.seed(&catalog).expect("Failed to seed");
        store.seed(&catalog).expect("Failed to re-seed");

        let active = store.list_active().expect("Failed to list");
        assert_eq!(active.len(), catalog.len());
    }

    #[test]
    fn test_try_unlock_guards_double_unlock() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let store = AchievementStore::new(db.connection());
        let catalog = definitions::default_catalog();
        store.seed(&catalog).expect("Failed to seed");

        let user = User::new("tester");
        UserStore::new(db.connection())
            .insert_user(&user)
            .expect("Failed to insert user");

        let achievement_id = catalog[0].id;
        assert!(store
            .try_unlock(&user.id, &achievement_id)
            .expect("Failed to unlock"));
        assert!(!store
            .try_unlock(&user.id, &achievement_id)
            .expect("Failed to unlock"));
        assert!(store
            .unlocked_ids(&user.id)
            .expect("Failed to list unlocks")
            .contains(&achievement_id));
    }
}

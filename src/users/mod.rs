//! User records and the counters the engine owns.
//!
//! Accounts are created externally; the engine never deletes them and only
//! mutates the reward counters and progression pointers.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::database::DatabaseError;

/// Account role. Teachers and parents review content freely, so they bypass
/// every unlock gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    #[default]
    Student,
    Teacher,
    Parent,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Student => "student",
            UserRole::Teacher => "teacher",
            UserRole::Parent => "parent",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "student" => Some(UserRole::Student),
            "teacher" => Some(UserRole::Teacher),
            "parent" => Some(UserRole::Parent),
            _ => None,
        }
    }

    /// Whether this role bypasses unlock gating.
    pub fn has_unrestricted_access(&self) -> bool {
        matches!(self, UserRole::Teacher | UserRole::Parent)
    }
}

/// A player account with the engine-owned counters.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub coins: u32,
    pub total_stars: u32,
    pub total_xp: u32,
    pub weekly_stars: u32,
    pub weekly_stars_reset_at: Option<DateTime<Utc>>,
    pub current_world: u32,
    pub current_level: u32,
    pub login_streak: u32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new student account record.
    pub fn new(username: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            role: UserRole::Student,
            coins: 0,
            total_stars: 0,
            total_xp: 0,
            weekly_stars: 0,
            weekly_stars_reset_at: None,
            current_world: 1,
            current_level: 1,
            login_streak: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this user bypasses unlock gating.
    pub fn has_unrestricted_access(&self) -> bool {
        self.role.has_unrestricted_access()
    }
}

/// User row access, borrowing a connection so it works inside and outside a
/// transaction.
pub struct UserStore<'a> {
    conn: &'a Connection,
}

impl<'a> UserStore<'a> {
    /// Create a new user store with the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a new user (account-creation collaborator interface).
    pub fn insert_user(&self, user: &User) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO users (id, username, role, coins, total_stars, total_xp,
                 weekly_stars, weekly_stars_reset_at, current_world, current_level,
                 login_streak, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    user.id.to_string(),
                    user.username,
                    user.role.as_str(),
                    user.coins,
                    user.total_stars,
                    user.total_xp,
                    user.weekly_stars,
                    user.weekly_stars_reset_at.map(|dt| dt.to_rfc3339()),
                    user.current_world,
                    user.current_level,
                    user.login_streak,
                    user.is_active,
                    user.created_at.to_rfc3339(),
                    user.updated_at.to_rfc3339(),
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(())
    }

    /// Get a user by ID.
    pub fn get_user(&self, user_id: &Uuid) -> Result<Option<User>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, username, role, coins, total_stars, total_xp, weekly_stars,
                 weekly_stars_reset_at, current_world, current_level, login_streak,
                 is_active, created_at, updated_at
                 FROM users WHERE id = ?1",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut rows = stmt
            .query(params![user_id.to_string()])
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if let Some(row) = rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
        {
            Ok(Some(self.row_to_user(row)?))
        } else {
            Ok(None)
        }
    }

    /// Persist the engine-owned counters and pointers after a ledger write.
    pub fn update_counters(&self, user: &User) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "UPDATE users SET coins = ?2, total_stars = ?3, total_xp = ?4,
                 weekly_stars = ?5, current_world = ?6, current_level = ?7,
                 updated_at = ?8
                 WHERE id = ?1",
                params![
                    user.id.to_string(),
                    user.coins,
                    user.total_stars,
                    user.total_xp,
                    user.weekly_stars,
                    user.current_world,
                    user.current_level,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(())
    }

    /// Credit coins atomically (achievement payouts).
    pub fn credit_coins(&self, user_id: &Uuid, amount: u32) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "UPDATE users SET coins = coins + ?2, updated_at = ?3 WHERE id = ?1",
                params![user_id.to_string(), amount, Utc::now().to_rfc3339()],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(())
    }

    /// Advance the world pointer, monotonically and capped.
    pub fn advance_world(&self, user_id: &Uuid, world: u32) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "UPDATE users SET current_world = ?2, updated_at = ?3
                 WHERE id = ?1 AND current_world < ?2",
                params![user_id.to_string(), world, Utc::now().to_rfc3339()],
            )
            .map_err(DatabaseError::from_sqlite)?;
        Ok(())
    }

    /// Zero every user's weekly star counter (scheduled weekly reset).
    /// Returns the number of affected rows.
    pub fn reset_weekly_stars(&self) -> Result<usize, DatabaseError> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE users SET weekly_stars = 0, weekly_stars_reset_at = ?1, updated_at = ?1
                 WHERE weekly_stars > 0",
                params![now],
            )
            .map_err(DatabaseError::from_sqlite)
    }

    /// List every active user (ranking rebuild on startup).
    pub fn list_active_users(&self) -> Result<Vec<User>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, username, role, coins, total_stars, total_xp, weekly_stars,
                 weekly_stars_reset_at, current_world, current_level, login_streak,
                 is_active, created_at, updated_at
                 FROM users WHERE is_active = 1",
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
            out.push(self.row_to_user(row)?);
        }
        Ok(out)
    }

    /// Fetch usernames for a set of IDs (leaderboard hydration).
    pub fn usernames(&self, ids: &[Uuid]) -> Result<Vec<(Uuid, String)>, DatabaseError> {
        let mut out = Vec::with_capacity(ids.len());
        let mut stmt = self
            .conn
            .prepare("SELECT username FROM users WHERE id = ?1")
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        for id in ids {
            let result: rusqlite::Result<String> =
                stmt.query_row(params![id.to_string()], |row| row.get(0));
            match result {
                Ok(name) => out.push((*id, name)),
                Err(rusqlite::Error::QueryReturnedNoRows) => {}
                Err(e) => return Err(DatabaseError::QueryFailed(e.to_string())),
            }
        }
        Ok(out)
    }

    fn row_to_user(&self, row: &rusqlite::Row<'_>) -> Result<User, DatabaseError> {
        let id_str: String = row
            .get(0)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let role_str: String = row
            .get(2)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let reset_str: Option<String> = row
            .get(7)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let created_str: String = row
            .get(12)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let updated_str: String = row
            .get(13)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(User {
            id: Uuid::parse_str(&id_str)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            username: row
                .get(1)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            role: UserRole::from_str(&role_str).unwrap_or_default(),
            coins: row
                .get(3)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            total_stars: row
                .get(4)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            total_xp: row
                .get(5)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            weekly_stars: row
                .get(6)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            weekly_stars_reset_at: reset_str
                .map(|s| {
                    DateTime::parse_from_rfc3339(&s)
                        .map(|dt| dt.with_timezone(&Utc))
                        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))
                })
                .transpose()?,
            current_world: row
                .get(8)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            current_level: row
                .get(9)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            login_streak: row
                .get(10)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            is_active: row
                .get(11)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    #[test]
    fn test_user_insert_and_get() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let store = UserStore::new(db.connection());

        let user = User::new("stella");
        store.insert_user(&user).expect("Failed to insert user");

        let loaded = store
            .get_user(&user.id)
            .expect("Failed to get user")
            .expect("User not found");
        assert_eq!(loaded.username, "stella");
        assert_eq!(loaded.role, UserRole::Student);
        assert_eq!(loaded.coins, 0);
        assert_eq!(loaded.current_world, 1);
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let store = UserStore::new(db.connection());

        store
            .insert_user(&User::new("stella"))
            .expect("Failed to insert user");
        let result = store.insert_user(&User::new("stella"));
        assert!(matches!(result, Err(DatabaseError::ConstraintViolation(_))));
    }

    #[test]
    fn test_advance_world_is_monotonic() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let store = UserStore::new(db.connection());

        let user = User::new("milo");
        store.insert_user(&user).expect("Failed to insert user");

        store.advance_world(&user.id, 3).expect("Failed to advance");
        store.advance_world(&user.id, 2).expect("Failed to advance");

        let loaded = store
            .get_user(&user.id)
            .expect("Failed to get user")
            .expect("User not found");
        assert_eq!(loaded.current_world, 3);
    }

    #[test]
    fn test_weekly_reset_zeroes_counters() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let store = UserStore::new(db.connection());

        let mut user = User::new("nia");
        user.weekly_stars = 14;
        store.insert_user(&user).expect("Failed to insert user");

        let affected = store.reset_weekly_stars().expect("Failed to reset");
        assert_eq!(affected, 1);

        let loaded = store
            .get_user(&user.id)
            .expect("Failed to get user")
            .expect("User not found");
        assert_eq!(loaded.weekly_stars, 0);
        assert!(loaded.weekly_stars_reset_at.is_some());
    }

    #[test]
    fn test_unrestricted_access_roles() {
        assert!(!UserRole::Student.has_unrestricted_access());
        assert!(UserRole::Teacher.has_unrestricted_access());
        assert!(UserRole::Parent.has_unrestricted_access());
    }
}

//! Static content descriptors: islands, topics and levels.
//!
//! Content is authored and seeded by an external collaborator; the engine
//! only reads it. The insert operations below exist as the seeding interface
//! (and for test fixtures) and are never called from the submission path.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::database::DatabaseError;

/// Number of worlds in the game.
pub const WORLD_COUNT: u32 = 4;

/// Levels per world in the legacy numeric scheme.
pub const WORLD_LEVEL_COUNT: u32 = 20;

/// Requirements for unlocking an island.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockRequirements {
    /// Code of the island that must be progressed first
    pub previous_island: String,
    /// Minimum stars earned on the previous island
    pub min_stars: u32,
}

/// A themed collection of topics within a world.
#[derive(Debug, Clone)]
pub struct Island {
    pub id: Uuid,
    pub code: String,
    pub world_id: u32,
    pub name: String,
    pub order_index: u32,
    pub unlock_requirements: Option<UnlockRequirements>,
    pub is_active: bool,
}

/// An ordered collection of levels within an island.
#[derive(Debug, Clone)]
pub struct Topic {
    pub id: Uuid,
    pub island_id: Uuid,
    pub code: String,
    pub name: String,
    pub order_index: u32,
    pub difficulty: String,
    pub level_count: u32,
}

/// The atomic completable unit.
///
/// `world_level` is the legacy numeric position a submission addresses;
/// `level_number` orders the level inside its topic. `coins_reward` is
/// authoring metadata carried for content parity; actual coin payouts
/// come from the score-based reward calculator.
#[derive(Debug, Clone)]
pub struct Level {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub level_number: u32,
    pub world_id: u32,
    pub world_level: u32,
    pub name: String,
    pub xp_reward: u32,
    pub coins_reward: u32,
}

/// Read/seed access to static content, borrowing a connection so it works
/// inside and outside a transaction.
pub struct ContentStore<'a> {
    conn: &'a Connection,
}

impl<'a> ContentStore<'a> {
    /// Create a new content store with the given connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert an island (seeding interface).
    pub fn insert_island(&self, island: &Island) -> Result<(), DatabaseError> {
        let requirements_json = island
            .unlock_requirements
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DatabaseError::SerializationError(e.to_string()))?;

        self.conn
            .execute(
                "INSERT INTO islands (id, code, world_id, name, order_index,
                 unlock_requirements_json, is_active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    island.id.to_string(),
                    island.code,
                    island.world_id,
                    island.name,
                    island.order_index,
                    requirements_json,
                    island.is_active,
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;

        Ok(())
    }

    /// Insert a topic (seeding interface).
    pub fn insert_topic(&self, topic: &Topic) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO topics (id, island_id, code, name, order_index, difficulty, level_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    topic.id.to_string(),
                    topic.island_id.to_string(),
                    topic.code,
                    topic.name,
                    topic.order_index,
                    topic.difficulty,
                    topic.level_count,
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;

        Ok(())
    }

    /// Insert a level (seeding interface).
    pub fn insert_level(&self, level: &Level) -> Result<(), DatabaseError> {
        self.conn
            .execute(
                "INSERT INTO levels (id, topic_id, level_number, world_id, world_level,
                 name, xp_reward, coins_reward)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    level.id.to_string(),
                    level.topic_id.to_string(),
                    level.level_number,
                    level.world_id,
                    level.world_level,
                    level.name,
                    level.xp_reward,
                    level.coins_reward,
                ],
            )
            .map_err(DatabaseError::from_sqlite)?;

        Ok(())
    }

    /// Get an island by ID.
    pub fn get_island(&self, island_id: &Uuid) -> Result<Option<Island>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, code, world_id, name, order_index, unlock_requirements_json, is_active
                 FROM islands WHERE id = ?1",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut rows = stmt
            .query(params![island_id.to_string()])
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if let Some(row) = rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
        {
            Ok(Some(self.row_to_island(row)?))
        } else {
            Ok(None)
        }
    }

    /// Get an island by its code.
    pub fn get_island_by_code(&self, code: &str) -> Result<Option<Island>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, code, world_id, name, order_index, unlock_requirements_json, is_active
                 FROM islands WHERE code = ?1",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut rows = stmt
            .query(params![code])
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if let Some(row) = rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
        {
            Ok(Some(self.row_to_island(row)?))
        } else {
            Ok(None)
        }
    }

    /// List the active islands of a world in display order.
    pub fn list_world_islands(&self, world_id: u32) -> Result<Vec<Island>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, code, world_id, name, order_index, unlock_requirements_json, is_active
                 FROM islands WHERE world_id = ?1 AND is_active = 1
                 ORDER BY order_index ASC",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut rows = stmt
            .query(params![world_id])
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut islands = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
        {
            islands.push(self.row_to_island(row)?);
        }
        Ok(islands)
    }

    /// Get a topic by ID.
    pub fn get_topic(&self, topic_id: &Uuid) -> Result<Option<Topic>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, island_id, code, name, order_index, difficulty, level_count
                 FROM topics WHERE id = ?1",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut rows = stmt
            .query(params![topic_id.to_string()])
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if let Some(row) = rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
        {
            Ok(Some(self.row_to_topic(row)?))
        } else {
            Ok(None)
        }
    }

    /// List the topics of an island in display order.
    pub fn list_island_topics(&self, island_id: &Uuid) -> Result<Vec<Topic>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, island_id, code, name, order_index, difficulty, level_count
                 FROM topics WHERE island_id = ?1
                 ORDER BY order_index ASC",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut rows = stmt
            .query(params![island_id.to_string()])
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut topics = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
        {
            topics.push(self.row_to_topic(row)?);
        }
        Ok(topics)
    }

    /// Resolve the legacy (world, level) position to a level descriptor.
    ///
    /// Returns `None` for legacy-only content that was never mapped onto the
    /// island model; the aggregator is skipped in that case.
    pub fn get_level_by_world_position(
        &self,
        world_id: u32,
        world_level: u32,
    ) -> Result<Option<Level>, DatabaseError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, topic_id, level_number, world_id, world_level, name,
                 xp_reward, coins_reward
                 FROM levels WHERE world_id = ?1 AND world_level = ?2",
            )
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let mut rows = stmt
            .query(params![world_id, world_level])
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        if let Some(row) = rows
            .next()
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?
        {
            Ok(Some(self.row_to_level(row)?))
        } else {
            Ok(None)
        }
    }

    fn row_to_island(&self, row: &rusqlite::Row<'_>) -> Result<Island, DatabaseError> {
        let id_str: String = row
            .get(0)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let requirements_json: Option<String> = row
            .get(5)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        let unlock_requirements = requirements_json
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| DatabaseError::DeserializationError(e.to_string()))?;

        Ok(Island {
            id: Uuid::parse_str(&id_str)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            code: row
                .get(1)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            world_id: row
                .get(2)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            name: row
                .get(3)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            order_index: row
                .get(4)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            unlock_requirements,
            is_active: row
                .get(6)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
        })
    }

    fn row_to_topic(&self, row: &rusqlite::Row<'_>) -> Result<Topic, DatabaseError> {
        let id_str: String = row
            .get(0)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let island_id_str: String = row
            .get(1)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(Topic {
            id: Uuid::parse_str(&id_str)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            island_id: Uuid::parse_str(&island_id_str)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            code: row
                .get(2)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            name: row
                .get(3)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            order_index: row
                .get(4)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            difficulty: row
                .get(5)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            level_count: row
                .get(6)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
        })
    }

    fn row_to_level(&self, row: &rusqlite::Row<'_>) -> Result<Level, DatabaseError> {
        let id_str: String = row
            .get(0)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
        let topic_id_str: String = row
            .get(1)
            .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        Ok(Level {
            id: Uuid::parse_str(&id_str)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            topic_id: Uuid::parse_str(&topic_id_str)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            level_number: row
                .get(2)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            world_id: row
                .get(3)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            world_level: row
                .get(4)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            name: row
                .get(5)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            xp_reward: row
                .get(6)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
            coins_reward: row
                .get(7)
                .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;

    fn sample_island(world_id: u32, code: &str, order_index: u32) -> Island {
        Island {
            id: Uuid::new_v4(),
            code: code.to_string(),
            world_id,
            name: format!("Island {}", code),
            order_index,
            unlock_requirements: None,
            is_active: true,
        }
    }

    #[test]
    fn test_island_roundtrip_with_requirements() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let store = ContentStore::new(db.connection());

        let mut island = sample_island(1, "math-island", 0);
        island.unlock_requirements = Some(UnlockRequirements {
            previous_island: "counting-cove".to_string(),
            min_stars: 12,
        });

        store.insert_island(&island).expect("Failed to insert island");

        let loaded = store
            .get_island(&island.id)
            .expect("Failed to get island")
            .expect("Island not found");
        assert_eq!(loaded.code, "math-island");

        let reqs = loaded.unlock_requirements.expect("Requirements missing");
        assert_eq!(reqs.previous_island, "counting-cove");
        assert_eq!(reqs.min_stars, 12);
    }

    #[test]
    fn test_world_islands_ordered() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let store = ContentStore::new(db.connection());

        store
            .insert_island(&sample_island(1, "second", 1))
            .expect("Failed to insert island");
        store
            .insert_island(&sample_island(1, "first", 0))
            .expect("Failed to insert island");
        store
            .insert_island(&sample_island(2, "other-world", 0))
            .expect("Failed to insert island");

        let islands = store.list_world_islands(1).expect("Failed to list islands");
        assert_eq!(islands.len(), 2);
        assert_eq!(islands[0].code, "first");
        assert_eq!(islands[1].code, "second");
    }

    #[test]
    fn test_level_lookup_by_world_position() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let store = ContentStore::new(db.connection());

        let island = sample_island(1, "math-island", 0);
        store.insert_island(&island).expect("Failed to insert island");

        let topic = Topic {
            id: Uuid::new_v4(),
            island_id: island.id,
            code: "addition".to_string(),
            name: "Addition".to_string(),
            order_index: 0,
            difficulty: "beginner".to_string(),
            level_count: 5,
        };
        store.insert_topic(&topic).expect("Failed to insert topic");

        let level = Level {
            id: Uuid::new_v4(),
            topic_id: topic.id,
            level_number: 1,
            world_id: 1,
            world_level: 1,
            name: "Counting Apples".to_string(),
            xp_reward: 10,
            coins_reward: 5,
        };
        store.insert_level(&level).expect("Failed to insert level");

        let found = store
            .get_level_by_world_position(1, 1)
            .expect("Failed to query level")
            .expect("Level not found");
        assert_eq!(found.topic_id, topic.id);

        let missing = store
            .get_level_by_world_position(1, 2)
            .expect("Failed to query level");
        assert!(missing.is_none());
    }

    #[test]
    fn test_duplicate_world_position_rejected() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let store = ContentStore::new(db.connection());

        let island = sample_island(1, "math-island", 0);
        store.insert_island(&island).expect("Failed to insert island");

        let topic = Topic {
            id: Uuid::new_v4(),
            island_id: island.id,
            code: "addition".to_string(),
            name: "Addition".to_string(),
            order_index: 0,
            difficulty: "beginner".to_string(),
            level_count: 5,
        };
        store.insert_topic(&topic).expect("Failed to insert topic");

        let mut level = Level {
            id: Uuid::new_v4(),
            topic_id: topic.id,
            level_number: 1,
            world_id: 1,
            world_level: 1,
            name: "Counting Apples".to_string(),
            xp_reward: 10,
            coins_reward: 5,
        };
        store.insert_level(&level).expect("Failed to insert level");

        level.id = Uuid::new_v4();
        level.level_number = 2;
        let result = store.insert_level(&level);
        assert!(matches!(result, Err(DatabaseError::ConstraintViolation(_))));
    }
}

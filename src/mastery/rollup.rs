//! The aggregation cascade: topic rollup, island summary, world gate.
//!
//! Runs inside the same transaction as the ledger write, so a reader never
//! observes a completed level without its topic rollup.

use rusqlite::Connection;

use crate::content::{ContentStore, Level, WORLD_COUNT};
use crate::mastery::{MasteryColor, Rollup, RollupStore, MASTERY_AVERAGE_THRESHOLD};
use crate::progression::{ProgressionError, ProgressStore};
use crate::users::{User, UserStore};

/// What the cascade decided for this completion.
#[derive(Debug, Clone)]
pub struct RollupOutcome {
    pub topic: Rollup,
    pub island: Rollup,
    pub island_completed: bool,
    pub world_advanced: bool,
}

/// Recompute the rollups affected by a completion of `level`.
///
/// The topic rollup is recomputed from the completed ledger rows, the island
/// summary from the topic rollups, and the world gate fires when the last
/// island of a world completes. Recomputation is idempotent; replaying the
/// same completion yields the same rows.
pub fn update_rollups(
    conn: &Connection,
    user: &User,
    level: &Level,
) -> Result<RollupOutcome, ProgressionError> {
    let content = ContentStore::new(conn);
    let rollups = RollupStore::new(conn);

    let topic = content
        .get_topic(&level.topic_id)?
        .ok_or_else(|| ProgressionError::NotFound(format!("topic {}", level.topic_id)))?;
    let island = content
        .get_island(&topic.island_id)?
        .ok_or_else(|| ProgressionError::NotFound(format!("island {}", topic.island_id)))?;

    // Topic rollup from the completed ledger rows
    let completed = ProgressStore::new(conn).list_completed_for_topic(&user.id, &topic.id)?;
    let levels_completed = completed.len() as u32;
    let star_sum: u32 = completed.iter().map(|row| row.stars).sum();
    let average_stars = if levels_completed > 0 {
        star_sum as f64 / levels_completed as f64
    } else {
        0.0
    };
    let is_complete = levels_completed >= topic.level_count && topic.level_count > 0;

    rollups.upsert(&Rollup {
        id: 0,
        user_id: user.id,
        island_id: island.id,
        topic_id: Some(topic.id),
        total_xp: completed.iter().map(|row| row.xp_earned).sum(),
        levels_completed,
        total_levels: topic.level_count,
        average_stars,
        mastery_color: MasteryColor::rate(levels_completed, topic.level_count, average_stars),
        topic_badge_earned: is_complete && average_stars >= MASTERY_AVERAGE_THRESHOLD,
        badge_earned_at: None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    })?;

    // Island summary from the topic rollups, star average weighted by how
    // many levels each topic contributes
    let island_topics = content.list_island_topics(&island.id)?;
    let topic_rollups = rollups.list_topic_rollups(&user.id, &island.id)?;

    let island_total: u32 = island_topics.iter().map(|t| t.level_count).sum();
    let island_completed_levels: u32 = topic_rollups.iter().map(|r| r.levels_completed).sum();
    let weighted_sum: f64 = topic_rollups
        .iter()
        .map(|r| r.average_stars * r.levels_completed as f64)
        .sum();
    let island_average = if island_completed_levels > 0 {
        weighted_sum / island_completed_levels as f64
    } else {
        0.0
    };
    let island_completed = !island_topics.is_empty()
        && topic_rollups.len() == island_topics.len()
        && topic_rollups.iter().all(|r| r.is_complete());

    rollups.upsert(&Rollup {
        id: 0,
        user_id: user.id,
        island_id: island.id,
        topic_id: None,
        total_xp: topic_rollups.iter().map(|r| r.total_xp).sum(),
        levels_completed: island_completed_levels,
        total_levels: island_total,
        average_stars: island_average,
        mastery_color: MasteryColor::rate(island_completed_levels, island_total, island_average),
        topic_badge_earned: false,
        badge_earned_at: None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    })?;

    // World gate: the last island completing a world moves the pointer on
    let mut world_advanced = false;
    if island_completed {
        let world_islands = content.list_world_islands(island.world_id)?;
        let mut all_complete = !world_islands.is_empty();
        for candidate in &world_islands {
            let summary = rollups.get(&user.id, &candidate.id, None)?;
            if !summary.map(|s| s.is_complete()).unwrap_or(false) {
                all_complete = false;
                break;
            }
        }
        if all_complete {
            let next_world = (island.world_id + 1).min(WORLD_COUNT);
            world_advanced = next_world > user.current_world;
            UserStore::new(conn).advance_world(&user.id, next_world)?;
        }
    }

    let topic_rollup = rollups
        .get(&user.id, &island.id, Some(&topic.id))?
        .ok_or_else(|| ProgressionError::NotFound(format!("rollup for topic {}", topic.id)))?;
    let island_rollup = rollups
        .get(&user.id, &island.id, None)?
        .ok_or_else(|| ProgressionError::NotFound(format!("rollup for island {}", island.id)))?;

    Ok(RollupOutcome {
        topic: topic_rollup,
        island: island_rollup,
        island_completed,
        world_advanced,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Island, Topic};
    use crate::progression::ledger::{record_attempt, Submission};
    use crate::storage::Database;
    use uuid::Uuid;

    fn seed_island(db: &Database, world_id: u32, level_count: u32) -> (Island, Topic, Vec<Level>) {
        let content = ContentStore::new(db.connection());

        let island = Island {
            id: Uuid::new_v4(),
            code: format!("island-{}", world_id),
            world_id,
            name: "Math Island".to_string(),
            order_index: 0,
            unlock_requirements: None,
            is_active: true,
        };
        content.insert_island(&island).expect("Failed to insert island");

        let topic = Topic {
            id: Uuid::new_v4(),
            island_id: island.id,
            code: format!("topic-{}", world_id),
            name: "Addition".to_string(),
            order_index: 0,
            difficulty: "beginner".to_string(),
            level_count,
        };
        content.insert_topic(&topic).expect("Failed to insert topic");

        let mut levels = Vec::new();
        for n in 1..=level_count {
            let level = Level {
                id: Uuid::new_v4(),
                topic_id: topic.id,
                level_number: n,
                world_id,
                world_level: n,
                name: format!("Level {}", n),
                xp_reward: 10,
                coins_reward: 5,
            };
            content.insert_level(&level).expect("Failed to insert level");
            levels.push(level);
        }
        (island, topic, levels)
    }

    fn complete(db: &Database, user: &mut User, level: &Level, score: u32) {
        let submission = Submission {
            score,
            time_spent_seconds: 60,
            hints_used: 0,
        };
        record_attempt(
            db.connection(),
            user,
            level.world_id,
            level.world_level,
            Some(level),
            &submission,
        )
        .expect("Attempt failed");
    }

    #[test]
    fn test_partial_topic_is_yellow() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let (_island, _topic, levels) = seed_island(&db, 1, 2);

        let mut user = User::new("tester");
        UserStore::new(db.connection())
            .insert_user(&user)
            .expect("Failed to insert user");

        complete(&db, &mut user, &levels[0], 95);
        let outcome =
            update_rollups(db.connection(), &user, &levels[0]).expect("Rollup failed");

        assert_eq!(outcome.topic.levels_completed, 1);
        assert_eq!(outcome.topic.mastery_color, MasteryColor::Yellow);
        assert!(!outcome.topic.topic_badge_earned);
        assert!(!outcome.island_completed);
    }

    #[test]
    fn test_completed_topic_earns_badge_and_advances_world() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let (_island, _topic, levels) = seed_island(&db, 1, 2);

        let mut user = User::new("tester");
        let users = UserStore::new(db.connection());
        users.insert_user(&user).expect("Failed to insert user");

        complete(&db, &mut user, &levels[0], 95);
        update_rollups(db.connection(), &user, &levels[0]).expect("Rollup failed");
        complete(&db, &mut user, &levels[1], 92);
        let outcome =
            update_rollups(db.connection(), &user, &levels[1]).expect("Rollup failed");

        assert_eq!(outcome.topic.mastery_color, MasteryColor::Green);
        assert!(outcome.topic.topic_badge_earned);
        assert!(outcome.topic.badge_earned_at.is_some());
        assert!(outcome.island_completed);
        assert!(outcome.world_advanced);

        let loaded = users
            .get_user(&user.id)
            .expect("Failed to get user")
            .expect("User not found");
        assert_eq!(loaded.current_world, 2);
    }

    #[test]
    fn test_completed_topic_with_low_average_has_no_badge() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let (_island, _topic, levels) = seed_island(&db, 1, 2);

        let mut user = User::new("tester");
        UserStore::new(db.connection())
            .insert_user(&user)
            .expect("Failed to insert user");

        // Two 1-star completions: complete but average 1.0
        complete(&db, &mut user, &levels[0], 55);
        update_rollups(db.connection(), &user, &levels[0]).expect("Rollup failed");
        complete(&db, &mut user, &levels[1], 55);
        let outcome =
            update_rollups(db.connection(), &user, &levels[1]).expect("Rollup failed");

        assert_eq!(outcome.topic.mastery_color, MasteryColor::Yellow);
        assert!(outcome.topic.is_complete());
        assert!(!outcome.topic.topic_badge_earned);
    }

    #[test]
    fn test_world_gate_is_idempotent() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let (_island, _topic, levels) = seed_island(&db, 1, 1);

        let mut user = User::new("tester");
        let users = UserStore::new(db.connection());
        users.insert_user(&user).expect("Failed to insert user");

        complete(&db, &mut user, &levels[0], 95);
        update_rollups(db.connection(), &user, &levels[0]).expect("Rollup failed");
        // Replaying the cascade must not move the pointer again
        let user = users
            .get_user(&user.id)
            .expect("Failed to get user")
            .expect("User not found");
        assert_eq!(user.current_world, 2);

        let outcome =
            update_rollups(db.connection(), &user, &levels[0]).expect("Rollup failed");
        assert!(outcome.island_completed);
        assert!(!outcome.world_advanced);

        let loaded = users
            .get_user(&user.id)
            .expect("Failed to get user")
            .expect("User not found");
        assert_eq!(loaded.current_world, 2);
    }
}

//! Post-commit achievement evaluation.
//!
//! Runs after the progression transaction commits, over a single consistent
//! snapshot of the user's durable state. Evaluation is best-effort: the
//! caller logs and swallows failures, and the unique unlock insert keeps
//! concurrent evaluators from paying a reward twice.

use rusqlite::Connection;
use uuid::Uuid;

use crate::achievements::{Achievement, AchievementStore, Requirement};
use crate::content::WORLD_LEVEL_COUNT;
use crate::progression::{LevelProgress, ProgressStore};
use crate::storage::database::DatabaseError;
use crate::users::{User, UserStore};

/// Evaluate every active achievement for a user and unlock the ones whose
/// requirement now holds. Returns the newly unlocked entries.
pub fn evaluate_achievements(
    conn: &Connection,
    user_id: &Uuid,
) -> Result<Vec<Achievement>, DatabaseError> {
    let users = UserStore::new(conn);
    let store = AchievementStore::new(conn);

    let user = users
        .get_user(user_id)?
        .ok_or_else(|| DatabaseError::NotFound(format!("user {}", user_id)))?;
    let progress = ProgressStore::new(conn).list_for_user(user_id)?;
    let unlocked = store.unlocked_ids(user_id)?;

    let mut newly_unlocked = Vec::new();
    for achievement in store.list_active()? {
        if unlocked.contains(&achievement.id) {
            continue;
        }
        if !requirement_met(&achievement.requirement, &user, &progress) {
            continue;
        }
        // The insert decides the race; only the winner credits the reward
        if store.try_unlock(user_id, &achievement.id)? {
            if achievement.coin_reward > 0 {
                users.credit_coins(user_id, achievement.coin_reward)?;
            }
            tracing::info!(
                user = %user.username,
                achievement = %achievement.code,
                coins = achievement.coin_reward,
                "achievement unlocked"
            );
            newly_unlocked.push(achievement);
        }
    }
    Ok(newly_unlocked)
}

/// Whether a requirement holds for the given snapshot. `progress` must be in
/// insertion order; the consecutive predicate reads its tail.
fn requirement_met(requirement: &Requirement, user: &User, progress: &[LevelProgress]) -> bool {
    match requirement {
        Requirement::ConsecutivePerfect { count } => {
            let completed: Vec<&LevelProgress> =
                progress.iter().filter(|row| row.completed).collect();
            completed.len() >= *count as usize
                && completed[completed.len() - *count as usize..]
                    .iter()
                    .all(|row| row.stars == 3)
        }
        Requirement::RetrySuccess { attempts } => progress
            .iter()
            .any(|row| row.completed && row.attempts >= *attempts),
        Requirement::WorldPerfect { world_id } => {
            let perfect = progress
                .iter()
                .filter(|row| row.world_id == *world_id && row.completed && row.stars == 3)
                .count() as u32;
            perfect >= WORLD_LEVEL_COUNT
        }
        Requirement::LoginStreak { days } => user.login_streak >= *days,
        Requirement::AllWorldsPerfect { total_stars } => user.total_stars >= *total_stars,
        Requirement::NoHints { count } => {
            let clean = progress
                .iter()
                .filter(|row| row.completed && row.hints_used == 0)
                .count() as u32;
            clean >= *count
        }
        Requirement::TotalStars { count } => user.total_stars >= *count,
        Requirement::WeeklyStars { count } => user.weekly_stars >= *count,
        // Time accumulates across attempts, so only first-try clears count
        Requirement::SpeedRun { max_seconds } => progress.iter().any(|row| {
            row.completed && row.attempts == 1 && row.time_spent_seconds <= *max_seconds
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::achievements::definitions::default_catalog;
    use crate::progression::ledger::{record_attempt, Submission};
    use crate::storage::Database;

    fn setup() -> (Database, User) {
        let db = Database::open_in_memory().expect("Failed to create database");
        AchievementStore::new(db.connection())
            .seed(&default_catalog())
            .expect("Failed to seed catalog");
        let user = User::new("tester");
        UserStore::new(db.connection())
            .insert_user(&user)
            .expect("Failed to insert user");
        (db, user)
    }

    fn complete(db: &Database, user: &mut User, level_id: u32, score: u32, hints: u32) {
        let submission = Submission {
            score,
            time_spent_seconds: 60,
            hints_used: hints,
        };
        record_attempt(db.connection(), user, 1, level_id, None, &submission)
            .expect("Attempt failed");
    }

    #[test]
    fn test_first_star_unlocks_and_pays_once() {
        let (db, mut user) = setup();
        complete(&db, &mut user, 1, 95, 0);
        let coins_before = user.coins;

        let unlocked =
            evaluate_achievements(db.connection(), &user.id).expect("Evaluation failed");
        assert!(unlocked.iter().any(|a| a.code == "first-star"));

        // Re-running finds nothing new and pays nothing
        let again =
            evaluate_achievements(db.connection(), &user.id).expect("Evaluation failed");
        assert!(again.is_empty());

        let loaded = UserStore::new(db.connection())
            .get_user(&user.id)
            .expect("Failed to get user")
            .expect("User not found");
        assert_eq!(loaded.coins, coins_before + 10);
    }

    #[test]
    fn test_consecutive_perfect_reads_recent_completions() {
        let (db, mut user) = setup();
        complete(&db, &mut user, 1, 60, 0); // 1 star breaks nothing yet
        complete(&db, &mut user, 2, 95, 0);
        complete(&db, &mut user, 3, 92, 0);
        complete(&db, &mut user, 4, 99, 0);

        let unlocked =
            evaluate_achievements(db.connection(), &user.id).expect("Evaluation failed");
        assert!(unlocked.iter().any(|a| a.code == "hat-trick"));
        assert!(!unlocked.iter().any(|a| a.code == "on-fire"));
    }

    #[test]
    fn test_retry_success_counts_attempts() {
        let (db, mut user) = setup();
        // Two failures then a pass on the same level: 3 attempts
        let fail = Submission {
            score: 30,
            time_spent_seconds: 30,
            hints_used: 0,
        };
        complete(&db, &mut user, 1, 60, 0);
        let _ = record_attempt(db.connection(), &mut user, 1, 1, None, &fail);
        let _ = record_attempt(db.connection(), &mut user, 1, 1, None, &fail);

        let unlocked =
            evaluate_achievements(db.connection(), &user.id).expect("Evaluation failed");
        assert!(unlocked.iter().any(|a| a.code == "comeback-kid"));
    }

    #[test]
    fn test_world_perfect_requires_all_levels() {
        let (db, mut user) = setup();
        for level_id in 1..=19 {
            complete(&db, &mut user, level_id, 95, 0);
        }
        let unlocked =
            evaluate_achievements(db.connection(), &user.id).expect("Evaluation failed");
        assert!(!unlocked.iter().any(|a| a.code == "world-1-champion"));

        complete(&db, &mut user, 20, 95, 0);
        let unlocked =
            evaluate_achievements(db.connection(), &user.id).expect("Evaluation failed");
        assert!(unlocked.iter().any(|a| a.code == "world-1-champion"));
    }

    #[test]
    fn test_speed_run_needs_a_fast_first_try() {
        let (db, mut user) = setup();
        let quick = Submission {
            score: 95,
            time_spent_seconds: 20,
            hints_used: 0,
        };
        record_attempt(db.connection(), &mut user, 1, 1, None, &quick)
            .expect("Attempt failed");

        let unlocked =
            evaluate_achievements(db.connection(), &user.id).expect("Evaluation failed");
        assert!(unlocked.iter().any(|a| a.code == "speed-demon"));

        // A slow first clear plus a fast retry never qualifies
        let (db, mut user) = setup();
        complete(&db, &mut user, 1, 60, 0);
        record_attempt(db.connection(), &mut user, 1, 1, None, &quick)
            .expect("Attempt failed");
        let unlocked =
            evaluate_achievements(db.connection(), &user.id).expect("Evaluation failed");
        assert!(!unlocked.iter().any(|a| a.code == "speed-demon"));
    }

    #[test]
    fn test_weekly_stars_read_the_weekly_counter() {
        let (db, mut user) = setup();
        complete(&db, &mut user, 1, 95, 0);

        let unlocked =
            evaluate_achievements(db.connection(), &user.id).expect("Evaluation failed");
        assert!(!unlocked.iter().any(|a| a.code == "weekly-warrior"));

        for level_id in 2..=5 {
            complete(&db, &mut user, level_id, 95, 0);
        }
        let unlocked =
            evaluate_achievements(db.connection(), &user.id).expect("Evaluation failed");
        assert!(unlocked.iter().any(|a| a.code == "weekly-warrior"));
    }

    #[test]
    fn test_login_streak_reads_user_counter() {
        let (db, user) = setup();
        db.connection()
            .execute(
                "UPDATE users SET login_streak = 7 WHERE id = ?1",
                rusqlite::params![user.id.to_string()],
            )
            .expect("Failed to set streak");

        let unlocked =
            evaluate_achievements(db.connection(), &user.id).expect("Evaluation failed");
        assert!(unlocked.iter().any(|a| a.code == "week-one"));
    }
}

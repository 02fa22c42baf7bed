//! The `ProgressionEngine` facade.
//!
//! Owns the database behind a mutex (rusqlite connections are not Sync) and
//! the shared ranking store. `submit_completion` is the single write path:
//! ledger, aggregator and world gate run in one transaction; rankings and
//! achievements apply after commit, best-effort.

use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use crate::achievements::{evaluate_achievements, definitions, Achievement, AchievementStore};
use crate::content::{ContentStore, Island, Topic, WORLD_COUNT, WORLD_LEVEL_COUNT};
use crate::leaderboards::{
    build_leaderboard, Leaderboard, RankingStore, GLOBAL_NAMESPACE, WEEKLY_NAMESPACE,
};
use crate::mastery::{is_island_unlocked, is_topic_unlocked, update_rollups, Rollup, RollupStore};
use crate::progression::ledger::{record_attempt, ProgressStore, Submission};
use crate::progression::ProgressionError;
use crate::storage::config::EngineConfig;
use crate::storage::Database;
use crate::users::{User, UserStore};

/// Maximum stars obtainable in one world.
const WORLD_STAR_COUNT: u32 = WORLD_LEVEL_COUNT * 3;

/// Everything a completion submission produced.
#[derive(Debug, Clone)]
pub struct CompletionOutcome {
    pub stars: u32,
    /// Coins reported for this submission, never negative. A better score
    /// that leaned harder on hints debits the balance without showing here.
    pub coins_earned: u32,
    pub xp_earned: u32,
    pub previous_stars: u32,
    pub is_new_completion: bool,
    /// Running totals as of the committed transaction. Achievement payouts
    /// land after the fact and are not folded in here.
    pub total_coins: u32,
    pub total_stars: u32,
    /// Recomputed topic rollup, when the level belongs to a topic.
    pub topic_rollup: Option<Rollup>,
    pub island_completed: bool,
    pub world_advanced: bool,
    /// Achievements unlocked by this submission (post-commit, best-effort).
    pub unlocked_achievements: Vec<Achievement>,
}

/// Per-world progress figures for the progress report.
#[derive(Debug, Clone, Copy)]
pub struct WorldStats {
    pub world_id: u32,
    pub levels_completed: u32,
    pub stars_earned: u32,
    pub completion_percent: f64,
    pub star_percent: f64,
}

/// A user's overall progress, grouped by world.
#[derive(Debug, Clone)]
pub struct UserProgressReport {
    pub user_id: Uuid,
    pub username: String,
    pub coins: u32,
    pub total_stars: u32,
    pub total_xp: u32,
    pub weekly_stars: u32,
    pub current_world: u32,
    pub current_level: u32,
    pub worlds: Vec<WorldStats>,
}

/// An island with its unlock state and the viewer's summary rollup.
#[derive(Debug, Clone)]
pub struct IslandStatus {
    pub island: Island,
    pub is_unlocked: bool,
    pub rollup: Option<Rollup>,
}

/// A topic with its unlock state and the viewer's rollup.
#[derive(Debug, Clone)]
pub struct TopicStatus {
    pub topic: Topic,
    pub is_unlocked: bool,
    pub rollup: Option<Rollup>,
}

pub struct ProgressionEngine {
    db: Mutex<Database>,
    rankings: Arc<RankingStore>,
    config: EngineConfig,
}

impl ProgressionEngine {
    /// Wrap an opened database: seed the achievement catalog and rebuild the
    /// ranking namespaces from the durable star counters.
    pub fn new(db: Database, config: EngineConfig) -> Result<Self, ProgressionError> {
        let rankings = Arc::new(RankingStore::new());
        {
            let conn = db.connection();
            AchievementStore::new(conn).seed(&definitions::default_catalog())?;

            let users = UserStore::new(conn).list_active_users()?;
            for user in &users {
                rankings.set_score(GLOBAL_NAMESPACE, user.id, user.total_stars);
                if user.weekly_stars > 0 {
                    rankings.set_score(WEEKLY_NAMESPACE, user.id, user.weekly_stars);
                }
            }
            tracing::info!(users = users.len(), "rankings rebuilt");
        }
        Ok(Self {
            db: Mutex::new(db),
            rankings,
            config,
        })
    }

    /// Shared handle to the ranking store.
    pub fn rankings(&self) -> Arc<RankingStore> {
        Arc::clone(&self.rankings)
    }

    fn lock_db(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a level completion submission.
    ///
    /// Ledger write, rollup cascade and world gate commit atomically; the
    /// ranking update and achievement evaluation follow the commit and never
    /// fail the submission.
    pub fn submit_completion(
        &self,
        user_id: &Uuid,
        world_id: u32,
        level_id: u32,
        submission: Submission,
    ) -> Result<CompletionOutcome, ProgressionError> {
        if !(1..=WORLD_COUNT).contains(&world_id) || !(1..=WORLD_LEVEL_COUNT).contains(&level_id) {
            return Err(ProgressionError::NotFound(format!(
                "level {}/{}",
                world_id, level_id
            )));
        }

        let mut db = self.lock_db();
        let tx = db.transaction()?;

        let mut user = UserStore::new(&tx)
            .get_user(user_id)?
            .ok_or_else(|| ProgressionError::NotFound(format!("user {}", user_id)))?;
        let level = ContentStore::new(&tx).get_level_by_world_position(world_id, level_id)?;

        let attempt = match record_attempt(
            &tx,
            &mut user,
            world_id,
            level_id,
            level.as_ref(),
            &submission,
        ) {
            Ok(attempt) => attempt,
            Err(err @ ProgressionError::ScoreTooLow { .. }) => {
                // The attempt counter bump on a failed attempt is durable
                tx.commit()
                    .map_err(|e| ProgressionError::StoreUnavailable(e.to_string()))?;
                return Err(err);
            }
            Err(other) => return Err(other),
        };

        let rollup_outcome = match &level {
            Some(level) => Some(update_rollups(&tx, &user, level)?),
            None => None,
        };

        tx.commit()
            .map_err(|e| ProgressionError::StoreUnavailable(e.to_string()))?;

        self.rankings
            .set_score(GLOBAL_NAMESPACE, user.id, user.total_stars);
        self.rankings
            .set_score(WEEKLY_NAMESPACE, user.id, user.weekly_stars);

        let unlocked = match evaluate_achievements(db.connection(), user_id) {
            Ok(unlocked) => unlocked,
            Err(e) => {
                tracing::warn!(user = %user.username, error = %e, "achievement evaluation failed");
                Vec::new()
            }
        };

        tracing::debug!(
            user = %user.username,
            world = world_id,
            level = level_id,
            stars = attempt.stars,
            coins = attempt.coins_earned,
            "completion recorded"
        );

        Ok(CompletionOutcome {
            stars: attempt.stars,
            coins_earned: attempt.coins_earned,
            xp_earned: attempt.xp_earned,
            previous_stars: attempt.previous_stars,
            is_new_completion: attempt.is_new_completion,
            total_coins: user.coins,
            total_stars: user.total_stars,
            topic_rollup: rollup_outcome.as_ref().map(|o| o.topic.clone()),
            island_completed: rollup_outcome
                .as_ref()
                .map(|o| o.island_completed)
                .unwrap_or(false),
            world_advanced: rollup_outcome
                .as_ref()
                .map(|o| o.world_advanced)
                .unwrap_or(false),
            unlocked_achievements: unlocked,
        })
    }

    /// A user's progress grouped by world.
    pub fn get_user_progress(
        &self,
        user_id: &Uuid,
    ) -> Result<UserProgressReport, ProgressionError> {
        let db = self.lock_db();
        let conn = db.connection();

        let user = UserStore::new(conn)
            .get_user(user_id)?
            .ok_or_else(|| ProgressionError::NotFound(format!("user {}", user_id)))?;
        let progress = ProgressStore::new(conn).list_for_user(user_id)?;

        let worlds = (1..=WORLD_COUNT)
            .map(|world_id| {
                let completed: Vec<_> = progress
                    .iter()
                    .filter(|row| row.world_id == world_id && row.completed)
                    .collect();
                let levels_completed = completed.len() as u32;
                let stars_earned: u32 = completed.iter().map(|row| row.stars).sum();
                WorldStats {
                    world_id,
                    levels_completed,
                    stars_earned,
                    completion_percent: f64::from(levels_completed)
                        / f64::from(WORLD_LEVEL_COUNT)
                        * 100.0,
                    star_percent: f64::from(stars_earned) / f64::from(WORLD_STAR_COUNT) * 100.0,
                }
            })
            .collect();

        Ok(UserProgressReport {
            user_id: user.id,
            username: user.username,
            coins: user.coins,
            total_stars: user.total_stars,
            total_xp: user.total_xp,
            weekly_stars: user.weekly_stars,
            current_world: user.current_world,
            current_level: user.current_level,
            worlds,
        })
    }

    /// A user's rollup for one topic, if any levels were completed there.
    pub fn get_topic_rollup(
        &self,
        user_id: &Uuid,
        topic_id: &Uuid,
    ) -> Result<Option<Rollup>, ProgressionError> {
        let db = self.lock_db();
        let conn = db.connection();

        let topic = ContentStore::new(conn)
            .get_topic(topic_id)?
            .ok_or_else(|| ProgressionError::NotFound(format!("topic {}", topic_id)))?;
        Ok(RollupStore::new(conn).get(user_id, &topic.island_id, Some(topic_id))?)
    }

    /// A user's island summary rollup, if any levels were completed there.
    pub fn get_island_rollup(
        &self,
        user_id: &Uuid,
        island_id: &Uuid,
    ) -> Result<Option<Rollup>, ProgressionError> {
        let db = self.lock_db();
        let conn = db.connection();

        ContentStore::new(conn)
            .get_island(island_id)?
            .ok_or_else(|| ProgressionError::NotFound(format!("island {}", island_id)))?;
        Ok(RollupStore::new(conn).get(user_id, island_id, None)?)
    }

    /// The islands of a world as seen by one user, unlock state included.
    pub fn get_world_islands(
        &self,
        user_id: &Uuid,
        world_id: u32,
    ) -> Result<Vec<IslandStatus>, ProgressionError> {
        let db = self.lock_db();
        let conn = db.connection();
        let content = ContentStore::new(conn);
        let rollups = RollupStore::new(conn);

        let user = UserStore::new(conn)
            .get_user(user_id)?
            .ok_or_else(|| ProgressionError::NotFound(format!("user {}", user_id)))?;

        let mut out = Vec::new();
        for island in content.list_world_islands(world_id)? {
            let previous_summary = match &island.unlock_requirements {
                Some(req) => match content.get_island_by_code(&req.previous_island)? {
                    Some(previous) => rollups.get(user_id, &previous.id, None)?,
                    None => None,
                },
                None => None,
            };
            let is_unlocked = is_island_unlocked(
                &user,
                island.unlock_requirements.as_ref(),
                previous_summary.as_ref(),
            );
            let rollup = rollups.get(user_id, &island.id, None)?;
            out.push(IslandStatus {
                island,
                is_unlocked,
                rollup,
            });
        }
        Ok(out)
    }

    /// The topics of an island as seen by one user, unlock state included.
    pub fn get_island_topics(
        &self,
        user_id: &Uuid,
        island_id: &Uuid,
    ) -> Result<Vec<TopicStatus>, ProgressionError> {
        let db = self.lock_db();
        let conn = db.connection();
        let content = ContentStore::new(conn);
        let rollups = RollupStore::new(conn);

        let user = UserStore::new(conn)
            .get_user(user_id)?
            .ok_or_else(|| ProgressionError::NotFound(format!("user {}", user_id)))?;
        content
            .get_island(island_id)?
            .ok_or_else(|| ProgressionError::NotFound(format!("island {}", island_id)))?;

        let topics = content.list_island_topics(island_id)?;
        let mut out: Vec<TopicStatus> = Vec::with_capacity(topics.len());
        for (index, topic) in topics.into_iter().enumerate() {
            let previous_rollup = if index == 0 {
                None
            } else {
                out[index - 1].rollup.clone()
            };
            let is_unlocked = is_topic_unlocked(&user, index as u32, previous_rollup.as_ref());
            let rollup = rollups.get(user_id, island_id, Some(&topic.id))?;
            out.push(TopicStatus {
                topic,
                is_unlocked,
                rollup,
            });
        }
        Ok(out)
    }

    /// A leaderboard page plus the requesting user's own position. `limit`
    /// falls back to the configured default and is clamped to the maximum.
    pub fn get_leaderboard(
        &self,
        namespace: &str,
        limit: Option<usize>,
        requesting_user: Option<&Uuid>,
    ) -> Result<Leaderboard, ProgressionError> {
        let limit = limit
            .unwrap_or(self.config.leaderboard.default_limit)
            .min(self.config.leaderboard.max_limit);

        let db = self.lock_db();
        Ok(build_leaderboard(
            db.connection(),
            &self.rankings,
            namespace,
            limit,
            requesting_user,
        )?)
    }

    /// Weekly reset: zero every weekly star counter and clear the weekly
    /// ranking namespace. Returns the number of users affected.
    pub fn reset_weekly(&self) -> Result<usize, ProgressionError> {
        let db = self.lock_db();
        let affected = UserStore::new(db.connection()).reset_weekly_stars()?;
        self.rankings.reset(WEEKLY_NAMESPACE);
        tracing::info!(affected, "weekly stars reset");
        Ok(affected)
    }
}

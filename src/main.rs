//! StemQuest - Progression, Unlock, and Ranking Engine
//!
//! Demo harness: seeds a small content tree and a few players, pushes
//! completions through the engine and prints the resulting leaderboard.

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

use stemquest::content::{ContentStore, Island, Level, Topic, UnlockRequirements};
use stemquest::leaderboards::{GLOBAL_NAMESPACE, WEEKLY_NAMESPACE};
use stemquest::users::UserStore;
use stemquest::{Database, ProgressionEngine, ProgressionError, Submission, User};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting StemQuest engine demo v{}", env!("CARGO_PKG_VERSION"));

    let config = stemquest::storage::config::load_config().context("loading configuration")?;
    let db = Database::open_in_memory().context("opening database")?;

    let players = seed(&db).context("seeding demo data")?;
    let engine = ProgressionEngine::new(db, config).context("starting engine")?;

    // Each player plays through the first few levels of world 1
    let scores: [&[(u32, u32, u32)]; 3] = [
        &[(1, 95, 0), (2, 91, 0), (3, 88, 1), (4, 97, 0)],
        &[(1, 72, 1), (2, 55, 3), (1, 93, 0)],
        &[(1, 45, 0), (1, 62, 2), (2, 81, 0)],
    ];
    for (player, rounds) in players.iter().zip(scores) {
        for &(level, score, hints) in rounds {
            let submission = Submission {
                score,
                time_spent_seconds: 90,
                hints_used: hints,
            };
            match engine.submit_completion(player, 1, level, submission) {
                Ok(outcome) => tracing::info!(
                    level,
                    stars = outcome.stars,
                    coins = outcome.coins_earned,
                    new = outcome.is_new_completion,
                    "completion accepted"
                ),
                Err(ProgressionError::ScoreTooLow { score, .. }) => {
                    tracing::info!(level, score, "attempt below passing score")
                }
                Err(e) => return Err(e).context("submitting completion"),
            }
        }
    }

    for namespace in [GLOBAL_NAMESPACE, WEEKLY_NAMESPACE] {
        let board = engine.get_leaderboard(namespace, Some(10), Some(&players[0]))?;
        println!("\n== {} leaderboard ==", namespace);
        for entry in &board.entries {
            println!("  #{} {:<12} {} stars", entry.rank, entry.username, entry.score);
        }
        if let Some(resets_at) = board.resets_at {
            println!("  resets at {}", resets_at);
        }
    }

    let report = engine.get_user_progress(&players[0])?;
    println!(
        "\n{}: {} coins, {} stars, {} xp, at world {} level {}",
        report.username,
        report.coins,
        report.total_stars,
        report.total_xp,
        report.current_world,
        report.current_level
    );
    for world in &report.worlds {
        println!(
            "  world {}: {}/20 levels ({:.0}%), {} stars",
            world.world_id, world.levels_completed, world.completion_percent, world.stars_earned
        );
    }

    Ok(())
}

/// Seed two islands of world 1 and three players. Returns the player IDs.
fn seed(db: &Database) -> anyhow::Result<Vec<Uuid>> {
    let conn = db.connection();
    let content = ContentStore::new(conn);

    let counting_cove = Island {
        id: Uuid::new_v4(),
        code: "counting-cove".to_string(),
        world_id: 1,
        name: "Counting Cove".to_string(),
        order_index: 0,
        unlock_requirements: None,
        is_active: true,
    };
    content.insert_island(&counting_cove)?;

    let shape_shore = Island {
        id: Uuid::new_v4(),
        code: "shape-shore".to_string(),
        world_id: 1,
        name: "Shape Shore".to_string(),
        order_index: 1,
        unlock_requirements: Some(UnlockRequirements {
            previous_island: "counting-cove".to_string(),
            min_stars: 12,
        }),
        is_active: true,
    };
    content.insert_island(&shape_shore)?;

    let addition = Topic {
        id: Uuid::new_v4(),
        island_id: counting_cove.id,
        code: "addition".to_string(),
        name: "Addition".to_string(),
        order_index: 0,
        difficulty: "beginner".to_string(),
        level_count: 4,
    };
    content.insert_topic(&addition)?;

    for n in 1..=4 {
        content.insert_level(&Level {
            id: Uuid::new_v4(),
            topic_id: addition.id,
            level_number: n,
            world_id: 1,
            world_level: n,
            name: format!("Addition {}", n),
            xp_reward: 10,
            coins_reward: 5,
        })?;
    }

    let users = UserStore::new(conn);
    let mut ids = Vec::new();
    for name in ["stella", "milo", "nia"] {
        let user = User::new(name);
        users.insert_user(&user)?;
        ids.push(user.id);
    }
    Ok(ids)
}

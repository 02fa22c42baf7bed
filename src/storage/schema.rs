//! Database schema definitions for the progression engine.

/// SQL schema for creating all database tables.
pub const SCHEMA: &str = r#"
-- Users table (identity is created externally; the engine owns the counters)
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    username TEXT NOT NULL UNIQUE,
    role TEXT NOT NULL DEFAULT 'student',
    coins INTEGER NOT NULL DEFAULT 0,
    total_stars INTEGER NOT NULL DEFAULT 0,
    total_xp INTEGER NOT NULL DEFAULT 0,
    weekly_stars INTEGER NOT NULL DEFAULT 0,
    weekly_stars_reset_at TEXT,
    current_world INTEGER NOT NULL DEFAULT 1,
    current_level INTEGER NOT NULL DEFAULT 1,
    login_streak INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Static content: islands
CREATE TABLE IF NOT EXISTS islands (
    id TEXT PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    world_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    order_index INTEGER NOT NULL DEFAULT 0,
    unlock_requirements_json TEXT,
    is_active INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_islands_world_id ON islands(world_id);

-- Static content: topics
CREATE TABLE IF NOT EXISTS topics (
    id TEXT PRIMARY KEY,
    island_id TEXT NOT NULL REFERENCES islands(id) ON DELETE CASCADE,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    order_index INTEGER NOT NULL DEFAULT 0,
    difficulty TEXT NOT NULL DEFAULT 'beginner',
    level_count INTEGER NOT NULL DEFAULT 8
);

CREATE INDEX IF NOT EXISTS idx_topics_island_id ON topics(island_id);

-- Static content: levels
-- world_level is the legacy numeric position (1..20 within a world) that
-- completion submissions address; level_number orders levels inside a topic.
CREATE TABLE IF NOT EXISTS levels (
    id TEXT PRIMARY KEY,
    topic_id TEXT NOT NULL REFERENCES topics(id) ON DELETE CASCADE,
    level_number INTEGER NOT NULL,
    world_id INTEGER NOT NULL,
    world_level INTEGER NOT NULL,
    name TEXT NOT NULL,
    xp_reward INTEGER NOT NULL DEFAULT 10,
    coins_reward INTEGER NOT NULL DEFAULT 5,
    UNIQUE(topic_id, level_number),
    UNIQUE(world_id, world_level)
);

-- Per-level progress ledger. The integer rowid doubles as the authoritative
-- insertion order for "most recent N completions" achievement checks.
CREATE TABLE IF NOT EXISTS level_progress (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    world_id INTEGER NOT NULL,
    level_id INTEGER NOT NULL,
    topic_id TEXT REFERENCES topics(id) ON DELETE SET NULL,
    level_number INTEGER,
    stars INTEGER NOT NULL DEFAULT 0,
    score INTEGER NOT NULL DEFAULT 0,
    attempts INTEGER NOT NULL DEFAULT 1,
    time_spent_seconds INTEGER NOT NULL DEFAULT 0,
    hints_used INTEGER NOT NULL DEFAULT 0,
    completed INTEGER NOT NULL DEFAULT 0,
    completed_at TEXT,
    coins_earned INTEGER NOT NULL DEFAULT 0,
    xp_earned INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(user_id, world_id, level_id)
);

CREATE INDEX IF NOT EXISTS idx_level_progress_user_id ON level_progress(user_id);
CREATE INDEX IF NOT EXISTS idx_level_progress_user_topic ON level_progress(user_id, topic_id);

-- Topic/island rollups. The island summary row carries a NULL topic_id;
-- SQLite treats NULLs as distinct in UNIQUE constraints, so uniqueness is
-- enforced through a COALESCE expression index instead.
CREATE TABLE IF NOT EXISTS user_island_progress (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    island_id TEXT NOT NULL REFERENCES islands(id) ON DELETE CASCADE,
    topic_id TEXT REFERENCES topics(id) ON DELETE CASCADE,
    total_xp INTEGER NOT NULL DEFAULT 0,
    levels_completed INTEGER NOT NULL DEFAULT 0,
    total_levels INTEGER NOT NULL DEFAULT 8,
    average_stars REAL NOT NULL DEFAULT 0.0,
    mastery_color TEXT NOT NULL DEFAULT 'red',
    topic_badge_earned INTEGER NOT NULL DEFAULT 0,
    badge_earned_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_user_island_topic
    ON user_island_progress(user_id, island_id, COALESCE(topic_id, ''));
CREATE INDEX IF NOT EXISTS idx_user_island_progress_user ON user_island_progress(user_id);

-- Achievement catalog
CREATE TABLE IF NOT EXISTS achievements (
    id TEXT PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    description TEXT,
    category TEXT NOT NULL DEFAULT 'general',
    coin_reward INTEGER NOT NULL DEFAULT 0,
    requirement_json TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1
);

-- Unlocked achievements; row existence is the unlock state
CREATE TABLE IF NOT EXISTS user_achievements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    achievement_id TEXT NOT NULL REFERENCES achievements(id) ON DELETE CASCADE,
    unlocked_at TEXT NOT NULL,
    UNIQUE(user_id, achievement_id)
);

CREATE INDEX IF NOT EXISTS idx_user_achievements_user ON user_achievements(user_id);
"#;

/// SQL for schema version tracking (migrations)
pub const SCHEMA_VERSION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
);
"#;

/// Current schema version
pub const CURRENT_VERSION: i32 = 1;

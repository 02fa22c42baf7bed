//! Leaderboards: the ranking store plus hydration into displayable entries.

pub mod rankings;

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::storage::database::DatabaseError;
use crate::users::UserStore;

pub use rankings::{RankingStore, GLOBAL_NAMESPACE, WEEKLY_NAMESPACE};

/// One ranked row, hydrated with the username.
#[derive(Debug, Clone)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: Uuid,
    pub username: String,
    pub score: u32,
}

/// A leaderboard page plus the requesting user's own position.
#[derive(Debug, Clone)]
pub struct Leaderboard {
    pub namespace: String,
    pub entries: Vec<LeaderboardEntry>,
    /// 1-based rank of the requesting user, `None` when unranked.
    pub user_rank: Option<usize>,
    pub user_score: Option<u32>,
    /// When the board next resets (weekly board only).
    pub resets_at: Option<DateTime<Utc>>,
}

/// Build a leaderboard page. Entries whose user row has disappeared are
/// skipped rather than shown nameless.
pub fn build_leaderboard(
    conn: &Connection,
    rankings: &RankingStore,
    namespace: &str,
    limit: usize,
    requesting_user: Option<&Uuid>,
) -> Result<Leaderboard, DatabaseError> {
    let top = rankings.top_n(namespace, limit);
    let ids: Vec<Uuid> = top.iter().map(|(id, _)| *id).collect();
    let names = UserStore::new(conn).usernames(&ids)?;

    let mut entries = Vec::with_capacity(top.len());
    for (rank, (user_id, score)) in top.into_iter().enumerate() {
        if let Some((_, username)) = names.iter().find(|(id, _)| *id == user_id) {
            entries.push(LeaderboardEntry {
                rank: rank + 1,
                user_id,
                username: username.clone(),
                score,
            });
        }
    }

    let (user_rank, user_score) = match requesting_user {
        Some(id) => (
            rankings.rank_of(namespace, id),
            rankings.score_of(namespace, id),
        ),
        None => (None, None),
    };

    Ok(Leaderboard {
        namespace: namespace.to_string(),
        entries,
        user_rank,
        user_score,
        resets_at: (namespace == WEEKLY_NAMESPACE).then(next_monday),
    })
}

/// Midnight UTC of the coming Monday; a board reset on Monday points at the
/// Monday after.
pub fn next_monday() -> DateTime<Utc> {
    let today = Utc::now().date_naive();
    let days_ahead = 7 - i64::from(today.weekday().num_days_from_monday());
    (today + Duration::days(days_ahead))
        .and_time(NaiveTime::MIN)
        .and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use crate::users::User;
    use chrono::Weekday;

    #[test]
    fn test_next_monday_is_in_the_future() {
        let monday = next_monday();
        assert_eq!(monday.weekday(), Weekday::Mon);
        assert!(monday > Utc::now());
        assert!(monday - Utc::now() <= Duration::days(7));
    }

    #[test]
    fn test_leaderboard_hydrates_and_positions_user() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let users = UserStore::new(db.connection());
        let rankings = RankingStore::new();

        let alice = User::new("alice");
        let bob = User::new("bob");
        users.insert_user(&alice).expect("Failed to insert user");
        users.insert_user(&bob).expect("Failed to insert user");

        rankings.set_score(GLOBAL_NAMESPACE, alice.id, 30);
        rankings.set_score(GLOBAL_NAMESPACE, bob.id, 10);

        let board = build_leaderboard(
            db.connection(),
            &rankings,
            GLOBAL_NAMESPACE,
            10,
            Some(&bob.id),
        )
        .expect("Failed to build leaderboard");

        assert_eq!(board.entries.len(), 2);
        assert_eq!(board.entries[0].username, "alice");
        assert_eq!(board.entries[0].rank, 1);
        assert_eq!(board.user_rank, Some(2));
        assert_eq!(board.user_score, Some(10));
        assert!(board.resets_at.is_none());
    }

    #[test]
    fn test_weekly_board_carries_reset_date() {
        let db = Database::open_in_memory().expect("Failed to create database");
        let rankings = RankingStore::new();

        let board =
            build_leaderboard(db.connection(), &rankings, WEEKLY_NAMESPACE, 10, None)
                .expect("Failed to build leaderboard");
        assert!(board.entries.is_empty());
        assert!(board.resets_at.is_some());
    }
}

//! In-memory ordered-score namespaces.
//!
//! Rankings are a derived view over the durable star counters, never the
//! source of truth; a restart rebuilds them from the users table. Ties are
//! broken by user ID so repeated reads return a stable order.

use std::collections::{BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::RwLock;

use uuid::Uuid;

/// Namespace ranked by lifetime stars.
pub const GLOBAL_NAMESPACE: &str = "global";

/// Namespace ranked by stars earned since the last weekly reset.
pub const WEEKLY_NAMESPACE: &str = "weekly";

#[derive(Default)]
struct ScoreBoard {
    scores: HashMap<Uuid, u32>,
    ordered: BTreeSet<(u32, Uuid)>,
}

impl ScoreBoard {
    fn set(&mut self, user_id: Uuid, score: u32) {
        if let Some(old) = self.scores.insert(user_id, score) {
            self.ordered.remove(&(old, user_id));
        }
        self.ordered.insert((score, user_id));
    }
}

/// Thread-safe ranking namespaces. Writes are idempotent overwrites, so a
/// replayed post-commit update converges on the same state.
#[derive(Default)]
pub struct RankingStore {
    boards: RwLock<HashMap<String, ScoreBoard>>,
}

impl RankingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or overwrite) a user's score in a namespace.
    pub fn set_score(&self, namespace: &str, user_id: Uuid, score: u32) {
        let mut boards = self.boards.write().unwrap_or_else(|e| e.into_inner());
        boards.entry(namespace.to_string()).or_default().set(user_id, score);
    }

    /// The top `n` entries of a namespace, highest score first.
    pub fn top_n(&self, namespace: &str, n: usize) -> Vec<(Uuid, u32)> {
        let boards = self.boards.read().unwrap_or_else(|e| e.into_inner());
        boards
            .get(namespace)
            .map(|board| {
                board
                    .ordered
                    .iter()
                    .rev()
                    .take(n)
                    .map(|(score, user_id)| (*user_id, *score))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A user's 1-based rank, or `None` when unranked.
    pub fn rank_of(&self, namespace: &str, user_id: &Uuid) -> Option<usize> {
        let boards = self.boards.read().unwrap_or_else(|e| e.into_inner());
        let board = boards.get(namespace)?;
        let score = *board.scores.get(user_id)?;
        let above = board
            .ordered
            .range((Bound::Excluded((score, *user_id)), Bound::Unbounded))
            .count();
        Some(above + 1)
    }

    /// A user's score in a namespace, or `None` when unranked.
    pub fn score_of(&self, namespace: &str, user_id: &Uuid) -> Option<u32> {
        let boards = self.boards.read().unwrap_or_else(|e| e.into_inner());
        boards.get(namespace)?.scores.get(user_id).copied()
    }

    /// Number of ranked users in a namespace.
    pub fn len(&self, namespace: &str) -> usize {
        let boards = self.boards.read().unwrap_or_else(|e| e.into_inner());
        boards.get(namespace).map(|b| b.scores.len()).unwrap_or(0)
    }

    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }

    /// Drop every entry in a namespace (weekly reset).
    pub fn reset(&self, namespace: &str) {
        let mut boards = self.boards.write().unwrap_or_else(|e| e.into_inner());
        boards.remove(namespace);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_n_descends() {
        let store = RankingStore::new();
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        store.set_score(GLOBAL_NAMESPACE, a, 10);
        store.set_score(GLOBAL_NAMESPACE, b, 30);
        store.set_score(GLOBAL_NAMESPACE, c, 20);

        let top = store.top_n(GLOBAL_NAMESPACE, 10);
        assert_eq!(top, vec![(b, 30), (c, 20), (a, 10)]);
        assert_eq!(store.top_n(GLOBAL_NAMESPACE, 2).len(), 2);
    }

    #[test]
    fn test_overwrite_replaces_old_score() {
        let store = RankingStore::new();
        let a = Uuid::new_v4();
        store.set_score(GLOBAL_NAMESPACE, a, 10);
        store.set_score(GLOBAL_NAMESPACE, a, 25);

        assert_eq!(store.score_of(GLOBAL_NAMESPACE, &a), Some(25));
        assert_eq!(store.len(GLOBAL_NAMESPACE), 1);
        assert_eq!(store.top_n(GLOBAL_NAMESPACE, 10), vec![(a, 25)]);
    }

    #[test]
    fn test_rank_is_one_based_and_unranked_is_none() {
        let store = RankingStore::new();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.set_score(WEEKLY_NAMESPACE, a, 5);
        store.set_score(WEEKLY_NAMESPACE, b, 9);

        assert_eq!(store.rank_of(WEEKLY_NAMESPACE, &b), Some(1));
        assert_eq!(store.rank_of(WEEKLY_NAMESPACE, &a), Some(2));
        assert_eq!(store.rank_of(WEEKLY_NAMESPACE, &Uuid::new_v4()), None);
        assert_eq!(store.rank_of("unknown", &a), None);
    }

    #[test]
    fn test_namespaces_are_independent() {
        let store = RankingStore::new();
        let a = Uuid::new_v4();
        store.set_score(GLOBAL_NAMESPACE, a, 50);
        store.set_score(WEEKLY_NAMESPACE, a, 3);

        store.reset(WEEKLY_NAMESPACE);
        assert!(store.is_empty(WEEKLY_NAMESPACE));
        assert_eq!(store.score_of(GLOBAL_NAMESPACE, &a), Some(50));
    }
}

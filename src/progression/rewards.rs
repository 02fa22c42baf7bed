//! Reward calculation: maps a raw score and hint usage to stars and coins.
//!
//! Pure and total; the ledger decides what to do with the result.

/// Minimum score required to complete a level.
pub const PASSING_SCORE: u32 = 50;

/// Coins granted per star before hint penalties.
pub const COINS_PER_STAR: u32 = 10;

/// Coin penalty per hint used.
pub const HINT_PENALTY: u32 = 2;

/// Stars for a score: 0 below 50, 1 for 50-69, 2 for 70-89, 3 for 90+.
pub fn stars_for_score(score: u32) -> u32 {
    if score >= 90 {
        3
    } else if score >= 70 {
        2
    } else if score >= PASSING_SCORE {
        1
    } else {
        0
    }
}

/// Coins for a star rating and hint count, floored at zero.
pub fn coins_for(stars: u32, hints_used: u32) -> u32 {
    (stars * COINS_PER_STAR).saturating_sub(hints_used * HINT_PENALTY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_thresholds() {
        assert_eq!(stars_for_score(0), 0);
        assert_eq!(stars_for_score(49), 0);
        assert_eq!(stars_for_score(50), 1);
        assert_eq!(stars_for_score(69), 1);
        assert_eq!(stars_for_score(70), 2);
        assert_eq!(stars_for_score(89), 2);
        assert_eq!(stars_for_score(90), 3);
        assert_eq!(stars_for_score(100), 3);
    }

    #[test]
    fn test_coin_rewards() {
        // score=95, hints=0 -> 3 stars, 30 coins
        assert_eq!(coins_for(stars_for_score(95), 0), 30);
        // score=65, hints=2 -> 1 star, 6 coins
        assert_eq!(coins_for(stars_for_score(65), 2), 6);
    }

    #[test]
    fn test_coins_floor_at_zero() {
        assert_eq!(coins_for(1, 5), 0);
        assert_eq!(coins_for(1, 100), 0);
        assert_eq!(coins_for(0, 0), 0);
    }
}

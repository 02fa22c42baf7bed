//! The built-in achievement catalog.

use uuid::Uuid;

use crate::achievements::{Achievement, Requirement};

fn entry(
    code: &str,
    name: &str,
    description: &str,
    category: &str,
    coin_reward: u32,
    requirement: Requirement,
) -> Achievement {
    Achievement {
        id: Uuid::new_v4(),
        code: code.to_string(),
        name: name.to_string(),
        description: Some(description.to_string()),
        category: category.to_string(),
        coin_reward,
        requirement,
        is_active: true,
    }
}

/// The default catalog seeded at startup. Codes are stable; IDs are minted
/// on first seed and kept thereafter (`seed` skips existing codes).
pub fn default_catalog() -> Vec<Achievement> {
    vec![
        entry(
            "first-star",
            "First Star",
            "Earn your very first star",
            "milestones",
            10,
            Requirement::TotalStars { count: 1 },
        ),
        entry(
            "star-collector",
            "Star Collector",
            "Earn 50 stars in total",
            "milestones",
            50,
            Requirement::TotalStars { count: 50 },
        ),
        entry(
            "star-master",
            "Star Master",
            "Earn 150 stars in total",
            "milestones",
            100,
            Requirement::TotalStars { count: 150 },
        ),
        entry(
            "hat-trick",
            "Hat Trick",
            "Score 3 stars on 3 levels in a row",
            "skill",
            30,
            Requirement::ConsecutivePerfect { count: 3 },
        ),
        entry(
            "on-fire",
            "On Fire",
            "Score 3 stars on 5 levels in a row",
            "skill",
            60,
            Requirement::ConsecutivePerfect { count: 5 },
        ),
        entry(
            "comeback-kid",
            "Comeback Kid",
            "Beat a level on your third try or later",
            "persistence",
            25,
            Requirement::RetrySuccess { attempts: 3 },
        ),
        entry(
            "never-give-up",
            "Never Give Up",
            "Beat a level after 5 or more attempts",
            "persistence",
            50,
            Requirement::RetrySuccess { attempts: 5 },
        ),
        entry(
            "no-help-needed",
            "No Help Needed",
            "Complete 10 levels without using a hint",
            "skill",
            40,
            Requirement::NoHints { count: 10 },
        ),
        entry(
            "week-one",
            "Week One",
            "Log in 7 days in a row",
            "engagement",
            35,
            Requirement::LoginStreak { days: 7 },
        ),
        entry(
            "weekly-warrior",
            "Weekly Warrior",
            "Earn 15 stars in a single week",
            "engagement",
            45,
            Requirement::WeeklyStars { count: 15 },
        ),
        entry(
            "speed-demon",
            "Speed Demon",
            "Beat a level first try in 30 seconds or less",
            "skill",
            30,
            Requirement::SpeedRun { max_seconds: 30 },
        ),
        entry(
            "world-1-champion",
            "Numberland Champion",
            "Score 3 stars on every level of World 1",
            "mastery",
            100,
            Requirement::WorldPerfect { world_id: 1 },
        ),
        entry(
            "world-2-champion",
            "Shapeville Champion",
            "Score 3 stars on every level of World 2",
            "mastery",
            100,
            Requirement::WorldPerfect { world_id: 2 },
        ),
        entry(
            "world-3-champion",
            "Patternia Champion",
            "Score 3 stars on every level of World 3",
            "mastery",
            100,
            Requirement::WorldPerfect { world_id: 3 },
        ),
        entry(
            "world-4-champion",
            "Logicopolis Champion",
            "Score 3 stars on every level of World 4",
            "mastery",
            100,
            Requirement::WorldPerfect { world_id: 4 },
        ),
        entry(
            "grand-champion",
            "Grand Champion",
            "Score 3 stars on every level in the game",
            "mastery",
            500,
            Requirement::AllWorldsPerfect { total_stars: 240 },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_codes_are_unique() {
        let catalog = default_catalog();
        let codes: HashSet<&str> = catalog.iter().map(|a| a.code.as_str()).collect();
        assert_eq!(codes.len(), catalog.len());
    }

    #[test]
    fn test_full_game_star_cap_matches_world_count() {
        let catalog = default_catalog();
        let grand = catalog
            .iter()
            .find(|a| a.code == "grand-champion")
            .expect("Catalog entry missing");
        // 4 worlds of 20 levels at 3 stars each
        assert_eq!(
            grand.requirement,
            Requirement::AllWorldsPerfect { total_stars: 240 }
        );
    }
}

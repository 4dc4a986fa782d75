//! Difficulty tiers and rating arithmetic.
//!
//! The rated opponent's strength follows the player's own rating: the
//! nearest tier decides how deep the engine searches and how often its best
//! move is swapped for a random legal one.

use crate::types::{MoveRequest, OutcomeKind};
use rand::Rng;
use rand::seq::SliceRandom;

/// Rating every new profile starts with.
pub const INITIAL_RATING: i32 = 800;

/// Search depth used outside rated play.
pub const MAX_DEPTH: u8 = 20;

/// One step of the difficulty ladder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifficultyTier {
    pub name: &'static str,
    /// Representative rating of an opponent at this tier.
    pub rating: i32,
    pub depth: u8,
    /// Probability that the engine's best move is replaced by a random one.
    pub error_rate: f64,
}

const fn tier(name: &'static str, rating: i32, depth: u8, error_rate: f64) -> DifficultyTier {
    DifficultyTier {
        name,
        rating,
        depth,
        error_rate,
    }
}

/// The ladder, sorted by ascending rating.
pub static TIERS: &[DifficultyTier] = &[
    tier("Débutant 1", 250, 1, 0.7),
    tier("Débutant 2", 400, 2, 0.6),
    tier("Débutant 3", 550, 3, 0.5),
    tier("Débutant 4", 700, 4, 0.4),
    tier("Débutant 5", 850, 5, 0.35),
    tier("Intermédiaire 1", 1000, 6, 0.3),
    tier("Intermédiaire 2", 1100, 7, 0.28),
    tier("Intermédiaire 3", 1200, 8, 0.25),
    tier("Intermédiaire 4", 1300, 9, 0.22),
    tier("Intermédiaire 5", 1400, 10, 0.2),
    tier("Intermédiaire 6", 1500, 11, 0.18),
    tier("Avancé 1", 1600, 12, 0.15),
    tier("Avancé 2", 1700, 12, 0.12),
    tier("Avancé 3", 1800, 13, 0.1),
    tier("Avancé 4", 1900, 13, 0.08),
    tier("Expert 1", 2000, 14, 0.06),
    tier("Expert 2", 2100, 14, 0.05),
    tier("Expert 3", 2200, 15, 0.04),
    tier("Expert 4", 2300, 15, 0.03),
    tier("Maître 1", 2400, 16, 0.02),
    tier("Maître 2", 2500, 16, 0.015),
    tier("Grand Maître 1", 2600, 17, 0.01),
    tier("Grand Maître 2", 2700, 17, 0.005),
    tier("Grand Maître 3", 2900, 18, 0.002),
    tier("Maximum", 3200, 20, 0.0),
];

// ---------------------------------------------------------------------------
// Tier lookup
// ---------------------------------------------------------------------------

/// The tier whose representative rating is nearest to `rating`.
///
/// Ratings outside the ladder clamp to its ends; an exact midpoint between
/// two tiers picks the higher one.
pub fn tier_for_rating(rating: i32) -> &'static DifficultyTier {
    let mut best = &TIERS[0];
    for t in TIERS.iter() {
        if (t.rating - rating).abs() <= (best.rating - rating).abs() {
            best = t;
        }
    }
    best
}

/// The tier above `current`, or `None` at the top of the ladder.
pub fn next_tier(current: &DifficultyTier) -> Option<&'static DifficultyTier> {
    let idx = TIERS.iter().position(|t| t.name == current.name)?;
    TIERS.get(idx + 1)
}

/// Percentage (0 to 100) of the way from the player's tier to the next one.
pub fn progress_to_next_tier(rating: i32) -> u8 {
    let current = tier_for_rating(rating);
    let Some(next) = next_tier(current) else {
        return 100;
    };
    let span = (next.rating - current.rating) as f64;
    let pct = (rating - current.rating) as f64 / span * 100.0;
    pct.clamp(0.0, 100.0).round() as u8
}

/// Engine search depth for a game.
pub fn search_depth(rated: bool, tier: &DifficultyTier) -> u8 {
    if rated { tier.depth } else { MAX_DEPTH }
}

// ---------------------------------------------------------------------------
// Rating update
// ---------------------------------------------------------------------------

/// Logistic expectation of `player` scoring against `opponent`.
pub fn expected_score(player: i32, opponent: i32) -> f64 {
    1.0 / (1.0 + 10f64.powf((opponent - player) as f64 / 400.0))
}

/// Development coefficient: new players move faster.
pub fn k_factor(rating: i32) -> f64 {
    if rating < 1000 {
        16.0
    } else if rating < 1800 {
        12.0
    } else {
        8.0
    }
}

pub fn new_rating(rating: i32, opponent: i32, outcome: OutcomeKind) -> i32 {
    let delta = k_factor(rating) * (outcome.actual_score() - expected_score(rating, opponent));
    (rating as f64 + delta).round() as i32
}

// ---------------------------------------------------------------------------
// Move degradation
// ---------------------------------------------------------------------------

/// With probability `error_rate`, swaps `best` for a uniformly random
/// different legal move. Otherwise returns `best`.
pub fn degrade_move<R: Rng>(
    best: MoveRequest,
    error_rate: f64,
    legal_moves: &[MoveRequest],
    rng: &mut R,
) -> MoveRequest {
    if legal_moves.len() <= 1 || !rng.gen_bool(error_rate.clamp(0.0, 1.0)) {
        return best;
    }
    let others: Vec<MoveRequest> = legal_moves.iter().copied().filter(|m| *m != best).collect();
    match others.choose(rng) {
        Some(m) => {
            log::debug!("Degraded engine move {} -> {}", best, m);
            *m
        }
        None => best,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn mv(s: &str) -> MoveRequest {
        s.parse().unwrap()
    }

    #[test]
    fn test_table_shape() {
        assert_eq!(TIERS.len(), 25);
        assert_eq!(TIERS[0].rating, 250);
        assert_eq!(TIERS[24].rating, 3200);
        assert!(TIERS.windows(2).all(|w| w[0].rating < w[1].rating));
    }

    #[test]
    fn test_tier_for_rating_nearest() {
        assert_eq!(tier_for_rating(800).rating, 850);
        assert_eq!(tier_for_rating(INITIAL_RATING).name, "Débutant 5");
        assert_eq!(tier_for_rating(1040).rating, 1000);
        assert_eq!(tier_for_rating(2850).rating, 2900);
    }

    #[test]
    fn test_tier_for_rating_clamps_and_midpoint() {
        assert_eq!(tier_for_rating(0).rating, 250);
        assert_eq!(tier_for_rating(-50).rating, 250);
        assert_eq!(tier_for_rating(5000).rating, 3200);
        // 1050 sits exactly between 1000 and 1100.
        assert_eq!(tier_for_rating(1050).rating, 1100);
        assert_eq!(tier_for_rating(2800).rating, 2900);
    }

    #[test]
    fn test_new_rating() {
        assert_eq!(new_rating(1000, 1000, OutcomeKind::Draw), 1000);
        assert_eq!(new_rating(800, 800, OutcomeKind::Win), 808);
        assert_eq!(new_rating(800, 800, OutcomeKind::Loss), 792);
        assert_eq!(new_rating(2000, 2000, OutcomeKind::Win), 2004);
        assert!(new_rating(1500, 2500, OutcomeKind::Win) > 1511);
    }

    #[test]
    fn test_expected_score_symmetry() {
        let e = expected_score(1200, 1600);
        assert!((e + expected_score(1600, 1200) - 1.0).abs() < 1e-9);
        assert!(e < 0.1);
    }

    #[test]
    fn test_k_factor_thresholds() {
        assert_eq!(k_factor(999), 16.0);
        assert_eq!(k_factor(1000), 12.0);
        assert_eq!(k_factor(1799), 12.0);
        assert_eq!(k_factor(1800), 8.0);
    }

    #[test]
    fn test_progress_to_next_tier() {
        assert_eq!(progress_to_next_tier(850), 0);
        assert_eq!(progress_to_next_tier(1050), 0);
        assert_eq!(progress_to_next_tier(1120), 20);
        assert_eq!(progress_to_next_tier(3200), 100);
        assert_eq!(progress_to_next_tier(800), 0);
        assert!(next_tier(&TIERS[24]).is_none());
    }

    #[test]
    fn test_search_depth() {
        let t = tier_for_rating(1200);
        assert_eq!(search_depth(true, t), 8);
        assert_eq!(search_depth(false, t), MAX_DEPTH);
    }

    #[test]
    fn test_degrade_move_extremes() {
        let mut rng = StdRng::seed_from_u64(7);
        let best = mv("e2e4");
        let legal = vec![mv("e2e4"), mv("d2d4"), mv("g1f3")];

        for _ in 0..100 {
            assert_eq!(degrade_move(best, 0.0, &legal, &mut rng), best);
            let degraded = degrade_move(best, 1.0, &legal, &mut rng);
            assert_ne!(degraded, best);
            assert!(legal.contains(&degraded));
        }
        // A single legal move is always played.
        assert_eq!(degrade_move(best, 1.0, &[best], &mut rng), best);
    }

    #[test]
    fn test_degrade_move_rate() {
        let mut rng = StdRng::seed_from_u64(42);
        let best = mv("e2e4");
        let legal = vec![mv("e2e4"), mv("d2d4"), mv("c2c4"), mv("g1f3")];
        let swapped = (0..2000)
            .filter(|_| degrade_move(best, 0.3, &legal, &mut rng) != best)
            .count();
        assert!((500..700).contains(&swapped), "swapped {} of 2000", swapped);
    }
}

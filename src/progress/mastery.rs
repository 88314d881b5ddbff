//! Mastery arithmetic
//!
//! A rating `r` in 1..=5 maps to `(r - 1) / 4 * 100` percent. A card's mastery
//! is the weighted mean of its retained ratings with weights 1..=n, newest
//! heaviest. A deck's mastery averages card masteries over every card in the
//! deck, unstudied cards counting 0.

use std::collections::HashMap;

use uuid::Uuid;

use super::models::CardProgress;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Check a client-supplied rating.
pub fn validate_rating(rating: i64) -> Result<u8, String> {
    if !(MIN_RATING as i64..=MAX_RATING as i64).contains(&rating) {
        return Err(format!(
            "Rating must be an integer between {} and {}",
            MIN_RATING, MAX_RATING
        ));
    }
    Ok(rating as u8)
}

pub fn rating_to_percent(rating: u8) -> f64 {
    (f64::from(rating) - 1.0) / 4.0 * 100.0
}

/// Weighted mastery of one card's retained ratings, oldest first.
pub fn card_mastery(ratings: &[u8]) -> f64 {
    if ratings.is_empty() {
        return 0.0;
    }

    let (weighted, weights) = ratings
        .iter()
        .enumerate()
        .fold((0.0, 0.0), |(sum, total), (i, &rating)| {
            let weight = (i + 1) as f64;
            (sum + rating_to_percent(rating) * weight, total + weight)
        });
    weighted / weights
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Aggregate figures of a progress record over the deck's current cards
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeckStats {
    pub mastery_percentage: f64,
    pub average_rating: f64,
    pub cards_studied: u32,
}

/// Compute deck-level stats. Entries for cards no longer in the deck are ignored.
pub fn deck_stats(entries: &[CardProgress], deck_card_ids: &[Uuid]) -> DeckStats {
    if deck_card_ids.is_empty() {
        return DeckStats {
            mastery_percentage: 0.0,
            average_rating: 0.0,
            cards_studied: 0,
        };
    }

    let by_card: HashMap<Uuid, &CardProgress> = entries.iter().map(|e| (e.card_id, e)).collect();
    let studied: Vec<&CardProgress> = deck_card_ids.iter().filter_map(|id| by_card.get(id).copied()).collect();

    // Card figures are recomputed unrounded; only the deck figure is rounded
    let mastery_sum: f64 = studied.iter().map(|e| card_mastery(&e.ratings)).sum();
    let average_rating = if studied.is_empty() {
        0.0
    } else {
        studied.iter().map(|e| f64::from(e.last_rating)).sum::<f64>() / studied.len() as f64
    };

    DeckStats {
        mastery_percentage: round1(mastery_sum / deck_card_ids.len() as f64),
        average_rating: round1(average_rating),
        cards_studied: studied.len() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rating() {
        assert_eq!(validate_rating(1).unwrap(), 1);
        assert_eq!(validate_rating(5).unwrap(), 5);
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
    }

    #[test]
    fn test_rating_to_percent() {
        assert_eq!(rating_to_percent(1), 0.0);
        assert_eq!(rating_to_percent(3), 50.0);
        assert_eq!(rating_to_percent(5), 100.0);
    }

    #[test]
    fn test_card_mastery_weights_recent_ratings() {
        assert_eq!(card_mastery(&[]), 0.0);
        assert_eq!(card_mastery(&[5]), 100.0);
        // (0 * 1 + 100 * 2) / 3
        assert!((card_mastery(&[1, 5]) - 66.666).abs() < 0.01);
        // (100 * 1 + 0 * 2) / 3
        assert!((card_mastery(&[5, 1]) - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_deck_stats_counts_unstudied_cards_as_zero() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let gone = Uuid::new_v4();

        let mut studied = CardProgress::new(a);
        studied.ratings = vec![5];
        studied.last_rating = 5;
        studied.mastery = 100.0;
        let mut stale = CardProgress::new(gone);
        stale.ratings = vec![1];
        stale.last_rating = 1;

        let stats = deck_stats(&[studied, stale], &[a, b]);
        assert_eq!(stats.mastery_percentage, 50.0);
        assert_eq!(stats.average_rating, 5.0);
        assert_eq!(stats.cards_studied, 1);
    }

    #[test]
    fn test_deck_mastery_is_rounded_once() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut entry = CardProgress::new(a);
        entry.ratings = vec![1, 5];
        entry.last_rating = 5;
        entry.mastery = round1(card_mastery(&entry.ratings));

        // 66.666.. / 2, not 66.7 / 2
        assert_eq!(deck_stats(&[entry], &[a, b]).mastery_percentage, 33.3);
    }

    #[test]
    fn test_empty_deck() {
        let stats = deck_stats(&[], &[]);
        assert_eq!(stats.mastery_percentage, 0.0);
        assert_eq!(stats.cards_studied, 0);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(66.666), 66.7);
        assert_eq!(round1(33.333), 33.3);
    }
}

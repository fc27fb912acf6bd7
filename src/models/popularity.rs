//! Recommender that always picks the most popular eligible item.
//!
//! Popularity is the number of training ratings an item has. In learning
//! rounds every relevant reaction counts as one more rating.
use rand;
use rand::prng::XorShiftRng;
use rand::{Rng, SeedableRng};

use super::argmax_random_tie;
use feedback::Reaction;
use store::RatingStore;
use {FittingError, ItemId, Recommender, UserId};

/// Most-popular recommender with random tie-breaking.
#[derive(Clone, Debug)]
pub struct MostPopularRecommender {
    counts: Vec<usize>,
    rng: XorShiftRng,
}

impl MostPopularRecommender {
    /// Build a recommender for `num_items` items.
    pub fn new(num_items: usize) -> Self {
        MostPopularRecommender {
            counts: vec![0; num_items],
            rng: XorShiftRng::from_seed(rand::thread_rng().gen()),
        }
    }

    /// Set the random number generator used to break ties.
    pub fn rng(mut self, rng: XorShiftRng) -> Self {
        self.rng = rng;
        self
    }

    /// Set the random number generator from seed.
    pub fn from_seed(mut self, seed: [u8; 16]) -> Self {
        self.rng = XorShiftRng::from_seed(seed);
        self
    }

    /// Current popularity of every item.
    pub fn counts(&self) -> &[usize] {
        &self.counts
    }
}

impl Recommender for MostPopularRecommender {
    fn name(&self) -> &str {
        "most_popular"
    }

    fn train(&mut self, store: &RatingStore) -> Result<(), FittingError> {
        if self.counts.len() < store.num_items() {
            self.counts.resize(store.num_items(), 0);
        }

        for rating in store.iter_train() {
            self.counts[rating.item_id()] += 1;
        }

        Ok(())
    }

    fn score_and_select(&mut self, _user_id: UserId, eligible: &[ItemId]) -> Option<ItemId> {
        let counts = &self.counts;

        argmax_random_tie(eligible, &mut self.rng, |item_id| {
            counts.get(item_id).cloned().unwrap_or(0) as f64
        })
    }

    fn update(&mut self, _user_id: UserId, item_id: ItemId, reaction: &Reaction) {
        if reaction.feedback.is_relevant() {
            if let Some(count) = self.counts.get_mut(item_id) {
                *count += 1;
            }
        }
    }
}

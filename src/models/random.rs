//! Recommender choosing uniformly at random among the eligible items.
use rand;
use rand::prng::XorShiftRng;
use rand::{Rng, SeedableRng};

use feedback::Reaction;
use store::RatingStore;
use {FittingError, ItemId, Recommender, UserId};

/// Random recommender; a baseline that never learns.
#[derive(Clone, Debug)]
pub struct RandomRecommender {
    rng: XorShiftRng,
}

impl RandomRecommender {
    /// Build a recommender seeded from the thread rng.
    pub fn new() -> Self {
        RandomRecommender {
            rng: XorShiftRng::from_seed(rand::thread_rng().gen()),
        }
    }

    /// Set the random number generator.
    pub fn rng(mut self, rng: XorShiftRng) -> Self {
        self.rng = rng;
        self
    }

    /// Set the random number generator from seed.
    pub fn from_seed(mut self, seed: [u8; 16]) -> Self {
        self.rng = XorShiftRng::from_seed(seed);
        self
    }
}

impl Recommender for RandomRecommender {
    fn name(&self) -> &str {
        "random"
    }

    fn train(&mut self, _store: &RatingStore) -> Result<(), FittingError> {
        Ok(())
    }

    fn score_and_select(&mut self, _user_id: UserId, eligible: &[ItemId]) -> Option<ItemId> {
        self.rng.choose(eligible).cloned()
    }

    fn update(&mut self, _user_id: UserId, _item_id: ItemId, _reaction: &Reaction) {}
}

//! Recommender that picks the eligible item with the best mean reward.
//!
//! Means are Laplace-smoothed: an item with `count` ratings summing to `sum`
//! has value `(sum + alpha) / (count + alpha * delta)`, so an unrated item
//! starts at `1 / delta`.
use rand;
use rand::prng::XorShiftRng;
use rand::{Rng, SeedableRng};

use super::argmax_random_tie;
use feedback::Reaction;
use store::RatingStore;
use {FittingError, ItemId, Recommender, UserId};

/// Default smoothing numerator.
pub fn default_alpha() -> f64 {
    1.0
}

/// Default smoothing ratio: unrated items start at `1 / delta`.
pub fn default_delta() -> f64 {
    2.0
}

/// Most-valuable recommender with random tie-breaking.
#[derive(Clone, Debug)]
pub struct MostValuableRecommender {
    alpha: f64,
    delta: f64,
    means: Vec<f64>,
    counts: Vec<f64>,
    rng: XorShiftRng,
}

impl MostValuableRecommender {
    /// Build a recommender for `num_items` items with default smoothing.
    pub fn new(num_items: usize) -> Self {
        let alpha = default_alpha();
        let delta = default_delta();

        MostValuableRecommender {
            alpha,
            delta,
            means: vec![1.0 / delta; num_items],
            counts: vec![alpha * delta; num_items],
            rng: XorShiftRng::from_seed(rand::thread_rng().gen()),
        }
    }

    /// Set the smoothing parameters.
    pub fn smoothing(mut self, alpha: f64, delta: f64) -> Self {
        self.alpha = alpha;
        self.delta = delta;
        self.reset(self.means.len());
        self
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

    /// Current smoothed mean of every item.
    pub fn means(&self) -> &[f64] {
        &self.means
    }

    fn reset(&mut self, num_items: usize) {
        let prior = self.alpha * self.delta;
        let initial = if prior > 0.0 { self.alpha / prior } else { 0.0 };

        self.means = vec![initial; num_items];
        self.counts = vec![prior; num_items];
    }
}

impl Recommender for MostValuableRecommender {
    fn name(&self) -> &str {
        "most_valuable"
    }

    fn train(&mut self, store: &RatingStore) -> Result<(), FittingError> {
        if !(self.alpha >= 0.0 && self.delta > 0.0) {
            return Err(FittingError::InvalidHyperparameters(format!(
                "smoothing requires alpha >= 0 and delta > 0, got alpha={} delta={}",
                self.alpha, self.delta
            )));
        }

        let num_items = ::std::cmp::max(self.means.len(), store.num_items());
        let mut sums = vec![0.0; num_items];
        let mut counts = vec![0.0; num_items];

        for rating in store.iter_train() {
            sums[rating.item_id()] += f64::from(rating.rating());
            counts[rating.item_id()] += 1.0;
        }

        let prior = self.alpha * self.delta;
        self.means = izip!(&sums, &counts)
            .map(|(sum, count)| (sum + self.alpha) / (count + prior))
            .collect();
        self.counts = counts.iter().map(|count| count + prior).collect();

        Ok(())
    }

    fn score_and_select(&mut self, _user_id: UserId, eligible: &[ItemId]) -> Option<ItemId> {
        let means = &self.means;

        argmax_random_tie(eligible, &mut self.rng, |item_id| {
            means.get(item_id).cloned().unwrap_or(0.0)
        })
    }

    fn update(&mut self, _user_id: UserId, item_id: ItemId, reaction: &Reaction) {
        let reward = if reaction.feedback.is_relevant() { 1.0 } else { 0.0 };

        if let (Some(mean), Some(count)) = (self.means.get_mut(item_id), self.counts.get_mut(item_id)) {
            let old_count = *count;
            *count += 1.0;
            *mean = (*mean * old_count + reward) / *count;
        }
    }
}

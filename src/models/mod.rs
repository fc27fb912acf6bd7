//! Models module.
//!
//! Reference recommenders that can be plugged into a
//! [`Simulation`](../simulation/struct.Simulation.html).
pub mod bandit;
pub mod popularity;
pub mod random;
pub mod valuable;

use rand::Rng;

use config::seed_bytes;
use feedback::Thresholds;
use {ItemId, Recommender};

/// The recommender a configured simulation runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecommenderKind {
    /// Uniformly random choice.
    Random,
    /// Item with the most ratings.
    MostPopular,
    /// Item with the best smoothed mean reward.
    MostValuable {
        /// Smoothing numerator.
        #[serde(default = "valuable::default_alpha")]
        alpha: f64,
        /// Smoothing ratio.
        #[serde(default = "valuable::default_delta")]
        delta: f64,
    },
    /// Multi-armed bandit over items.
    ItemBandit {
        /// Arm selection policy.
        policy: bandit::Policy,
        /// Prior successes of every arm.
        #[serde(default)]
        alphas: f64,
        /// Prior failures of every arm.
        #[serde(default)]
        betas: f64,
        /// Count reactions without a signal as failures.
        #[serde(default)]
        unknown_as_failure: bool,
    },
}

impl RecommenderKind {
    /// Build the recommender for a catalogue of `num_items` items.
    /// `thresholds` decide how models reading raw training ratings tell
    /// successes from failures.
    pub fn build(
        &self,
        num_items: usize,
        seed: Option<u64>,
        thresholds: Thresholds,
    ) -> Box<dyn Recommender> {
        match *self {
            RecommenderKind::Random => {
                let model = random::RandomRecommender::new();
                Box::new(match seed {
                    Some(seed) => model.from_seed(seed_bytes(seed)),
                    None => model,
                })
            }
            RecommenderKind::MostPopular => {
                let model = popularity::MostPopularRecommender::new(num_items);
                Box::new(match seed {
                    Some(seed) => model.from_seed(seed_bytes(seed)),
                    None => model,
                })
            }
            RecommenderKind::MostValuable { alpha, delta } => {
                let model = valuable::MostValuableRecommender::new(num_items).smoothing(alpha, delta);
                Box::new(match seed {
                    Some(seed) => model.from_seed(seed_bytes(seed)),
                    None => model,
                })
            }
            RecommenderKind::ItemBandit {
                ref policy,
                alphas,
                betas,
                unknown_as_failure,
            } => {
                let hyper = bandit::Hyperparameters::new(num_items)
                    .policy(policy.clone())
                    .priors(alphas, betas)
                    .unknown_as_failure(unknown_as_failure)
                    .thresholds(thresholds);
                Box::new(match seed {
                    Some(seed) => hyper.from_seed(seed_bytes(seed)),
                    None => hyper,
                }.build())
            }
        }
    }
}

/// Pick uniformly among the items sharing the highest score.
fn argmax_random_tie<R, F>(eligible: &[ItemId], rng: &mut R, score: F) -> Option<ItemId>
where
    R: Rng,
    F: Fn(ItemId) -> f64,
{
    let mut best = ::std::f64::NEG_INFINITY;
    let mut ties = Vec::new();

    for &item_id in eligible {
        let value = score(item_id);

        if value > best {
            best = value;
            ties.clear();
            ties.push(item_id);
        } else if value == best {
            ties.push(item_id);
        }
    }

    match ties.len() {
        0 => None,
        1 => Some(ties[0]),
        len => Some(ties[rng.gen_range(0, len)]),
    }
}

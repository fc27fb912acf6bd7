//! Multi-armed bandit whose arms are the items of the catalogue.
//!
//! Every arm keeps a Beta-Bernoulli estimate of its reward: `alphas` count
//! successes, `betas` count failures and the estimate is
//! `alpha / (alpha + beta)`. Each pull is restricted to the arms a user is
//! still eligible for, so the same item is never pulled twice for the same
//! user unless repetition is allowed.
//!
//! A relevant reaction is a success and an anti-relevant reaction a failure.
//! Reactions carrying no signal are ignored, or counted as failures when
//! `unknown_as_failure` is set.
use rand;
use rand::distributions::{Distribution, Gamma};
use rand::prng::XorShiftRng;
use rand::{Rng, SeedableRng};

use super::argmax_random_tie;
use feedback::{Feedback, Reaction, Thresholds};
use store::RatingStore;
use {FittingError, ItemId, Recommender, UserId};

/// Arm selection policy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// Always the best estimate.
    Greedy,
    /// A random arm with probability `epsilon`, the best estimate otherwise.
    EpsilonGreedy {
        /// Exploration probability, within `[0, 1]`.
        epsilon: f64,
    },
    /// A random arm.
    Random,
    /// The arm with the highest draw from `Beta(alpha + 1, beta + 1)`.
    ThompsonSampling,
    /// UCB1. A negative `delta` grows with time as `1 + t * ln(t)^2`.
    Ucb {
        /// Exploration weight.
        delta: f64,
    },
}

/// Hyperparameters describing the item bandit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Hyperparameters {
    num_items: usize,
    policy: Policy,
    alphas: f64,
    betas: f64,
    unknown_as_failure: bool,
    thresholds: Thresholds,
    seed: Option<[u8; 16]>,
}

impl Hyperparameters {
    /// Build new hyperparameters.
    pub fn new(num_items: usize) -> Self {
        Hyperparameters {
            num_items,
            policy: Policy::EpsilonGreedy { epsilon: 0.2 },
            alphas: 0.0,
            betas: 0.0,
            unknown_as_failure: false,
            thresholds: Thresholds::default(),
            seed: None,
        }
    }

    /// Set the arm selection policy.
    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the initial success and failure counts of every arm.
    pub fn priors(mut self, alphas: f64, betas: f64) -> Self {
        self.alphas = alphas;
        self.betas = betas;
        self
    }

    /// Count reactions without a signal as failures.
    pub fn unknown_as_failure(mut self, unknown_as_failure: bool) -> Self {
        self.unknown_as_failure = unknown_as_failure;
        self
    }

    /// Set the thresholds used to read training ratings as successes
    /// and failures.
    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the random number generator from seed.
    pub fn from_seed(mut self, seed: [u8; 16]) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<(), FittingError> {
        if !(self.alphas >= 0.0 && self.betas >= 0.0) {
            return Err(FittingError::InvalidHyperparameters(format!(
                "priors must be non-negative, got alphas={} betas={}",
                self.alphas, self.betas
            )));
        }

        if let Policy::EpsilonGreedy { epsilon } = self.policy {
            if !(epsilon >= 0.0 && epsilon <= 1.0) {
                return Err(FittingError::InvalidHyperparameters(format!(
                    "epsilon must be within [0, 1], got {}",
                    epsilon
                )));
            }
        }

        Ok(())
    }

    /// Build the item bandit.
    pub fn build(self) -> ItemBandit {
        let rng = match self.seed {
            Some(seed) => XorShiftRng::from_seed(seed),
            None => XorShiftRng::from_seed(rand::thread_rng().gen()),
        };
        let mut bandit = ItemBandit {
            hyper: self,
            arms: Arms::default(),
            rng,
        };
        bandit.reset();

        bandit
    }
}

#[derive(Clone, Debug, Default)]
struct Arms {
    num_pulls: Vec<usize>,
    alphas: Vec<f64>,
    betas: Vec<f64>,
    estimates: Vec<f64>,
    total_reward: f64,
    // 1-based pull counter.
    t: usize,
}

/// Item bandit recommender. Not personalised: all users share the arms.
#[derive(Clone, Debug)]
pub struct ItemBandit {
    hyper: Hyperparameters,
    arms: Arms,
    rng: XorShiftRng,
}

impl ItemBandit {
    /// Return every arm to its prior.
    pub fn reset(&mut self) {
        let num_items = self.hyper.num_items;
        let (alpha0, beta0) = (self.hyper.alphas, self.hyper.betas);
        let initial = if alpha0 > 0.0 {
            alpha0 / (alpha0 + beta0)
        } else {
            0.0
        };

        self.arms = Arms {
            num_pulls: vec![0; num_items],
            alphas: vec![alpha0; num_items],
            betas: vec![beta0; num_items],
            estimates: vec![initial; num_items],
            total_reward: 0.0,
            t: 1,
        };
    }

    /// Current reward estimate of every arm.
    pub fn estimates(&self) -> &[f64] {
        &self.arms.estimates
    }

    /// Number of pulls of every arm, training included.
    pub fn num_pulls(&self) -> &[usize] {
        &self.arms.num_pulls
    }

    /// Successes observed so far, training included.
    pub fn total_reward(&self) -> f64 {
        self.arms.total_reward
    }

    fn choose(&mut self, available: &[ItemId]) -> Option<ItemId> {
        if available.is_empty() {
            return None;
        }

        let arms = &self.arms;
        let rng = &mut self.rng;

        match self.hyper.policy {
            Policy::Random => rng.choose(available).cloned(),
            Policy::Greedy => argmax_random_tie(available, rng, |arm| arms.estimates[arm]),
            Policy::EpsilonGreedy { epsilon } => {
                if rng.gen::<f64>() < epsilon {
                    rng.choose(available).cloned()
                } else {
                    argmax_random_tie(available, rng, |arm| arms.estimates[arm])
                }
            }
            Policy::ThompsonSampling => {
                let draws: Vec<f64> = available
                    .iter()
                    .map(|&arm| beta_sample(arms.alphas[arm] + 1.0, arms.betas[arm] + 1.0, &mut *rng))
                    .collect();
                let best = argmax_random_tie(
                    &(0..available.len()).collect::<Vec<_>>(),
                    rng,
                    |idx| draws[idx],
                );

                best.map(|idx| available[idx])
            }
            Policy::Ucb { delta } => {
                let unpulled: Vec<ItemId> = available
                    .iter()
                    .cloned()
                    .filter(|&arm| arms.num_pulls[arm] == 0)
                    .collect();

                if !unpulled.is_empty() {
                    return rng.choose(&unpulled).cloned();
                }

                let t = arms.t as f64;
                let delta = if delta < 0.0 {
                    1.0 + t * t.ln().powi(2)
                } else {
                    delta
                };

                argmax_random_tie(available, rng, |arm| {
                    arms.estimates[arm] + (delta * t.ln() / arms.num_pulls[arm] as f64).sqrt()
                })
            }
        }
    }

    /// Register a pull of `arm` made outside of the policy.
    fn pull_fixed_arm(&mut self, arm: ItemId) {
        self.arms.num_pulls[arm] += 1;
        self.arms.t += 1;
    }

    fn update_rewards(&mut self, arm: ItemId, feedback: Option<Feedback>) {
        let arms = &mut self.arms;

        match feedback {
            Some(Feedback::Relevant) => {
                arms.alphas[arm] += 1.0;
                arms.total_reward += 1.0;
            }
            Some(Feedback::AntiRelevant) => arms.betas[arm] += 1.0,
            _ if self.hyper.unknown_as_failure => arms.betas[arm] += 1.0,
            _ => return,
        }

        let total = arms.alphas[arm] + arms.betas[arm];
        arms.estimates[arm] = if total > 0.0 {
            arms.alphas[arm] / total
        } else {
            0.0
        };
    }
}

fn beta_sample<R: Rng>(alpha: f64, beta: f64, rng: &mut R) -> f64 {
    let x = Gamma::new(alpha, 1.0).sample(rng);
    let y = Gamma::new(beta, 1.0).sample(rng);

    x / (x + y)
}

impl Recommender for ItemBandit {
    fn name(&self) -> &str {
        "item_bandit"
    }

    /// Replay the training subset as pulls of the rated items, reading each
    /// rating through the configured thresholds.
    fn train(&mut self, store: &RatingStore) -> Result<(), FittingError> {
        self.hyper.validate()?;

        if self.hyper.num_items < store.num_items() {
            self.hyper.num_items = store.num_items();
            self.reset();
        }

        for rating in store.iter_train() {
            let item_id = rating.item_id();
            let feedback = match self.hyper.thresholds.classify(Some(rating.rating())) {
                Feedback::Irrelevant => None,
                feedback => Some(feedback),
            };

            self.pull_fixed_arm(item_id);
            self.update_rewards(item_id, feedback);
        }

        Ok(())
    }

    fn score_and_select(&mut self, _user_id: UserId, eligible: &[ItemId]) -> Option<ItemId> {
        let arm = self.choose(eligible)?;

        self.pull_fixed_arm(arm);

        Some(arm)
    }

    fn update(&mut self, _user_id: UserId, item_id: ItemId, reaction: &Reaction) {
        let feedback = match reaction.feedback {
            Feedback::Irrelevant => None,
            feedback => Some(feedback),
        };

        self.update_rewards(item_id, feedback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data::{Rating, Ratings};

    fn store() -> RatingStore {
        let train = Ratings::from(vec![
            Rating::new(0, 0, 1.0, 0),
            Rating::new(1, 0, 1.0, 0),
            Rating::new(2, 1, -1.0, 0),
            Rating::new(3, 2, 0.0, 0),
        ]);

        RatingStore::new(&train, &Ratings::new(4, 4))
    }

    fn trained(policy: Policy) -> ItemBandit {
        let mut bandit = Hyperparameters::new(4)
            .policy(policy)
            .from_seed([42; 16])
            .build();
        bandit.train(&store()).unwrap();

        bandit
    }

    #[test]
    fn training_replays_fixed_pulls() {
        let bandit = trained(Policy::Greedy);

        assert_eq!(bandit.num_pulls(), &[2, 1, 1, 0]);
        assert_eq!(bandit.estimates(), &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(bandit.total_reward(), 2.0);
    }

    #[test]
    fn greedy_exploits_the_best_arm() {
        let mut bandit = trained(Policy::Greedy);

        assert_eq!(bandit.score_and_select(0, &[0, 1, 2, 3]), Some(0));
        assert_eq!(bandit.num_pulls()[0], 3);
    }

    #[test]
    fn pulls_are_restricted_to_eligible_arms() {
        for policy in vec![
            Policy::Greedy,
            Policy::Random,
            Policy::EpsilonGreedy { epsilon: 0.5 },
            Policy::ThompsonSampling,
            Policy::Ucb { delta: 2.0 },
            Policy::Ucb { delta: -1.0 },
        ] {
            let mut bandit = trained(policy);

            for _ in 0..20 {
                let arm = bandit.score_and_select(0, &[1, 3]).unwrap();
                assert!(arm == 1 || arm == 3);
            }
            assert_eq!(bandit.score_and_select(0, &[]), None);
        }
    }

    #[test]
    fn ucb_pulls_unexplored_arms_first() {
        let mut bandit = trained(Policy::Ucb { delta: 2.0 });

        assert_eq!(bandit.score_and_select(0, &[0, 1, 3]), Some(3));
    }

    #[test]
    fn reactions_update_the_pulled_arm() {
        let mut bandit = trained(Policy::Greedy);

        let arm = bandit.score_and_select(0, &[1]).unwrap();
        bandit.update(
            0,
            arm,
            &Reaction {
                rating: Some(1.0),
                feedback: Feedback::Relevant,
            },
        );
        assert_eq!(bandit.estimates()[arm], 0.5);

        bandit.update(
            0,
            3,
            &Reaction {
                rating: None,
                feedback: Feedback::Irrelevant,
            },
        );
        assert_eq!(bandit.estimates()[3], 0.0);
        assert_eq!(bandit.num_pulls()[3], 0);
    }

    #[test]
    fn unknown_reactions_can_count_as_failures() {
        let mut bandit = Hyperparameters::new(4)
            .policy(Policy::Greedy)
            .priors(1.0, 1.0)
            .unknown_as_failure(true)
            .from_seed([42; 16])
            .build();
        bandit.train(&store()).unwrap();

        bandit.update(
            0,
            3,
            &Reaction {
                rating: None,
                feedback: Feedback::Irrelevant,
            },
        );

        assert!((bandit.estimates()[3] - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn training_ratings_follow_the_thresholds() {
        let train = Ratings::from(vec![
            Rating::new(0, 0, 5.0, 0),
            Rating::new(1, 0, 4.0, 0),
            Rating::new(2, 1, 1.0, 0),
            Rating::new(3, 2, 3.0, 0),
        ]);
        let store = RatingStore::new(&train, &Ratings::new(4, 4));

        let mut bandit = Hyperparameters::new(4)
            .policy(Policy::Greedy)
            .thresholds(Thresholds::new(3.0, 2.0).unwrap())
            .from_seed([42; 16])
            .build();
        bandit.train(&store).unwrap();

        assert_eq!(bandit.estimates(), &[1.0, 0.0, 0.0, 0.0]);
        assert_eq!(bandit.total_reward(), 2.0);
        assert_eq!(bandit.num_pulls(), &[2, 1, 1, 0]);

        // With the sign rule every rating on a 1-5 scale is a success.
        let mut signed = Hyperparameters::new(4)
            .policy(Policy::Greedy)
            .from_seed([42; 16])
            .build();
        signed.train(&store).unwrap();

        assert_eq!(signed.total_reward(), 4.0);
    }

    #[test]
    fn invalid_epsilon_fails_training() {
        let mut bandit = Hyperparameters::new(4)
            .policy(Policy::EpsilonGreedy { epsilon: 1.5 })
            .build();

        assert!(bandit.train(&store()).is_err());
    }
}

#![deny(missing_docs)]
//! # cyclorec
//!
//! `cyclorec` simulates repeated recommendation cycles against a held-out
//! set of ratings. Every round, each user who can still be recommended
//! something receives exactly one item; the outcome is looked up in the test
//! partition and classified as relevant, anti-relevant or irrelevant, and
//! cumulative quality metrics are updated as the simulation proceeds.
//!
//! ## Example
//! Run ten learning rounds of a most-popular recommender on a toy dataset:
//!
//! ```rust
//! # extern crate cyclorec;
//! # extern crate rand;
//! # use rand::{SeedableRng, prng::XorShiftRng};
//! use cyclorec::data::{train_test_split, Rating, Ratings};
//! use cyclorec::feedback::Thresholds;
//! use cyclorec::models::popularity::MostPopularRecommender;
//! use cyclorec::simulation::Simulation;
//! use cyclorec::store::RatingStore;
//!
//! let mut data = Ratings::from(
//!     (0..20)
//!         .flat_map(|user| (0..10).map(move |item| {
//!             let rating = if (user + item) % 3 == 0 { 1.0 } else { -1.0 };
//!             Rating::new(user, item, rating, 0)
//!         }))
//!         .collect::<Vec<_>>(),
//! );
//!
//! let mut rng = XorShiftRng::from_seed([42; 16]);
//! let (train, test) = train_test_split(&mut data, &mut rng, 0.5);
//! let store = RatingStore::new(&train, &test);
//!
//! let model = MostPopularRecommender::new(store.num_items()).from_seed([7; 16]);
//! let mut simulation = Simulation::new(store, model, Thresholds::default());
//!
//! let output = simulation.recommendation_round_loop(10, false, true).unwrap();
//! let metrics = output.metrics.unwrap();
//!
//! println!(
//!     "{} recommendations, final recall {}",
//!     output.events.len(),
//!     metrics.last().map_or(0.0, |row| row.recall)
//! );
//! ```
#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate itertools;

#[cfg(feature = "csv")]
extern crate csv;
#[macro_use]
extern crate failure;
extern crate ndarray;
extern crate rand;
extern crate rayon;
extern crate serde;
extern crate serde_json;
extern crate siphasher;
#[macro_use]
extern crate tracing;

#[cfg(test)]
#[macro_use]
extern crate proptest;

pub mod config;
pub mod data;
#[cfg(feature = "csv")]
pub mod datasets;
pub mod evaluation;
pub mod feedback;
pub mod models;
pub mod simulation;
pub mod store;
pub mod tracker;

use feedback::Reaction;
use store::RatingStore;

/// Alias for user indices.
pub type UserId = usize;
/// Alias for item indices.
pub type ItemId = usize;
/// Alias for timestamps.
pub type Timestamp = usize;

/// Model fitting error types.
#[derive(Debug, Fail)]
pub enum FittingError {
    /// The model needs training interactions but none were supplied.
    #[fail(display = "No interactions to fit the model on.")]
    NoInteractions,
    /// Hyperparameters outside of their valid range.
    #[fail(display = "Invalid hyperparameters: {}", _0)]
    InvalidHyperparameters(String),
}

/// Simulation error types.
#[derive(Debug, Fail)]
pub enum SimulationError {
    /// No user can receive a further recommendation.
    #[fail(display = "All the possible recommendations have been made.")]
    SystemFull,
    /// The user does not exist in the rating store.
    #[fail(display = "Unknown user: {}.", _0)]
    UnknownUser(UserId),
    /// The recommender has already been trained for this simulation.
    #[fail(display = "The recommender has already been trained.")]
    AlreadyTrained,
    /// The recommender selected an item it was not offered.
    #[fail(
        display = "Item {} is not eligible for user {}.",
        item_id,
        user_id
    )]
    InvalidSelection {
        /// The user being recommended.
        user_id: UserId,
        /// The offending item.
        item_id: ItemId,
    },
    /// Training the recommender failed.
    #[fail(display = "Failed to train the recommender: {}", _0)]
    Fitting(#[cause] FittingError),
}

impl From<FittingError> for SimulationError {
    fn from(error: FittingError) -> Self {
        SimulationError::Fitting(error)
    }
}

/// Trait describing recommenders that can be driven through a cyclic
/// simulation.
///
/// The simulation never inspects a recommender's internals: it trains it
/// once, offers it the items a user is still eligible for, and, in learning
/// rounds, reports back the simulated reaction.
pub trait Recommender {
    /// Short, human-readable name of the recommender.
    fn name(&self) -> &str;
    /// Fit the recommender on the training partition. Called at most once,
    /// before any recommendation is made.
    fn train(&mut self, store: &RatingStore) -> Result<(), FittingError>;
    /// Choose one of `eligible` (sorted, non-empty) for `user_id`, or `None`
    /// if the recommender declines to recommend.
    fn score_and_select(&mut self, user_id: UserId, eligible: &[ItemId]) -> Option<ItemId>;
    /// Learn from the reaction to a recommendation.
    fn update(&mut self, user_id: UserId, item_id: ItemId, reaction: &Reaction);
    /// Hook called once per completed round of a learning loop.
    fn epoch_update(&mut self) {}
}

impl<R: Recommender + ?Sized> Recommender for Box<R> {
    fn name(&self) -> &str {
        (**self).name()
    }
    fn train(&mut self, store: &RatingStore) -> Result<(), FittingError> {
        (**self).train(store)
    }
    fn score_and_select(&mut self, user_id: UserId, eligible: &[ItemId]) -> Option<ItemId> {
        (**self).score_and_select(user_id, eligible)
    }
    fn update(&mut self, user_id: UserId, item_id: ItemId, reaction: &Reaction) {
        (**self).update(user_id, item_id, reaction)
    }
    fn epoch_update(&mut self) {
        (**self).epoch_update()
    }
}

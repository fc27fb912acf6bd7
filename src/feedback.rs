//! Classification of simulated user reactions.
//!
//! A raw rating found in the test partition is mapped to one of three
//! discrete classes using a pair of thresholds: ratings strictly above the
//! relevance threshold are relevant, ratings strictly below the
//! anti-relevance threshold are anti-relevant and everything in between is
//! irrelevant. A `(user, item)` pair with no test rating produces no
//! reaction at all, which is also irrelevant.
use config::ConfigError;
use store::RatingStore;
use {ItemId, UserId};

/// Discrete feedback class of a recommendation outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feedback {
    /// Positive reaction.
    Relevant,
    /// Negative reaction.
    AntiRelevant,
    /// Neutral reaction, or no reaction observed.
    Irrelevant,
}

impl Feedback {
    /// Whether this is `Relevant`.
    pub fn is_relevant(&self) -> bool {
        *self == Feedback::Relevant
    }
}

/// Thresholds mapping raw rating values to feedback classes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    relevance: f32,
    anti_relevance: f32,
}

impl Default for Thresholds {
    /// Sign rule: positive is relevant, negative anti-relevant, zero irrelevant.
    fn default() -> Self {
        Thresholds {
            relevance: 0.0,
            anti_relevance: 0.0,
        }
    }
}

impl Thresholds {
    /// Fails if `anti_relevance` exceeds `relevance`, since a rating could
    /// then belong to both classes.
    pub fn new(relevance: f32, anti_relevance: f32) -> Result<Self, ConfigError> {
        if !(anti_relevance <= relevance) {
            return Err(ConfigError::InvalidThresholds {
                relevance,
                anti_relevance,
            });
        }

        Ok(Thresholds {
            relevance,
            anti_relevance,
        })
    }

    /// Ratings strictly above this are relevant.
    pub fn relevance(&self) -> f32 {
        self.relevance
    }

    /// Ratings strictly below this are anti-relevant.
    pub fn anti_relevance(&self) -> f32 {
        self.anti_relevance
    }

    /// Classify a rating, `None` meaning no rating exists.
    pub fn classify(&self, rating: Option<f32>) -> Feedback {
        match rating {
            Some(value) if value > self.relevance => Feedback::Relevant,
            Some(value) if value < self.anti_relevance => Feedback::AntiRelevant,
            _ => Feedback::Irrelevant,
        }
    }
}

/// Simulated reaction to a single recommendation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    /// Raw test rating, `None` if the pair is absent from the test partition.
    pub rating: Option<f32>,
    /// Class of the reaction.
    pub feedback: Feedback,
}

impl Reaction {
    /// No test rating exists for the pair.
    pub fn is_unknown(&self) -> bool {
        self.rating.is_none()
    }
}

/// Resolves reactions against the test partition of a rating store.
#[derive(Clone, Copy, Debug, Default)]
pub struct FeedbackClassifier {
    thresholds: Thresholds,
}

impl FeedbackClassifier {
    /// Classifier using `thresholds`.
    pub fn new(thresholds: Thresholds) -> Self {
        FeedbackClassifier { thresholds }
    }

    /// Return the thresholds in use.
    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Resolve the reaction of `user_id` to `item_id`.
    pub fn classify(&self, store: &RatingStore, user_id: UserId, item_id: ItemId) -> Reaction {
        let rating = store.test_rating(user_id, item_id);

        Reaction {
            rating,
            feedback: self.thresholds.classify(rating),
        }
    }
}

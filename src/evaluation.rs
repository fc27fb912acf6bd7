//! Streaming computation of simulation quality metrics.
//!
//! Recall and fallout are cumulative over the whole simulated history:
//! total hits (misses) so far divided by the number of relevant
//! (anti-relevant) ratings available in the test subset. Precision,
//! antiprecision and discovery are computed per round and reported as the
//! mean over all elapsed rounds. Every ratio is `0.0` when its denominator
//! is zero.
use rayon::prelude::*;

use feedback::{Feedback, FeedbackClassifier};
use store::RatingStore;
use {ItemId, UserId};

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Raw outcome counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricCounters {
    /// Recommendations made.
    pub recommendations: usize,
    /// Relevant outcomes.
    pub hits: usize,
    /// Anti-relevant outcomes.
    pub misses: usize,
    /// Recommendations of items never before shown to any user.
    pub discoveries: usize,
}

impl MetricCounters {
    fn add(&mut self, other: &MetricCounters) {
        self.recommendations += other.recommendations;
        self.hits += other.hits;
        self.misses += other.misses;
        self.discoveries += other.discoveries;
    }

    /// Hits over recommendations.
    pub fn precision(&self) -> f64 {
        ratio(self.hits, self.recommendations)
    }

    /// Misses over recommendations.
    pub fn antiprecision(&self) -> f64 {
        ratio(self.misses, self.recommendations)
    }

    /// Discoveries over recommendations.
    pub fn discovery(&self) -> f64 {
        ratio(self.discoveries, self.recommendations)
    }
}

/// Relevant and anti-relevant ratings present in the test subset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Available {
    /// Test ratings classified relevant.
    pub positives: usize,
    /// Test ratings classified anti-relevant.
    pub negatives: usize,
}

/// One row of the metrics table.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricsRow {
    /// 1-based round index, or the number of closed rounds for a snapshot.
    pub round: usize,
    /// Cumulative hits over available positives.
    pub recall: f64,
    /// Mean per-round precision.
    pub precision: f64,
    /// Cumulative misses over available negatives.
    pub fallout: f64,
    /// Mean per-round antiprecision.
    pub antiprecision: f64,
    /// Mean per-round discovery rate.
    pub discovering: f64,
}

/// Cumulative metrics of a single user.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserMetrics {
    /// Id of the user.
    pub user_id: UserId,
    /// Raw counts.
    pub counters: MetricCounters,
    /// Positives and negatives in the user's test ratings.
    pub available: Available,
    /// Hits over the user's available positives.
    pub recall: f64,
    /// Hits over the user's recommendations.
    pub precision: f64,
    /// Misses over the user's available negatives.
    pub fallout: f64,
    /// Misses over the user's recommendations.
    pub antiprecision: f64,
}

/// Running metric counters, global and per user.
#[derive(Clone, Debug)]
pub struct MetricsAccumulator {
    available: Available,
    user_available: Vec<Available>,
    user_counters: Vec<MetricCounters>,
    cumulative: MetricCounters,
    rounds: Vec<MetricCounters>,
    current: Option<MetricCounters>,
    presented: Vec<bool>,
    precision_sum: f64,
    antiprecision_sum: f64,
    discovery_sum: f64,
}

impl MetricsAccumulator {
    /// Count the relevant and anti-relevant test ratings of every user.
    pub fn new(store: &RatingStore, classifier: &FeedbackClassifier) -> Self {
        let thresholds = classifier.thresholds();

        let user_available: Vec<Available> = store
            .users()
            .collect::<Vec<_>>()
            .par_iter()
            .map(|&user_id| {
                store
                    .test_ratings(user_id)
                    .fold(Available::default(), |mut available, (_, rating)| {
                        match thresholds.classify(Some(rating)) {
                            Feedback::Relevant => available.positives += 1,
                            Feedback::AntiRelevant => available.negatives += 1,
                            Feedback::Irrelevant => {}
                        }
                        available
                    })
            })
            .collect();

        let available = user_available
            .iter()
            .fold(Available::default(), |mut total, user| {
                total.positives += user.positives;
                total.negatives += user.negatives;
                total
            });

        MetricsAccumulator {
            available,
            user_counters: vec![MetricCounters::default(); user_available.len()],
            user_available,
            cumulative: MetricCounters::default(),
            rounds: Vec::new(),
            current: None,
            presented: vec![false; store.num_items()],
            precision_sum: 0.0,
            antiprecision_sum: 0.0,
            discovery_sum: 0.0,
        }
    }

    /// Relevant and anti-relevant test ratings over all users.
    pub fn available(&self) -> Available {
        self.available
    }

    /// Counters summed over every recorded recommendation.
    pub fn cumulative(&self) -> &MetricCounters {
        &self.cumulative
    }

    /// Counters of every closed round, oldest first.
    pub fn rounds(&self) -> &[MetricCounters] {
        &self.rounds
    }

    /// Number of closed rounds.
    pub fn num_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Open a new round. An unclosed previous round is discarded.
    pub fn begin_round(&mut self) {
        self.current = Some(MetricCounters::default());
    }

    /// Count one recommendation in the open round.
    pub fn record(&mut self, user_id: UserId, item_id: ItemId, feedback: Feedback) {
        let mut counters = MetricCounters {
            recommendations: 1,
            ..MetricCounters::default()
        };

        match feedback {
            Feedback::Relevant => counters.hits = 1,
            Feedback::AntiRelevant => counters.misses = 1,
            Feedback::Irrelevant => {}
        }

        if let Some(presented) = self.presented.get_mut(item_id) {
            if !*presented {
                *presented = true;
                counters.discoveries = 1;
            }
        }

        if let Some(user) = self.user_counters.get_mut(user_id) {
            user.add(&counters);
        }
        self.cumulative.add(&counters);
        self.current
            .get_or_insert_with(MetricCounters::default)
            .add(&counters);
    }

    /// Close the open round and report the metrics after it.
    pub fn end_round(&mut self, round: usize) -> MetricsRow {
        let counters = self.current.take().unwrap_or_default();

        self.precision_sum += counters.precision();
        self.antiprecision_sum += counters.antiprecision();
        self.discovery_sum += counters.discovery();
        self.rounds.push(counters);

        self.row(round)
    }

    /// Metrics over the closed rounds, without closing the open one.
    pub fn snapshot(&self) -> MetricsRow {
        let round = self.rounds.len();
        self.row(round)
    }

    fn row(&self, round: usize) -> MetricsRow {
        let elapsed = self.rounds.len().max(1) as f64;

        MetricsRow {
            round,
            recall: ratio(self.cumulative.hits, self.available.positives),
            precision: self.precision_sum / elapsed,
            fallout: ratio(self.cumulative.misses, self.available.negatives),
            antiprecision: self.antiprecision_sum / elapsed,
            discovering: self.discovery_sum / elapsed,
        }
    }

    /// Cumulative metrics of a single user, `None` if out of range.
    pub fn user_metrics(&self, user_id: UserId) -> Option<UserMetrics> {
        let counters = *self.user_counters.get(user_id)?;
        let available = self.user_available[user_id];

        Some(UserMetrics {
            user_id,
            counters,
            available,
            recall: ratio(counters.hits, available.positives),
            precision: counters.precision(),
            fallout: ratio(counters.misses, available.negatives),
            antiprecision: counters.antiprecision(),
        })
    }
}

//! Cyclic simulation of recommendation rounds.
//!
//! A [`Simulation`](struct.Simulation.html) owns the rating store, the
//! per-user candidate state, the metric counters and the log of every
//! recommendation made so far. Each round offers every user who is not full
//! exactly one recommendation, in user-id order, and resolves the reaction
//! against the test subset. Learning rounds report the reaction back to the
//! recommender, straight rounds do not.
//!
//! State is never reset: calling a loop twice continues from where the
//! previous call stopped, and round indices keep increasing.
use failure;

use config::SimulationConfig;
use evaluation::{MetricsAccumulator, MetricsRow, UserMetrics};
use feedback::{FeedbackClassifier, Thresholds};
use store::RatingStore;
use tracker::CandidateTracker;
use {ItemId, Recommender, SimulationError, UserId};

const PROGRESS_STEP: usize = 20;

/// A single recommendation made during the simulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecommendationEvent {
    /// 1-based index of the round the recommendation was made in.
    pub round: usize,
    /// User recommended to.
    pub user_id: UserId,
    /// Item recommended.
    pub item_id: ItemId,
}

/// Progress of a multi-round loop, reported at every 20% milestone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Iterations completed.
    pub completed: usize,
    /// Iterations requested.
    pub total: usize,
    /// Milestone reached, a multiple of 20.
    pub percent: usize,
}

/// Outcome of a single round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoundOutput {
    /// 1-based index of the round.
    pub round: usize,
    /// Recommendations made, in user order.
    pub recommendations: Vec<RecommendationEvent>,
    /// Metrics after the round, if requested.
    pub metrics: Option<MetricsRow>,
}

/// Outcome of a loop of rounds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LoopOutput {
    /// Recommendations made, in order.
    pub events: Vec<RecommendationEvent>,
    /// One row per completed round, if requested.
    pub metrics: Option<Vec<MetricsRow>>,
}

/// Stateful recommendation simulation.
pub struct Simulation<R: Recommender> {
    store: RatingStore,
    classifier: FeedbackClassifier,
    tracker: CandidateTracker,
    metrics: MetricsAccumulator,
    recommender: R,
    log: Vec<RecommendationEvent>,
    trained: bool,
    round: usize,
    progress: Option<Box<dyn FnMut(&Progress)>>,
}

impl Simulation<Box<dyn Recommender>> {
    /// Build the simulation described by `config` on top of `store`.
    pub fn from_config(store: RatingStore, config: &SimulationConfig) -> Result<Self, failure::Error> {
        config.validate()?;

        let thresholds = config.thresholds()?;
        let recommender = config
            .get_recommender()
            .build(store.num_items(), config.get_seed(), thresholds);

        Ok(Simulation::new(store, recommender, thresholds))
    }
}

impl<R: Recommender> Simulation<R> {
    /// Set up a simulation. Nothing is trained or recommended yet.
    pub fn new(store: RatingStore, recommender: R, thresholds: Thresholds) -> Self {
        let classifier = FeedbackClassifier::new(thresholds);
        let tracker = CandidateTracker::new(&store);
        let metrics = MetricsAccumulator::new(&store, &classifier);

        Simulation {
            store,
            classifier,
            tracker,
            metrics,
            recommender,
            log: Vec::new(),
            trained: false,
            round: 0,
            progress: None,
        }
    }

    /// Train the recommender on the training subset.
    ///
    /// Rounds train the recommender on first use, so calling this is only
    /// needed to surface fitting errors early. Fails with
    /// `AlreadyTrained` if the recommender was trained before.
    pub fn train(&mut self) -> Result<(), SimulationError> {
        if self.trained {
            return Err(SimulationError::AlreadyTrained);
        }

        info!(
            recommender = self.recommender.name(),
            train = self.store.train_len(),
            "training recommender"
        );
        self.recommender.train(&self.store)?;
        self.trained = true;

        Ok(())
    }

    fn ensure_trained(&mut self) -> Result<(), SimulationError> {
        if self.trained {
            Ok(())
        } else {
            self.train()
        }
    }

    /// Register an observer of loop progress. Replaces any previous one.
    pub fn set_progress_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&Progress) + 'static,
    {
        self.progress = Some(Box::new(callback));
    }

    /// Every recommendation made so far, in the order it was made.
    pub fn events(&self) -> &[RecommendationEvent] {
        &self.log
    }

    /// Number of rounds run so far.
    pub fn num_rounds(&self) -> usize {
        self.round
    }

    /// Return the rating store.
    pub fn store(&self) -> &RatingStore {
        &self.store
    }

    /// Return the feedback classifier.
    pub fn classifier(&self) -> &FeedbackClassifier {
        &self.classifier
    }

    /// Return the per-user candidate state.
    pub fn tracker(&self) -> &CandidateTracker {
        &self.tracker
    }

    /// Return the metric counters.
    pub fn metrics(&self) -> &MetricsAccumulator {
        &self.metrics
    }

    /// Return the recommender.
    pub fn recommender(&self) -> &R {
        &self.recommender
    }

    /// Cumulative metrics of a single user.
    pub fn user_metrics(&self, user_id: UserId) -> Result<UserMetrics, SimulationError> {
        self.metrics
            .user_metrics(user_id)
            .ok_or(SimulationError::UnknownUser(user_id))
    }

    /// Run one learning round over every user who is not full.
    pub fn recommendation_round(
        &mut self,
        allow_repetition: bool,
        enable_metrics: bool,
    ) -> Result<RoundOutput, SimulationError> {
        self.ensure_trained()?;

        let users = self.tracker.eligible_users(allow_repetition);
        let mut output = self.run_round(&users, allow_repetition, true)?;

        if !enable_metrics {
            output.metrics = None;
        }

        Ok(output)
    }

    /// Run one round without reporting reactions to the recommender.
    pub fn straight_recommendation_round(
        &mut self,
        allow_repetition: bool,
    ) -> Result<Vec<RecommendationEvent>, SimulationError> {
        self.ensure_trained()?;

        let users = self.tracker.eligible_users(allow_repetition);

        Ok(self.run_round(&users, allow_repetition, false)?.recommendations)
    }

    /// Run up to `maxiter` learning rounds, stopping early once every user
    /// is full. Users the recommender declines to serve are skipped without
    /// ending the round.
    ///
    /// Errors other than a full system abort the loop. The recommendations
    /// made before the error are then only reachable through `events()`.
    pub fn recommendation_round_loop(
        &mut self,
        maxiter: usize,
        allow_repetition: bool,
        enable_metrics: bool,
    ) -> Result<LoopOutput, SimulationError> {
        let (events, rows) = self.run_loop(None, maxiter, allow_repetition, true)?;

        Ok(LoopOutput {
            events,
            metrics: if enable_metrics { Some(rows) } else { None },
        })
    }

    /// Run up to `maxiter` straight rounds, stopping early once every user
    /// is full.
    ///
    /// Errors other than a full system abort the loop. The recommendations
    /// made before the error are then only reachable through `events()`.
    pub fn straight_recommendation_round_loop(
        &mut self,
        maxiter: usize,
        allow_repetition: bool,
    ) -> Result<Vec<RecommendationEvent>, SimulationError> {
        let (events, _) = self.run_loop(None, maxiter, allow_repetition, false)?;

        Ok(events)
    }

    /// Run up to `maxiter` learning rounds restricted to a single user.
    ///
    /// Without repetition this stops once the user is full, so at most as
    /// many recommendations as the user has eligible items are made.
    ///
    /// Errors other than a full system abort the loop. The recommendations
    /// made before the error are then only reachable through `events()`.
    pub fn fixed_user_recommendation_loop(
        &mut self,
        user_id: UserId,
        maxiter: usize,
        allow_repetition: bool,
        enable_metrics: bool,
    ) -> Result<LoopOutput, SimulationError> {
        if !self.tracker.contains_user(user_id) {
            return Err(SimulationError::UnknownUser(user_id));
        }

        let (events, rows) = self.run_loop(Some(user_id), maxiter, allow_repetition, true)?;

        Ok(LoopOutput {
            events,
            metrics: if enable_metrics { Some(rows) } else { None },
        })
    }

    /// Straight counterpart of `fixed_user_recommendation_loop`.
    ///
    /// Errors other than a full system abort the loop. The recommendations
    /// made before the error are then only reachable through `events()`.
    pub fn straight_fixed_user_recommendation_loop(
        &mut self,
        user_id: UserId,
        maxiter: usize,
        allow_repetition: bool,
    ) -> Result<Vec<RecommendationEvent>, SimulationError> {
        if !self.tracker.contains_user(user_id) {
            return Err(SimulationError::UnknownUser(user_id));
        }

        let (events, _) = self.run_loop(Some(user_id), maxiter, allow_repetition, false)?;

        Ok(events)
    }

    /// Run the loop `config` asks for.
    pub fn run_configured(&mut self, config: &SimulationConfig) -> Result<LoopOutput, SimulationError> {
        if config.is_learning() {
            self.recommendation_round_loop(
                config.get_max_iter(),
                config.repetition_allowed(),
                config.metrics_enabled(),
            )
        } else {
            let events =
                self.straight_recommendation_round_loop(config.get_max_iter(), config.repetition_allowed())?;

            Ok(LoopOutput {
                events,
                metrics: None,
            })
        }
    }

    fn run_loop(
        &mut self,
        user_id: Option<UserId>,
        maxiter: usize,
        allow_repetition: bool,
        learning: bool,
    ) -> Result<(Vec<RecommendationEvent>, Vec<MetricsRow>), SimulationError> {
        self.ensure_trained()?;

        info!(
            recommender = self.recommender.name(),
            maxiter,
            allow_repetition,
            learning,
            fixed_user = ?user_id,
            "starting recommendation loop"
        );

        let mut events = Vec::new();
        let mut rows = Vec::with_capacity(maxiter);
        let mut next_milestone = PROGRESS_STEP;

        for iteration in 0..maxiter {
            let users = match user_id {
                Some(user_id) if self.tracker.is_full(user_id, allow_repetition) => Vec::new(),
                Some(user_id) => vec![user_id],
                None => self.tracker.eligible_users(allow_repetition),
            };

            match self.run_round(&users, allow_repetition, learning) {
                Ok(output) => {
                    events.extend(output.recommendations);
                    rows.extend(output.metrics);
                }
                Err(SimulationError::SystemFull) => {
                    info!(
                        rounds = iteration,
                        events = events.len(),
                        "no eligible users left, stopping"
                    );
                    return Ok((events, rows));
                }
                Err(error) => return Err(error),
            }

            self.report_progress(&mut next_milestone, iteration + 1, maxiter);
        }

        info!(rounds = maxiter, events = events.len(), "reached maximum iterations");

        Ok((events, rows))
    }

    fn run_round(
        &mut self,
        users: &[UserId],
        allow_repetition: bool,
        learning: bool,
    ) -> Result<RoundOutput, SimulationError> {
        if users.is_empty() {
            return Err(SimulationError::SystemFull);
        }

        self.round += 1;
        let round = self.round;

        self.metrics.begin_round();

        let mut recommendations = Vec::with_capacity(users.len());
        let mut skipped: usize = 0;
        let mut invalid = None;

        for &user_id in users {
            let item_id = {
                let eligible = self.tracker.eligible_items(user_id, allow_repetition);

                if eligible.is_empty() {
                    skipped += 1;
                    continue;
                }

                match self.recommender.score_and_select(user_id, eligible) {
                    Some(item_id) if eligible.binary_search(&item_id).is_ok() => item_id,
                    Some(item_id) => {
                        invalid = Some(SimulationError::InvalidSelection { user_id, item_id });
                        break;
                    }
                    None => {
                        skipped += 1;
                        continue;
                    }
                }
            };

            let reaction = self.classifier.classify(&self.store, user_id, item_id);
            let event = RecommendationEvent {
                round,
                user_id,
                item_id,
            };

            trace!(round, user_id, item_id, feedback = ?reaction.feedback, "recommended");

            self.tracker.mark_recommended(user_id, item_id);
            self.metrics.record(user_id, item_id, reaction.feedback);
            if learning {
                self.recommender.update(user_id, item_id, &reaction);
            }

            self.log.push(event);
            recommendations.push(event);
        }

        let row = self.metrics.end_round(round);

        if let Some(error) = invalid {
            return Err(error);
        }

        if learning {
            self.recommender.epoch_update();
        }

        debug!(
            round,
            eligible = users.len(),
            recommended = recommendations.len(),
            skipped,
            "finished round"
        );

        Ok(RoundOutput {
            round,
            recommendations,
            metrics: Some(row),
        })
    }

    fn report_progress(&mut self, next_milestone: &mut usize, completed: usize, total: usize) {
        if total == 0 {
            return;
        }

        let percent = completed * 100 / total;

        while *next_milestone <= 100 && percent >= *next_milestone {
            let progress = Progress {
                completed,
                total,
                percent: *next_milestone,
            };

            info!(completed, total, percent = progress.percent, "progress");
            if let Some(ref mut callback) = self.progress {
                callback(&progress);
            }

            *next_milestone += PROGRESS_STEP;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    use proptest::prelude::*;

    use super::*;
    use data::{Rating, Ratings};
    use feedback::Reaction;
    use models::popularity::MostPopularRecommender;
    use models::random::RandomRecommender;
    use store::RatingStore;
    use FittingError;

    /// Always picks the lowest eligible item and records what it is told.
    #[derive(Default)]
    struct FirstItem {
        trained: usize,
        updates: Vec<(UserId, ItemId, Reaction)>,
        epochs: usize,
    }

    impl Recommender for FirstItem {
        fn name(&self) -> &str {
            "first_item"
        }

        fn train(&mut self, _store: &RatingStore) -> Result<(), FittingError> {
            self.trained += 1;
            Ok(())
        }

        fn score_and_select(&mut self, _user_id: UserId, eligible: &[ItemId]) -> Option<ItemId> {
            eligible.first().cloned()
        }

        fn update(&mut self, user_id: UserId, item_id: ItemId, reaction: &Reaction) {
            self.updates.push((user_id, item_id, *reaction));
        }

        fn epoch_update(&mut self) {
            self.epochs += 1;
        }
    }

    /// Recommends an item the user was not offered.
    struct OutOfRange;

    impl Recommender for OutOfRange {
        fn name(&self) -> &str {
            "out_of_range"
        }

        fn train(&mut self, _store: &RatingStore) -> Result<(), FittingError> {
            Ok(())
        }

        fn score_and_select(&mut self, _user_id: UserId, _eligible: &[ItemId]) -> Option<ItemId> {
            Some(1000)
        }

        fn update(&mut self, _user_id: UserId, _item_id: ItemId, _reaction: &Reaction) {}
    }

    /// Declines every recommendation for user 1, picks the lowest item
    /// otherwise.
    struct DeclineUserOne;

    impl Recommender for DeclineUserOne {
        fn name(&self) -> &str {
            "decline_user_one"
        }

        fn train(&mut self, _store: &RatingStore) -> Result<(), FittingError> {
            Ok(())
        }

        fn score_and_select(&mut self, user_id: UserId, eligible: &[ItemId]) -> Option<ItemId> {
            if user_id == 1 {
                None
            } else {
                eligible.first().cloned()
            }
        }

        fn update(&mut self, _user_id: UserId, _item_id: ItemId, _reaction: &Reaction) {}
    }

    /// Serves the first round correctly, then picks an item it was not
    /// offered.
    #[derive(Default)]
    struct GoesAstray {
        calls: usize,
    }

    impl Recommender for GoesAstray {
        fn name(&self) -> &str {
            "goes_astray"
        }

        fn train(&mut self, _store: &RatingStore) -> Result<(), FittingError> {
            Ok(())
        }

        fn score_and_select(&mut self, _user_id: UserId, eligible: &[ItemId]) -> Option<ItemId> {
            self.calls += 1;

            if self.calls > 3 {
                Some(1000)
            } else {
                eligible.first().cloned()
            }
        }

        fn update(&mut self, _user_id: UserId, _item_id: ItemId, _reaction: &Reaction) {}
    }

    struct Failing;

    impl Recommender for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn train(&mut self, _store: &RatingStore) -> Result<(), FittingError> {
            Err(FittingError::NoInteractions)
        }

        fn score_and_select(&mut self, _user_id: UserId, eligible: &[ItemId]) -> Option<ItemId> {
            eligible.first().cloned()
        }

        fn update(&mut self, _user_id: UserId, _item_id: ItemId, _reaction: &Reaction) {}
    }

    // Three users, four items. User 0 rated items 0 and 1 in training.
    fn small_store() -> RatingStore {
        let train = Ratings::from(vec![
            Rating::new(0, 0, 1.0, 0),
            Rating::new(0, 1, -1.0, 0),
        ]);
        let test = Ratings::from(vec![
            Rating::new(0, 2, -1.0, 0),
            Rating::new(0, 3, 1.0, 0),
            Rating::new(1, 0, 1.0, 0),
            Rating::new(1, 2, -1.0, 0),
            Rating::new(2, 3, 1.0, 0),
        ]);

        RatingStore::new(&train, &test)
    }

    fn simulation<R: Recommender>(recommender: R) -> Simulation<R> {
        Simulation::new(small_store(), recommender, Thresholds::default())
    }

    fn has_repeats(events: &[RecommendationEvent]) -> bool {
        let mut seen = HashSet::new();

        events
            .iter()
            .any(|event| !seen.insert((event.user_id, event.item_id)))
    }

    #[test]
    fn single_round_recommends_once_per_user() {
        let mut simulation = simulation(FirstItem::default());

        let output = simulation.recommendation_round(false, true).unwrap();

        assert_eq!(output.round, 1);
        assert_eq!(
            output.recommendations,
            vec![
                RecommendationEvent {
                    round: 1,
                    user_id: 0,
                    item_id: 2,
                },
                RecommendationEvent {
                    round: 1,
                    user_id: 1,
                    item_id: 0,
                },
                RecommendationEvent {
                    round: 1,
                    user_id: 2,
                    item_id: 0,
                },
            ]
        );
        assert_eq!(simulation.events().len(), 3);
        assert_eq!(simulation.recommender().trained, 1);
        assert_eq!(simulation.recommender().updates.len(), 3);
        assert_eq!(simulation.recommender().epochs, 1);
        assert!(output.metrics.is_some());
    }

    #[test]
    fn anti_relevant_outcome_counts_as_miss() {
        let mut simulation = simulation(FirstItem::default());

        simulation.recommendation_round(false, true).unwrap();

        // User 0 was recommended item 2, rated -1 in the test subset.
        let user = simulation.user_metrics(0).unwrap();
        assert_eq!(user.counters.misses, 1);
        assert_eq!(user.counters.hits, 0);
        assert!(user.fallout > 0.0);

        let reaction = simulation.recommender().updates[0].2;
        assert_eq!(reaction.feedback, ::feedback::Feedback::AntiRelevant);
        assert_eq!(reaction.rating, Some(-1.0));
    }

    #[test]
    fn full_system_fails_without_events() {
        let mut simulation = simulation(FirstItem::default());

        // User 0 has two eligible items, users 1 and 2 have four.
        let output = simulation.recommendation_round_loop(10, false, true).unwrap();
        assert_eq!(output.events.len(), 10);
        assert_eq!(output.metrics.unwrap().len(), 4);
        assert!(!has_repeats(&output.events));

        let logged = simulation.events().len();
        match simulation.recommendation_round(false, true) {
            Err(SimulationError::SystemFull) => {}
            other => panic!("expected a full system, got {:?}", other.map(|x| x.round)),
        }
        assert_eq!(simulation.events().len(), logged);
        assert_eq!(simulation.num_rounds(), 4);
    }

    #[test]
    fn straight_rounds_never_repeat() {
        let mut simulation = simulation(FirstItem::default());

        let first = simulation.straight_recommendation_round(false).unwrap();
        let second = simulation.straight_recommendation_round(false).unwrap();

        let mut events = first.clone();
        events.extend(second);
        assert!(!has_repeats(&events));
        assert!(simulation.recommender().updates.is_empty());
        assert_eq!(simulation.recommender().epochs, 0);
        assert!(events.iter().all(|event| event.round <= 2));
    }

    #[test]
    fn repetition_keeps_offering_the_same_items() {
        let mut simulation = simulation(FirstItem::default());

        let events = simulation.straight_recommendation_round_loop(5, true).unwrap();

        assert_eq!(events.len(), 15);
        assert!(events
            .iter()
            .filter(|event| event.user_id == 0)
            .all(|event| event.item_id == 2));
    }

    #[test]
    fn round_indices_continue_across_calls() {
        let mut simulation = simulation(FirstItem::default());

        simulation.recommendation_round_loop(2, false, false).unwrap();
        let output = simulation.recommendation_round_loop(1, false, true).unwrap();

        assert!(output.events.iter().all(|event| event.round == 3));
        assert_eq!(output.metrics.unwrap()[0].round, 3);
    }

    #[test]
    fn fixed_user_loop_stops_when_user_is_full() {
        let mut simulation = simulation(FirstItem::default());

        let output = simulation
            .fixed_user_recommendation_loop(0, 10, false, true)
            .unwrap();

        let items: Vec<ItemId> = output.events.iter().map(|event| event.item_id).collect();
        assert_eq!(items, vec![2, 3]);
        assert_eq!(output.metrics.unwrap().len(), 2);
        assert!(output.events.iter().all(|event| event.user_id == 0));
        assert!(simulation.tracker().is_full(0, false));
        assert!(!simulation.tracker().is_full(1, false));
    }

    #[test]
    fn fixed_user_loop_with_repetition_runs_every_iteration() {
        let mut simulation = simulation(FirstItem::default());

        let events = simulation
            .straight_fixed_user_recommendation_loop(1, 7, true)
            .unwrap();

        assert_eq!(events.len(), 7);
    }

    #[test]
    fn unknown_users_are_rejected() {
        let mut simulation = simulation(FirstItem::default());

        match simulation.fixed_user_recommendation_loop(3, 1, false, false) {
            Err(SimulationError::UnknownUser(3)) => {}
            _ => panic!("expected an unknown user"),
        }
        assert!(simulation.user_metrics(3).is_err());
        assert!(simulation.events().is_empty());
    }

    #[test]
    fn training_happens_once() {
        let mut simulation = simulation(FirstItem::default());

        simulation.train().unwrap();
        match simulation.train() {
            Err(SimulationError::AlreadyTrained) => {}
            _ => panic!("expected an error"),
        }

        simulation.recommendation_round(false, false).unwrap();
        assert_eq!(simulation.recommender().trained, 1);
    }

    #[test]
    fn declined_users_are_skipped_without_losing_events() {
        let mut simulation = simulation(DeclineUserOne);

        let first = simulation.recommendation_round(false, true).unwrap();
        let users: Vec<UserId> = first.recommendations.iter().map(|x| x.user_id).collect();
        assert_eq!(users, vec![0, 2]);

        // User 1 is never full, so the loop runs until maxiter.
        let output = simulation.recommendation_round_loop(9, false, true).unwrap();
        let users: Vec<UserId> = output.events.iter().map(|x| x.user_id).collect();
        assert_eq!(users, vec![0, 2, 2, 2]);
        assert_eq!(output.metrics.unwrap().len(), 9);
        assert_eq!(simulation.num_rounds(), 10);

        assert_eq!(simulation.events().len(), 6);
        assert_eq!(&simulation.events()[2..], &output.events[..]);
        assert!(simulation.events().iter().all(|x| x.user_id != 1));
        assert!(simulation.tracker().is_full(2, false));
        assert_eq!(simulation.tracker().num_recommended(1), 0);
    }

    #[test]
    fn fitting_errors_surface() {
        let mut simulation = simulation(Failing);

        match simulation.recommendation_round_loop(3, false, true) {
            Err(SimulationError::Fitting(FittingError::NoInteractions)) => {}
            _ => panic!("expected a fitting error"),
        }
        assert!(simulation.events().is_empty());
    }

    #[test]
    fn invalid_selections_are_reported() {
        let mut simulation = simulation(OutOfRange);

        match simulation.recommendation_round(false, true) {
            Err(SimulationError::InvalidSelection {
                user_id: 0,
                item_id: 1000,
            }) => {}
            _ => panic!("expected an invalid selection"),
        }
    }

    #[test]
    fn aborted_loops_keep_earlier_events_in_the_log() {
        let mut simulation = simulation(GoesAstray::default());

        match simulation.recommendation_round_loop(5, false, true) {
            Err(SimulationError::InvalidSelection { user_id: 0, .. }) => {}
            _ => panic!("expected an invalid selection"),
        }

        assert_eq!(simulation.events().len(), 3);
        assert!(simulation.events().iter().all(|x| x.round == 1));
        assert_eq!(simulation.num_rounds(), 2);
    }

    #[test]
    fn progress_is_reported_at_milestones() {
        let mut simulation = simulation(FirstItem::default());
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        simulation.set_progress_callback(move |progress| sink.borrow_mut().push(*progress));

        simulation
            .straight_fixed_user_recommendation_loop(1, 10, true)
            .unwrap();

        let percents: Vec<usize> = seen.borrow().iter().map(|progress| progress.percent).collect();
        let completed: Vec<usize> = seen.borrow().iter().map(|progress| progress.completed).collect();
        assert_eq!(percents, vec![20, 40, 60, 80, 100]);
        assert_eq!(completed, vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn configured_simulation_runs() {
        let config = SimulationConfig::new().max_iter(3).seed(11);
        let mut simulation = Simulation::from_config(small_store(), &config).unwrap();

        let output = simulation.run_configured(&config).unwrap();

        assert_eq!(simulation.recommender().name(), "most_popular");
        assert_eq!(simulation.classifier().thresholds(), &Thresholds::default());
        assert_eq!(output.metrics.unwrap().len(), 3);
        assert!(!has_repeats(&output.events));
    }

    fn ratings(max_users: usize, max_items: usize) -> impl Strategy<Value = Vec<Rating>> {
        prop::collection::vec(
            (0..max_users, 0..max_items, -2i8..3),
            1..80,
        ).prop_map(|triplets| {
            triplets
                .into_iter()
                .enumerate()
                .map(|(timestamp, (user_id, item_id, rating))| {
                    Rating::new(user_id, item_id, f32::from(rating), timestamp)
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn loops_respect_their_invariants(
            train in ratings(8, 12),
            test in ratings(8, 12),
            maxiter in 1usize..20,
            seed in any::<u8>(),
        ) {
            let store = RatingStore::new(&Ratings::from(train), &Ratings::from(test));
            let model = RandomRecommender::new().from_seed([seed; 16]);
            let mut simulation = Simulation::new(store, model, Thresholds::default());

            let mut last = (0.0, 0.0);
            let mut rounds = 0;

            for _ in 0..maxiter {
                let eligible = simulation.tracker().eligible_users(false).len();

                match simulation.recommendation_round(false, true) {
                    Ok(output) => {
                        let row = output.metrics.unwrap();
                        prop_assert_eq!(output.recommendations.len(), eligible);
                        prop_assert!(row.recall >= last.0);
                        prop_assert!(row.fallout >= last.1);
                        last = (row.recall, row.fallout);
                        rounds += 1;
                    }
                    Err(SimulationError::SystemFull) => {
                        prop_assert_eq!(eligible, 0);
                        break;
                    }
                    Err(error) => panic!("unexpected error {}", error),
                }
            }

            prop_assert!(rounds <= maxiter);
            prop_assert!(!has_repeats(simulation.events()));
            for event in simulation.events() {
                prop_assert!(simulation.store().train_items(event.user_id).binary_search(&event.item_id).is_err());
            }
        }

        #[test]
        fn fixed_user_loop_makes_min_events(
            train in ratings(4, 10),
            maxiter in 0usize..15,
        ) {
            let store = RatingStore::new(&Ratings::from(train), &Ratings::new(4, 10));
            let available = store.num_items() - store.train_items(0).len();
            let model = MostPopularRecommender::new(store.num_items()).from_seed([3; 16]);
            let mut simulation = Simulation::new(store, model, Thresholds::default());

            let output = simulation
                .fixed_user_recommendation_loop(0, maxiter, false, false)
                .unwrap();

            prop_assert_eq!(output.events.len(), ::std::cmp::min(maxiter, available));
            prop_assert!(output.metrics.is_none());
            prop_assert!(!has_repeats(&output.events));
        }
    }
}

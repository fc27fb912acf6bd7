//! Simulation configuration, loadable from JSON.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use failure;
use serde_json;

use feedback::Thresholds;
use models::RecommenderKind;

/// Configuration error types.
#[derive(Debug, Fail)]
pub enum ConfigError {
    /// A rating could be both relevant and anti-relevant.
    #[fail(
        display = "Anti-relevance threshold {} exceeds relevance threshold {}.",
        anti_relevance,
        relevance
    )]
    InvalidThresholds {
        /// Ratings above this are relevant.
        relevance: f32,
        /// Ratings below this are anti-relevant.
        anti_relevance: f32,
    },
    /// Test fraction outside of `[0, 1]`.
    #[fail(display = "Test fraction {} is not within [0, 1].", _0)]
    InvalidTestFraction(f32),
}

/// Everything needed to run a simulation from the command line.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    relevance_threshold: f32,
    anti_relevance_threshold: f32,
    test_fraction: f32,
    max_iter: usize,
    allow_repetition: bool,
    enable_metrics: bool,
    learning: bool,
    seed: Option<u64>,
    recommender: RecommenderKind,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            relevance_threshold: 0.0,
            anti_relevance_threshold: 0.0,
            test_fraction: 0.2,
            max_iter: 100,
            allow_repetition: false,
            enable_metrics: true,
            learning: true,
            seed: None,
            recommender: RecommenderKind::MostPopular,
        }
    }
}

impl SimulationConfig {
    /// Default configuration.
    pub fn new() -> Self {
        SimulationConfig::default()
    }

    /// Read and validate a JSON configuration file. Missing fields keep
    /// their defaults.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, failure::Error> {
        let reader = BufReader::new(File::open(path)?);
        let config: SimulationConfig = serde_json::from_reader(reader)?;

        config.validate()?;

        Ok(config)
    }

    /// Check thresholds and test fraction.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds()?;

        if !(self.test_fraction >= 0.0 && self.test_fraction <= 1.0) {
            return Err(ConfigError::InvalidTestFraction(self.test_fraction));
        }

        Ok(())
    }

    /// Set the feedback thresholds.
    pub fn with_thresholds(mut self, relevance: f32, anti_relevance: f32) -> Self {
        self.relevance_threshold = relevance;
        self.anti_relevance_threshold = anti_relevance;
        self
    }

    /// Set the proportion of ratings held out for the test subset.
    pub fn test_fraction(mut self, test_fraction: f32) -> Self {
        self.test_fraction = test_fraction;
        self
    }

    /// Set the maximum number of rounds.
    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Allow recommending an item to the same user more than once.
    pub fn allow_repetition(mut self, allow_repetition: bool) -> Self {
        self.allow_repetition = allow_repetition;
        self
    }

    /// Return a metrics row per round.
    pub fn enable_metrics(mut self, enable_metrics: bool) -> Self {
        self.enable_metrics = enable_metrics;
        self
    }

    /// Whether the recommender learns from each reaction.
    pub fn learning(mut self, learning: bool) -> Self {
        self.learning = learning;
        self
    }

    /// Seed the split and the recommender.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the recommender to run.
    pub fn recommender(mut self, recommender: RecommenderKind) -> Self {
        self.recommender = recommender;
        self
    }

    /// Feedback thresholds, validated.
    pub fn thresholds(&self) -> Result<Thresholds, ConfigError> {
        Thresholds::new(self.relevance_threshold, self.anti_relevance_threshold)
    }

    /// Proportion of ratings held out for the test subset.
    pub fn get_test_fraction(&self) -> f32 {
        self.test_fraction
    }

    /// Maximum number of rounds.
    pub fn get_max_iter(&self) -> usize {
        self.max_iter
    }

    /// Whether repetition is allowed.
    pub fn repetition_allowed(&self) -> bool {
        self.allow_repetition
    }

    /// Whether metrics rows are returned.
    pub fn metrics_enabled(&self) -> bool {
        self.enable_metrics
    }

    /// Whether rounds report reactions to the recommender.
    pub fn is_learning(&self) -> bool {
        self.learning
    }

    /// Seed, if set.
    pub fn get_seed(&self) -> Option<u64> {
        self.seed
    }

    /// Recommender to run.
    pub fn get_recommender(&self) -> &RecommenderKind {
        &self.recommender
    }
}

/// Expand a 64-bit seed into the 16 bytes `XorShiftRng` is seeded from.
pub fn seed_bytes(seed: u64) -> [u8; 16] {
    let mut bytes = [0; 16];
    let low = seed.to_le_bytes();
    let high = (!seed).to_le_bytes();

    bytes[..8].copy_from_slice(&low);
    bytes[8..].copy_from_slice(&high);

    bytes
}

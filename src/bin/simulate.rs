extern crate cyclorec;
extern crate failure;
extern crate rand;
#[macro_use]
extern crate serde_derive;
extern crate serde;
extern crate serde_json;
#[macro_use]
extern crate tracing;
extern crate tracing_subscriber;

use std::env;
use std::io;
use std::time::Instant;

use rand::prng::XorShiftRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cyclorec::config::{seed_bytes, SimulationConfig};
use cyclorec::data::train_test_split;
use cyclorec::datasets::{load_log, load_matrix, Dataset, LogFormat};
use cyclorec::evaluation::MetricsRow;
use cyclorec::simulation::{RecommendationEvent, Simulation};
use cyclorec::store::RatingStore;

const USAGE: &str = "usage: simulate <ratings-file> [log|matrix] [config.json]";

#[derive(Debug, Serialize)]
struct Report<'a> {
    recommender: &'a str,
    config: &'a SimulationConfig,
    num_users: usize,
    num_items: usize,
    events: Vec<RecommendationEvent>,
    metrics: Option<Vec<MetricsRow>>,
    elapsed_ms: u64,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn load(path: &str, layout: &str) -> Result<Dataset, failure::Error> {
    match layout {
        "log" => load_log(path, LogFormat::new()),
        "matrix" => load_matrix(path, b','),
        other => Err(failure::err_msg(format!("unknown layout {:?}\n{}", other, USAGE))),
    }
}

fn main() -> Result<(), failure::Error> {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let path = args.get(0).ok_or_else(|| failure::err_msg(USAGE))?;
    let layout = args.get(1).map_or("log", |layout| layout.as_str());
    let config = match args.get(2) {
        Some(config_path) => SimulationConfig::from_path(config_path)?,
        None => SimulationConfig::new(),
    };

    let mut dataset = load(path, layout)?;

    let mut rng = match config.get_seed() {
        Some(seed) => XorShiftRng::from_seed(seed_bytes(seed)),
        None => XorShiftRng::from_seed(rand::thread_rng().gen()),
    };
    let (train, test) = train_test_split(&mut dataset.ratings, &mut rng, config.get_test_fraction());
    info!(train = train.len(), test = test.len(), "split ratings");

    let store = RatingStore::new(&train, &test);
    let (num_users, num_items) = (store.num_users(), store.num_items());
    let mut simulation = Simulation::from_config(store, &config)?;

    let start = Instant::now();
    let output = simulation.run_configured(&config)?;
    let elapsed = start.elapsed();

    let report = Report {
        recommender: simulation.recommender().name(),
        config: &config,
        num_users,
        num_items,
        events: output.events,
        metrics: output.metrics,
        elapsed_ms: elapsed.as_secs() * 1000 + u64::from(elapsed.subsec_millis()),
    };

    serde_json::to_writer_pretty(io::stdout(), &report)?;
    println!();

    Ok(())
}

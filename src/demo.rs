// src/demo.rs

//! The `taskloader` binary: limit concurrent connections per host.
//!
//! Six simulated downloads across two hosts run on a network consumer whose
//! strategy allows a few connections per host. Each host's files feed a kept
//! "service" task on a CPU consumer that combines them.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZero;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{LoaderConfig, load_and_validate};
use crate::engine::Loader;
use crate::strategy::PerKeyLimit;
use crate::task::Task;
use crate::types::ConsumerId;

const SERVICES: &[(&str, &[&str])] = &[
    (
        "example.net API",
        &[
            "https://www.example.net/products.json",
            "https://www.example.net/servers.json",
            "https://www.example.net/news.json",
        ],
    ),
    (
        "anotherhost API",
        &[
            "https://anotherhost.example.org/friends.json",
            "https://anotherhost.example.org/recommendations.json",
            "https://anotherhost.example.org/notifications.json",
        ],
    ),
];

pub fn run(args: CliArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => load_and_validate(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => LoaderConfig::default(),
    };

    let mut loader: Loader<String> = Loader::with_config(&config);
    let configured = loader.register_consumers(&config)?;

    let net = match configured.get("net") {
        Some(&id) => id,
        None => loader.new_consumer_with(args.net_workers, PerKeyLimit::new(args.per_host))?,
    };
    let cpu = match configured.get("cpu") {
        Some(&id) => id,
        None => {
            let cpus = thread::available_parallelism().map_or(1, NonZero::get);
            loader.new_consumer(cpus, None)?
        }
    };

    let tasks = SERVICES
        .iter()
        .map(|&(name, urls)| service(name, cpu, urls.iter().map(|&url| fetch(url, net))));
    loader.add(tasks)?;

    if args.all {
        let progress = loader.load_all()?;
        println!("Loaded {}/{}", progress.completed, progress.total());
    } else {
        let mut last = None;
        loop {
            let progress = loader.load(Duration::from_millis(50))?;

            if last != Some(progress.completed) {
                last = Some(progress.completed);
                println!("Progress: {}/{}", progress.completed, progress.total());
            }

            if progress.done {
                break;
            }

            // Stand-in for drawing a frame.
            thread::sleep(Duration::from_millis(16));
        }
    }

    for (name, _) in SERVICES {
        match loader.must_result(name) {
            Ok(value) => println!("{value}"),
            Err(err) => println!("{name}: {err}"),
        }
    }

    loader.close();
    info!("demo finished");
    Ok(())
}

fn fetch(url: &'static str, consumer: ConsumerId) -> Task<String> {
    let host = hostname(url).to_string();
    let delay = Duration::from_millis(pseudo_random(url) % 400);

    Task::new(move |_| {
        thread::sleep(delay);
        Ok(format!("I am network file {url}!"))
    })
    .consumer(consumer)
    .info(move || host.clone())
}

fn service(
    name: &'static str,
    consumer: ConsumerId,
    files: impl IntoIterator<Item = Task<String>>,
) -> Task<String> {
    Task::new(move |inputs: Vec<Option<String>>| {
        let inputs: Vec<String> = inputs
            .into_iter()
            .map(|input| input.unwrap_or_else(|| "<missing>".to_string()))
            .collect();
        debug!(service = name, inputs = inputs.len(), "combining");
        Ok(format!(
            "I'm task {name} and I have the following inputs: {}",
            inputs.join(", ")
        ))
    })
    .name(name)
    .keep(true)
    .consumer(consumer)
    .requires_direct(files)
}

fn hostname(url: &str) -> &str {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split(['/', ':']).next().unwrap_or(rest)
}

fn pseudo_random(seed: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    hasher.finish()
}

//! Strategy wrapper that records every admission decision.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use taskloader::Strategy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call<I> {
    Start { info: Option<I>, accepted: bool },
    End { info: Option<I> },
}

#[derive(Debug)]
struct Books<I> {
    calls: Vec<Call<I>>,
    running: HashMap<Option<I>, usize>,
    peak: HashMap<Option<I>, usize>,
    peak_total: usize,
    /// `end` for a key with nothing running.
    unbalanced: usize,
}

/// Read side of a [`RecordingStrategy`], usable after the strategy has been
/// moved into a consumer.
#[derive(Debug, Clone)]
pub struct StrategyLog<I> {
    books: Arc<Mutex<Books<I>>>,
}

/// Wraps a strategy and records its `start` verdicts and `end` calls.
pub struct RecordingStrategy<S, I> {
    inner: S,
    books: Arc<Mutex<Books<I>>>,
}

impl<S, I> RecordingStrategy<S, I>
where
    S: Strategy<I>,
    I: Eq + Hash + Clone,
{
    pub fn new(inner: S) -> (Self, StrategyLog<I>) {
        let books = Arc::new(Mutex::new(Books {
            calls: Vec::new(),
            running: HashMap::new(),
            peak: HashMap::new(),
            peak_total: 0,
            unbalanced: 0,
        }));

        let log = StrategyLog {
            books: Arc::clone(&books),
        };

        (Self { inner, books }, log)
    }
}

impl<S, I> Strategy<I> for RecordingStrategy<S, I>
where
    S: Strategy<I>,
    I: Eq + Hash + Clone + Send,
{
    fn start(&mut self, info: Option<&I>) -> bool {
        let accepted = self.inner.start(info);
        let mut books = self.books.lock().unwrap();
        let key = info.cloned();

        books.calls.push(Call::Start {
            info: key.clone(),
            accepted,
        });

        if accepted {
            let running = books.running.entry(key.clone()).or_default();
            *running += 1;
            let now = *running;

            let peak = books.peak.entry(key).or_default();
            *peak = (*peak).max(now);

            let total: usize = books.running.values().sum();
            books.peak_total = books.peak_total.max(total);
        }

        accepted
    }

    fn end(&mut self, info: Option<&I>) {
        self.inner.end(info);
        let mut books = self.books.lock().unwrap();
        let key = info.cloned();

        books.calls.push(Call::End { info: key.clone() });

        let balanced = match books.running.get_mut(&key) {
            Some(running) if *running > 0 => {
                *running -= 1;
                true
            }
            _ => false,
        };
        if !balanced {
            books.unbalanced += 1;
        }
    }
}

impl<I: Clone + Eq + Hash + Debug> StrategyLog<I> {
    pub fn calls(&self) -> Vec<Call<I>> {
        self.books.lock().unwrap().calls.clone()
    }

    pub fn accepted(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Start { accepted: true, .. }))
            .count()
    }

    pub fn ends(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::End { .. }))
            .count()
    }

    /// Most tasks with `info` admitted at once.
    pub fn peak(&self, info: Option<&I>) -> usize {
        let books = self.books.lock().unwrap();
        books.peak.get(&info.cloned()).copied().unwrap_or(0)
    }

    /// Most tasks admitted at once, across every info value.
    pub fn peak_total(&self) -> usize {
        self.books.lock().unwrap().peak_total
    }

    /// Tasks currently admitted and not yet ended.
    pub fn running(&self) -> usize {
        self.books.lock().unwrap().running.values().sum()
    }

    /// Number of `end` calls that had no matching accepted `start`.
    pub fn unbalanced(&self) -> usize {
        self.books.lock().unwrap().unbalanced
    }
}

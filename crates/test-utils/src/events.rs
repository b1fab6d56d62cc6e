//! Order in which task `load` functions start and end.

use std::sync::{Arc, Mutex};

use taskloader::Task;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(String),
    End(String),
}

/// Shared, thread-safe record of `load` calls.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// A task whose `load` is `load`, recorded under `label`.
    pub fn task<T, I, F>(&self, label: &str, load: F) -> Task<T, I>
    where
        T: 'static,
        F: Fn(Vec<Option<T>>) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let events = Arc::clone(&self.events);
        let label = label.to_string();

        Task::new(move |inputs| {
            events.lock().unwrap().push(Event::Start(label.clone()));
            let result = load(inputs);
            events.lock().unwrap().push(Event::End(label.clone()));
            result
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Labels in the order their `load` started.
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Start(label) => Some(label),
                Event::End(_) => None,
            })
            .collect()
    }

    pub fn start_count(&self, label: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Start(l) if l == label))
            .count()
    }

    /// True if `first` ended before `then` started.
    pub fn ended_before_start(&self, first: &str, then: &str) -> bool {
        let events = self.events();
        let end = events
            .iter()
            .position(|e| matches!(e, Event::End(l) if l == first));
        let start = events
            .iter()
            .position(|e| matches!(e, Event::Start(l) if l == then));

        matches!((end, start), (Some(end), Some(start)) if end < start)
    }

    /// Largest number of `load` calls running at the same time.
    pub fn peak_running(&self) -> usize {
        let mut running = 0usize;
        let mut peak = 0usize;
        for event in self.events() {
            match event {
                Event::Start(_) => {
                    running += 1;
                    peak = peak.max(running);
                }
                Event::End(_) => running -= 1,
            }
        }
        peak
    }
}

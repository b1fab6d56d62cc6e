// src/engine/ingest.rs

use std::collections::hash_map::Entry;

use tracing::{debug, error};

use crate::consumer::Completion;
use crate::errors::LoaderError;

use super::Loader;

impl<T, I> Loader<T, I>
where
    T: Clone + Send + 'static,
    I: Send + 'static,
{
    /// Ingest every buffered completion, oldest first.
    ///
    /// A duplicate kept name does not stop ingestion; the first one seen is
    /// stored in `duplicate` for the caller to report. Returns the number of
    /// completions ingested.
    pub(super) fn ingest_received(&mut self, duplicate: &mut Option<LoaderError>) -> usize {
        let mut ingested = 0;

        while let Some(completion) = self.received.pop_front() {
            if let Err(err) = self.ingest(completion) {
                duplicate.get_or_insert(err);
            }
            ingested += 1;
        }

        ingested
    }

    /// Record one completion: count it, keep it if asked, store the result in
    /// the DAG and make ready successors pending.
    fn ingest(&mut self, completion: Completion<T>) -> Result<(), LoaderError> {
        let Completion { idx, outcome } = completion;

        self.progress.completed += 1;
        self.progress.remaining = self.progress.remaining.saturating_sub(1);

        let node = self.dag.node(idx);
        let mut duplicate = None;

        let slot = match (node.keep, &node.name) {
            (true, Some(name)) => match self.kept.entry(name.clone()) {
                Entry::Vacant(slot) => Some(slot),
                Entry::Occupied(slot) => {
                    error!(name = %slot.key(), idx, "duplicate kept task name; keeping the first result");
                    duplicate = Some(LoaderError::DuplicateKeptName(slot.key().clone()));
                    None
                }
            },
            _ => None,
        };

        let value = match outcome {
            Ok(value) => {
                if let Some(slot) = slot {
                    slot.insert(Ok(value.clone()));
                }
                Some(value)
            }
            Err(err) => {
                if let Some(slot) = slot {
                    slot.insert(Err(err));
                }
                None
            }
        };

        let ok = value.is_some();
        let ready = self.dag.complete(idx, value);

        debug!(
            idx,
            ok,
            ready = ready.len(),
            completed = self.progress.completed,
            remaining = self.progress.remaining,
            "completion ingested"
        );

        match duplicate {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

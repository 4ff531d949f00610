//! Shared, live-replaceable rule storage.
//!
//! Readers take a point-in-time [`Arc<RuleTable>`] with [`RuleStore::snapshot`] and use it for
//! the whole of one query. Writers never mutate a published table: they build a new one and swap
//! the pointer, so a reader sees either the old table or the new one, never a mix.
use crate::error::Error;
use crate::rules::RuleTable;
use arc_swap::{ArcSwap, Guard};
use std::sync::Arc;

#[derive(Debug, Clone)]
#[allow(clippy::module_name_repetitions)]
pub struct RuleStore {
    current: Arc<ArcSwap<RuleTable>>,
}

impl RuleStore {
    #[must_use]
    pub fn new(table: RuleTable) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(table)),
        }
    }

    /// The current table. Lock-free.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RuleTable> {
        self.current.load_full()
    }

    /// Publish `table`, replacing whatever is current.
    pub fn replace(&self, table: RuleTable) {
        self.current.store(Arc::new(table));
    }

    /// Publish a table derived from the current one.
    ///
    /// `f` may be called more than once if another writer publishes concurrently; the table it
    /// returns is only published if the table it was derived from is still current.
    ///
    /// # Errors
    ///
    /// Returns the first error `f` returns, leaving the current table in place.
    pub fn update<F>(&self, f: F) -> Result<Arc<RuleTable>, Error>
    where
        F: Fn(&RuleTable) -> Result<RuleTable, Error>,
    {
        let mut current = self.current.load_full();
        loop {
            let next = Arc::new(f(&current)?);
            let prev = self.current.compare_and_swap(&current, Arc::clone(&next));
            if Arc::ptr_eq(&prev, &current) {
                return Ok(next);
            }
            current = Guard::into_inner(prev);
        }
    }
}

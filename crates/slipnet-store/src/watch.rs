//! Value Subscriptions
//!
//! A [`Watch`] follows one value derived from the committed store state.
//! The first [`Watch::next`] returns the current value immediately; later
//! calls wait until the value changes. Rapid successive writes may be
//! coalesced into the latest value.
//!
//! Dropping a `Watch` unsubscribes it. Other subscribers and pending writes
//! are unaffected.

use crate::store::StoreState;
use std::sync::Arc;
use tokio::sync::watch;

type Projection<T> = Box<dyn Fn(&StoreState) -> T + Send + Sync>;

/// Subscription to a value derived from the store
pub struct Watch<T> {
    rx: watch::Receiver<Arc<StoreState>>,
    project: Projection<T>,
    last: Option<T>,
}

impl<T: Clone + PartialEq> Watch<T> {
    pub(crate) fn new(
        rx: watch::Receiver<Arc<StoreState>>,
        project: impl Fn(&StoreState) -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            rx,
            project: Box::new(project),
            last: None,
        }
    }

    /// Current value, without waiting
    pub fn current(&self) -> T {
        let state = self.rx.borrow();
        (self.project)(&**state)
    }

    /// Next value: the current one on first call, then each change.
    ///
    /// Returns `None` once the store has been dropped.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            let value = {
                let state = self.rx.borrow_and_update();
                (self.project)(&**state)
            };

            if self.last.as_ref() != Some(&value) {
                self.last = Some(value.clone());
                return Some(value);
            }

            if self.rx.changed().await.is_err() {
                return None;
            }
        }
    }
}

//! In-flight dispatch registry.
//!
//! At most one remote computation runs per fingerprint. The first caller for
//! a fingerprint becomes the leader and receives a [`Lead`]; later callers get
//! a receiver for the leader's outcome. The registry entry is removed when the
//! `Lead` is dropped, whether the dispatch finished, failed or panicked.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

use crate::dispatch::CancellationHandle;
use crate::error::RemoteComputationError;
use crate::identity::Fingerprint;

pub type Outcome<T> = Result<T, RemoteComputationError>;

#[derive(Debug)]
struct InFlightEntry<T> {
    receiver: watch::Receiver<Option<Outcome<T>>>,
    cancel: CancellationHandle,
}

/// Result of [`InFlightRegistry::join`]
#[derive(Debug)]
pub enum Join<T> {
    /// No dispatch was running; the caller must run it and complete the lead
    Leader(Lead<T>),
    /// A dispatch is already running; await its outcome
    Follower(watch::Receiver<Option<Outcome<T>>>),
}

/// Ownership of one in-flight dispatch
#[derive(Debug)]
pub struct Lead<T> {
    sender: watch::Sender<Option<Outcome<T>>>,
    cancel: CancellationHandle,
    _registration: Registration<T>,
}

impl<T> Lead<T> {
    pub fn cancellation(&self) -> &CancellationHandle {
        &self.cancel
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Outcome<T>>> {
        self.sender.subscribe()
    }

    /// Publish the outcome to every waiter and release the registry entry
    pub fn complete(self, outcome: Outcome<T>) {
        // No receivers left is fine: the result is already in the cache.
        let _ = self.sender.send(Some(outcome));
    }
}

#[derive(Debug)]
struct Registration<T> {
    entries: Arc<DashMap<Fingerprint, InFlightEntry<T>>>,
    fingerprint: Fingerprint,
}

impl<T> Drop for Registration<T> {
    fn drop(&mut self) {
        self.entries.remove(&self.fingerprint);
        debug!(fingerprint = %self.fingerprint.short(), "Released in-flight dispatch");
    }
}

#[derive(Debug)]
pub struct InFlightRegistry<T> {
    entries: Arc<DashMap<Fingerprint, InFlightEntry<T>>>,
}

impl<T> Default for InFlightRegistry<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }
}

impl<T: Clone> InFlightRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lead a new dispatch for `fingerprint` or follow the running one
    pub fn join(&self, fingerprint: &Fingerprint) -> Join<T> {
        match self.entries.entry(fingerprint.clone()) {
            Entry::Occupied(entry) => Join::Follower(entry.get().receiver.clone()),
            Entry::Vacant(entry) => {
                let (sender, receiver) = watch::channel(None);
                let cancel = CancellationHandle::new();
                entry.insert(InFlightEntry {
                    receiver,
                    cancel: cancel.clone(),
                });
                Join::Leader(Lead {
                    sender,
                    cancel,
                    _registration: Registration {
                        entries: Arc::clone(&self.entries),
                        fingerprint: fingerprint.clone(),
                    },
                })
            }
        }
    }

    /// Signal the dispatch running for `fingerprint`, if any
    pub fn cancel(&self, fingerprint: &Fingerprint) -> bool {
        match self.entries.get(fingerprint) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Wait for the leader's outcome
///
/// A leader that went away without publishing yields `Interrupted`.
pub async fn wait_for_outcome<T: Clone>(
    mut receiver: watch::Receiver<Option<Outcome<T>>>,
    fingerprint: &Fingerprint,
) -> Outcome<T> {
    let interrupted = || RemoteComputationError::Interrupted {
        fingerprint: fingerprint.to_string(),
    };
    match receiver.wait_for(Option::is_some).await {
        Ok(value) => (*value).clone().unwrap_or_else(|| Err(interrupted())),
        Err(_) => Err(interrupted()),
    }
}

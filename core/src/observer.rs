//! Explicit observer registry.
//!
//! Observers are registered with [`ObserverRegistry::register`] and receive a
//! [`SubscriptionId`] they hand back to [`ObserverRegistry::unregister`].
//! A registry built with [`ObserverRegistry::bounded`] refuses observers
//! beyond its limit.
//!
//! # Delivery
//!
//! Notifications are delivered one at a time. A notification finishes calling
//! every observer before the next one starts, so each observer sees values in
//! the order they were published. Observers must not publish into the same
//! registry from inside their callback.
//!
//! A state change that must be reported in the order it was made goes
//! through a [`Publisher`]: take it, apply the change, then notify. Two
//! publishers never overlap.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Identifier returned by [`ObserverRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Raw numeric identifier.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A bounded registry is already at its limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Observer limit of {limit} reached")]
pub struct RegistryFull {
    /// Maximum number of observers
    pub limit: usize,
}

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Registry<T> {
    next_id: u64,
    limit: Option<usize>,
    observers: Vec<(SubscriptionId, Callback<T>)>,
}

/// Thread-safe registry of callbacks for values of type `T`.
///
/// Cloning the registry yields another handle to the same set of observers.
pub struct ObserverRegistry<T> {
    registry: Arc<Mutex<Registry<T>>>,
    delivery: Arc<Mutex<()>>,
}

/// Exclusive right to notify, held across a state change.
///
/// While a publisher is alive no other notification, registration or
/// publisher can proceed. Do not hold one across an `.await`.
#[must_use = "a publisher only orders changes while it is held"]
pub struct Publisher<'a, T> {
    registry: &'a ObserverRegistry<T>,
    _delivery: MutexGuard<'a, ()>,
}

impl<T> Publisher<'_, T> {
    /// Deliver `value` to every registered observer, in registration order.
    pub fn notify(&self, value: &T) {
        self.registry.deliver(value);
    }
}

impl<T> ObserverRegistry<T> {
    /// Create an empty registry without an observer limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(None)
    }

    /// Create an empty registry accepting at most `limit` observers.
    #[must_use]
    pub fn bounded(limit: usize) -> Self {
        Self::with_limit(Some(limit))
    }

    fn with_limit(limit: Option<usize>) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry {
                next_id: 1,
                limit,
                observers: Vec::new(),
            })),
            delivery: Arc::new(Mutex::new(())),
        }
    }

    /// Register an observer.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryFull`] if a bounded registry is at its limit.
    pub fn register<F>(&self, observer: F) -> Result<SubscriptionId, RegistryFull>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let _delivery = self.delivery_guard();
        self.insert(Arc::new(observer))
    }

    /// Register an observer and immediately deliver an initial value to it.
    ///
    /// `initial` is evaluated while delivery is held, so no notification can
    /// interleave between registration and the initial call. Returning `None`
    /// registers the observer without an initial call.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryFull`] if a bounded registry is at its limit;
    /// `initial` is then not evaluated.
    pub fn register_with<F, I>(&self, observer: F, initial: I) -> Result<SubscriptionId, RegistryFull>
    where
        F: Fn(&T) + Send + Sync + 'static,
        I: FnOnce() -> Option<T>,
    {
        let _delivery = self.delivery_guard();
        let callback: Callback<T> = Arc::new(observer);
        let id = self.insert(Arc::clone(&callback))?;

        if let Some(value) = initial() {
            tracing::trace!(subscription = %id, "Delivering initial value");
            callback(&value);
        }

        Ok(id)
    }

    /// Remove an observer.
    ///
    /// Returns `true` if the observer was registered.
    pub fn unregister(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry_guard();
        let before = registry.observers.len();
        registry.observers.retain(|(existing, _)| *existing != id);
        before != registry.observers.len()
    }

    /// Take the exclusive right to notify.
    ///
    /// Blocks while another notification or publisher is in progress.
    pub fn publisher(&self) -> Publisher<'_, T> {
        Publisher {
            registry: self,
            _delivery: self.delivery_guard(),
        }
    }

    /// Deliver `value` to every registered observer, in registration order.
    pub fn notify(&self, value: &T) {
        self.publisher().notify(value);
    }

    /// Number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry_guard().observers.len()
    }

    /// Returns `true` if no observer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn deliver(&self, value: &T) {
        // Snapshot so observers may unregister themselves while being called
        let observers: Vec<Callback<T>> = self
            .registry_guard()
            .observers
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        tracing::trace!(observers = observers.len(), "Notifying observers");

        for callback in observers {
            callback(value);
        }
    }

    fn insert(&self, callback: Callback<T>) -> Result<SubscriptionId, RegistryFull> {
        let mut registry = self.registry_guard();
        if let Some(limit) = registry.limit.filter(|limit| registry.observers.len() >= *limit) {
            tracing::debug!(limit, "Rejecting observer, registry is full");
            return Err(RegistryFull { limit });
        }
        let id = SubscriptionId(registry.next_id);
        registry.next_id += 1;
        registry.observers.push((id, callback));
        Ok(id)
    }

    // A panicking observer must not wedge the registry for everyone else
    fn registry_guard(&self) -> MutexGuard<'_, Registry<T>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn delivery_guard(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for ObserverRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ObserverRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            delivery: Arc::clone(&self.delivery),
        }
    }
}

impl<T> fmt::Debug for ObserverRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}

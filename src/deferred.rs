//! The deferred value and the two handles that settle it.
//!
//! State is shared between the [`Deferred`] and its handles through an
//! `Arc<Mutex<Inner>>`, so a handle stays bound to its instance however far it
//! travels. Listeners always run after the lock has been released.
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::Error;

type OnResolve<T> = Box<dyn FnOnce(T) + Send>;
type OnReject<E> = Box<dyn FnOnce(E) + Send>;

struct Inner<T, E> {
    pending: bool,
    value: Option<T>,
    on_resolve: Option<OnResolve<T>>,
    on_reject: Option<OnReject<E>>,
}

impl<T, E> Inner<T, E> {
    /// Leaves the pending state. Returns false if the value had already
    /// settled.
    fn settle(&mut self) -> bool {
        std::mem::replace(&mut self.pending, false)
    }
}

// The guarded state is consistent between statements, and listeners never run
// under the lock, so a poisoned mutex is safe to keep using.
fn lock<T, E>(inner: &Mutex<Inner<T, E>>) -> MutexGuard<'_, Inner<T, E>> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A value that becomes available later and settles exactly once, either
/// successfully with a `T` or with an error `E`.
///
/// Cloning a `Deferred` yields another handle to the same instance.
///
/// Only one success listener and one failure listener are kept; registering
/// another replaces the previous one. Settlement is never replayed: a listener
/// registered after the value has settled is never called.
///
/// # Examples
///
/// ```
/// use deferred::{Deferred, Error};
/// use futures::channel::oneshot;
/// use futures::executor::block_on;
/// use std::sync::mpsc;
/// use std::thread;
///
/// let (go, wait) = mpsc::channel::<()>();
/// let deferred: Deferred<String> = Deferred::new(|resolver, _| {
///     thread::spawn(move || {
///         if wait.recv().is_ok() {
///             resolver.resolve(String::from("🍓"));
///         }
///     });
///     Ok(())
/// });
///
/// let (tx, rx) = oneshot::channel();
/// deferred
///     .then(move |value| {
///         let _ = tx.send(value);
///     })
///     .catch(|err: Error| panic!("unexpected failure: {err}"));
///
/// go.send(()).unwrap();
/// assert_eq!(block_on(rx).unwrap(), "🍓");
/// assert!(!deferred.is_pending());
/// ```
pub struct Deferred<T, E = Error> {
    inner: Arc<Mutex<Inner<T, E>>>,
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T: fmt::Debug, E> fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = lock(&self.inner);
        f.debug_struct("Deferred")
            .field("pending", &inner.pending)
            .field("value", &inner.value)
            .finish_non_exhaustive()
    }
}

impl<T, E> Deferred<T, E> {
    /// Creates a pending value and runs `producer` on it immediately.
    ///
    /// The producer is handed the two settlement handles. If it returns
    /// `Err`, the value is rejected with that error; this is a no-op when the
    /// producer already settled it. Panics are not caught.
    pub fn new<F>(producer: F) -> Self
    where
        F: FnOnce(Resolver<T, E>, Rejecter<T, E>) -> Result<(), E>,
    {
        let deferred = Self {
            inner: Arc::new(Mutex::new(Inner {
                pending: true,
                value: None,
                on_resolve: None,
                on_reject: None,
            })),
        };
        let rejecter = Rejecter { inner: deferred.inner.clone() };
        let resolver = Resolver { inner: deferred.inner.clone() };
        if let Err(err) = producer(resolver, rejecter.clone()) {
            log::trace!("producer failed before returning, rejecting");
            rejecter.reject(err);
        }
        deferred
    }

    /// A value that has already failed with `error`.
    pub fn rejected(error: E) -> Self {
        Self::new(|_, rejecter| {
            rejecter.reject(error);
            Ok(())
        })
    }

    /// Sets the success listener, replacing any previous one.
    ///
    /// If the value has already settled the listener is dropped without being
    /// called.
    pub fn then<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        // The replaced listener is dropped once the lock is released.
        let _previous = {
            let mut inner = lock(&self.inner);
            if inner.pending {
                inner.on_resolve.replace(Box::new(callback))
            } else {
                log::trace!("success listener registered after settlement, it will not run");
                None
            }
        };
        self
    }

    /// Sets the failure listener, replacing any previous one.
    ///
    /// Like [`then`](Self::then), a listener registered after settlement
    /// never runs.
    pub fn catch<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(E) + Send + 'static,
    {
        let _previous = {
            let mut inner = lock(&self.inner);
            if inner.pending {
                inner.on_reject.replace(Box::new(callback))
            } else {
                log::trace!("failure listener registered after settlement, it will not run");
                None
            }
        };
        self
    }

    /// True until the value settles, false forever after.
    pub fn is_pending(&self) -> bool {
        lock(&self.inner).pending
    }
}

impl<T: Clone, E> Deferred<T, E> {
    /// A value that has already succeeded with `value`.
    pub fn resolved(value: T) -> Self {
        Self::new(|resolver, _| {
            resolver.resolve(value);
            Ok(())
        })
    }

    /// The success payload, or `None` while pending or after a failure.
    pub fn value(&self) -> Option<T> {
        lock(&self.inner).value.clone()
    }
}

/// Settles a [`Deferred`] successfully.
pub struct Resolver<T, E = Error> {
    inner: Arc<Mutex<Inner<T, E>>>,
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T, E> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

impl<T, E> Resolver<T, E> {
    /// The instance this handle settles.
    pub fn deferred(&self) -> Deferred<T, E> {
        Deferred { inner: self.inner.clone() }
    }
}

impl<T: Clone, E> Resolver<T, E> {
    /// Stores `value` and calls the success listener with it, if one is set.
    ///
    /// Ignored if the value has already settled.
    pub fn resolve(&self, value: T) {
        let (notify, _stale) = {
            let mut inner = lock(&self.inner);
            if !inner.settle() {
                log::debug!("resolve called on a settled value, ignoring");
                return;
            }
            let notify = match inner.on_resolve.take() {
                Some(listener) => {
                    inner.value = Some(value.clone());
                    Some((listener, value))
                }
                None => {
                    inner.value = Some(value);
                    None
                }
            };
            (notify, inner.on_reject.take())
        };
        log::trace!("resolved, listener present: {}", notify.is_some());
        if let Some((listener, value)) = notify {
            listener(value);
        }
    }
}

/// Settles a [`Deferred`] with an error.
pub struct Rejecter<T, E = Error> {
    inner: Arc<Mutex<Inner<T, E>>>,
}

impl<T, E> Clone for Rejecter<T, E> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<T, E> fmt::Debug for Rejecter<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejecter").finish_non_exhaustive()
    }
}

impl<T, E> Rejecter<T, E> {
    /// The instance this handle settles.
    pub fn deferred(&self) -> Deferred<T, E> {
        Deferred { inner: self.inner.clone() }
    }

    /// Calls the failure listener with `error`, if one is set. No value is
    /// stored. An error nobody listens for is dropped.
    ///
    /// Ignored if the value has already settled.
    pub fn reject(&self, error: E) {
        let (listener, _stale) = {
            let mut inner = lock(&self.inner);
            if !inner.settle() {
                log::debug!("reject called on a settled value, ignoring");
                return;
            }
            (inner.on_reject.take(), inner.on_resolve.take())
        };
        log::trace!("rejected, listener present: {}", listener.is_some());
        if let Some(listener) = listener {
            listener(error);
        }
    }
}

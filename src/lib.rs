//! Chainable promises that start running the moment they are created.
//!
//! A [`Promise`] wraps one deferred computation. Its body runs right away, on its own thread by
//! default, and settles exactly once with either a value or an [`ErrorHandle`]. Continuations
//! attached with [`Promise::then`], [`Promise::then_or`] or [`Promise::except`] produce new
//! promises that run as soon as their predecessor settles. [`await_promise`] blocks until a chain
//! is done and releases every node of it, and [`all`] fans in a tuple of independent promises.
//!
//! # Examples
//!
//! ```
//! use promise_chain::{all, await_promise, create_promise, resolve};
//!
//! let doubled = resolve(21).then(|x| x * 2);
//! assert_eq!(await_promise(doubled).unwrap(), 42);
//!
//! let joined = all((create_promise(|| 1), resolve("two"), resolve(())));
//! assert_eq!(joined.await_promise().unwrap(), (1, "two", ()));
//! ```
//!
//! Failures travel down the chain untouched until a handler takes them:
//!
//! ```
//! use promise_chain::resolve;
//!
//! let recovered = resolve(4)
//!     .then(|_| -> i32 { std::panic::panic_any(1i32) })
//!     .then_or(|x| x * 2, |err| *err.downcast_ref::<i32>().unwrap());
//! assert_eq!(recovered.await_promise().unwrap(), 1);
//! ```

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod combinators;
pub mod lifecycle;
pub mod promise;
pub mod rejection;
pub mod settlement;
pub mod spawn;
mod unit;

pub use combinators::{
    all, all_of, await_promise, create_promise, create_promise_with, reject, resolve,
    try_create_promise, All,
};
pub use lifecycle::Tracker;
pub use promise::Promise;
pub use rejection::ErrorHandle;
pub use settlement::Deferred;
pub use spawn::{Mode, Spawner};
pub use unit::resolved;

/// Failures raised by the library itself.
///
/// They reach handlers wrapped in an [`ErrorHandle`], next to whatever payloads user code raises.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("deferral handle dropped without settling the promise")]
    ProducerDropped,
    #[error("promise already settled")]
    AlreadySettled,
    #[error("settled outcome was already taken")]
    AlreadyTaken,
    #[error("promise chain was released by an earlier await")]
    Released,
    #[error("failed to spawn a promise thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Bodies never run while one of our locks is held, so a poisoned lock still guards valid state.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

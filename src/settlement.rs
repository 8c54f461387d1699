//! The settlement cell behind every promise.
//!
//! A [`Deferred`] is the producer half: it is handed to a promise body and settles the cell with
//! a value or a failure. The consumer half, [`Settlement`], is held by the promise itself and
//! either blocks a thread or parks a task until that single outcome is written.

use std::{
    any::Any,
    cell::RefCell,
    mem,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Condvar, Mutex, PoisonError},
    task::{Context, Poll, Waker},
    thread,
};

use crate::{lock, Error, ErrorHandle};

thread_local! {
    /// Slots of the bodies currently running on this thread, innermost last.
    static RUNNING: RefCell<Vec<usize>> = const { RefCell::new(Vec::new()) };
}

/// Creates a connected pair of [`Deferred`] and [`Settlement`].
pub(crate) fn pair<T>() -> (Deferred<T>, Settlement<T>) {
    let slot = Arc::new(Slot {
        inner: Mutex::new(Inner {
            state: State::Pending,
            waker: None,
        }),
        ready: Condvar::new(),
    });
    (
        Deferred {
            slot: slot.clone(),
            settled: false,
        },
        Settlement { slot },
    )
}

/// Runs a promise body, turning a panic into a rejection.
///
/// A panicking body drops its own [`Deferred`] while unwinding. That drop stays silent here, and
/// the panic payload becomes the rejection instead of [`Error::ProducerDropped`]. Any other
/// handle the body drops on the way out still rejects with [`Error::ProducerDropped`].
pub(crate) fn run<T, F>(body: F, deferred: Deferred<T>)
where
    F: FnOnce(Deferred<T>),
{
    let slot = deferred.slot.clone();
    let key = slot.key();
    RUNNING.with(|running| running.borrow_mut().push(key));
    let result = panic::catch_unwind(AssertUnwindSafe(move || body(deferred)));
    RUNNING.with(|running| running.borrow_mut().pop());
    if let Err(payload) = result {
        if let Err(err) = slot.settle(Err(ErrorHandle::from_panic(payload))) {
            log::debug!("body panicked after settling its promise: {err}");
        }
    }
}

fn owned_by_running_body(key: usize) -> bool {
    RUNNING.with(|running| running.borrow().contains(&key))
}

/// The deferral handle a promise body settles.
///
/// Both [`resolve`](Deferred::resolve) and [`reject`](Deferred::reject) consume the handle, so a
/// promise cannot be settled twice. Dropping the handle without calling either rejects the
/// promise with [`Error::ProducerDropped`].
///
/// # Examples
///
/// ```
/// use promise_chain::Promise;
/// use std::thread;
///
/// let promise = Promise::new(|deferred| {
///     thread::spawn(move || deferred.resolve(String::from("🍓")));
/// });
/// assert_eq!(promise.await_promise().unwrap(), "🍓");
/// ```
#[derive(Debug)]
pub struct Deferred<T> {
    slot: Arc<Slot<T>>,
    settled: bool,
}

impl<T> Deferred<T> {
    pub fn resolve(mut self, value: T) {
        self.settle(Ok(value));
    }

    /// Rejects with `error`; an [`ErrorHandle`] is forwarded with its payload untouched.
    pub fn reject<E: Any + Send>(mut self, error: E) {
        self.settle(Err(ErrorHandle::new(error)));
    }

    fn settle(&mut self, outcome: Result<T, ErrorHandle>) {
        self.settled = true;
        if let Err(err) = self.slot.settle(outcome) {
            log::warn!("ignoring a second settlement: {err}");
        }
    }
}

impl<T> Drop for Deferred<T> {
    /// If this is an unsettled producer, reject with [`Error::ProducerDropped`].
    fn drop(&mut self) {
        if self.settled || (thread::panicking() && owned_by_running_body(self.slot.key())) {
            return;
        }
        log::trace!("deferral handle dropped before settling");
        if let Err(err) = self.slot.settle(Err(ErrorHandle::new(Error::ProducerDropped))) {
            log::trace!("dropped deferral handle found its promise settled: {err}");
        }
    }
}

/// The reading half of a settlement cell.
#[derive(Debug)]
pub(crate) struct Settlement<T> {
    slot: Arc<Slot<T>>,
}

impl<T> Settlement<T> {
    /// Blocks the calling thread until the outcome is written, then takes it.
    pub(crate) fn wait(&self) -> Result<T, ErrorHandle> {
        self.slot.wait()
    }

    /// Takes the outcome if it is there, otherwise parks `cx`'s waker.
    pub(crate) fn poll_take(&self, cx: &mut Context<'_>) -> Poll<Result<T, ErrorHandle>> {
        let mut inner = lock(&self.slot.inner);
        match mem::replace(&mut inner.state, State::Taken) {
            State::Pending => {
                inner.state = State::Pending;
                inner.waker = Some(cx.waker().clone());
                Poll::Pending
            }
            State::Settled(outcome) => Poll::Ready(outcome),
            State::Taken => Poll::Ready(Err(ErrorHandle::new(Error::AlreadyTaken))),
        }
    }

    pub(crate) fn is_settled(&self) -> bool {
        !matches!(lock(&self.slot.inner).state, State::Pending)
    }
}

#[derive(Debug)]
struct Slot<T> {
    inner: Mutex<Inner<T>>,
    ready: Condvar,
}

#[derive(Debug)]
struct Inner<T> {
    state: State<T>,
    waker: Option<Waker>,
}

#[derive(Debug)]
enum State<T> {
    Pending,
    Settled(Result<T, ErrorHandle>),
    Taken,
}

impl<T> Slot<T> {
    fn key(&self) -> usize {
        self as *const Self as usize
    }

    fn settle(&self, outcome: Result<T, ErrorHandle>) -> Result<(), Error> {
        let mut inner = lock(&self.inner);
        if !matches!(inner.state, State::Pending) {
            return Err(Error::AlreadySettled);
        }
        log::trace!(
            "settling promise as {}",
            if outcome.is_ok() { "resolved" } else { "rejected" }
        );
        inner.state = State::Settled(outcome);
        let waker = inner.waker.take();
        drop(inner);
        self.ready.notify_all();
        if let Some(waker) = waker {
            waker.wake()
        }
        Ok(())
    }

    fn wait(&self) -> Result<T, ErrorHandle> {
        let mut inner = lock(&self.inner);
        loop {
            match mem::replace(&mut inner.state, State::Taken) {
                State::Pending => {
                    inner.state = State::Pending;
                    inner = self
                        .ready
                        .wait(inner)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                State::Settled(outcome) => return outcome,
                State::Taken => return Err(ErrorHandle::new(Error::AlreadyTaken)),
            }
        }
    }
}

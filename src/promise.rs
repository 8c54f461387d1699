//! The promise type and its continuations.

use std::{
    any::Any,
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use crate::{
    lifecycle::{Node, Tracker},
    lock,
    settlement::{self, Settlement},
    Deferred, Error, ErrorHandle, Mode, Spawner,
};

/// A deferred computation that settles exactly once with a `T` or an [`ErrorHandle`].
///
/// The body starts running as soon as the promise is created. Continuations consume the promise
/// they are attached to and return a new one, so every promise has at most one reader and no
/// handle to a chain survives the [`await_promise`](Promise::await_promise) that releases it.
///
/// A promise is also a [`Future`], which lets async code wait for it without blocking a thread.
///
/// # Examples
///
/// ```
/// use futures::executor::block_on;
/// use promise_chain::Promise;
///
/// let promise = Promise::new(|deferred| deferred.resolve(2)).then(|x| x * 10);
/// assert_eq!(block_on(promise).unwrap(), 20);
/// ```
#[derive(Debug)]
pub struct Promise<T> {
    settlement: Settlement<T>,
    node: Arc<Node>,
}

impl<T: Send + 'static> Promise<T> {
    /// Creates a root promise whose body runs on a new thread.
    pub fn new<F>(body: F) -> Self
    where
        F: FnOnce(Deferred<T>) + Send + 'static,
    {
        Spawner::new().create(body)
    }

    /// Creates a root promise whose body has already run when this returns.
    ///
    /// Continuations of an inline promise run inline too, blocking the caller until they settle.
    pub fn new_inline<F>(body: F) -> Self
    where
        F: FnOnce(Deferred<T>) + Send + 'static,
    {
        Spawner::inline().create(body)
    }

    pub(crate) fn launch<F>(node: Arc<Node>, body: F) -> Self
    where
        F: FnOnce(Deferred<T>) + Send + 'static,
    {
        let (deferred, settlement) = settlement::pair();
        match node.spawner().execution_mode() {
            Mode::Inline => {
                settlement::run(body, deferred);
                node.finish_process();
            }
            Mode::Threaded => {
                // Handed back to us if the thread never starts.
                let job = Arc::new(Mutex::new(Some((body, deferred))));
                let worker_job = job.clone();
                let worker_node = node.clone();
                let spawned = node.spawner().spawn(node.id(), move || {
                    let taken = lock(&worker_job).take();
                    if let Some((body, deferred)) = taken {
                        settlement::run(body, deferred);
                    }
                    worker_node.finish_process();
                });
                // Detached: readers wait on the settlement, never on the thread.
                match spawned {
                    Ok(_) => log::trace!("spawned promise #{}", node.id()),
                    Err(err) => {
                        log::error!("failed to spawn promise #{}: {err}", node.id());
                        let taken = lock(&job).take();
                        if let Some((_, deferred)) = taken {
                            deferred.reject(Error::Spawn(err));
                        }
                        node.finish_process();
                    }
                }
            }
        }
        Promise { settlement, node }
    }

    /// Attaches a child promise whose body reads this promise's outcome and hands it to `step`.
    fn chain<U, F>(self, step: F) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(Result<T, ErrorHandle>, Deferred<U>) + Send + 'static,
    {
        let adopted = self.node.adopt();
        match adopted {
            Ok(node) => Promise::launch(node, move |deferred| step(self.settle(), deferred)),
            Err(err) => {
                log::warn!(
                    "continuation attached to promise #{} after its chain was released",
                    self.node.id()
                );
                Spawner::inline().create(move |deferred| deferred.reject(err))
            }
        }
    }

    /// Waits for the outcome only. The body may still be running after it settled.
    fn settle(self) -> Result<T, ErrorHandle> {
        self.settlement.wait()
    }

    /// Runs `on_success` with the value once this promise resolves.
    ///
    /// A failure of this promise is forwarded to the returned promise unchanged. A panic inside
    /// `on_success` rejects the returned promise with the panic payload.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::resolve;
    ///
    /// let promise = resolve(3).then(|x| x + 1).then(|x| x.to_string());
    /// assert_eq!(promise.await_promise().unwrap(), "4");
    /// ```
    pub fn then<U, F>(self, on_success: F) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.chain(move |outcome, deferred| match outcome {
            Ok(value) => deferred.resolve(on_success(value)),
            Err(err) => deferred.reject(err),
        })
    }

    /// Like [`then`](Promise::then), but a failure of this promise goes to `on_error`, whose
    /// result resolves the returned promise.
    ///
    /// `on_error` only ever sees this promise's failure: a panic in `on_success` rejects the
    /// returned promise directly, and so does a panic in `on_error`.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::reject;
    ///
    /// let promise = reject::<i32, _>("no value").then_or(|x| x * 2, |err| {
    ///     assert_eq!(err.message(), Some("no value"));
    ///     -1
    /// });
    /// assert_eq!(promise.await_promise().unwrap(), -1);
    /// ```
    pub fn then_or<U, F, R>(self, on_success: F, on_error: R) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
        R: FnOnce(ErrorHandle) -> U + Send + 'static,
    {
        self.chain(move |outcome, deferred| match outcome {
            Ok(value) => deferred.resolve(on_success(value)),
            Err(err) => deferred.resolve(on_error(err)),
        })
    }

    /// Like [`then`](Promise::then) for a fallible step: `Err(e)` rejects with `e`.
    pub fn try_then<U, E, F>(self, on_success: F) -> Promise<U>
    where
        U: Send + 'static,
        E: Any + Send,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        self.chain(move |outcome, deferred| match outcome.map(on_success) {
            Ok(Ok(value)) => deferred.resolve(value),
            Ok(Err(err)) => deferred.reject(err),
            Err(err) => deferred.reject(err),
        })
    }

    /// Terminates a chain: a success resolves with `()`, a failure goes to `on_error`.
    ///
    /// If `on_error` panics, the returned promise rejects with that panic instead.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::resolve;
    /// use std::sync::mpsc::channel;
    ///
    /// let (tx, rx) = channel();
    /// let done = resolve(1)
    ///     .then(|_: i32| -> i32 { panic!("lost") })
    ///     .except(move |err| tx.send(err.to_string()).unwrap());
    /// done.await_promise().unwrap();
    /// assert_eq!(rx.recv().unwrap(), "lost");
    /// ```
    pub fn except<F>(self, on_error: F) -> Promise<()>
    where
        F: FnOnce(ErrorHandle) + Send + 'static,
    {
        self.chain(move |outcome, deferred| {
            if let Err(err) = outcome {
                on_error(err);
            }
            deferred.resolve(())
        })
    }

    /// Passes a success through and turns a failure into a value with `on_error`.
    pub fn recover<F>(self, on_error: F) -> Promise<T>
    where
        F: FnOnce(ErrorHandle) -> T + Send + 'static,
    {
        self.chain(move |outcome, deferred| match outcome {
            Ok(value) => deferred.resolve(value),
            Err(err) => deferred.resolve(on_error(err)),
        })
    }

    /// Blocks until this promise settles, then releases every node of its chain.
    ///
    /// The chain registry is empty once this returns. Bodies that settled but are still running
    /// hold on to their own node until they return.
    ///
    /// Returns the value, or the [`ErrorHandle`] the chain was rejected with. Call
    /// [`ErrorHandle::resume`] on the error to re-raise it as a panic.
    pub fn await_promise(self) -> Result<T, ErrorHandle> {
        let node = self.node.clone();
        let outcome = self.settle();
        node.release_chain();
        outcome
    }

    /// `true` once the outcome is written. Never blocks.
    pub fn is_settled(&self) -> bool {
        self.settlement.is_settled()
    }

    /// A weak observer of this promise's lifecycle node and chain.
    pub fn tracker(&self) -> Tracker {
        self.node.tracker()
    }
}

impl<T: Send + 'static> Future for Promise<T> {
    type Output = Result<T, ErrorHandle>;

    /// Once ready, the chain is released exactly as [`Promise::await_promise`] releases it.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let promise = self.get_mut();
        match promise.settlement.poll_take(cx) {
            Poll::Ready(outcome) => {
                promise.node.release_chain();
                Poll::Ready(outcome)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

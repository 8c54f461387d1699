//! Conveniences for promises that carry no value.

use crate::{resolve, Deferred, ErrorHandle, Promise};

/// A promise that has nothing to report besides being done.
pub fn resolved() -> Promise<()> {
    resolve(())
}

impl Deferred<()> {
    /// Resolves a no-value promise.
    pub fn done(self) {
        self.resolve(())
    }
}

impl Promise<()> {
    /// Runs `on_success` once this promise resolves, with no value flowing between the two.
    ///
    /// # Examples
    ///
    /// ```
    /// use promise_chain::create_promise;
    ///
    /// let promise = create_promise(|| println!("first")).then_do(|| println!("second"));
    /// promise.await_promise().unwrap();
    /// ```
    pub fn then_do<U, F>(self, on_success: F) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce() -> U + Send + 'static,
    {
        self.then(move |()| on_success())
    }

    /// The no-value form of [`Promise::then_or`].
    pub fn then_do_or<U, F, R>(self, on_success: F, on_error: R) -> Promise<U>
    where
        U: Send + 'static,
        F: FnOnce() -> U + Send + 'static,
        R: FnOnce(ErrorHandle) -> U + Send + 'static,
    {
        self.then_or(move |()| on_success(), on_error)
    }
}

//! Where promise bodies run.

use std::{
    io,
    thread::{self, JoinHandle},
};

use crate::{lifecycle::Node, Deferred, Promise};

/// How a promise body is executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Every promise gets its own OS thread and creation returns immediately.
    #[default]
    Threaded,
    /// The body runs to completion in the calling context before creation returns.
    Inline,
}

/// A builder that configures how promises of one chain are executed.
///
/// Continuations attached with [`Promise::then`] and friends inherit the spawner of the promise
/// they were attached to.
///
/// # Examples
///
/// ```
/// use promise_chain::{Mode, Spawner};
///
/// let spawner = Spawner::new().name("fetch").stack_size(256 * 1024);
/// let promise = spawner.create(|deferred| {
///     let name = std::thread::current().name().map(str::to_owned);
///     deferred.resolve(name)
/// });
/// assert!(promise.await_promise().unwrap().unwrap().starts_with("fetch-"));
///
/// let inline = Spawner::new().mode(Mode::Inline).create(|deferred| deferred.resolve(1));
/// assert!(inline.is_settled());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Spawner {
    mode: Mode,
    name: Option<String>,
    stack_size: Option<usize>,
}

impl Spawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a spawner in [`Mode::Inline`].
    pub fn inline() -> Self {
        Self::new().mode(Mode::Inline)
    }

    pub fn mode(self, mode: Mode) -> Self {
        Self { mode, ..self }
    }

    /// Sets the prefix of promise thread names. Threads are named `<name>-<node id>`.
    pub fn name<N: Into<String>>(self, name: N) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Sets the stack size of promise threads, in bytes.
    pub fn stack_size(self, stack_size: usize) -> Self {
        Self {
            stack_size: Some(stack_size),
            ..self
        }
    }

    pub fn execution_mode(&self) -> Mode {
        self.mode
    }

    /// Creates a root promise whose body runs according to this configuration.
    pub fn create<T, F>(&self, body: F) -> Promise<T>
    where
        T: Send + 'static,
        F: FnOnce(Deferred<T>) + Send + 'static,
    {
        Promise::launch(Node::root(self.clone()), body)
    }

    pub(crate) fn spawn<F>(&self, id: u64, task: F) -> io::Result<JoinHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        let prefix = self.name.as_deref().unwrap_or("promise");
        let mut builder = thread::Builder::new().name(format!("{prefix}-{id}"));
        if let Some(stack_size) = self.stack_size {
            builder = builder.stack_size(stack_size);
        }
        builder.spawn(task)
    }
}

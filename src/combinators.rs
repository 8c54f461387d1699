//! Free functions that build and combine promises.

use std::any::Any;

use crate::{Deferred, ErrorHandle, Promise};

/// A root promise that resolves with `value`.
pub fn resolve<T: Send + 'static>(value: T) -> Promise<T> {
    Promise::new(move |deferred| deferred.resolve(value))
}

/// A root promise that rejects with `error`.
///
/// # Examples
///
/// ```
/// use promise_chain::reject;
///
/// let err = reject::<u8, _>(404u16).await_promise().unwrap_err();
/// assert_eq!(err.downcast_ref::<u16>(), Some(&404));
/// ```
pub fn reject<T, E>(error: E) -> Promise<T>
where
    T: Send + 'static,
    E: Any + Send,
{
    Promise::new(move |deferred| deferred.reject(error))
}

/// A root promise resolving with whatever `f` returns. A panic in `f` rejects it.
pub fn create_promise<T, F>(f: F) -> Promise<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    Promise::new(move |deferred| deferred.resolve(f()))
}

/// A root promise whose body settles the [`Deferred`] handle itself.
pub fn create_promise_with<T, F>(f: F) -> Promise<T>
where
    T: Send + 'static,
    F: FnOnce(Deferred<T>) + Send + 'static,
{
    Promise::new(f)
}

/// A root promise settled by the `Result` of `f`.
pub fn try_create_promise<T, E, F>(f: F) -> Promise<T>
where
    T: Send + 'static,
    E: Any + Send,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    Promise::new(move |deferred| match f() {
        Ok(value) => deferred.resolve(value),
        Err(err) => deferred.reject(err),
    })
}

/// Blocks until `promise` settles and releases its chain. See [`Promise::await_promise`].
pub fn await_promise<T: Send + 'static>(promise: Promise<T>) -> Result<T, ErrorHandle> {
    promise.await_promise()
}

/// A fixed set of promises that can be waited on together.
///
/// Implemented for tuples of up to twelve promises of any value types.
pub trait All {
    type Output: Send + 'static;

    fn all(self) -> Promise<Self::Output>;
}

/// Fans in a tuple of independently running promises.
///
/// The returned promise awaits the inputs in order and resolves with a tuple of their values,
/// `()` standing in for no-value promises. The first input found rejected, in argument order,
/// rejects the whole fan-in with its error. The other inputs keep running either way.
///
/// # Examples
///
/// ```
/// use promise_chain::{all, create_promise, resolve};
///
/// let joined = all((resolve(1), create_promise(|| "two"), resolve(())));
/// assert_eq!(joined.await_promise().unwrap(), (1, "two", ()));
/// ```
pub fn all<P: All>(promises: P) -> Promise<P::Output> {
    promises.all()
}

macro_rules! impl_all {
    ($($value:ident),+) => {
        impl<$($value: Send + 'static),+> All for ($(Promise<$value>,)+) {
            type Output = ($($value,)+);

            #[allow(non_snake_case)]
            fn all(self) -> Promise<Self::Output> {
                Promise::new(move |deferred| {
                    let ($($value,)+) = self;
                    $(
                        let $value = match $value.await_promise() {
                            Ok(value) => value,
                            Err(err) => return deferred.reject(err),
                        };
                    )+
                    deferred.resolve(($($value,)+))
                })
            }
        }
    };
}

impl_all!(A);
impl_all!(A, B);
impl_all!(A, B, C);
impl_all!(A, B, C, D);
impl_all!(A, B, C, D, E);
impl_all!(A, B, C, D, E, F);
impl_all!(A, B, C, D, E, F, G);
impl_all!(A, B, C, D, E, F, G, H);
impl_all!(A, B, C, D, E, F, G, H, I);
impl_all!(A, B, C, D, E, F, G, H, I, J);
impl_all!(A, B, C, D, E, F, G, H, I, J, K);
impl_all!(A, B, C, D, E, F, G, H, I, J, K, L);

/// Fans in any number of promises of one value type, with the same ordering and failure rules
/// as [`all`].
pub fn all_of<T, I>(promises: I) -> Promise<Vec<T>>
where
    T: Send + 'static,
    I: IntoIterator<Item = Promise<T>>,
{
    let promises: Vec<_> = promises.into_iter().collect();
    Promise::new(move |deferred| {
        let mut values = Vec::with_capacity(promises.len());
        for promise in promises {
            match promise.await_promise() {
                Ok(value) => values.push(value),
                Err(err) => return deferred.reject(err),
            }
        }
        deferred.resolve(values)
    })
}

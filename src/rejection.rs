//! Type-erased failure payloads.

use std::{any::Any, fmt, panic::resume_unwind};

use crate::Error;

/// Whatever a failed promise was rejected with.
///
/// The payload keeps its concrete type, so a handler recovers it with [`ErrorHandle::downcast_ref`]
/// or [`ErrorHandle::downcast`]. Panic payloads captured from bodies and handlers land here as-is,
/// which means `panic!("...")` yields a `&'static str` or `String` payload and
/// [`std::panic::panic_any`] yields whatever value it was given.
///
/// # Examples
///
/// ```
/// use promise_chain::ErrorHandle;
///
/// let err = ErrorHandle::new(7u8);
/// assert!(err.is::<u8>());
/// assert_eq!(err.downcast::<u8>().ok(), Some(7));
/// ```
pub struct ErrorHandle {
    payload: Box<dyn Any + Send>,
}

impl ErrorHandle {
    /// Wraps `error`. Wrapping an `ErrorHandle` returns it unchanged.
    pub fn new<E: Any + Send>(error: E) -> Self {
        Self::from_panic(Box::new(error))
    }

    /// Wraps a payload caught by [`std::panic::catch_unwind`].
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        match payload.downcast::<ErrorHandle>() {
            Ok(handle) => *handle,
            Err(payload) => ErrorHandle { payload },
        }
    }

    pub fn is<E: Any>(&self) -> bool {
        self.payload.is::<E>()
    }

    pub fn downcast_ref<E: Any>(&self) -> Option<&E> {
        self.payload.downcast_ref::<E>()
    }

    /// Takes the payload out as an `E`, or hands the handle back if it holds something else.
    pub fn downcast<E: Any>(self) -> Result<E, Self> {
        match self.payload.downcast::<E>() {
            Ok(error) => Ok(*error),
            Err(payload) => Err(ErrorHandle { payload }),
        }
    }

    /// The text of a `&str` or `String` payload, which covers `panic!` with a message.
    pub fn message(&self) -> Option<&str> {
        if let Some(message) = self.payload.downcast_ref::<&'static str>() {
            Some(*message)
        } else {
            self.payload.downcast_ref::<String>().map(String::as_str)
        }
    }

    /// Re-raises the failure as a panic in the calling thread.
    pub fn resume(self) -> ! {
        resume_unwind(self.payload)
    }

    pub fn into_inner(self) -> Box<dyn Any + Send> {
        self.payload
    }
}

impl From<Error> for ErrorHandle {
    fn from(error: Error) -> Self {
        ErrorHandle::new(error)
    }
}

impl fmt::Debug for ErrorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.message(), self.downcast_ref::<Error>()) {
            (Some(message), _) => f.debug_tuple("ErrorHandle").field(&message).finish(),
            (None, Some(error)) => f.debug_tuple("ErrorHandle").field(error).finish(),
            (None, None) => f.write_str("ErrorHandle(<opaque>)"),
        }
    }
}

impl fmt::Display for ErrorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.message(), self.downcast_ref::<Error>()) {
            (Some(message), _) => f.write_str(message),
            (None, Some(error)) => fmt::Display::fmt(error, f),
            (None, None) => f.write_str("promise rejected with an opaque payload"),
        }
    }
}

impl std::error::Error for ErrorHandle {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.downcast_ref::<Error>()
            .map(|error| error as &(dyn std::error::Error + 'static))
    }
}

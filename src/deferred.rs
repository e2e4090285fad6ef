//! Values that become available once an asynchronous dependency settles.
//!
//! A [`Deferred`] wraps a shared boxed future. Cloning is cheap and every
//! clone observes the same result. Nothing drives the future except a
//! consumer awaiting it, so constructing or mapping a deferred value never
//! blocks.

use std::fmt;
use std::future::{Future, IntoFuture};

use futures::future::{BoxFuture, FutureExt, Shared};

use crate::error::OutputError;

/// Settled result of a deferred value.
pub type Settled<T> = Result<T, OutputError>;

/// A value resolved after its dependencies settle.
pub struct Deferred<T: Clone> {
    inner: Shared<BoxFuture<'static, Settled<T>>>,
}

impl<T> Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Wrap a future.
    pub fn from_future<F>(future: F) -> Self
    where
        F: Future<Output = Settled<T>> + Send + 'static,
    {
        Self {
            inner: future.boxed().shared(),
        }
    }

    /// An already-known value.
    pub fn ready(value: T) -> Self {
        Self::from_future(futures::future::ready(Ok(value)))
    }

    /// An already-failed value.
    pub fn failed(error: OutputError) -> Self {
        Self::from_future(futures::future::ready(Err(error)))
    }

    /// Derive a new deferred value from this one once it settles.
    pub fn apply<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Settled<U> + Send + 'static,
    {
        let source = self.inner.clone();
        Deferred::from_future(async move { f(source.await?) })
    }

    /// The settled result, if some consumer has already driven it to completion.
    pub fn peek(&self) -> Option<Settled<T>> {
        self.inner.peek().cloned()
    }
}

impl<T: Clone> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.inner.peek().is_some() {
            "settled"
        } else {
            "pending"
        };
        f.debug_struct("Deferred").field("state", &state).finish()
    }
}

impl<T> IntoFuture for Deferred<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Output = Settled<T>;
    type IntoFuture = Shared<BoxFuture<'static, Settled<T>>>;

    fn into_future(self) -> Self::IntoFuture {
        self.inner
    }
}

//! Single-assignment asynchronous result.
//!
//! A [`Deferred`] is the settling side; any number of [`Promise`]s observe
//! the outcome. Only the first `resolve`/`reject` has effect. Promises are
//! plain futures and cannot settle anything themselves.

use crate::error::LoadError;
use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::Shared;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

pub type Outcome<T> = Result<T, LoadError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    Pending,
    Resolved,
    Rejected,
}

struct Slot<T> {
    sender: Option<oneshot::Sender<Outcome<T>>>,
    status: Status,
}

pub struct Deferred<T: Clone> {
    slot: Rc<RefCell<Slot<T>>>,
    shared: Shared<oneshot::Receiver<Outcome<T>>>,
}

impl<T: Clone> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
            shared: self.shared.clone(),
        }
    }
}

impl<T: Clone> Default for Deferred<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Deferred<T> {
    pub fn new() -> Self {
        let (sender, receiver) = oneshot::channel();
        Self {
            slot: Rc::new(RefCell::new(Slot {
                sender: Some(sender),
                status: Status::Pending,
            })),
            shared: receiver.shared(),
        }
    }

    /// Returns false if the deferred had already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    pub fn reject(&self, error: LoadError) -> bool {
        self.settle(Err(error))
    }

    fn settle(&self, outcome: Outcome<T>) -> bool {
        let mut slot = self.slot.borrow_mut();
        let Some(sender) = slot.sender.take() else {
            return false;
        };
        slot.status = if outcome.is_ok() {
            Status::Resolved
        } else {
            Status::Rejected
        };
        // Nobody listening is fine; the status still records the outcome.
        let _ = sender.send(outcome);
        true
    }

    pub fn status(&self) -> Status {
        self.slot.borrow().status
    }

    pub fn is_pending(&self) -> bool {
        self.status() == Status::Pending
    }

    pub fn promise(&self) -> Promise<T> {
        Promise {
            inner: self.shared.clone(),
        }
    }
}

/// Read side of a [`Deferred`].
///
/// Resolves to [`LoadError::Abandoned`] if every settling handle is dropped
/// while still pending.
pub struct Promise<T: Clone> {
    inner: Shared<oneshot::Receiver<Outcome<T>>>,
}

impl<T: Clone> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone> Promise<T> {
    /// The outcome if it is already available, without waiting.
    pub fn peek(&self) -> Option<Outcome<T>> {
        self.inner
            .clone()
            .now_or_never()
            .map(|received| received.unwrap_or(Err(LoadError::Abandoned)))
    }
}

impl<T: Clone> Future for Promise<T> {
    type Output = Outcome<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner
            .poll_unpin(cx)
            .map(|received| received.unwrap_or(Err(LoadError::Abandoned)))
    }
}

//! Observable contract and the scoped-observation helper.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::{
  disposable::Disposable,
  error::{DisposeError, ObserveError},
  observer::Observer,
};

mod iterable;
mod unit;

pub use iterable::FromIterable;
pub use unit::Unit;

/// Source capability: can be attached to by an [`Observer`].
///
/// The returned disposable is the sole owning handle for the attachment;
/// disposing it detaches the observer, and a second dispose is a no-op.
/// Attachment is pure registration, never delivery.
#[async_trait]
pub trait Observable<Item>: Send + Sync {
  async fn observe(
    &self,
    observer: Arc<dyn Observer<Item>>,
  ) -> Result<Box<dyn Disposable>, ObserveError>;
}

/// Attach `observer` to `source`, returning the scoped [`Observation`].
pub async fn observe<Item>(
  source: &dyn Observable<Item>,
  observer: Arc<dyn Observer<Item>>,
) -> Result<Observation<Item>, ObserveError> {
  let handle = source.observe(observer.clone()).await?;
  Ok(Observation { observer, handle: Mutex::new(Some(handle)) })
}

/// A source/observer pairing managed as a scoped resource: acquired by
/// attaching, released by [`Observation::dispose`].
///
/// Release detaches the observer from the source and then gracefully closes
/// the observer, unless it is `keep_alive` or already closed. That close is
/// what lets a chain of stages unwind from an upstream detach.
pub struct Observation<Item> {
  observer: Arc<dyn Observer<Item>>,
  handle: Mutex<Option<Box<dyn Disposable>>>,
}

impl<Item> Observation<Item> {
  pub fn observer(&self) -> &Arc<dyn Observer<Item>> { &self.observer }

  /// Resolves once the attached observer has closed.
  pub async fn completed(&self) { self.observer.wait_closed().await }

  pub async fn dispose(&self) -> Result<(), DisposeError> { self.release().await }

  async fn release(&self) -> Result<(), DisposeError> {
    let handle = self.handle.lock().unwrap().take();
    let Some(handle) = handle else {
      return Ok(());
    };
    let result = handle.dispose().await;
    if !(self.observer.closed() || self.observer.keep_alive()) {
      self.observer.aclose().await;
    }
    result
  }
}

#[async_trait]
impl<Item: Send + Sync> Disposable for Observation<Item> {
  async fn dispose(&self) -> Result<(), DisposeError> { self.release().await }
}

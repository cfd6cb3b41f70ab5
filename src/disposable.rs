//! Scoped-release handles for stream attachments and other owned teardown.

use std::{future::Future, mem, sync::Mutex};

use async_trait::async_trait;
use futures::future::{join_all, BoxFuture};
use smallvec::SmallVec;

use crate::error::{DisposeError, DynError};

/// A one-shot teardown handle.
///
/// `dispose` is idempotent: the underlying teardown runs at most once, and
/// every call after the first succeeds without side effects.
#[async_trait]
pub trait Disposable: Send + Sync {
  async fn dispose(&self) -> Result<(), DisposeError>;
}

#[async_trait]
impl Disposable for Box<dyn Disposable> {
  async fn dispose(&self) -> Result<(), DisposeError> { (**self).dispose().await }
}

// ============================================================================
// AnonymousDisposable
// ============================================================================

type Teardown = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), DynError>> + Send>;

/// Wraps a single teardown action.
pub struct AnonymousDisposable {
  teardown: Mutex<Option<Teardown>>,
}

impl AnonymousDisposable {
  /// Wrap an asynchronous teardown action.
  pub fn new<F, Fut>(teardown: F) -> Self
  where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), DynError>> + Send + 'static,
  {
    AnonymousDisposable {
      teardown: Mutex::new(Some(Box::new(move || Box::pin(teardown())))),
    }
  }

  /// Wrap a synchronous, infallible teardown action. Handy for handles whose
  /// release is plain bookkeeping (task aborts, membership removal).
  pub fn sync<F>(teardown: F) -> Self
  where
    F: FnOnce() + Send + 'static,
  {
    AnonymousDisposable::new(move || {
      teardown();
      futures::future::ready(Ok(()))
    })
  }
}

#[async_trait]
impl Disposable for AnonymousDisposable {
  async fn dispose(&self) -> Result<(), DisposeError> {
    let teardown = self.teardown.lock().unwrap().take();
    match teardown {
      Some(teardown) => teardown().await.map_err(DisposeError::Teardown),
      None => Ok(()),
    }
  }
}

// ============================================================================
// CompositeDisposable
// ============================================================================

/// A group of disposables released together.
///
/// Disposal always attempts every member, even when earlier members fail;
/// encountered failures are collected and surfaced as
/// [`DisposeError::Aggregate`] rather than swallowed or cut short.
#[derive(Default)]
pub struct CompositeDisposable {
  children: Mutex<SmallVec<[Box<dyn Disposable>; 2]>>,
}

impl CompositeDisposable {
  pub fn new() -> Self { CompositeDisposable::default() }

  pub fn add(&self, child: Box<dyn Disposable>) { self.children.lock().unwrap().push(child); }

  pub fn len(&self) -> usize { self.children.lock().unwrap().len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[async_trait]
impl Disposable for CompositeDisposable {
  async fn dispose(&self) -> Result<(), DisposeError> {
    let children = mem::take(&mut *self.children.lock().unwrap());
    let results = join_all(children.iter().map(|child| child.dispose())).await;
    let mut failures: Vec<DisposeError> =
      results.into_iter().filter_map(Result::err).collect();
    match failures.len() {
      0 => Ok(()),
      1 => Err(failures.remove(0)),
      _ => Err(DisposeError::Aggregate(failures)),
    }
  }
}

#[cfg(test)]
mod test {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use super::*;
  use crate::error::dyn_error;

  #[derive(Debug, thiserror::Error)]
  #[error("teardown refused")]
  struct Refused;

  #[tokio::test]
  async fn dispose_is_idempotent() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let disposable = AnonymousDisposable::sync(move || {
      counter.fetch_add(1, Ordering::SeqCst);
    });

    assert!(disposable.dispose().await.is_ok());
    assert!(disposable.dispose().await.is_ok());
    assert!(disposable.dispose().await.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn composite_attempts_every_child_and_aggregates() {
    let calls = Arc::new(AtomicUsize::new(0));
    let composite = CompositeDisposable::new();

    composite.add(Box::new(AnonymousDisposable::new(|| async {
      Err(dyn_error(Refused))
    })));
    let counter = calls.clone();
    composite.add(Box::new(AnonymousDisposable::sync(move || {
      counter.fetch_add(1, Ordering::SeqCst);
    })));
    composite.add(Box::new(AnonymousDisposable::new(|| async {
      Err(dyn_error(Refused))
    })));

    let err = composite.dispose().await.unwrap_err();
    match err {
      DisposeError::Aggregate(failures) => assert_eq!(failures.len(), 2),
      other => panic!("expected aggregate failure, got {other}"),
    }
    // The healthy member in the middle was still released.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn composite_single_failure_is_not_wrapped() {
    let composite = CompositeDisposable::new();
    composite.add(Box::new(AnonymousDisposable::new(|| async {
      Err(dyn_error(Refused))
    })));
    composite.add(Box::new(AnonymousDisposable::sync(|| {})));

    let err = composite.dispose().await.unwrap_err();
    assert!(matches!(err, DisposeError::Teardown(_)));
  }
}

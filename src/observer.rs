//! Observer contract, the per-observer lifecycle guard, and the
//! closure-driven terminal observer.

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc, Mutex,
};

use async_trait::async_trait;
use tokio::sync::{watch, MutexGuard};

use crate::{
  error::{self, DynError, ObserverError},
  namespace::{self, Action, Namespace},
};

// ============================================================================
// Observer trait
// ============================================================================

/// Sink capability: receives values, error events, and a close signal.
///
/// `asend` and `araise` fail with [`ObserverError::Closed`] once the observer
/// has closed; `aclose` is idempotent and is the only operation that may
/// safely race with itself. Each concrete observer serializes its own state
/// transitions, so the contract holds under real parallelism as well as under
/// cooperative scheduling.
#[async_trait]
pub trait Observer<Item>: Send + Sync {
  /// Deliver a value. `namespace` is the causality record of the immediate
  /// upstream caller; `None` marks this observer as the originating source.
  async fn asend(&self, value: Item, namespace: Option<&Namespace>) -> Result<(), ObserverError>;

  /// Deliver an error event. An error is a value in the protocol, not a
  /// terminal signal; whether to close in response is this observer's policy.
  async fn araise(&self, error: DynError, namespace: Option<&Namespace>)
    -> Result<(), ObserverError>;

  /// Close the observer, releasing any resources it owns. Returns `true`
  /// only for the call that actually performed the close.
  async fn aclose(&self) -> bool;

  /// Whether the observer has closed (or is in the middle of closing).
  fn closed(&self) -> bool;

  /// When `true`, producers that would otherwise auto-close this observer
  /// after a one-shot delivery must leave it open.
  fn keep_alive(&self) -> bool;

  /// Resolves once the observer has fully closed.
  async fn wait_closed(&self);
}

// ============================================================================
// Lifecycle
// ============================================================================

/// State machine embedded by every concrete observer in this crate.
///
/// - `guard` serializes deliveries, so the closed flag can never be observed
///   mid-transition by another delivery.
/// - `closing` is the close-in-progress latch: the first `aclose` wins it,
///   waits out any in-flight delivery via the guard, and only then runs its
///   teardown. Deliveries queued behind it fail with `Closed`.
/// - closed state is a `watch` channel, which gives `wait_closed` a
///   suspension point instead of a poll loop.
pub(crate) struct Lifecycle {
  kind: &'static str,
  id: u64,
  keep_alive: bool,
  closing: AtomicBool,
  closed: watch::Sender<bool>,
  guard: tokio::sync::Mutex<()>,
}

impl Lifecycle {
  pub(crate) fn new(kind: &'static str, keep_alive: bool) -> Self {
    let (closed, _) = watch::channel(false);
    Lifecycle {
      kind,
      id: namespace::next_id(),
      keep_alive,
      closing: AtomicBool::new(false),
      closed,
      guard: tokio::sync::Mutex::new(()),
    }
  }

  pub(crate) fn keep_alive(&self) -> bool { self.keep_alive }

  pub(crate) fn closed(&self) -> bool {
    self.closing.load(Ordering::Acquire) || *self.closed.borrow()
  }

  pub(crate) fn label(&self) -> String { format!("{}#{}", self.kind, self.id) }

  /// Acquire the delivery guard, failing if the observer is closed or a close
  /// is in progress.
  pub(crate) async fn enter(&self) -> Result<MutexGuard<'_, ()>, ObserverError> {
    let permit = self.guard.lock().await;
    if self.closing.load(Ordering::Acquire) {
      return Err(ObserverError::Closed);
    }
    Ok(permit)
  }

  /// Build the fresh causality record for one delivery handled here.
  pub(crate) fn namespace(&self, action: Action, previous: Option<&Namespace>) -> Namespace {
    Namespace::new(self.kind, self.id, action, previous)
  }

  /// Win the close race. Returns the delivery guard for the single caller
  /// that gets to run teardown; every later caller gets `None`.
  pub(crate) async fn begin_close(&self) -> Option<MutexGuard<'_, ()>> {
    if self.closing.swap(true, Ordering::AcqRel) {
      return None;
    }
    Some(self.guard.lock().await)
  }

  pub(crate) fn finish_close(&self) { self.closed.send_replace(true); }

  pub(crate) async fn wait_closed(&self) {
    let mut rx = self.closed.subscribe();
    // The sender lives in self, so wait_for cannot observe a dropped channel.
    let _ = rx.wait_for(|closed| *closed).await;
  }
}

// ============================================================================
// AnonymousObserver
// ============================================================================

type SendHandler<Item> = Box<dyn Fn(Item, &Namespace) -> Result<(), DynError> + Send + Sync>;
type RaiseHandler = Box<dyn Fn(DynError, &Namespace) -> Result<bool, DynError> + Send + Sync>;
type CloseHandler = Box<dyn FnOnce() + Send>;

/// Terminal observer driven by plain closures.
///
/// ```
/// use rivulet::prelude::*;
///
/// let listener = AnonymousObserver::<i32>::builder()
///   .on_send(|value, _ns| {
///     println!("got {value}");
///     Ok(())
///   })
///   .build();
/// ```
pub struct AnonymousObserver<Item> {
  life: Lifecycle,
  on_send: Option<SendHandler<Item>>,
  on_raise: Option<RaiseHandler>,
  on_close: Mutex<Option<CloseHandler>>,
}

impl<Item> AnonymousObserver<Item> {
  pub fn builder() -> AnonymousObserverBuilder<Item> {
    AnonymousObserverBuilder {
      keep_alive: false,
      on_send: None,
      on_raise: None,
      on_close: None,
    }
  }
}

pub struct AnonymousObserverBuilder<Item> {
  keep_alive: bool,
  on_send: Option<SendHandler<Item>>,
  on_raise: Option<RaiseHandler>,
  on_close: Option<CloseHandler>,
}

impl<Item> AnonymousObserverBuilder<Item> {
  /// Handler for incoming values.
  pub fn on_send<F>(mut self, handler: F) -> Self
  where
    F: Fn(Item, &Namespace) -> Result<(), DynError> + Send + Sync + 'static,
  {
    self.on_send = Some(Box::new(handler));
    self
  }

  /// Handler for incoming error events. Return `Ok(true)` to close this
  /// observer after handling the error; the default handler reports the
  /// event to the error sink and stays open.
  pub fn on_raise<F>(mut self, handler: F) -> Self
  where
    F: Fn(DynError, &Namespace) -> Result<bool, DynError> + Send + Sync + 'static,
  {
    self.on_raise = Some(Box::new(handler));
    self
  }

  /// Hook invoked exactly once, when the observer closes.
  pub fn on_close<F>(mut self, handler: F) -> Self
  where
    F: FnOnce() + Send + 'static,
  {
    self.on_close = Some(Box::new(handler));
    self
  }

  /// Keep the observer open after one-shot deliveries.
  pub fn keep_alive(mut self, keep_alive: bool) -> Self {
    self.keep_alive = keep_alive;
    self
  }

  pub fn build(self) -> Arc<AnonymousObserver<Item>> {
    Arc::new(AnonymousObserver {
      life: Lifecycle::new("AnonymousObserver", self.keep_alive),
      on_send: self.on_send,
      on_raise: self.on_raise,
      on_close: Mutex::new(self.on_close),
    })
  }
}

#[async_trait]
impl<Item: Send + 'static> Observer<Item> for AnonymousObserver<Item> {
  async fn asend(&self, value: Item, namespace: Option<&Namespace>) -> Result<(), ObserverError> {
    let mut failure = None;
    let mut close_after = false;
    {
      let _permit = self.life.enter().await?;
      let ns = self.life.namespace(Action::Send, namespace);
      if let Some(handler) = &self.on_send {
        if let Err(err) = handler(value, &ns) {
          // A faulty send handler is routed through this observer's own
          // raise policy; without one the observer closes, so hubs can
          // sweep it instead of failing on every later broadcast.
          let raise_ns = self.life.namespace(Action::Raise, namespace);
          close_after = match &self.on_raise {
            Some(handler) => handler(err.clone(), &raise_ns).unwrap_or(true),
            None => true,
          };
          failure = Some(err);
        }
      }
    }
    if close_after {
      self.aclose().await;
    }
    match failure {
      Some(err) => Err(ObserverError::Delivery(err)),
      None => Ok(()),
    }
  }

  async fn araise(
    &self,
    error: DynError,
    namespace: Option<&Namespace>,
  ) -> Result<(), ObserverError> {
    let close_after = {
      let _permit = self.life.enter().await?;
      let ns = self.life.namespace(Action::Raise, namespace);
      match &self.on_raise {
        Some(handler) => handler(error, &ns).map_err(ObserverError::Delivery)?,
        None => {
          error::report(&format!("{}: unhandled error event", self.life.label()), &error);
          false
        }
      }
    };
    if close_after {
      self.aclose().await;
    }
    Ok(())
  }

  async fn aclose(&self) -> bool {
    let Some(permit) = self.life.begin_close().await else {
      return false;
    };
    if let Some(handler) = self.on_close.lock().unwrap().take() {
      handler();
    }
    drop(permit);
    self.life.finish_close();
    true
  }

  fn closed(&self) -> bool { self.life.closed() }

  fn keep_alive(&self) -> bool { self.life.keep_alive() }

  async fn wait_closed(&self) { self.life.wait_closed().await }
}

#[cfg(test)]
mod test {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use super::*;

  #[tokio::test]
  async fn send_after_close_fails_with_closed() {
    let observer = AnonymousObserver::<i32>::builder().build();
    assert!(observer.asend(1, None).await.is_ok());

    observer.aclose().await;
    assert!(observer.closed());
    assert!(matches!(observer.asend(2, None).await, Err(ObserverError::Closed)));
    assert!(matches!(
      observer.araise(crate::error::dyn_error(std::fmt::Error), None).await,
      Err(ObserverError::Closed)
    ));
  }

  #[tokio::test]
  async fn close_is_idempotent() {
    let closes = Arc::new(AtomicUsize::new(0));
    let counter = closes.clone();
    let observer = AnonymousObserver::<i32>::builder()
      .on_close(move || {
        counter.fetch_add(1, Ordering::SeqCst);
      })
      .build();

    assert!(observer.aclose().await);
    assert!(!observer.aclose().await);
    assert!(!observer.aclose().await);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn concurrent_close_runs_teardown_once() {
    let closes = Arc::new(AtomicUsize::new(0));
    let counter = closes.clone();
    let observer = AnonymousObserver::<i32>::builder()
      .on_close(move || {
        counter.fetch_add(1, Ordering::SeqCst);
      })
      .build();

    let winners = futures::future::join_all((0..8).map(|_| observer.aclose())).await;
    assert_eq!(winners.into_iter().filter(|won| *won).count(), 1);
    assert_eq!(closes.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn send_handler_fault_closes_the_observer() {
    let observer = AnonymousObserver::<i32>::builder()
      .on_send(|_value, _ns| Err(crate::error::dyn_error(std::fmt::Error)))
      .build();

    assert!(matches!(
      observer.asend(1, None).await,
      Err(ObserverError::Delivery(_))
    ));
    assert!(observer.closed());
  }

  #[tokio::test]
  async fn raise_policy_can_keep_a_faulty_observer_open() {
    let raises = Arc::new(AtomicUsize::new(0));
    let counter = raises.clone();
    let observer = AnonymousObserver::<i32>::builder()
      .on_send(|_value, _ns| Err(crate::error::dyn_error(std::fmt::Error)))
      .on_raise(move |_error, ns| {
        assert_eq!(ns.action(), Action::Raise);
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(false)
      })
      .build();

    assert!(observer.asend(1, None).await.is_err());
    assert!(!observer.closed());
    assert_eq!(raises.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn raise_can_request_close() {
    let observer = AnonymousObserver::<i32>::builder()
      .on_raise(|_error, _ns| Ok(true))
      .build();

    assert!(observer.araise(crate::error::dyn_error(std::fmt::Error), None).await.is_ok());
    assert!(observer.closed());
    observer.wait_closed().await;
  }

  #[tokio::test]
  async fn handler_receives_fresh_root_namespace() {
    let observer = AnonymousObserver::<i32>::builder()
      .on_send(|_value, ns| {
        assert_eq!(ns.kind(), "AnonymousObserver");
        assert_eq!(ns.action(), Action::Send);
        assert!(ns.is_root());
        Ok(())
      })
      .build();

    observer.asend(3, None).await.unwrap();
  }
}

//! Hot multicast hub: one upstream, many independently-lifetimed observers.
//!
//! The hub is hot in the sense that it drops events while no observers are
//! attached, and it never replays. A broadcast does not resolve until every
//! live member finished handling the event (the fan-out barrier), which is
//! the system's only backpressure mechanism: the slowest observer paces the
//! producer.
//!
//! Per-member failures are isolated. A member that closed under the hub's
//! feet produces an expected `Closed` error (membership cleanup is lazy);
//! anything else is reported to the error sink and never re-raised to the
//! producer, so one broken observer cannot break delivery to its siblings or
//! abort the producer.

use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use futures::future::join_all;
use smallvec::SmallVec;
use tokio::task::JoinHandle;

use crate::{
  disposable::{AnonymousDisposable, Disposable},
  error::{self, DynError, ErrorSink, ObserveError, ObserverError},
  namespace::{Action, Namespace},
  observable::Observable,
  observer::{Lifecycle, Observer},
};

type Members<Item> = SmallVec<[Arc<dyn Observer<Item>>; 2]>;

/// Hot stream that can be observed by multiple observers.
pub struct MultiStream<Item> {
  life: Lifecycle,
  observers: Mutex<Members<Item>>,
  sweep: Mutex<Option<JoinHandle<()>>>,
  strict: bool,
  sink: Option<Arc<dyn ErrorSink>>,
  weak: Weak<MultiStream<Item>>,
}

impl<Item> MultiStream<Item>
where
  Item: Clone + Send + Sync + 'static,
{
  /// A lenient hub: per-member faults are reported to the error sink and the
  /// producer always sees success.
  pub fn new() -> Arc<Self> { MultiStream::build(false, None) }

  /// A strict hub: the first non-`Closed` per-member fault of a broadcast is
  /// surfaced to the producer after the fan-out barrier. Sibling delivery is
  /// unaffected either way.
  pub fn strict() -> Arc<Self> { MultiStream::build(true, None) }

  /// A lenient hub reporting to `sink` instead of the process-wide sink.
  pub fn with_error_sink(sink: Arc<dyn ErrorSink>) -> Arc<Self> {
    MultiStream::build(false, Some(sink))
  }

  fn build(strict: bool, sink: Option<Arc<dyn ErrorSink>>) -> Arc<Self> {
    Arc::new_cyclic(|weak| MultiStream {
      life: Lifecycle::new("MultiStream", false),
      observers: Mutex::new(SmallVec::new()),
      sweep: Mutex::new(None),
      strict,
      sink,
      weak: weak.clone(),
    })
  }

  /// Number of currently attached observers (closed members included until
  /// the next sweep).
  pub fn observer_count(&self) -> usize { self.observers.lock().unwrap().len() }

  fn report(&self, context: &str, err: &DynError) {
    match &self.sink {
      Some(sink) => sink.report(context, err),
      None => error::report(context, err),
    }
  }

  /// Snapshot of the currently open members. Delivery works on this snapshot
  /// so membership mutation can interleave freely with a running fan-out.
  fn members(&self) -> Members<Item> {
    self
      .observers
      .lock()
      .unwrap()
      .iter()
      .filter(|observer| !observer.closed())
      .cloned()
      .collect()
  }

  fn detach(&self, observer: &Arc<dyn Observer<Item>>) {
    self
      .observers
      .lock()
      .unwrap()
      .retain(|member| !Arc::ptr_eq(member, observer));
  }

  /// Enqueue one asynchronous sweep of closed members, unless one is already
  /// pending. A lazily-scheduled task, not a lock: the membership set may
  /// change shape between observation and sweep, and that is fine.
  fn schedule_sweep(&self) {
    let mut slot = self.sweep.lock().unwrap();
    if slot.as_ref().is_some_and(|pending| !pending.is_finished()) {
      return;
    }
    let Some(stream) = self.weak.upgrade() else {
      return;
    };
    *slot = Some(tokio::spawn(async move { stream.clear_closed() }));
  }

  fn clear_closed(&self) {
    let closed: Members<Item> = self
      .observers
      .lock()
      .unwrap()
      .iter()
      .filter(|observer| observer.closed())
      .cloned()
      .collect();
    if closed.is_empty() {
      return;
    }
    tracing::debug!(stream = %self.life.label(), count = closed.len(), "sweeping closed observers");
    for observer in &closed {
      self.detach(observer);
    }
  }
}

#[async_trait]
impl<Item> Observer<Item> for MultiStream<Item>
where
  Item: Clone + Send + Sync + 'static,
{
  async fn asend(&self, value: Item, namespace: Option<&Namespace>) -> Result<(), ObserverError> {
    let mut strict_failure = None;
    {
      let _permit = self.life.enter().await?;
      let ns = self.life.namespace(Action::Send, namespace);
      let members = self.members();
      if members.is_empty() {
        // Hot semantics: no observers, the value is dropped.
        return Ok(());
      }

      let barrier =
        join_all(members.iter().map(|observer| observer.asend(value.clone(), Some(&ns))));
      // Remove the producer's copy early; only the per-member clones remain.
      drop(value);

      for result in barrier.await {
        match result {
          Ok(()) | Err(ObserverError::Closed) => {}
          Err(ObserverError::Delivery(err)) => {
            if self.strict && strict_failure.is_none() {
              strict_failure = Some(err);
            } else {
              self.report(
                &format!("{}: unhandled failure while propagating value", self.life.label()),
                &err,
              );
            }
          }
        }
      }
      self.schedule_sweep();
    }
    match strict_failure {
      Some(err) => Err(ObserverError::Delivery(err)),
      None => Ok(()),
    }
  }

  async fn araise(
    &self,
    error: DynError,
    namespace: Option<&Namespace>,
  ) -> Result<(), ObserverError> {
    let mut strict_failure = None;
    {
      let _permit = self.life.enter().await?;
      let ns = self.life.namespace(Action::Raise, namespace);
      let members = self.members();
      if members.is_empty() {
        return Ok(());
      }

      let barrier =
        join_all(members.iter().map(|observer| observer.araise(error.clone(), Some(&ns))));

      for result in barrier.await {
        match result {
          Ok(()) | Err(ObserverError::Closed) => {}
          Err(ObserverError::Delivery(err)) => {
            if self.strict && strict_failure.is_none() {
              strict_failure = Some(err);
            } else {
              self.report(
                &format!(
                  "{}: unhandled failure while propagating error event",
                  self.life.label()
                ),
                &err,
              );
            }
          }
        }
      }
      self.schedule_sweep();
    }
    // Broadcasting an error is just another event: the hub itself stays open.
    match strict_failure {
      Some(err) => Err(ObserverError::Delivery(err)),
      None => Ok(()),
    }
  }

  async fn aclose(&self) -> bool {
    let Some(permit) = self.life.begin_close().await else {
      return false;
    };
    let pending = self.sweep.lock().unwrap().take();
    if let Some(pending) = pending {
      let _ = pending.await;
    }
    let members = std::mem::take(&mut *self.observers.lock().unwrap());
    // Best effort: release every remaining member, keep-alive ones excepted.
    join_all(
      members
        .iter()
        .filter(|observer| !(observer.closed() || observer.keep_alive()))
        .map(|observer| observer.aclose()),
    )
    .await;
    drop(permit);
    self.life.finish_close();
    true
  }

  fn closed(&self) -> bool { self.life.closed() }

  fn keep_alive(&self) -> bool { self.life.keep_alive() }

  async fn wait_closed(&self) { self.life.wait_closed().await }
}

#[async_trait]
impl<Item> Observable<Item> for MultiStream<Item>
where
  Item: Clone + Send + Sync + 'static,
{
  async fn observe(
    &self,
    observer: Arc<dyn Observer<Item>>,
  ) -> Result<Box<dyn Disposable>, ObserveError> {
    if self.life.closed() {
      return Err(ObserveError::Closed);
    }
    {
      let mut observers = self.observers.lock().unwrap();
      // Membership is a set: attaching the same observer twice is a no-op.
      if !observers.iter().any(|member| Arc::ptr_eq(member, &observer)) {
        observers.push(observer.clone());
      }
    }
    let stream = self.weak.clone();
    Ok(Box::new(AnonymousDisposable::sync(move || {
      if let Some(stream) = stream.upgrade() {
        stream.detach(&observer);
      }
    })))
  }
}

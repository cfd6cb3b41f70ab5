//! Transformer stage base: an observer of its upstream and an observable for
//! exactly one downstream observer.
//!
//! Operator behavior is composed in through [`Operate`] rather than
//! inherited: a stage holds its operator, and the stage owns all protocol
//! concerns (guarding, namespaces, forwarding, close propagation). Leaf
//! operators in [`crate::ops`] are nothing but `Operate` implementations.

use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;

use crate::{
  disposable::{AnonymousDisposable, Disposable},
  error::{self, DynError, ObserveError, ObserverError},
  namespace::{Action, Namespace},
  observable::Observable,
  observer::{Lifecycle, Observer},
};

/// What a stage should do with the value an operator just processed.
pub enum OpOutcome<Out> {
  /// Forward this value downstream.
  Emit(Out),
  /// Drop the value.
  Skip,
  /// Surface an error event downstream. Operator faults take this path, so
  /// they never cross the attach boundary as protocol failures.
  Raise(DynError),
  /// Close the stage; the triggering value is dropped.
  Close,
}

/// Per-operator behavior plugged into a [`SingleStream`].
#[async_trait]
pub trait Operate<In, Out>: Send {
  async fn next(&mut self, value: In, namespace: &Namespace) -> OpOutcome<Out>;

  /// Map an incoming error event before it is forwarded. Identity unless the
  /// operator rewrites errors.
  async fn on_raise(&mut self, error: DynError) -> DynError { error }

  /// Buffered values to emit downstream when the stage closes, each with the
  /// namespace of the delivery that buffered it. Trailing-window operators
  /// and min/max flush here.
  async fn flush(&mut self) -> Vec<(Out, Namespace)> { Vec::new() }
}

/// A single-downstream transformer stage.
pub struct SingleStream<In, Out> {
  life: Lifecycle,
  op: tokio::sync::Mutex<Box<dyn Operate<In, Out>>>,
  downstream: Mutex<Option<Arc<dyn Observer<Out>>>>,
  weak: Weak<SingleStream<In, Out>>,
}

impl<In, Out> SingleStream<In, Out>
where
  In: Send + 'static,
  Out: Send + Sync + 'static,
{
  /// Build a stage around an operator. `kind` names the operator in
  /// namespaces and diagnostics.
  pub fn new(kind: &'static str, op: impl Operate<In, Out> + 'static) -> Arc<Self> {
    Arc::new_cyclic(|weak| SingleStream {
      life: Lifecycle::new(kind, false),
      op: tokio::sync::Mutex::new(Box::new(op)),
      downstream: Mutex::new(None),
      weak: weak.clone(),
    })
  }

  fn downstream(&self) -> Option<Arc<dyn Observer<Out>>> {
    self.downstream.lock().unwrap().clone()
  }

  /// Forward one value downstream. A closed downstream means the stage has
  /// no consumer left and should close itself; the caller handles that.
  async fn forward(
    &self,
    value: Out,
    namespace: &Namespace,
  ) -> Result<(), ObserverError> {
    match self.downstream() {
      Some(downstream) => downstream.asend(value, Some(namespace)).await,
      // No consumer yet: hot semantics, the value is dropped.
      None => Ok(()),
    }
  }
}

#[async_trait]
impl<In, Out> Observer<In> for SingleStream<In, Out>
where
  In: Send + 'static,
  Out: Send + Sync + 'static,
{
  async fn asend(&self, value: In, namespace: Option<&Namespace>) -> Result<(), ObserverError> {
    let mut close_after = false;
    let mut result = Ok(());
    {
      let _permit = self.life.enter().await?;
      let ns = self.life.namespace(Action::Send, namespace);
      let outcome = self.op.lock().await.next(value, &ns).await;
      match outcome {
        OpOutcome::Emit(out) => match self.forward(out, &ns).await {
          Ok(()) => {}
          Err(ObserverError::Closed) => {
            close_after = true;
            result = Err(ObserverError::Closed);
          }
          Err(err) => result = Err(err),
        },
        OpOutcome::Skip => {}
        OpOutcome::Raise(raised) => {
          if let Some(downstream) = self.downstream() {
            let raise_ns = self.life.namespace(Action::Raise, namespace);
            match downstream.araise(raised, Some(&raise_ns)).await {
              Ok(()) => {}
              Err(ObserverError::Closed) => {
                close_after = true;
                result = Err(ObserverError::Closed);
              }
              Err(err) => result = Err(err),
            }
          }
        }
        OpOutcome::Close => close_after = true,
      }
    }
    if close_after {
      self.aclose().await;
    }
    result
  }

  async fn araise(
    &self,
    error: DynError,
    namespace: Option<&Namespace>,
  ) -> Result<(), ObserverError> {
    let mut close_after = false;
    let mut result = Ok(());
    {
      let _permit = self.life.enter().await?;
      let ns = self.life.namespace(Action::Raise, namespace);
      let mapped = self.op.lock().await.on_raise(error).await;
      if let Some(downstream) = self.downstream() {
        match downstream.araise(mapped, Some(&ns)).await {
          Ok(()) => {}
          Err(ObserverError::Closed) => {
            close_after = true;
            result = Err(ObserverError::Closed);
          }
          Err(err) => result = Err(err),
        }
      }
    }
    if close_after {
      self.aclose().await;
    }
    result
  }

  async fn aclose(&self) -> bool {
    let Some(permit) = self.life.begin_close().await else {
      return false;
    };
    let flushed = self.op.lock().await.flush().await;
    let downstream = self.downstream.lock().unwrap().take();
    if let Some(downstream) = downstream {
      for (value, ns) in flushed {
        match downstream.asend(value, Some(&ns)).await {
          Ok(()) => {}
          Err(ObserverError::Closed) => break,
          Err(ObserverError::Delivery(err)) => {
            error::report(&format!("{}: failed to flush buffered value", self.life.label()), &err);
          }
        }
      }
      if !(downstream.closed() || downstream.keep_alive()) {
        downstream.aclose().await;
      }
    }
    drop(permit);
    self.life.finish_close();
    true
  }

  fn closed(&self) -> bool { self.life.closed() }

  fn keep_alive(&self) -> bool { self.life.keep_alive() }

  async fn wait_closed(&self) { self.life.wait_closed().await }
}

#[async_trait]
impl<In, Out> Observable<Out> for SingleStream<In, Out>
where
  In: Send + 'static,
  Out: Send + Sync + 'static,
{
  async fn observe(
    &self,
    observer: Arc<dyn Observer<Out>>,
  ) -> Result<Box<dyn Disposable>, ObserveError> {
    if self.life.closed() {
      return Err(ObserveError::Closed);
    }
    {
      let mut slot = self.downstream.lock().unwrap();
      if slot.is_some() {
        return Err(ObserveError::AlreadyObserved);
      }
      *slot = Some(observer);
    }
    let stage = self.weak.clone();
    Ok(Box::new(AnonymousDisposable::new(move || async move {
      if let Some(stage) = stage.upgrade() {
        stage.downstream.lock().unwrap().take();
        // A stage without a consumer is dead; closing it lets the upstream
        // observation unwind in turn.
        stage.aclose().await;
      }
      Ok(())
    })))
  }
}

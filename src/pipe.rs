//! Operator-chain composition.
//!
//! A [`Pipe`] is a deferred description of a chain: source, zero or more
//! transformer stages, and eventually a terminal observer. Nothing attaches
//! until [`Pipe::sink`] runs; it then attaches tail-to-head, so every stage
//! already has its consumer before its upstream can start delivering.
//!
//! The resulting [`Sink`] owns one disposable per attachment and releases
//! them head-to-tail, letting in-flight values drain through the downstream
//! stages before those are torn down.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::{
  disposable::Disposable,
  error::{self, dyn_error, DisposeError, ObserveError},
  observable::{observe, Observable},
  observer::Observer,
  single_stream::SingleStream,
};

type AttachThunk =
  Box<dyn FnOnce() -> BoxFuture<'static, Result<Box<dyn Disposable>, ObserveError>> + Send>;

fn link<Item>(
  upstream: Arc<dyn Observable<Item>>,
  downstream: Arc<dyn Observer<Item>>,
) -> AttachThunk
where
  Item: Send + Sync + 'static,
{
  // Scoped observations, so detaching a link also closes the stage attached
  // through it; that close is what makes disposal cascade down the chain.
  Box::new(move || {
    Box::pin(async move {
      let observation = observe(upstream.as_ref(), downstream).await?;
      Ok(Box::new(observation) as Box<dyn Disposable>)
    })
  })
}

/// A source with a chain of pending transformer stages, head to tail.
pub struct Pipe<Out> {
  links: Vec<AttachThunk>,
  tail: Arc<dyn Observable<Out>>,
}

/// Start a chain: `source` feeding `stage`.
pub fn pipe<In, Out>(
  source: Arc<dyn Observable<In>>,
  stage: Arc<SingleStream<In, Out>>,
) -> Pipe<Out>
where
  In: Send + Sync + 'static,
  Out: Send + Sync + 'static,
{
  Pipe { links: vec![link(source, stage.clone())], tail: stage }
}

impl<Out> Pipe<Out>
where
  Out: Send + Sync + 'static,
{
  /// Append another transformer stage to the chain.
  pub fn then<Next>(mut self, stage: Arc<SingleStream<Out, Next>>) -> Pipe<Next>
  where
    Next: Send + Sync + 'static,
  {
    self.links.push(link(self.tail, stage.clone()));
    Pipe { links: self.links, tail: stage }
  }

  /// Terminate the chain with `observer` and attach every link.
  ///
  /// Attachment runs tail-to-head. If any link fails to attach, the links
  /// attached so far are disposed again and the error is returned; a failed
  /// sink never leaves a half-built chain behind.
  pub async fn sink(mut self, observer: Arc<dyn Observer<Out>>) -> Result<Sink<Out>, ObserveError> {
    self.links.push(link(self.tail, observer.clone()));

    let mut attached = Vec::with_capacity(self.links.len());
    while let Some(thunk) = self.links.pop() {
      match thunk().await {
        Ok(handle) => attached.push(handle),
        Err(err) => {
          for handle in attached {
            if let Err(failure) = handle.dispose().await {
              error::report(
                "pipe: failed to unwind a partially attached chain",
                &dyn_error(failure),
              );
            }
          }
          return Err(err);
        }
      }
    }
    attached.reverse();
    Ok(Sink { links: Mutex::new(attached), terminal: observer })
  }
}

/// A fully attached chain. Disposing it detaches every link, upstream links
/// first, which cascades a close down the chain to the terminal observer.
pub struct Sink<Out> {
  links: Mutex<Vec<Box<dyn Disposable>>>,
  terminal: Arc<dyn Observer<Out>>,
}

impl<Out> Sink<Out> {
  pub fn observer(&self) -> &Arc<dyn Observer<Out>> { &self.terminal }

  /// Resolves once the terminal observer has closed.
  pub async fn completed(&self) { self.terminal.wait_closed().await }

  pub async fn dispose(&self) -> Result<(), DisposeError> { self.release().await }

  async fn release(&self) -> Result<(), DisposeError> {
    let links = std::mem::take(&mut *self.links.lock().unwrap());
    let mut failures = Vec::new();
    // Sequential on purpose: a link must be fully detached before the one
    // below it goes, so stage closes cascade in order.
    for handle in links {
      if let Err(err) = handle.dispose().await {
        failures.push(err);
      }
    }
    match failures.len() {
      0 => Ok(()),
      1 => Err(failures.remove(0)),
      _ => Err(DisposeError::Aggregate(failures)),
    }
  }
}

#[async_trait]
impl<Out: Send + Sync> Disposable for Sink<Out> {
  async fn dispose(&self) -> Result<(), DisposeError> { self.release().await }
}

//! Invariant-checking operator.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
  error::DynError,
  namespace::Namespace,
  single_stream::{OpOutcome, Operate, SingleStream},
};

struct AssertOp<F> {
  predicate: F,
  error: DynError,
}

#[async_trait]
impl<Item, F> Operate<Item, Item> for AssertOp<F>
where
  Item: Send + 'static,
  F: FnMut(&Item) -> bool + Send,
{
  async fn next(&mut self, value: Item, _ns: &Namespace) -> OpOutcome<Item> {
    if (self.predicate)(&value) {
      OpOutcome::Emit(value)
    } else {
      // Refcounted, so every violation raises the same error value.
      OpOutcome::Raise(self.error.clone())
    }
  }
}

/// Stage that forwards values unchanged and raises `error` as an error event
/// for any value `predicate` rejects. The rejected value is dropped; the
/// stage stays open.
pub fn assert_that<Item, F>(predicate: F, error: DynError) -> Arc<SingleStream<Item, Item>>
where
  Item: Send + Sync + 'static,
  F: FnMut(&Item) -> bool + Send + 'static,
{
  SingleStream::new("assert", AssertOp { predicate, error })
}

#[cfg(test)]
mod test {
  use std::sync::Mutex;

  use super::*;
  use crate::{
    error::dyn_error,
    observable::Observable,
    observer::{AnonymousObserver, Observer},
  };

  #[tokio::test]
  async fn violations_become_error_events() {
    let values = Arc::new(Mutex::new(Vec::new()));
    let errors = Arc::new(Mutex::new(Vec::new()));
    let value_sink = values.clone();
    let error_sink = errors.clone();
    let listener = AnonymousObserver::<i32>::builder()
      .on_send(move |value, _ns| {
        value_sink.lock().unwrap().push(value);
        Ok(())
      })
      .on_raise(move |error, _ns| {
        error_sink.lock().unwrap().push(error.to_string());
        Ok(false)
      })
      .build();

    let stage = assert_that(|value: &i32| *value >= 0, dyn_error(std::fmt::Error));
    let _handle = stage.observe(listener).await.unwrap();

    stage.asend(1, None).await.unwrap();
    stage.asend(-1, None).await.unwrap();
    stage.asend(2, None).await.unwrap();

    assert_eq!(*values.lock().unwrap(), vec![1, 2]);
    assert_eq!(*errors.lock().unwrap(), vec![std::fmt::Error.to_string()]);
    assert!(!stage.closed());
  }
}

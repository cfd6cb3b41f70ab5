//! Predicate-triggered termination.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
  namespace::Namespace,
  single_stream::{OpOutcome, Operate, SingleStream},
};

struct StopOp<F> {
  predicate: F,
}

#[async_trait]
impl<Item, F> Operate<Item, Item> for StopOp<F>
where
  Item: Send + 'static,
  F: FnMut(&Item) -> bool + Send,
{
  async fn next(&mut self, value: Item, _ns: &Namespace) -> OpOutcome<Item> {
    if (self.predicate)(&value) {
      // The triggering value is not forwarded.
      OpOutcome::Close
    } else {
      OpOutcome::Emit(value)
    }
  }
}

/// Stage that forwards values until `predicate` matches one, then closes.
/// The matching value is dropped.
pub fn stop<Item, F>(predicate: F) -> Arc<SingleStream<Item, Item>>
where
  Item: Send + Sync + 'static,
  F: FnMut(&Item) -> bool + Send + 'static,
{
  SingleStream::new("stop", StopOp { predicate })
}

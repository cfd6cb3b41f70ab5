//! Predicate-based selection.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
  namespace::Namespace,
  single_stream::{OpOutcome, Operate, SingleStream},
};

struct FilterOp<F> {
  predicate: F,
}

#[async_trait]
impl<Item, F> Operate<Item, Item> for FilterOp<F>
where
  Item: Send + 'static,
  F: FnMut(&Item) -> bool + Send,
{
  async fn next(&mut self, value: Item, _ns: &Namespace) -> OpOutcome<Item> {
    if (self.predicate)(&value) {
      OpOutcome::Emit(value)
    } else {
      OpOutcome::Skip
    }
  }
}

/// Stage that forwards only the values `predicate` accepts.
pub fn filter<Item, F>(predicate: F) -> Arc<SingleStream<Item, Item>>
where
  Item: Send + Sync + 'static,
  F: FnMut(&Item) -> bool + Send + 'static,
{
  SingleStream::new("filter", FilterOp { predicate })
}

#[cfg(test)]
mod test {
  use std::sync::Mutex;

  use super::*;
  use crate::{observable::Observable, observer::{AnonymousObserver, Observer}};

  #[tokio::test]
  async fn drops_rejected_values() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let listener = AnonymousObserver::<i32>::builder()
      .on_send(move |value, _ns| {
        sink.lock().unwrap().push(value);
        Ok(())
      })
      .build();

    let stage = filter(|value: &i32| value % 2 == 0);
    let _handle = stage.observe(listener).await.unwrap();

    for value in 0..6 {
      stage.asend(value, None).await.unwrap();
    }
    assert_eq!(*seen.lock().unwrap(), vec![0, 2, 4]);
  }
}

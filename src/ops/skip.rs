//! Prefix-dropping operator.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
  namespace::Namespace,
  single_stream::{OpOutcome, Operate, SingleStream},
};

struct SkipOp {
  remaining: usize,
}

#[async_trait]
impl<Item> Operate<Item, Item> for SkipOp
where
  Item: Send + 'static,
{
  async fn next(&mut self, value: Item, _ns: &Namespace) -> OpOutcome<Item> {
    if self.remaining > 0 {
      self.remaining -= 1;
      return OpOutcome::Skip;
    }
    OpOutcome::Emit(value)
  }
}

/// Stage that drops the first `count` values and forwards the rest.
pub fn skip<Item>(count: usize) -> Arc<SingleStream<Item, Item>>
where
  Item: Send + Sync + 'static,
{
  SingleStream::new("skip", SkipOp { remaining: count })
}

#[cfg(test)]
mod test {
  use std::sync::Mutex;

  use super::*;
  use crate::{observable::Observable, observer::{AnonymousObserver, Observer}};

  #[tokio::test]
  async fn drops_the_prefix() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let listener = AnonymousObserver::<i32>::builder()
      .on_send(move |value, _ns| {
        sink.lock().unwrap().push(value);
        Ok(())
      })
      .build();

    let stage = skip(3);
    let _handle = stage.observe(listener).await.unwrap();

    for value in 0..6 {
      stage.asend(value, None).await.unwrap();
    }
    assert_eq!(*seen.lock().unwrap(), vec![3, 4, 5]);
  }
}

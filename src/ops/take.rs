//! Leading and trailing window operators.

use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;

use crate::{
  namespace::Namespace,
  single_stream::{OpOutcome, Operate, SingleStream},
};

struct TakeOp {
  remaining: usize,
}

#[async_trait]
impl<Item> Operate<Item, Item> for TakeOp
where
  Item: Send + 'static,
{
  async fn next(&mut self, value: Item, _ns: &Namespace) -> OpOutcome<Item> {
    if self.remaining == 0 {
      // The window is spent; the first value past it closes the stage.
      return OpOutcome::Close;
    }
    self.remaining -= 1;
    OpOutcome::Emit(value)
  }
}

/// Stage that forwards the first `count` values, then closes when the next
/// value arrives.
pub fn take<Item>(count: usize) -> Arc<SingleStream<Item, Item>>
where
  Item: Send + Sync + 'static,
{
  SingleStream::new("take", TakeOp { remaining: count })
}

struct TakeLastOp<Item> {
  count: usize,
  window: VecDeque<(Item, Namespace)>,
}

#[async_trait]
impl<Item> Operate<Item, Item> for TakeLastOp<Item>
where
  Item: Send + 'static,
{
  async fn next(&mut self, value: Item, ns: &Namespace) -> OpOutcome<Item> {
    if self.count == 0 {
      return OpOutcome::Skip;
    }
    if self.window.len() == self.count {
      self.window.pop_front();
    }
    self.window.push_back((value, ns.clone()));
    OpOutcome::Skip
  }

  async fn flush(&mut self) -> Vec<(Item, Namespace)> {
    self.window.drain(..).collect()
  }
}

/// Stage that buffers the trailing `count` values and emits them downstream
/// only when the stage closes.
pub fn take_last<Item>(count: usize) -> Arc<SingleStream<Item, Item>>
where
  Item: Send + Sync + 'static,
{
  SingleStream::new("take_last", TakeLastOp { count, window: VecDeque::new() })
}

#[cfg(test)]
mod test {
  use std::sync::Mutex;

  use super::*;
  use crate::{observable::Observable, observer::{AnonymousObserver, Observer}};

  fn recording() -> (Arc<AnonymousObserver<i32>>, Arc<Mutex<Vec<i32>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let listener = AnonymousObserver::<i32>::builder()
      .on_send(move |value, _ns| {
        sink.lock().unwrap().push(value);
        Ok(())
      })
      .build();
    (listener, seen)
  }

  #[tokio::test]
  async fn take_closes_after_the_window() {
    let (listener, seen) = recording();
    let stage = take(3);
    let _handle = stage.observe(listener.clone()).await.unwrap();

    for value in 0..3 {
      stage.asend(value, None).await.unwrap();
    }
    assert!(!stage.closed());

    // The fourth value is dropped and trips the close.
    assert!(stage.asend(3, None).await.is_ok());
    assert!(stage.closed());
    assert!(listener.closed());
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
  }

  #[tokio::test]
  async fn take_last_emits_only_on_close() {
    let (listener, seen) = recording();
    let stage = take_last(2);
    let _handle = stage.observe(listener.clone()).await.unwrap();

    for value in 0..5 {
      stage.asend(value, None).await.unwrap();
    }
    assert!(seen.lock().unwrap().is_empty());

    stage.aclose().await;
    assert_eq!(*seen.lock().unwrap(), vec![3, 4]);
    assert!(listener.closed());
  }

  #[tokio::test]
  async fn take_last_zero_emits_nothing() {
    let (listener, seen) = recording();
    let stage = take_last(0);
    let _handle = stage.observe(listener.clone()).await.unwrap();

    stage.asend(1, None).await.unwrap();
    stage.aclose().await;
    assert!(seen.lock().unwrap().is_empty());
  }
}

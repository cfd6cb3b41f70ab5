//! Iterable adapter: pushes each item of an iterator through an observer.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
  disposable::{AnonymousDisposable, Disposable},
  error::{self, ObserveError, ObserverError},
  namespace::{self, Action, Namespace},
  observable::Observable,
  observer::Observer,
};

/// Observable that emits every item of a cloneable iterable in order, then
/// closes the observer (unless `keep_alive`). Emission stops early when the
/// observer closes.
pub struct FromIterable<I> {
  id: u64,
  iterable: I,
}

impl<I> FromIterable<I> {
  pub fn new(iterable: I) -> Self { FromIterable { id: namespace::next_id(), iterable } }
}

#[async_trait]
impl<I, Item> Observable<Item> for FromIterable<I>
where
  I: IntoIterator<Item = Item> + Clone + Send + Sync + 'static,
  I::IntoIter: Send,
  Item: Send + Sync + 'static,
{
  async fn observe(
    &self,
    observer: Arc<dyn Observer<Item>>,
  ) -> Result<Box<dyn Disposable>, ObserveError> {
    let iterable = self.iterable.clone();
    let id = self.id;
    let worker = tokio::spawn(async move {
      for value in iterable {
        if observer.closed() {
          break;
        }
        let ns = Namespace::new("FromIterable", id, Action::Send, None);
        match observer.asend(value, Some(&ns)).await {
          Ok(()) => {}
          Err(ObserverError::Closed) => break,
          Err(ObserverError::Delivery(err)) => {
            error::report("FromIterable: failed to deliver value", &err);
          }
        }
      }
      if !(observer.closed() || observer.keep_alive()) {
        observer.aclose().await;
      }
    });
    Ok(Box::new(AnonymousDisposable::sync(move || worker.abort())))
  }
}

#[cfg(test)]
mod test {
  use std::sync::Mutex;

  use super::*;
  use crate::{observable::observe, observer::AnonymousObserver};

  #[tokio::test]
  async fn emits_in_order_then_closes() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let listener = AnonymousObserver::<i32>::builder()
      .on_send(move |value, _ns| {
        sink.lock().unwrap().push(value);
        Ok(())
      })
      .build();

    let source = FromIterable::new(0..5);
    let observation = observe(&source, listener.clone()).await.unwrap();
    observation.completed().await;

    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    assert!(listener.closed());
  }

  #[tokio::test]
  async fn delivers_nothing_to_a_closed_observer() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let listener = AnonymousObserver::<i32>::builder()
      .on_send(move |value, _ns| {
        sink.lock().unwrap().push(value);
        Ok(())
      })
      .build();
    listener.aclose().await;

    let source = FromIterable::new(0..1_000_000);
    let observation = observe(&source, listener.clone()).await.unwrap();
    observation.completed().await;

    assert!(seen.lock().unwrap().is_empty());
  }
}

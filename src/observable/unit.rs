//! One-shot source: emits a single value, then closes its observer.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
  disposable::{AnonymousDisposable, Disposable},
  error::{self, ObserveError, ObserverError},
  namespace::{self, Action, Namespace},
  observable::Observable,
  observer::Observer,
};

/// Observable that outputs a single value then closes the observer, unless
/// the observer asked to be kept alive.
pub struct Unit<Item> {
  id: u64,
  value: Item,
}

impl<Item> Unit<Item> {
  pub fn new(value: Item) -> Self { Unit { id: namespace::next_id(), value } }
}

#[async_trait]
impl<Item> Observable<Item> for Unit<Item>
where
  Item: Clone + Send + Sync + 'static,
{
  async fn observe(
    &self,
    observer: Arc<dyn Observer<Item>>,
  ) -> Result<Box<dyn Disposable>, ObserveError> {
    let value = self.value.clone();
    let id = self.id;
    let worker = tokio::spawn(async move {
      let ns = Namespace::new("Unit", id, Action::Send, None);
      match observer.asend(value, Some(&ns)).await {
        Ok(()) | Err(ObserverError::Closed) => {}
        Err(ObserverError::Delivery(err)) => {
          error::report("Unit: failed to deliver value", &err);
        }
      }
      if !(observer.closed() || observer.keep_alive()) {
        observer.aclose().await;
      }
    });
    // Disposing the attachment cancels the pending delivery outright.
    Ok(Box::new(AnonymousDisposable::sync(move || worker.abort())))
  }
}

#[cfg(test)]
mod test {
  use std::sync::Mutex;

  use super::*;
  use crate::{observable::observe, observer::AnonymousObserver};

  #[tokio::test]
  async fn emits_once_then_closes() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let listener = AnonymousObserver::<i32>::builder()
      .on_send(move |value, ns| {
        assert!(ns.previous().is_some_and(Namespace::is_root));
        sink.lock().unwrap().push(value);
        Ok(())
      })
      .build();

    let unit = Unit::new(42);
    let observation = observe(&unit, listener.clone()).await.unwrap();
    observation.completed().await;

    assert_eq!(*seen.lock().unwrap(), vec![42]);
    assert!(listener.closed());
  }

  #[tokio::test]
  async fn keep_alive_observer_stays_open() {
    let listener = AnonymousObserver::<i32>::builder().keep_alive(true).build();

    let unit = Unit::new(7);
    let observation = observe(&unit, listener.clone()).await.unwrap();
    // Give the worker a chance to run; the observer must still be open.
    tokio::task::yield_now().await;
    tokio::task::yield_now().await;
    assert!(!listener.closed());

    observation.dispose().await.unwrap();
    assert!(!listener.closed());
  }
}

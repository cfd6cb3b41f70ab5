//! Running-extreme operators: the result is known only once the stream ends,
//! so the current extreme is buffered and emitted on close.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
  namespace::Namespace,
  single_stream::{OpOutcome, Operate, SingleStream},
};

struct ExtremeOp<Item> {
  best: Option<(Item, Namespace)>,
  better: fn(&Item, &Item) -> bool,
}

#[async_trait]
impl<Item> Operate<Item, Item> for ExtremeOp<Item>
where
  Item: Send + 'static,
{
  async fn next(&mut self, value: Item, ns: &Namespace) -> OpOutcome<Item> {
    let replace = match &self.best {
      Some((current, _)) => (self.better)(&value, current),
      None => true,
    };
    if replace {
      self.best = Some((value, ns.clone()));
    }
    OpOutcome::Skip
  }

  async fn flush(&mut self) -> Vec<(Item, Namespace)> {
    self.best.take().into_iter().collect()
  }
}

/// Stage that emits the smallest observed value when it closes. An empty
/// stream emits nothing.
pub fn min<Item>() -> Arc<SingleStream<Item, Item>>
where
  Item: PartialOrd + Send + Sync + 'static,
{
  SingleStream::new("min", ExtremeOp { best: None, better: |candidate, best| candidate < best })
}

/// Stage that emits the largest observed value when it closes.
pub fn max<Item>() -> Arc<SingleStream<Item, Item>>
where
  Item: PartialOrd + Send + Sync + 'static,
{
  SingleStream::new("max", ExtremeOp { best: None, better: |candidate, best| candidate > best })
}

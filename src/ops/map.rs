//! Projection operators.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
  error::DynError,
  namespace::Namespace,
  single_stream::{OpOutcome, Operate, SingleStream},
};

struct MapOp<F> {
  project: F,
}

#[async_trait]
impl<In, Out, F> Operate<In, Out> for MapOp<F>
where
  In: Send + 'static,
  Out: Send + 'static,
  F: FnMut(In) -> Out + Send,
{
  async fn next(&mut self, value: In, _ns: &Namespace) -> OpOutcome<Out> {
    OpOutcome::Emit((self.project)(value))
  }
}

/// Stage that projects each value through `project`.
pub fn map<In, Out, F>(project: F) -> Arc<SingleStream<In, Out>>
where
  In: Send + 'static,
  Out: Send + Sync + 'static,
  F: FnMut(In) -> Out + Send + 'static,
{
  SingleStream::new("map", MapOp { project })
}

struct MapErrOp<F> {
  project: F,
}

#[async_trait]
impl<Item, F> Operate<Item, Item> for MapErrOp<F>
where
  Item: Send + 'static,
  F: FnMut(DynError) -> DynError + Send,
{
  async fn next(&mut self, value: Item, _ns: &Namespace) -> OpOutcome<Item> {
    OpOutcome::Emit(value)
  }

  async fn on_raise(&mut self, error: DynError) -> DynError { (self.project)(error) }
}

/// Stage that passes values through untouched and rewrites error events
/// through `project`.
pub fn map_err<Item, F>(project: F) -> Arc<SingleStream<Item, Item>>
where
  Item: Send + Sync + 'static,
  F: FnMut(DynError) -> DynError + Send + 'static,
{
  SingleStream::new("map_err", MapErrOp { project })
}

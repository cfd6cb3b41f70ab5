pub use crate::{
  disposable::{AnonymousDisposable, CompositeDisposable, Disposable},
  error::{
    dyn_error, set_error_sink, DisposeError, DynError, ErrorSink, ObserveError, ObserverError,
  },
  multi_stream::MultiStream,
  namespace::{Action, Namespace},
  observable::{observe, FromIterable, Observable, Observation, Unit},
  observer::{AnonymousObserver, AnonymousObserverBuilder, Observer},
  ops::{assert_that, filter, map, map_err, max, min, skip, stop, take, take_last},
  pipe::{pipe, Pipe, Sink},
  single_stream::{OpOutcome, Operate, SingleStream},
};

//! Error taxonomy and the process-wide error sink.
//!
//! Errors fall into two very different groups:
//!
//! - Protocol results ([`ObserverError`], [`ObserveError`], [`DisposeError`])
//!   returned through the `Result` channel of the capability traits.
//! - Error *events* ([`DynError`]) which travel through `araise` like any
//!   other value and are not terminal for the stream that carries them.
//!
//! Failures that must not abort an in-flight broadcast (a single observer
//! misbehaving during a fan-out) are routed to the [`ErrorSink`] instead of
//! being re-raised to the producer.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use thiserror::Error;

/// Shared, type-erased application error. Error events are delivered to many
/// observers at once, so the payload is reference counted rather than boxed.
pub type DynError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Wrap a concrete error into the shared error-event payload.
pub fn dyn_error<E>(error: E) -> DynError
where
  E: std::error::Error + Send + Sync + 'static,
{
  Arc::new(error)
}

/// Result of pushing an event into an [`Observer`](crate::observer::Observer).
#[derive(Debug, Clone, Error)]
pub enum ObserverError {
  /// The observer already closed. Routinely ignored by the multicast hub:
  /// membership cleanup is lazy, so racing against a closing observer is a
  /// natural condition, not a fault.
  #[error("observer is closed")]
  Closed,
  /// The observer's handler failed while processing the event.
  #[error("delivery handler failed: {0}")]
  Delivery(DynError),
}

/// Result of attaching an observer to an
/// [`Observable`](crate::observable::Observable).
#[derive(Debug, Clone, Error)]
pub enum ObserveError {
  /// Single-downstream stages accept exactly one observer at a time.
  #[error("stage already has a downstream observer")]
  AlreadyObserved,
  /// The source has closed and will never emit again.
  #[error("cannot attach to a closed source")]
  Closed,
}

/// Result of releasing a [`Disposable`](crate::disposable::Disposable).
#[derive(Debug, Error)]
pub enum DisposeError {
  /// The wrapped teardown action failed.
  #[error("teardown failed: {0}")]
  Teardown(DynError),
  /// A composite teardown attempted every member and more than one failed.
  /// All collected failures are surfaced, never just the first.
  #[error("{} teardown failure(s) during composite dispose", .0.len())]
  Aggregate(Vec<DisposeError>),
}

// ============================================================================
// Process-wide error sink
// ============================================================================

/// Append-only diagnostic channel for failures that are isolated rather than
/// propagated: per-observer faults during a fan-out, teardown failures on
/// best-effort paths.
///
/// A sink must not fail; it is the last line of defense for otherwise
/// unhandled faults.
pub trait ErrorSink: Send + Sync {
  fn report(&self, context: &str, error: &DynError);
}

static ERROR_SINK: OnceCell<Box<dyn ErrorSink>> = OnceCell::new();

/// Install the process-wide error sink. The first registration wins; a
/// subsequent call returns the rejected sink.
pub fn set_error_sink(sink: Box<dyn ErrorSink>) -> Result<(), Box<dyn ErrorSink>> {
  ERROR_SINK.set(sink)
}

/// Report to the installed sink, or to `tracing` when none was installed.
pub(crate) fn report(context: &str, error: &DynError) {
  match ERROR_SINK.get() {
    Some(sink) => sink.report(context, error),
    None => tracing::error!(context, error = %error, "unhandled stream failure"),
  }
}

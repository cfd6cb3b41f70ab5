//! Causality records threaded through a delivery chain.
//!
//! Every delivery builds a fresh [`Namespace`] identifying the participant
//! that handled it (kind + identity + action) and linking to the record of
//! the immediate upstream caller. At a terminal observer the chain walks all
//! the way back to the originating source, which makes event provenance
//! inspectable without retaining any values.

use std::{
  fmt,
  sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
  },
};

/// Lifecycle operation a namespace record was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
  Send,
  Raise,
  Close,
}

impl fmt::Display for Action {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Action::Send => f.write_str("asend"),
      Action::Raise => f.write_str("araise"),
      Action::Close => f.write_str("aclose"),
    }
  }
}

/// Immutable causality record. Cloning is cheap (shared inner), and a clone
/// compares equal to its original: identity lives in the data, not the
/// allocation.
#[derive(Debug, Clone)]
pub struct Namespace {
  inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
  kind: &'static str,
  id: u64,
  action: Action,
  previous: Option<Namespace>,
}

impl Namespace {
  pub fn new(kind: &'static str, id: u64, action: Action, previous: Option<&Namespace>) -> Self {
    Namespace {
      inner: Arc::new(Inner { kind, id, action, previous: previous.cloned() }),
    }
  }

  /// Participant category, e.g. `"MultiStream"` or an operator name.
  pub fn kind(&self) -> &'static str { self.inner.kind }

  /// Process-unique identity of the participant. Diagnostics only; never an
  /// ownership handle.
  pub fn id(&self) -> u64 { self.inner.id }

  pub fn action(&self) -> Action { self.inner.action }

  pub fn previous(&self) -> Option<&Namespace> { self.inner.previous.as_ref() }

  /// `true` iff this record was created by the originating source.
  pub fn is_root(&self) -> bool { self.inner.previous.is_none() }

  /// Number of records in the chain, this one included.
  pub fn depth(&self) -> usize {
    let mut depth = 1;
    let mut current = self;
    while let Some(previous) = current.previous() {
      depth += 1;
      current = previous;
    }
    depth
  }

  /// The originating record of the chain.
  pub fn root(&self) -> &Namespace {
    let mut current = self;
    while let Some(previous) = current.previous() {
      current = previous;
    }
    current
  }
}

impl fmt::Display for Namespace {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}#{}.{}", self.inner.kind, self.inner.id, self.inner.action)?;
    if let Some(previous) = self.previous() {
      write!(f, " <- {previous}")?;
    }
    Ok(())
  }
}

/// Allocate a process-unique participant identity.
pub(crate) fn next_id() -> u64 {
  static NEXT: AtomicU64 = AtomicU64::new(0);
  NEXT.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn chain_depth_and_root() {
    let root = Namespace::new("MultiStream", next_id(), Action::Send, None);
    let mid = Namespace::new("filter", next_id(), Action::Send, Some(&root));
    let tip = Namespace::new("AnonymousObserver", next_id(), Action::Send, Some(&mid));

    assert!(root.is_root());
    assert!(!mid.is_root());
    assert!(!tip.is_root());
    assert_eq!(tip.depth(), 3);
    assert_eq!(tip.root().kind(), "MultiStream");
    assert_eq!(tip.root().id(), root.id());
  }

  #[test]
  fn display_walks_the_chain() {
    let root = Namespace::new("Unit", 7, Action::Send, None);
    let tip = Namespace::new("map", 8, Action::Send, Some(&root));
    assert_eq!(tip.to_string(), "map#8.asend <- Unit#7.asend");
  }

  #[test]
  fn ids_are_unique() {
    let a = next_id();
    let b = next_id();
    assert_ne!(a, b);
  }
}

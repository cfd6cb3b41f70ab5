//! Asynchronous reactive streams built on three capabilities: observables
//! emit, observers receive, disposables release. Events are pushed, delivery
//! is awaited end to end, and every delivery carries a causality record
//! ([`Namespace`]) linking it back to its originating source.
//!
//! The two stream flavors are [`MultiStream`], a hot multicast hub, and
//! [`SingleStream`], the single-downstream transformer stage that the
//! operators in [`ops`] are built from. Chains are assembled with [`pipe`]
//! and attached with [`Pipe::sink`].
//!
//! ```
//! use std::sync::Arc;
//!
//! use rivulet::prelude::*;
//!
//! let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! rt.block_on(async {
//!   let hub = MultiStream::<i32>::new();
//!   let listener = AnonymousObserver::<i32>::builder()
//!     .on_send(|value, _ns| {
//!       println!("even: {value}");
//!       Ok(())
//!     })
//!     .build();
//!
//!   let source: Arc<dyn Observable<i32>> = hub.clone();
//!   let chain = pipe(source, filter(|value: &i32| value % 2 == 0))
//!     .sink(listener)
//!     .await
//!     .unwrap();
//!
//!   hub.asend(1, None).await.unwrap();
//!   hub.asend(2, None).await.unwrap();
//!   chain.dispose().await.unwrap();
//! });
//! ```

pub mod disposable;
pub mod error;
pub mod multi_stream;
pub mod namespace;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod pipe;
pub mod prelude;
pub mod single_stream;

pub use prelude::*;

//! Leaf operators, each a thin [`Operate`](crate::single_stream::Operate)
//! implementation wrapped in a [`SingleStream`](crate::single_stream::SingleStream)
//! stage by its constructor function.

mod assertion;
mod filter;
mod map;
mod minmax;
mod skip;
mod stop;
mod take;

pub use assertion::assert_that;
pub use filter::filter;
pub use map::{map, map_err};
pub use minmax::{max, min};
pub use skip::skip;
pub use stop::stop;
pub use take::{take, take_last};

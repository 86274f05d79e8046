//! The fleet dispatch engine: target resolution, eligibility filtering, job
//! submission, and the collection barrier.

mod dispatcher;
mod resolver;

pub use dispatcher::Dispatcher;
pub use resolver::{resolve_targets, Selector};

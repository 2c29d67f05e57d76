//! Tab presence domain entities.

pub mod liveness;
pub mod model;

pub use liveness::Liveness;
pub use model::{TabKey, TabRecord};

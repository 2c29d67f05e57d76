//! Shared domain types.

pub mod id;

pub use id::{DeviceId, TabId, UserId};

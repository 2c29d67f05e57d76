//! Repository implementations for all TabHub entities.

pub mod tab;
pub mod user;

pub use tab::TabRepository;
pub use user::UserRepository;

//! # tabhub-auth
//!
//! Email/password authentication for TabHub.
//!
//! ## Modules
//!
//! - `password` — Argon2id password hashing and policy enforcement
//! - `client` — sign-in/up/out flows and the current-identity event channel
//! - `session` — persisted auth session restored across restarts
//! - `guard` — route-guard helpers deferring to the first identity resolution

pub mod client;
pub mod guard;
pub mod password;
pub mod session;

pub use client::{AuthClient, Identity};
pub use password::{PasswordHasher, PasswordValidator};
pub use session::SessionFile;

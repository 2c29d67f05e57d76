//! # tabhub-database
//!
//! PostgreSQL connection management, concrete repositories for the
//! `user_tabs` and `users` tables, and the LISTEN/NOTIFY change listener
//! backing the push channel.

pub mod connection;
pub mod listener;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use listener::TabChangeListener;

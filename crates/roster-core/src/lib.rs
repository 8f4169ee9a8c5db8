//! Core types, role logic, and trait definitions for the Roster account store.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; the role catalog, the highest-role
//! calculator, and the bulk role updater all live here.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod account;
pub mod bulk;
pub mod error;
pub mod highest;
pub mod merge;
pub mod roles;
pub mod service;
pub mod store;

pub use error::{Error, Result};
pub use service::AccountService;

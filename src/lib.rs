//! BettingGame deployment and integration tooling.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod chain;
pub mod config;
pub mod contracts;
pub mod deploy;
pub mod fee;
pub mod network;
pub mod scenarios;
pub mod types;

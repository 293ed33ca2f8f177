//! # Blacklist Node Library
//!
//! Process-level plumbing for the `blacklist-node` binary: command line and
//! environment configuration, logging setup, local address discovery, the
//! interactive port prompt and signal-driven shutdown.
//! The main entry point is the `main.rs` binary.

#![allow(missing_docs)]

pub mod config;
pub mod logging;
pub mod net;
pub mod prompt;
pub mod shutdown;

pub use config::{build_config, Args};

//! Common test utilities and fixtures for scoreboard-engine integration tests
//!
//! This module provides:
//! - `TestServer`, a daemon bound to an ephemeral port with in-memory storage
//! - A roster fixture with open and closed competitions
//! - Helpers for waiting on channel traffic

#![allow(unused_imports)]
#![allow(dead_code)]

pub mod fixtures;
pub mod test_server;

pub use fixtures::*;
pub use test_server::*;

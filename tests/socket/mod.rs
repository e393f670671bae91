//! Daemon integration tests
//!
//! Each test starts its own `TestServer` so channels and stores never leak
//! between tests.

pub mod channel_tests;
pub mod judging_tests;
pub mod rotation_tests;

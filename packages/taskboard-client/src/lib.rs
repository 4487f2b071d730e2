//! Command-line client for a hosted task board: REST gateway, configuration
//! and logging around the `taskboard-core` engine.

pub mod config;
pub mod logging;
pub mod rest;

//! Integration test suite for AIUP
//!
//! End-to-end tests of the update state machine through the public library
//! API and through the `aiup` binary.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **server**: a minimal local HTTP server serving release metadata and artifacts
//! - **scenarios**: fresh install, label short-circuit, digest backfill, running instances
//! - **http**: the state machine against the real `reqwest` fetcher
//! - **config**: configuration lookup through the environment
//! - **cli**: exit codes and output of the binary

mod server;

mod cli;
mod config;
mod http;
mod scenarios;

//! Integration test suite for tplbuild
//!
//! End-to-end tests that drive a [`tplbuild::BuildPipeline`] through complete
//! build cycles with real extensions and on-disk config files.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! Tests are organized by functionality area:
//! - **pipeline**: Build cycles, hook ordering, header lifecycle, config errors
//! - **watch**: Config watch bridge and file-event handling

mod common;
mod pipeline;
mod watch;

//! Logging setup shared by DocPilot binaries and tests.
//!
//! Wraps `tracing-subscriber` so every entry point gets the same
//! `RUST_LOG`-aware filter and the same human or JSON output shape.

pub mod logging;

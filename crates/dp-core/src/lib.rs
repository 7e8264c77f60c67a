//! Shared domain types and configuration for DocPilot.

pub mod config;
pub mod types;

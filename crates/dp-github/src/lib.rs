//! GitHub documentation synchronisation for DocPilot.
//!
//! [`sync::DocSyncEngine`] takes an [`dp_core::types::UpdateRequest`] and
//! lands it as a working branch plus pull request. It talks to the remote
//! through [`host::RepositoryHost`], implemented for GitHub by
//! [`client::OctocrabHost`] and in memory by [`memory::MemoryHost`].

pub mod auth;
pub mod branch;
pub mod changes;
pub mod client;
pub mod comments;
pub mod directory;
pub mod error;
pub mod host;
pub mod memory;
pub mod planner;
pub mod publisher;
pub mod sync;
pub mod tree;
pub mod webhook;

pub use error::{Result, SyncError};
pub use sync::DocSyncEngine;

//! # plexnudge-core
//!
//! Building blocks for nudging a Plex server to rescan exactly the paths
//! that just changed, instead of whole libraries:
//!
//! - batched scheduling of refresh requests with a restartable quiet period
//! - translation of local paths into the server's filesystem view
//! - a Plex HTTP client that scopes refreshes to the matching library
//!   section
//! - hard-link placement strategies for finished transfers
//!
//! The `plexnudged` binary wires these together behind a filesystem
//! watcher.

#![cfg_attr(docsrs, feature(doc_cfg))]

/// Scheduler and connection tunables.
pub mod config;
/// Error types shared across the crate.
pub mod error;
/// Hard-link placement strategies.
pub mod link;
/// Local-to-server path translation.
pub mod pathmap;
/// Destination path string helpers.
pub mod paths;
/// Plex HTTP integration.
pub mod plex;
/// Debounced refresh batching.
pub mod scheduler;

pub use config::{PlexServerSettings, SchedulerSettings};
pub use error::{RefreshError, Result};
pub use pathmap::{MapEntry, PathMap};
pub use plex::PlexClient;
pub use scheduler::{RefreshScheduler, RefreshTarget};

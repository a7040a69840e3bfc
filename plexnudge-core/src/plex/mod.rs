//! Plex server integration: section discovery and scoped refresh requests.

pub mod client;
pub mod types;

pub use client::{PlexClient, match_section};
pub use types::{Section, SectionLocation};

//! Strategies for placing finished transfers into the library tree.
//!
//! Hard links keep the seed copy and the library copy backed by the same
//! inode, so neither side pays for a duplicate. What happens when the
//! library path is already occupied is a policy choice, hence the trait.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{RefreshError, Result};

/// Places a finished file at its library path.
pub trait LinkStrategy: Send + Sync {
    fn place(&self, source: &Path, target: &Path) -> Result<()>;
}

/// Hard-links the source, replacing whatever already sits at the target.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReplaceLink;

impl LinkStrategy for ReplaceLink {
    fn place(&self, source: &Path, target: &Path) -> Result<()> {
        if target.exists() {
            debug!(target = %target.display(), "removing existing target before linking");
            fs::remove_file(target)?;
        }
        fs::hard_link(source, target)?;
        Ok(())
    }
}

/// Hard-links the source but refuses to touch an occupied target.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeepExistingLink;

impl LinkStrategy for KeepExistingLink {
    fn place(&self, source: &Path, target: &Path) -> Result<()> {
        if target.exists() {
            return Err(RefreshError::AlreadyExists(
                target.display().to_string(),
            ));
        }
        fs::hard_link(source, target)?;
        Ok(())
    }
}

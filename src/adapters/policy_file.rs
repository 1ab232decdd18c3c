//! Policy bundle file loader.
//!
//! Reads a JSON policy bundle from disk.  Errors carry the path so an
//! operator can tell which bundle failed.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use crate::policy::PolicyBundle;

/// Load and parse the policy bundle at `path`.
pub fn load_policy_bundle(path: impl AsRef<Path>) -> Result<PolicyBundle> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading policy bundle {}", path.display()))?;
    let bundle = PolicyBundle::from_json_str(&text)
        .with_context(|| format!("parsing policy bundle {}", path.display()))?;
    info!(
        "policy bundle {} loaded (version {:?})",
        path.display(),
        bundle.version
    );
    Ok(bundle)
}

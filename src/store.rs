// Whole-document JSON persistence for the aggregate and achievement stores.
// Read-modify-write per poll cycle, single writer; save goes through a temp
// file and rename so a crash mid-write never leaves a truncated document.

use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Load a persisted document. A missing file yields the default structure;
/// an unreadable or malformed file is logged and replaced by the default
/// rather than propagated (a corrupt store must not stall the poll loop).
pub fn load_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read store; using default");
            return T::default();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse store; using default");
            T::default()
        }
    }
}

/// Persist a document: create parent dirs, write `<path>.tmp`, rename over
/// the target.
pub fn save<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, &bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

//! Implementation of `berth clean`.

use anyhow::Result;

use crate::core::Workspace;
use crate::util::fs::remove_dir_all_if_exists;

/// Remove the target directory. Returns whether anything was removed.
pub fn clean(ws: &Workspace) -> Result<bool> {
    let target = ws.target_dir();
    if !target.exists() {
        return Ok(false);
    }
    tracing::debug!("Removing {}", target.display());
    remove_dir_all_if_exists(target)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::MANIFEST_NAME;
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_target_dir() {
        let tmp = TempDir::new().unwrap();
        let manifest = tmp.path().join(MANIFEST_NAME);
        std::fs::write(&manifest, "[package]\nname = \"p\"\n").unwrap();
        let ws = Workspace::new(&manifest).unwrap();

        assert!(!clean(&ws).unwrap());

        ws.ensure_output_dir().unwrap();
        assert!(clean(&ws).unwrap());
        assert!(!ws.target_dir().exists());
        assert!(manifest.exists());
    }
}

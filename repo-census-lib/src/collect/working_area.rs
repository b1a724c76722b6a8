use super::path_utils::sanitize_path_component;
use ohno::{IntoAppError, bail};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "   staging";
const CONTENT_DIR: &str = "content";
const OUTPUT_DIR: &str = "metrics";

/// Item-scoped staging directory holding a clone and the analyzer's output.
///
/// The directory is removed when the value is dropped, whatever path the enrichment took
/// to get there. Removal is best-effort: failures are logged and never propagated.
#[derive(Debug)]
pub struct WorkingArea {
    root: PathBuf,
    content: PathBuf,
    output: PathBuf,
}

impl WorkingArea {
    /// Create a fresh area for `key` under `work_root`, discarding any leftover area with the same key.
    ///
    /// Fails for a key that does not name a directory strictly below `work_root`.
    pub fn stage(work_root: &Path, key: &str) -> crate::Result<Self> {
        let component = sanitize_path_component(key);
        if component.trim().is_empty() || component == "." {
            bail!("'{key}' cannot be used as a working area name");
        }

        let root = work_root.join(component);

        match fs::remove_dir_all(&root) {
            Ok(()) => log::debug!(target: LOG_TARGET, "Removed stale working area '{}'", root.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).into_app_err_with(|| format!("could not remove stale working area '{}'", root.display())),
        }

        let area = Self {
            content: root.join(CONTENT_DIR),
            output: root.join(OUTPUT_DIR),
            root,
        };

        fs::create_dir_all(&area.output).into_app_err_with(|| format!("could not create working area '{}'", area.root.display()))?;

        Ok(area)
    }

    /// Root of the area.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Where the item's content gets cloned. Does not exist until the clone runs.
    #[must_use]
    pub fn content_dir(&self) -> &Path {
        &self.content
    }

    /// Where the analyzer writes its tables.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output
    }
}

impl Drop for WorkingArea {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.root) {
            Ok(()) => log::trace!(target: LOG_TARGET, "Removed working area '{}'", self.root.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(target: LOG_TARGET, "Could not remove working area '{}': {e}", self.root.display()),
        }
    }
}

/// Remove the work root if nothing is left inside it.
pub fn remove_root_if_empty(work_root: &Path) {
    match fs::remove_dir(work_root) {
        Ok(()) => log::debug!(target: LOG_TARGET, "Removed work root '{}'", work_root.display()),
        Err(e) => log::trace!(target: LOG_TARGET, "Left work root '{}' in place: {e}", work_root.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_creates_output_only() {
        let tmp = tempfile::tempdir().unwrap();
        let area = WorkingArea::stage(tmp.path(), "octo/widget").unwrap();

        assert_eq!(area.path(), tmp.path().join("octo_widget"));
        assert!(area.output_dir().is_dir());
        assert!(!area.content_dir().exists());
        assert!(area.content_dir().starts_with(area.path()));
    }

    #[test]
    fn test_drop_removes_area() {
        let tmp = tempfile::tempdir().unwrap();
        let root = {
            let area = WorkingArea::stage(tmp.path(), "octo/widget").unwrap();
            fs::create_dir_all(area.content_dir().join("src")).unwrap();
            fs::write(area.output_dir().join("class.csv"), "loc\n1\n").unwrap();
            area.path().to_path_buf()
        };

        assert!(!root.exists());
        assert!(tmp.path().exists());
    }

    #[test]
    fn test_stage_replaces_stale_area() {
        let tmp = tempfile::tempdir().unwrap();
        let stale = tmp.path().join("octo_widget").join("content");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("leftover.txt"), "old").unwrap();

        let area = WorkingArea::stage(tmp.path(), "octo/widget").unwrap();
        assert!(!area.content_dir().exists());
        assert!(area.output_dir().is_dir());
    }

    #[test]
    fn test_drop_after_external_removal() {
        let tmp = tempfile::tempdir().unwrap();
        let area = WorkingArea::stage(tmp.path(), "a/b").unwrap();
        fs::remove_dir_all(area.path()).unwrap();
        drop(area);
    }

    #[test]
    fn test_stage_keys_cannot_escape_root() {
        let tmp = tempfile::tempdir().unwrap();
        let area = WorkingArea::stage(tmp.path(), "../escape").unwrap();
        assert!(area.path().starts_with(tmp.path()));
    }

    #[test]
    fn test_stage_rejects_keys_naming_the_root() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("unrelated.txt"), "keep me").unwrap();

        for key in ["", ".", "  "] {
            let err = WorkingArea::stage(tmp.path(), key).unwrap_err();
            assert!(err.to_string().contains("cannot be used as a working area name"));
        }

        assert!(tmp.path().join("unrelated.txt").is_file());
    }

    #[test]
    fn test_remove_root_if_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("work");

        fs::create_dir_all(root.join("busy")).unwrap();
        remove_root_if_empty(&root);
        assert!(root.exists());

        fs::remove_dir(root.join("busy")).unwrap();
        remove_root_if_empty(&root);
        assert!(!root.exists());
    }
}

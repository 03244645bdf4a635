use std::path::{Path, PathBuf};

use anyhow::Context as _;
use tracing::{debug, warn};

use super::Variant;
use crate::error::ReelResult;

/// Per-run scratch tree under `<out>/work-<lesson_id>/`.
///
/// Every variant and pass writes into its own directory, so writers never share a path.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    keep: bool,
}

impl Workspace {
    pub fn create(out_dir: &Path, lesson_id: &str, keep: bool) -> ReelResult<Self> {
        let root = out_dir.join(format!("work-{lesson_id}"));
        std::fs::create_dir_all(&root)
            .with_context(|| format!("create workspace '{}'", root.display()))?;
        let root = std::path::absolute(&root)
            .with_context(|| format!("resolve '{}'", root.display()))?;
        debug!(root = %root.display(), keep, "workspace ready");
        Ok(Self { root, keep })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Audio for a variant lives directly in this directory.
    pub fn variant_dir(&self, variant: Variant) -> PathBuf {
        self.root.join(variant.name())
    }

    /// Frames, segments and the assembled part of one pass (`listening`, `reading`, `story`).
    pub fn pass_dir(&self, variant: Variant, pass: &str) -> PathBuf {
        self.variant_dir(variant).join(pass)
    }

    /// Cards, normalized clips and the concatenated sequence of a variant.
    pub fn montage_dir(&self, variant: Variant) -> PathBuf {
        self.root.join(format!("montage-{}", variant.name()))
    }

    /// Remove the tree unless the run asked to keep it.
    pub fn cleanup(self) -> ReelResult<()> {
        if self.keep {
            debug!(root = %self.root.display(), "keeping workspace");
            return Ok(());
        }
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            warn!(root = %self.root.display(), error = %e, "failed to remove workspace");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_out(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "storyreel_ws_{tag}_{}_{nanos}",
            std::process::id()
        ))
    }

    #[test]
    fn layout_is_disjoint_per_variant_and_pass() {
        let out = temp_out("layout");
        let ws = Workspace::create(&out, "lesson-1", false).unwrap();
        assert!(ws.root().ends_with("work-lesson-1"));
        let listening = ws.pass_dir(Variant::Social, "listening");
        let reading = ws.pass_dir(Variant::Social, "reading");
        assert_ne!(listening, reading);
        assert!(listening.starts_with(ws.variant_dir(Variant::Social)));
        assert!(!ws.montage_dir(Variant::Web).starts_with(ws.variant_dir(Variant::Web)));
        let _ = std::fs::remove_dir_all(&out);
    }

    #[test]
    fn cleanup_honors_keep() {
        let out = temp_out("cleanup");
        let ws = Workspace::create(&out, "a", true).unwrap();
        let root = ws.root().to_path_buf();
        ws.cleanup().unwrap();
        assert!(root.exists());

        let ws = Workspace::create(&out, "a", false).unwrap();
        std::fs::write(ws.root().join("x.txt"), b"x").unwrap();
        ws.cleanup().unwrap();
        assert!(!root.exists());
        let _ = std::fs::remove_dir_all(&out);
    }
}

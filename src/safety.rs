use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Keeps patch targets inside the workspace root.
///
/// Record paths are relative. They are normalized lexically, so `..` may not
/// climb above the root. The deepest existing ancestor is then canonicalized
/// so a symlink cannot redirect a write outside the root either.
#[derive(Debug, Clone)]
pub struct WorkspaceGuard {
    /// Canonical workspace root
    workspace_root: PathBuf,
}

#[derive(Error, Debug)]
pub enum SafetyError {
    #[error("target path must be relative to the workspace: {path}")]
    AbsolutePath { path: PathBuf },

    #[error("path is outside workspace: {path} (workspace: {workspace})")]
    OutsideWorkspace { path: PathBuf, workspace: PathBuf },

    #[error("failed to canonicalize path: {0}")]
    Canonicalize(#[from] std::io::Error),
}

impl WorkspaceGuard {
    /// Create a guard for an existing workspace root.
    pub fn new(workspace_root: impl AsRef<Path>) -> Result<Self, SafetyError> {
        let workspace_root = workspace_root.as_ref().canonicalize()?;
        Ok(Self { workspace_root })
    }

    /// Resolve a record's relative `file` to an absolute path inside the root.
    ///
    /// The target itself need not exist.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf, SafetyError> {
        let relative = relative.as_ref();
        let mut normalized = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => normalized.push(part),
                Component::CurDir => {}
                Component::ParentDir => {
                    if !normalized.pop() {
                        return Err(self.outside(relative));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(SafetyError::AbsolutePath {
                        path: relative.to_path_buf(),
                    });
                }
            }
        }

        let resolved = self.workspace_root.join(&normalized);
        self.check_existing_ancestor(&resolved)?;
        Ok(resolved)
    }

    fn check_existing_ancestor(&self, path: &Path) -> Result<(), SafetyError> {
        let Some(existing) = path.ancestors().find(|a| a.exists()) else {
            return Ok(());
        };
        let canonical = existing.canonicalize()?;
        if !canonical.starts_with(&self.workspace_root) {
            return Err(SafetyError::OutsideWorkspace {
                path: canonical,
                workspace: self.workspace_root.clone(),
            });
        }
        Ok(())
    }

    fn outside(&self, path: &Path) -> SafetyError {
        SafetyError::OutsideWorkspace {
            path: path.to_path_buf(),
            workspace: self.workspace_root.clone(),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }
}

//! Path containment for every dynamic command that touches the filesystem.
//!
//! Resolution is lexical first (`.` and `..` collapsed against the chat's
//! working directory), then every existing component below the root is
//! inspected so a symlink cannot redirect the path outside the sandbox.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chatgate_commons::{canonicalize_or_self, is_within, normalize_path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("empty path")]
    EmptyPath,
    #[error("path outside base_dir")]
    OutsideRoot,
    #[error("symlink points outside base_dir")]
    SymlinkEscape,
    #[error("invalid base_dir: {0}")]
    InvalidRoot(#[source] io::Error),
}

/// Confines user-supplied paths to a single root directory.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
    canonical_root: PathBuf,
}

impl PathSandbox {
    /// Build a sandbox rooted at `root`, made absolute against the process
    /// working directory when relative.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SandboxError> {
        let absolute = std::path::absolute(root.as_ref()).map_err(SandboxError::InvalidRoot)?;
        let root = normalize_path(&absolute);
        let canonical_root = canonicalize_or_self(&root);
        Ok(Self {
            root,
            canonical_root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `user_path` against `current_dir` and reject anything that
    /// lands outside the root, lexically or through a symlink.
    pub fn resolve(&self, current_dir: &Path, user_path: &str) -> Result<PathBuf, SandboxError> {
        if user_path.trim().is_empty() {
            return Err(SandboxError::EmptyPath);
        }

        let requested = Path::new(user_path);
        let candidate = if requested.is_absolute() {
            normalize_path(requested)
        } else {
            normalize_path(&current_dir.join(requested))
        };

        if !is_within(&self.root, &candidate) {
            return Err(SandboxError::OutsideRoot);
        }

        self.ensure_links_contained(&candidate)?;
        Ok(candidate)
    }

    fn contains_resolved(&self, target: &Path) -> bool {
        is_within(&self.canonical_root, target) || is_within(&self.root, target)
    }

    fn ensure_links_contained(&self, candidate: &Path) -> Result<(), SandboxError> {
        let Ok(relative) = candidate.strip_prefix(&self.root) else {
            return Err(SandboxError::OutsideRoot);
        };

        let mut current = self.root.clone();
        for component in relative.components() {
            current.push(component);
            let Ok(metadata) = fs::symlink_metadata(&current) else {
                // Nothing below a missing component exists either.
                break;
            };
            if !metadata.file_type().is_symlink() {
                continue;
            }

            let target = match fs::canonicalize(&current) {
                Ok(target) => target,
                Err(_) => dangling_target(&current)?,
            };
            if !self.contains_resolved(&target) {
                return Err(SandboxError::SymlinkEscape);
            }
        }
        Ok(())
    }
}

/// Lexical target of a link that cannot be followed, so a later create
/// through it is still confined.
fn dangling_target(link: &Path) -> Result<PathBuf, SandboxError> {
    let destination = fs::read_link(link).map_err(|_| SandboxError::SymlinkEscape)?;
    if destination.is_absolute() {
        return Ok(normalize_path(&destination));
    }
    let parent = link.parent().unwrap_or(link);
    Ok(normalize_path(&parent.join(destination)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sandbox() -> (TempDir, PathSandbox) {
        let dir = TempDir::new().unwrap();
        let sandbox = PathSandbox::new(dir.path()).unwrap();
        (dir, sandbox)
    }

    #[test]
    fn rejects_blank_input() {
        let (_dir, sandbox) = sandbox();
        let error = sandbox.resolve(sandbox.root(), "   ").unwrap_err();
        assert_eq!(error.to_string(), "empty path");
    }

    #[test]
    fn relative_paths_join_current_dir() {
        let (_dir, sandbox) = sandbox();
        let current = sandbox.root().join("movies");
        let resolved = sandbox.resolve(&current, "./2024/../a.mp4").unwrap();
        assert_eq!(resolved, sandbox.root().join("movies/a.mp4"));
    }

    #[test]
    fn root_itself_is_allowed() {
        let (_dir, sandbox) = sandbox();
        let current = sandbox.root().join("movies");
        assert_eq!(sandbox.resolve(&current, "..").unwrap(), sandbox.root());
    }

    #[test]
    fn parent_traversal_is_rejected() {
        let (_dir, sandbox) = sandbox();
        let error = sandbox.resolve(sandbox.root(), "../../etc/passwd").unwrap_err();
        assert!(matches!(error, SandboxError::OutsideRoot));
    }

    #[test]
    fn absolute_paths_outside_are_rejected() {
        let (_dir, sandbox) = sandbox();
        let error = sandbox.resolve(sandbox.root(), "/etc/passwd").unwrap_err();
        assert_eq!(error.to_string(), "path outside base_dir");
    }

    #[test]
    fn sibling_prefix_is_not_inside() {
        let (_dir, sandbox) = sandbox();
        let sibling = format!("{}-other/file", sandbox.root().display());
        assert!(matches!(
            sandbox.resolve(sandbox.root(), &sibling),
            Err(SandboxError::OutsideRoot)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_rejected() {
        let (dir, sandbox) = sandbox();
        let outside = TempDir::new().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();

        let error = sandbox.resolve(sandbox.root(), "escape").unwrap_err();
        assert_eq!(error.to_string(), "symlink points outside base_dir");
    }

    #[cfg(unix)]
    #[test]
    fn intermediate_symlink_escape_is_rejected() {
        let (dir, sandbox) = sandbox();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "x").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();

        assert!(matches!(
            sandbox.resolve(sandbox.root(), "escape/secret.txt"),
            Err(SandboxError::SymlinkEscape)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_outside_is_rejected() {
        let (dir, sandbox) = sandbox();
        std::os::unix::fs::symlink("/nonexistent-chatgate-target", dir.path().join("dangling"))
            .unwrap();

        assert!(matches!(
            sandbox.resolve(sandbox.root(), "dangling"),
            Err(SandboxError::SymlinkEscape)
        ));
    }

    #[cfg(unix)]
    #[test]
    fn internal_symlink_is_allowed() {
        let (dir, sandbox) = sandbox();
        fs::create_dir(dir.path().join("real")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        let resolved = sandbox.resolve(sandbox.root(), "alias").unwrap();
        assert_eq!(resolved, sandbox.root().join("alias"));
    }
}

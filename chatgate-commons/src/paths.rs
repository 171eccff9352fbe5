use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Normalize a path by resolving `.` and `..` components lexically.
///
/// `..` at the filesystem root stays at the root, matching how the kernel
/// resolves `/..`.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                normalized.pop();
            }
            Component::CurDir => {}
            Component::Prefix(prefix) => normalized.push(prefix.as_os_str()),
            Component::RootDir => normalized.push(component.as_os_str()),
            Component::Normal(part) => normalized.push(part),
        }
    }
    normalized
}

/// Returns true when `path` is `root` or a descendant of it.
///
/// The comparison is component-wise, so `/srv/data2` is not inside `/srv/data`.
pub fn is_within(root: &Path, path: &Path) -> bool {
    path.starts_with(root)
}

/// Canonicalize a path, falling back to the lexical form if the filesystem
/// cannot resolve it.
pub fn canonicalize_or_self(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|error| {
        warn!(
            path = %path.display(),
            %error,
            "Failed to canonicalize path; falling back to provided path"
        );
        path.to_path_buf()
    })
}

//! Logical path resolution with traversal rejection.
//!
//! Feature file mappings carry logical paths; this module maps them to
//! on-disk locations (sources) or archive-relative paths (destinations)
//! and guarantees that the result stays inside its declared root. The
//! check is purely lexical and runs before any I/O, so a hostile mapping
//! never touches the filesystem.

use std::path::{Component, Path, PathBuf};

/// Error types for path resolution.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Path escapes its permitted root: {0}")]
    PathEscape(String),
}

/// Resolves mapping paths against the configured roots.
#[derive(Debug, Clone)]
pub struct PathResolver {
    project_root: PathBuf,
    core_base: PathBuf,
}

impl PathResolver {
    pub fn new(project_root: impl Into<PathBuf>, core_base: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            core_base: core_base.into(),
        }
    }

    pub fn core_base(&self) -> &Path {
        &self.core_base
    }

    /// Resolve a mapping source to an absolute on-disk path.
    ///
    /// `modules/...` and `core/...` paths are rooted at the project
    /// root; legacy paths are treated as relative to the core tree.
    pub fn resolve_source(&self, source: &str) -> Result<PathBuf, PathError> {
        if source.starts_with("modules/") || source.starts_with("core/") {
            resolve_under(&self.project_root, source)
        } else {
            resolve_under(&self.core_base, source)
        }
    }

    /// Resolve a mapping destination to an archive path beneath the
    /// project directory, using forward slashes.
    pub fn resolve_destination(
        &self,
        project_name: &str,
        destination: &str,
    ) -> Result<String, PathError> {
        let mut parts: Vec<&str> = Vec::new();
        for component in Path::new(destination).components() {
            match component {
                Component::Normal(part) => {
                    let part = part
                        .to_str()
                        .ok_or_else(|| PathError::PathEscape(destination.to_string()))?;
                    parts.push(part);
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(PathError::PathEscape(destination.to_string()));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(PathError::PathEscape(destination.to_string()));
                }
            }
        }
        if parts.is_empty() {
            return Err(PathError::PathEscape(destination.to_string()));
        }
        Ok(format!("{}/{}", project_name, parts.join("/")))
    }
}

/// Join `relative` onto `root`, normalizing lexically and rejecting any
/// step above the root.
fn resolve_under(root: &Path, relative: &str) -> Result<PathBuf, PathError> {
    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return Err(PathError::PathEscape(relative.to_string()));
                }
                resolved.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathError::PathEscape(relative.to_string()));
            }
        }
    }

    Ok(resolved)
}

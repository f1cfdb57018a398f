//! Project folder selection

use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Resolves a folder choice to a usable directory.
///
/// Returns `None` when the user cancelled or the choice is not a directory.
#[async_trait]
pub trait FolderPicker: Send + Sync {
    async fn select_folder(&self, candidate: Option<PathBuf>) -> Option<PathBuf>;
}

/// Accepts a path proposed by the client if it exists on this machine
#[derive(Debug, Default, Clone)]
pub struct LocalFolderPicker;

#[async_trait]
impl FolderPicker for LocalFolderPicker {
    async fn select_folder(&self, candidate: Option<PathBuf>) -> Option<PathBuf> {
        let candidate = candidate?;
        match tokio::fs::canonicalize(&candidate).await {
            Ok(path) if is_directory(&path).await => Some(path),
            Ok(path) => {
                tracing::debug!(path = %path.display(), "Selected path is not a directory");
                None
            }
            Err(e) => {
                tracing::debug!(path = %candidate.display(), error = %e, "Selected path does not exist");
                None
            }
        }
    }
}

async fn is_directory(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// Display name of a project: the last component of its path
pub fn project_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_name() {
        assert_eq!(project_name(Path::new("/home/dev/repo")), "repo");
        assert_eq!(project_name(Path::new("/home/dev/repo/")), "repo");
        assert_eq!(project_name(Path::new("/")), "/");
    }

    #[tokio::test]
    async fn test_accepts_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let picked = LocalFolderPicker
            .select_folder(Some(dir.path().to_path_buf()))
            .await;
        assert_eq!(picked, Some(dir.path().canonicalize().unwrap()));
    }

    #[tokio::test]
    async fn test_rejects_files_and_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, "x").unwrap();

        assert_eq!(LocalFolderPicker.select_folder(Some(file)).await, None);
        assert_eq!(
            LocalFolderPicker
                .select_folder(Some(dir.path().join("missing")))
                .await,
            None
        );
        assert_eq!(LocalFolderPicker.select_folder(None).await, None);
    }
}

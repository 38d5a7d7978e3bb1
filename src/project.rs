use std::path::{Path, PathBuf};

/// Finds the project a path belongs to.
pub trait ProjectResolver: Send + Sync {
    /// Root directory of the project containing `start`, if any.
    fn project_root(&self, start: &Path) -> Option<PathBuf>;
}

/// Walks up from a path looking for marker files such as `.git`.
#[derive(Debug, Clone)]
pub struct MarkerResolver {
    markers: Vec<String>,
}

impl MarkerResolver {
    pub fn new(markers: Vec<String>) -> Self {
        Self { markers }
    }
}

impl ProjectResolver for MarkerResolver {
    fn project_root(&self, start: &Path) -> Option<PathBuf> {
        let mut dir = start.to_path_buf();
        if dir.is_file() {
            dir.pop();
        }
        loop {
            if self.markers.iter().any(|m| dir.join(m).exists()) {
                return Some(dir);
            }
            if !dir.pop() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_finds_nearest_marker() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("repo");
        let nested = root.join("src").join("deep");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(nested.join("a.rs"), "").unwrap();

        let resolver = MarkerResolver::new(vec![".git".into()]);
        assert_eq!(resolver.project_root(&nested), Some(root.clone()));
        assert_eq!(resolver.project_root(&nested.join("a.rs")), Some(root));
    }

    #[test]
    fn test_no_marker_means_no_project() {
        let tmp = TempDir::new().unwrap();
        let resolver = MarkerResolver::new(vec!["todoscope-marker-that-does-not-exist".into()]);
        assert_eq!(resolver.project_root(tmp.path()), None);
    }
}

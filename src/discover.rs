// src/discover.rs

//! Feature file discovery.

use tracing::{debug, warn};

use crate::errors::Result;

/// Expand `pattern` into the feature files to run.
///
/// Directories are skipped and unreadable entries are logged and ignored.
/// The result is sorted and free of duplicates.
pub fn discover_features(pattern: &str) -> Result<Vec<String>> {
    let mut files = Vec::new();

    for entry in glob::glob(pattern)? {
        match entry {
            Ok(path) if path.is_file() => files.push(path.to_string_lossy().into_owned()),
            Ok(path) => debug!(path = %path.display(), "skipping non-file match"),
            Err(err) => warn!(path = %err.path().display(), error = %err.error(), "unreadable glob match"),
        }
    }

    files.sort();
    files.dedup();
    debug!(pattern, count = files.len(), "feature files discovered");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::BehatError;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn finds_nested_feature_files_sorted() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("features/admin")).unwrap();
        fs::create_dir_all(root.join("features/dir.feature")).unwrap();
        fs::write(root.join("features/login.feature"), "Feature: login").unwrap();
        fs::write(root.join("features/admin/users.feature"), "Feature: users").unwrap();
        fs::write(root.join("features/notes.txt"), "not a feature").unwrap();

        let pattern = format!("{}/features/**/*.feature", root.display());
        let files = discover_features(&pattern).unwrap();

        assert_eq!(
            files,
            vec![
                format!("{}/features/admin/users.feature", root.display()),
                format!("{}/features/login.feature", root.display()),
            ]
        );
    }

    #[test]
    fn no_matches_is_an_empty_run() {
        let dir = tempdir().unwrap();
        let pattern = format!("{}/*.feature", dir.path().display());
        assert!(discover_features(&pattern).unwrap().is_empty());
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(matches!(
            discover_features("features/[*.feature"),
            Err(BehatError::GlobError(_))
        ));
    }
}

//! Input discovery.
//!
//! Turns the paths given on the command line into a sorted, de-duplicated
//! list of image files:
//!
//! - A **file** is kept if its extension is in the capability table;
//!   otherwise it is skipped with a warning.
//! - A **directory** contributes its supported image files. Only the top
//!   level is read unless `recursive` is set.
//! - A path that does not exist is an error.
//!
//! Directory walking goes through `walkdir`, which yields entries in
//! file-name order and reports permission problems per entry.

use crate::imaging::format::{is_supported_path, supported_extensions};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum InputError {
    #[error("Input not found: {0}")]
    NotFound(PathBuf),
    #[error(
        "No supported image files found ({})",
        supported_extensions().collect::<Vec<_>>().join(", ")
    )]
    NoInputs,
    #[error("Failed to read directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Expand `inputs` into the list of image files to process.
pub fn resolve_inputs(inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>, InputError> {
    let mut found = BTreeSet::new();

    for input in inputs {
        if input.is_dir() {
            collect_dir(input, recursive, &mut found)?;
        } else if input.is_file() {
            if is_supported_path(input) {
                found.insert(input.clone());
            } else {
                warn!(path = %input.display(), "skipping unsupported file type");
            }
        } else {
            return Err(InputError::NotFound(input.clone()));
        }
    }

    if found.is_empty() {
        return Err(InputError::NoInputs);
    }
    Ok(found.into_iter().collect())
}

fn collect_dir(
    dir: &Path,
    recursive: bool,
    found: &mut BTreeSet<PathBuf>,
) -> Result<(), InputError> {
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 })
        .sort_by_file_name();

    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && is_supported_path(entry.path()) {
            found.insert(entry.into_path());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    fn setup() -> TempDir {
        let tmp = TempDir::new().unwrap();
        for name in [
            "b.jpg",
            "a.PNG",
            "notes.txt",
            "c.webp",
            "nested/d.tiff",
            "nested/deeper/e.jpeg",
            "nested/readme.md",
        ] {
            touch(&tmp.path().join(name));
        }
        tmp
    }

    fn names(paths: &[PathBuf], root: &Path) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn directory_top_level_only_by_default() {
        let tmp = setup();
        let files = resolve_inputs(&[tmp.path().to_path_buf()], false).unwrap();
        assert_eq!(names(&files, tmp.path()), ["a.PNG", "b.jpg", "c.webp"]);
    }

    #[test]
    fn directory_recursive() {
        let tmp = setup();
        let files = resolve_inputs(&[tmp.path().to_path_buf()], true).unwrap();
        assert_eq!(
            names(&files, tmp.path()),
            [
                "a.PNG",
                "b.jpg",
                "c.webp",
                "nested/d.tiff",
                "nested/deeper/e.jpeg"
            ]
        );
    }

    #[test]
    fn explicit_files_sorted_and_deduplicated() {
        let tmp = setup();
        let b = tmp.path().join("b.jpg");
        let a = tmp.path().join("a.PNG");
        let files = resolve_inputs(&[b.clone(), a.clone(), b.clone()], false).unwrap();
        assert_eq!(files, [a, b]);
    }

    #[test]
    fn file_and_its_directory_deduplicate() {
        let tmp = setup();
        let files =
            resolve_inputs(&[tmp.path().join("c.webp"), tmp.path().to_path_buf()], false).unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn unsupported_explicit_file_is_skipped() {
        let tmp = setup();
        let result = resolve_inputs(
            &[tmp.path().join("notes.txt"), tmp.path().join("b.jpg")],
            false,
        )
        .unwrap();
        assert_eq!(result, [tmp.path().join("b.jpg")]);
    }

    #[test]
    fn missing_path_is_not_found() {
        let tmp = setup();
        let missing = tmp.path().join("nope.jpg");
        let result = resolve_inputs(&[missing.clone()], false);
        assert!(matches!(result, Err(InputError::NotFound(p)) if p == missing));
    }

    #[test]
    fn nothing_supported_is_no_inputs() {
        let tmp = setup();
        let result = resolve_inputs(&[tmp.path().join("notes.txt")], false);
        assert!(matches!(result, Err(InputError::NoInputs)));

        let empty = TempDir::new().unwrap();
        let result = resolve_inputs(&[empty.path().to_path_buf()], true);
        assert!(matches!(result, Err(InputError::NoInputs)));
    }

    #[test]
    fn no_inputs_message_lists_every_extension() {
        let message = InputError::NoInputs.to_string();
        assert_eq!(
            message,
            "No supported image files found (jpg, jpeg, png, webp, tif, tiff)"
        );
        assert!(supported_extensions().all(|ext| message.contains(ext)));
    }
}

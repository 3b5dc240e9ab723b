//! Experiment directory allocation
//!
//! Picks the directory for the current experiment under the experiments
//! root, creating it atomically with respect to sibling invocations in
//! this process.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::metadata::ARGS_FILE;
use crate::Result;

/// Outcome of directory allocation.
#[derive(Debug)]
pub struct Allocation {
    pub id: String,
    pub dir: PathBuf,
    /// True when the directory pre-existed with recorded artifacts; the
    /// caller must run the resume check instead of writing fresh ones.
    pub resumed: bool,
}

/// Materialize an experiment directory under `root`.
///
/// An explicit id is used verbatim, any string allowed. Otherwise the id
/// is one greater than the largest integer-named child of `root`;
/// children with non-integer names are ignored.
pub fn allocate(root: &Path, explicit_id: Option<&str>) -> Result<Allocation> {
    fs::create_dir_all(root)?;

    if let Some(id) = explicit_id {
        let dir = root.join(id);
        return match fs::create_dir(&dir) {
            Ok(()) => {
                debug!(id = %id, "created experiment directory");
                Ok(Allocation {
                    id: id.to_string(),
                    dir,
                    resumed: false,
                })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                // Resume when the directory holds a recorded experiment;
                // an empty leftover directory is reused as fresh.
                let resumed = dir.join(ARGS_FILE).exists();
                Ok(Allocation {
                    id: id.to_string(),
                    dir,
                    resumed,
                })
            }
            Err(e) => Err(e.into()),
        };
    }

    loop {
        let id = (max_integer_child(root)? + 1).to_string();
        let dir = root.join(&id);
        match fs::create_dir(&dir) {
            Ok(()) => {
                debug!(id = %id, "created experiment directory");
                return Ok(Allocation {
                    id,
                    dir,
                    resumed: false,
                });
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                // A sibling appeared between the scan and the create. An
                // empty directory is taken over; otherwise rescan, which
                // now sees the new sibling and picks a higher id.
                if !dir.join(ARGS_FILE).exists() && dir_is_empty(&dir)? {
                    return Ok(Allocation {
                        id,
                        dir,
                        resumed: false,
                    });
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}

fn max_integer_child(root: &Path) -> Result<u64> {
    let mut max = 0u64;
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Some(n) = entry
            .file_name()
            .to_str()
            .and_then(|name| name.parse::<u64>().ok())
        {
            max = max.max(n);
        }
    }
    Ok(max)
}

fn dir_is_empty(dir: &Path) -> Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_allocation_is_one() {
        let tmp = tempfile::tempdir().unwrap();
        let alloc = allocate(tmp.path(), None).unwrap();
        assert_eq!(alloc.id, "1");
        assert!(alloc.dir.is_dir());
        assert!(!alloc.resumed);
    }

    #[test]
    fn test_sequential_ids_increase() {
        let tmp = tempfile::tempdir().unwrap();
        let mut seen = Vec::new();
        for _ in 0..3 {
            let alloc = allocate(tmp.path(), None).unwrap();
            // Simulate a recorded experiment so the slot is not reused.
            std::fs::write(alloc.dir.join(ARGS_FILE), "{}").unwrap();
            seen.push(alloc.id.parse::<u64>().unwrap());
        }
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_non_integer_children_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("a")).unwrap();
        fs::create_dir(tmp.path().join("notes")).unwrap();
        fs::create_dir(tmp.path().join("7")).unwrap();
        std::fs::write(tmp.path().join("7").join(ARGS_FILE), "{}").unwrap();

        let alloc = allocate(tmp.path(), None).unwrap();
        assert_eq!(alloc.id, "8");
    }

    #[test]
    fn test_explicit_id_verbatim() {
        let tmp = tempfile::tempdir().unwrap();
        let alloc = allocate(tmp.path(), Some("a")).unwrap();
        assert_eq!(alloc.id, "a");
        assert!(tmp.path().join("a").is_dir());
        assert!(!alloc.resumed);

        // Auto-allocation is undisturbed by non-integer siblings.
        let auto = allocate(tmp.path(), None).unwrap();
        assert_eq!(auto.id, "1");
    }

    #[test]
    fn test_explicit_id_with_artifacts_resumes() {
        let tmp = tempfile::tempdir().unwrap();
        let first = allocate(tmp.path(), Some("2")).unwrap();
        std::fs::write(first.dir.join(ARGS_FILE), "{}").unwrap();

        let again = allocate(tmp.path(), Some("2")).unwrap();
        assert!(again.resumed);
        assert_eq!(again.dir, first.dir);
    }

    #[test]
    fn test_explicit_id_empty_directory_is_fresh() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("5")).unwrap();

        let alloc = allocate(tmp.path(), Some("5")).unwrap();
        assert!(!alloc.resumed);
    }

    #[test]
    fn test_auto_allocation_skips_existing_integer_children() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("1")).unwrap();

        let alloc = allocate(tmp.path(), None).unwrap();
        assert_eq!(alloc.id, "2");
    }

    #[test]
    fn test_root_created_recursively() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("deep").join("experiments");
        let alloc = allocate(&root, None).unwrap();
        assert_eq!(alloc.id, "1");
        assert!(root.join("1").is_dir());
    }
}

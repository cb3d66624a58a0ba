//! Cleaning up the directory used for intermediate build files.
use std::fs::{read_dir, remove_dir, remove_dir_all, remove_file};
use std::io;
use std::path::{Path, PathBuf};

/// An entry of the intermediate directory that couldn't be removed.
#[derive(Debug)]
pub struct Failure {
    pub path: PathBuf,
    pub error: io::Error,
}

/// The result of clearing a directory.
#[derive(Debug, Default)]
pub struct Cleanup {
    /// The number of entries removed.
    pub removed: usize,

    /// The entries (including the directory itself) that couldn't be removed.
    pub failures: Vec<Failure>,
}

impl Cleanup {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, path: PathBuf, result: io::Result<()>) {
        match result {
            Ok(_) => self.removed += 1,
            Err(error) => {
                log::warn!("failed to remove {}: {}", path.display(), error);
                self.failures.push(Failure { path, error });
            }
        }
    }
}

fn remove_entry(path: &Path) -> io::Result<()> {
    // symlink_metadata() is used so we remove symbolic links to directories
    // instead of the contents of the directories they point to.
    if path.symlink_metadata()?.is_dir() {
        remove_dir_all(path)
    } else {
        remove_file(path)
    }
}

/// Removes every entry in `directory`, followed by the directory itself.
///
/// Entries are removed one by one, and a failure to remove one entry doesn't
/// prevent the removal of the others. If the directory doesn't exist, an empty
/// `Cleanup` is returned.
pub fn clear_directory(directory: &Path) -> Cleanup {
    let mut cleanup = Cleanup::default();

    if !directory.is_dir() {
        return cleanup;
    }

    match read_dir(directory) {
        Ok(entries) => {
            for entry in entries {
                match entry {
                    Ok(entry) => {
                        let path = entry.path();
                        let res = remove_entry(&path);

                        cleanup.record(path, res);
                    }
                    Err(err) => {
                        cleanup.record(directory.to_path_buf(), Err(err));
                    }
                }
            }
        }
        Err(err) => {
            cleanup.record(directory.to_path_buf(), Err(err));
            return cleanup;
        }
    }

    // The directory itself doesn't count as a removed entry.
    if let Err(error) = remove_dir(directory) {
        cleanup.record(directory.to_path_buf(), Err(error));
    }

    log::debug!(
        "cleared {}: {} removed, {} failed",
        directory.display(),
        cleanup.removed,
        cleanup.failures.len()
    );

    cleanup
}

//! Unpacking documentation artifacts into a working tree.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

const GIT_DIR: &str = ".git";

/// Errors raised while preparing the working tree.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The archive is missing or not a valid zip file.
    #[error("cannot read archive {path}: {message}")]
    Corrupt {
        /// Archive path.
        path: Utf8PathBuf,
        /// Underlying failure.
        message: String,
    },

    /// A file could not be written to or removed from the working tree.
    #[error("cannot update {path}: {source}")]
    Io {
        /// Path relative to the working tree root.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
}

impl ArchiveError {
    fn io(path: impl Into<Utf8PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    fn corrupt(path: &Utf8Path) -> impl FnOnce(ZipError) -> Self + '_ {
        move |error| Self::Corrupt {
            path: path.to_owned(),
            message: error.to_string(),
        }
    }
}

/// What [`unpack`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnpackReport {
    /// Number of files written.
    pub files: usize,
    /// Raw names of entries that were refused.
    pub skipped: Vec<String>,
}

/// Removes everything under `root` except the `.git` directory.
///
/// # Errors
///
/// Returns [`ArchiveError::Io`] when an entry cannot be removed.
pub fn clear_worktree(root: &Utf8Path) -> Result<usize, ArchiveError> {
    let dir = Dir::open_ambient_dir(root, ambient_authority()).map_err(ArchiveError::io(root))?;
    let mut removed = 0;
    for listed in dir.entries().map_err(ArchiveError::io(root))? {
        let entry = listed.map_err(ArchiveError::io(root))?;
        let name = entry.file_name().map_err(ArchiveError::io(root))?;
        if name == GIT_DIR {
            continue;
        }
        let is_dir = entry
            .file_type()
            .map_err(ArchiveError::io(name.as_str()))?
            .is_dir();
        let outcome = if is_dir {
            dir.remove_dir_all(&name)
        } else {
            dir.remove_file(&name)
        };
        outcome.map_err(ArchiveError::io(name.as_str()))?;
        removed += 1;
    }
    Ok(removed)
}

/// Extracts every file of the zip at `archive` below `root`, overwriting
/// existing files.
///
/// Entries whose names would land outside `root` or inside `.git` are
/// skipped and reported.
///
/// # Errors
///
/// Returns [`ArchiveError::Corrupt`] for unreadable archives and
/// [`ArchiveError::Io`] when a file cannot be written.
pub fn unpack(archive: &Utf8Path, root: &Utf8Path) -> Result<UnpackReport, ArchiveError> {
    let file = std::fs::File::open(archive).map_err(|error| ArchiveError::Corrupt {
        path: archive.to_owned(),
        message: error.to_string(),
    })?;
    let mut zip = ZipArchive::new(file).map_err(ArchiveError::corrupt(archive))?;
    let dir = Dir::open_ambient_dir(root, ambient_authority()).map_err(ArchiveError::io(root))?;

    let mut report = UnpackReport::default();
    for index in 0..zip.len() {
        let mut entry = zip.by_index(index).map_err(ArchiveError::corrupt(archive))?;
        let Some(path) = entry
            .enclosed_name()
            .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
            .filter(|path| !is_git_path(path))
        else {
            tracing::warn!("skipping archive entry {:?}", entry.name());
            report.skipped.push(entry.name().to_owned());
            continue;
        };

        if entry.is_dir() {
            dir.create_dir_all(&path).map_err(ArchiveError::io(&path))?;
            continue;
        }
        if let Some(parent) = path.parent()
            && !parent.as_str().is_empty()
        {
            dir.create_dir_all(parent).map_err(ArchiveError::io(parent))?;
        }
        let mut output = dir.create(&path).map_err(ArchiveError::io(&path))?;
        io::copy(&mut entry, &mut output).map_err(ArchiveError::io(&path))?;
        report.files += 1;
    }
    Ok(report)
}

fn is_git_path(path: &Utf8Path) -> bool {
    path.components()
        .next()
        .is_some_and(|first| first.as_str() == GIT_DIR)
}

#[cfg(test)]
#[expect(
    clippy::panic_in_result_fn,
    reason = "Test assertions are expected to panic on failure"
)]
mod tests {
    use std::io::Write;

    use camino::{Utf8Path, Utf8PathBuf};
    use rstest::{fixture, rstest};
    use tempfile::TempDir;
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    use super::{ArchiveError, UnpackReport, clear_worktree, unpack};

    type TestError = Box<dyn std::error::Error>;

    struct Workspace {
        _dir: TempDir,
        root: Utf8PathBuf,
    }

    impl Workspace {
        fn archive(&self, entries: &[(&str, &str)]) -> Result<Utf8PathBuf, TestError> {
            let path = self.root.join("artifact.zip");
            let mut writer = ZipWriter::new(std::fs::File::create(&path)?);
            for (name, contents) in entries {
                writer.start_file(*name, SimpleFileOptions::default())?;
                writer.write_all(contents.as_bytes())?;
            }
            writer.finish()?;
            Ok(path)
        }

        fn tree(&self) -> Result<Utf8PathBuf, TestError> {
            let tree = self.root.join("tree");
            std::fs::create_dir_all(&tree)?;
            Ok(tree)
        }
    }

    #[fixture]
    fn workspace() -> Workspace {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::try_from(dir.path().to_path_buf()).expect("utf-8 temp dir");
        Workspace { _dir: dir, root }
    }

    fn read(root: &Utf8Path, path: &str) -> String {
        std::fs::read_to_string(root.join(path)).expect("file should exist")
    }

    #[rstest]
    fn writes_nested_files_and_overwrites(workspace: Workspace) -> Result<(), TestError> {
        let tree = workspace.tree()?;
        std::fs::write(tree.join("index.html"), "old")?;
        let archive =
            workspace.archive(&[("index.html", "new"), ("options/index.html", "opts")])?;

        let report = unpack(&archive, &tree)?;

        assert_eq!(report, UnpackReport { files: 2, skipped: vec![] });
        assert_eq!(read(&tree, "index.html"), "new");
        assert_eq!(read(&tree, "options/index.html"), "opts");
        Ok(())
    }

    #[rstest]
    fn refuses_escaping_and_git_entries(workspace: Workspace) -> Result<(), TestError> {
        let tree = workspace.tree()?;
        let archive = workspace.archive(&[
            ("../outside.txt", "x"),
            (".git/config", "x"),
            ("ok.txt", "fine"),
        ])?;

        let report = unpack(&archive, &tree)?;

        assert_eq!(report.files, 1);
        assert_eq!(report.skipped, vec!["../outside.txt", ".git/config"]);
        assert!(!workspace.root.join("outside.txt").exists());
        assert!(!tree.join(".git").exists());
        Ok(())
    }

    #[rstest]
    fn rejects_non_zip_input(workspace: Workspace) -> Result<(), TestError> {
        let tree = workspace.tree()?;
        let bogus = workspace.root.join("bogus.zip");
        std::fs::write(&bogus, "not a zip")?;

        let result = unpack(&bogus, &tree);

        assert!(matches!(result, Err(ArchiveError::Corrupt { .. })));
        Ok(())
    }

    #[rstest]
    fn clearing_keeps_only_git_dir(workspace: Workspace) -> Result<(), TestError> {
        let tree = workspace.tree()?;
        std::fs::create_dir_all(tree.join(".git/refs"))?;
        std::fs::create_dir_all(tree.join("stale/deeper"))?;
        std::fs::write(tree.join("stale/deeper/page.html"), "old")?;
        std::fs::write(tree.join("index.html"), "old")?;

        let removed = clear_worktree(&tree)?;

        assert_eq!(removed, 2);
        assert!(tree.join(".git/refs").is_dir());
        assert!(!tree.join("stale").exists());
        assert!(!tree.join("index.html").exists());
        Ok(())
    }
}

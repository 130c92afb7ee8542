use crate::{Error, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Regular files directly inside `dir`, sorted by name.
///
/// Hidden files are skipped; with a `prefix`, only names starting with it
/// are returned. Entries that cannot be resolved (dangling symlinks,
/// permission errors) are logged and left out.
pub fn discover_files(dir: &Path, prefix: Option<&str>) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::InvalidInput(format!(
            "input directory not found: {}",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) if e.depth() == 0 => {
                return Err(Error::InvalidInput(format!(
                    "cannot list {}: {}",
                    dir.display(),
                    e
                )));
            }
            Err(e) => {
                let path = e.path().map(|p| p.display().to_string()).unwrap_or_default();
                log::warn!("skipping unreadable entry {}: {}", path, e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') {
            continue;
        }
        if let Some(prefix) = prefix
            && !name.starts_with(prefix)
        {
            continue;
        }
        files.push(entry.into_path());
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_sorted_flat_listing() -> Result<()> {
        let dir = TempDir::new()?;
        for name in ["geth-b.log", "geth-a.log.gz", ".hidden", "other.log"] {
            std::fs::write(dir.path().join(name), "")?;
        }
        std::fs::create_dir(dir.path().join("geth-nested"))?;
        std::fs::write(dir.path().join("geth-nested").join("geth-c.log"), "")?;

        assert_eq!(
            names(&discover_files(dir.path(), None)?),
            vec!["geth-a.log.gz", "geth-b.log", "other.log"]
        );
        assert_eq!(
            names(&discover_files(dir.path(), Some("geth"))?),
            vec!["geth-a.log.gz", "geth-b.log"]
        );
        Ok(())
    }

    #[test]
    fn test_missing_directory() {
        let err = discover_files(Path::new("/nonexistent/poolscope-input"), None).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_skipped() -> Result<()> {
        let dir = TempDir::new()?;
        std::fs::write(dir.path().join("geth-a.log"), "")?;
        std::os::unix::fs::symlink(
            dir.path().join("gone.log"),
            dir.path().join("geth-b.log"),
        )?;
        std::fs::write(dir.path().join("geth-c.log"), "")?;

        assert_eq!(
            names(&discover_files(dir.path(), None)?),
            vec!["geth-a.log", "geth-c.log"]
        );
        Ok(())
    }
}

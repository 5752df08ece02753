use std::fs;
use std::io;
use std::path::{Path, PathBuf};


/// Resolves a possibly relative path against a base directory.
///
/// # Arguments
///
/// * `path` - Path as given by the user.
/// * `cwd` - Directory relative paths are anchored to.
///
/// # Returns
/// Absolute-or-anchored PathBuf.
pub fn resolve_path(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}


/// Creates a directory and its parents, returning it.
pub fn ensure_dir(dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    Ok(dir.to_path_buf())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        let cwd = Path::new("/work");
        assert_eq!(resolve_path(Path::new("reads/a.fq.gz"), cwd), PathBuf::from("/work/reads/a.fq.gz"));
        assert_eq!(resolve_path(Path::new("/abs/meta.tsv"), cwd), PathBuf::from("/abs/meta.tsv"));
    }

    #[test]
    fn test_ensure_dir_creates_parents() -> std::io::Result<()> {
        let tmp = tempfile::tempdir()?;
        let nested = tmp.path().join("a/b/c");
        assert_eq!(ensure_dir(&nested)?, nested);
        assert!(nested.is_dir());
        Ok(())
    }
}

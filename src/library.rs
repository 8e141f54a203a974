// Collection module
// Copies loaded GIFs into the user's save directory

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Copy `source` into the collection under the chosen name, creating the
/// directory on demand and enforcing a `.gif` suffix. Returns the destination
/// path.
pub fn save_to_collection(save_dir: &Path, source: &Path, name: &str) -> Result<PathBuf> {
    let name = name.trim();
    if name.is_empty() {
        bail!("empty file name");
    }
    if !source.exists() {
        bail!("source no longer exists: {}", source.display());
    }

    fs::create_dir_all(save_dir)
        .with_context(|| format!("failed to create save directory {}", save_dir.display()))?;

    let file_name = if name.ends_with(".gif") {
        name.to_string()
    } else {
        format!("{}.gif", name)
    };

    let dest = save_dir.join(file_name);
    fs::copy(source, &dest)
        .with_context(|| format!("failed to copy {} to {}", source.display(), dest.display()))?;

    Ok(dest)
}

/// Whether the collection directory exists at all. Used to decide between the
/// picker and the "no saved GIFs yet" notice.
pub fn collection_exists(save_dir: &Path) -> bool {
    save_dir.is_dir()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_bytes_and_appends_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.gif");
        fs::write(&source, b"GIF89a-payload").unwrap();
        let save_dir = dir.path().join("collection");

        let dest = save_to_collection(&save_dir, &source, "party").unwrap();

        assert_eq!(dest, save_dir.join("party.gif"));
        assert_eq!(fs::read(&dest).unwrap(), b"GIF89a-payload");
    }

    #[test]
    fn keeps_existing_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.gif");
        fs::write(&source, b"x").unwrap();

        let dest = save_to_collection(dir.path(), &source, "already.gif").unwrap();
        assert_eq!(dest.file_name().unwrap(), "already.gif");
    }

    #[test]
    fn creates_save_dir_on_demand() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.gif");
        fs::write(&source, b"x").unwrap();
        let save_dir = dir.path().join("deep").join("collection");
        assert!(!collection_exists(&save_dir));

        save_to_collection(&save_dir, &source, "a").unwrap();
        assert!(collection_exists(&save_dir));
    }

    #[test]
    fn missing_source_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("vanished.gif");

        assert!(save_to_collection(dir.path(), &source, "a").is_err());
    }

    #[test]
    fn empty_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src.gif");
        fs::write(&source, b"x").unwrap();

        assert!(save_to_collection(dir.path(), &source, "   ").is_err());
    }
}

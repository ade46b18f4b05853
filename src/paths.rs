//! Path utilities for the shared artifact file.

use std::path::{Path, PathBuf};

/// Default artifact filename, relative to the working directory.
pub const ARTIFACT_FILENAME: &str = "code.txt";

/// Get the default artifact path.
pub fn default_artifact_path() -> PathBuf {
    PathBuf::from(ARTIFACT_FILENAME)
}

/// Expands a leading `~` in a path to the user's home directory.
///
/// This handles the common case where shell tilde expansion doesn't occur,
/// such as when using `--artifact=~/out.txt` instead of `--artifact ~/out.txt`.
pub fn expand_tilde<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    if let Ok(stripped) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    path.to_path_buf()
}

//! Data directory resolution

use std::io;
use std::path::{Path, PathBuf};

use crate::{GatewayError, Result};

/// Resolves and creates the data directory of a client.
///
/// The directory is `<root>/<name>`, where `root` defaults to the user cache
/// directory. Existing directories and their content are reused. New
/// directories are created owner-only on unix.
///
/// # Errors
///
/// - `GatewayError::Validation` - If `name` is empty or not a single path component
/// - `GatewayError::Storage` - If no cache directory exists or creation failed
pub fn resolve_data_dir(name: &str, root: Option<&Path>) -> Result<PathBuf> {
    validate_name(name)?;

    let root = match root {
        Some(root) => root.to_path_buf(),
        None => dirs::cache_dir().ok_or_else(|| GatewayError::Storage {
            path: PathBuf::from(name),
            source: io::Error::new(io::ErrorKind::NotFound, "no user cache directory"),
        })?,
    };

    let data_dir = root.join(name);
    create_private_dir(&data_dir).map_err(|source| GatewayError::Storage {
        path: data_dir.clone(),
        source,
    })?;
    tracing::debug!("Using data directory {}", data_dir.display());
    Ok(data_dir)
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.trim().is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.chars().any(char::is_control);
    if valid {
        Ok(())
    } else {
        Err(GatewayError::Validation {
            reason: format!("Invalid client name {name:?}"),
        })
    }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> io::Result<()> {
    std::fs::create_dir_all(path)
}

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

/// Find the server executable. A bare name such as `divvyd` is looked up on the `PATH`, anything
/// with a directory part must exist as given.
pub fn resolve_server_path(server_path: &str) -> anyhow::Result<PathBuf> {
    if server_path.is_empty() {
        bail!("The divvyd path is empty");
    }

    let path = Path::new(server_path);
    if path.components().count() == 1 && !path.exists() {
        return which::which(server_path)
            .with_context(|| format!("Could not find '{server_path}' on the PATH"));
    }

    if !path.exists() {
        bail!("No divvyd executable at '{}'", path.display());
    }
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_path_is_rejected() {
        assert!(resolve_server_path("").is_err());
    }

    #[test]
    fn missing_file_is_rejected() {
        let err = resolve_server_path("build/not-a-divvyd").unwrap_err();
        assert!(err.to_string().contains("build/not-a-divvyd"), "{err}");
    }

    #[test]
    fn existing_file_is_used_as_given() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("divvyd");
        std::fs::write(&path, "").unwrap();

        let resolved = resolve_server_path(path.to_str().unwrap()).unwrap();
        assert_eq!(resolved, path);
    }

    #[cfg(unix)]
    #[test]
    fn bare_name_is_found_on_path() {
        assert_eq!(resolve_server_path("sh").unwrap(), which::which("sh").unwrap());
    }

    #[test]
    fn bare_name_not_on_path_is_rejected() {
        let err = resolve_server_path("no-such-divvyd-anywhere").unwrap_err();
        assert!(err.to_string().contains("PATH"), "{err}");
    }
}

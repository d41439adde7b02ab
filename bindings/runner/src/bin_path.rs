use anyhow::bail;
use anyhow::Context;
use harness_runner::prelude::HarnessResult;
use std::env;
use std::path::PathBuf;

/// Environment variable to override the path to the divvyd binary used to run servers.
pub const DIVVYD_PATH_ENV: &str = "DIVVYD_PATH";

/// Get the path to the divvyd binary.
///
/// If [`DIVVYD_PATH_ENV`] is set to a path, that path is used. A bare `divvyd`, or no value at all,
/// means the binary is looked up in the user's `PATH`.
pub(crate) fn divvyd_path() -> HarnessResult<PathBuf> {
    match env::var(DIVVYD_PATH_ENV).ok().as_deref() {
        Some("") => {
            bail!("'{DIVVYD_PATH_ENV}' set to empty string");
        }
        Some("divvyd") | None => {
            log::warn!("'{DIVVYD_PATH_ENV}' is not a path so looking in user's 'PATH'");
            which::which("divvyd").with_context(|| {
                format!(
                    "divvyd binary not found in PATH. Please install divvyd or set '{DIVVYD_PATH_ENV}' to the correct path."
                )
            })
        }
        Some(path) => {
            let divvyd_path = PathBuf::from(path);
            if !divvyd_path.exists() {
                bail!(
                    "Path to divvyd binary overwritten with '{DIVVYD_PATH_ENV}={path}' but that path doesn't exist",
                    path = divvyd_path.display()
                );
            }
            Ok(divvyd_path)
        }
    }
}

use indicatif::{ProgressBar, ProgressStyle};

/// Shows how many runs of the pass have finished.
pub(crate) fn start_progress(run_count: u64) -> ProgressBar {
    let pb = ProgressBar::new(run_count);
    match ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
    ) {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => log::warn!("Failed to set progress style: {e}"),
    }
    pb
}

use indicatif::{ProgressBar, ProgressStyle};

/// Shows how many scenarios of the suite have finished.
pub(crate) fn start_progress(suite_name: &str, scenario_count: usize) -> ProgressBar {
    let pb = ProgressBar::new(scenario_count as u64);
    match ProgressStyle::with_template(
        "{spinner:.green} {prefix} [{wide_bar:.cyan/blue}] {pos}/{len} {msg}",
    ) {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => log::warn!("Failed to set progress style: {e}"),
    }
    pb.set_prefix(suite_name.to_string());
    pb
}

use indicatif::{ProgressBar, ProgressStyle};

/// One tick per (engine, case) pair. Hidden when progress is disabled so the
/// call sites need no branching.
pub(crate) fn start_progress(total: u64, no_progress: bool) -> ProgressBar {
    if no_progress {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template("[{wide_bar}] {pos}/{len} case runs ({elapsed})")
            .expect("Failed to set progress style")
            .progress_chars("#>-"),
    );
    bar
}

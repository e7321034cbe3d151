//! Progress reporting for long-running sweeps.

/// Observer for periodic progress callbacks from the metric engine.
///
/// Purely informational: the engine works identically with or without one,
/// and callbacks are only ever issued from the thread driving the sweep.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, stage: &str, processed: usize, total: usize);
}

/// SCCs between consecutive callbacks.
pub(crate) const REPORT_INTERVAL: usize = 1000;

/// Emits a callback at the reporting interval and at completion.
pub(crate) fn report(
    observer: Option<&dyn ProgressObserver>,
    stage: &str,
    processed: usize,
    total: usize,
) {
    if let Some(obs) = observer {
        if processed == total || processed % REPORT_INTERVAL == 0 {
            obs.on_progress(stage, processed, total);
        }
    }
}

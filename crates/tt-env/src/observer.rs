//! Environment observer trait for progress reporting and metrics.

use tt_rollout::RolloutReport;

/// Callbacks invoked by [`TrackingEnv`][crate::TrackingEnv] at key points of
/// the tracking loop.
///
/// All methods have default no-op implementations so implementors only need to
/// override what they care about.
///
/// # Example: recovery counter
///
/// ```rust,ignore
/// #[derive(Default)]
/// struct Recovered(usize);
///
/// impl EnvObserver for Recovered {
///     fn on_rollout(&mut self, _step: u64, report: &RolloutReport) {
///         self.0 += report.recovered.len();
///     }
/// }
/// ```
pub trait EnvObserver {
    /// Called at the end of every successful `step`.
    ///
    /// `stepped` is the size of the active set going into the step,
    /// `stopped` how many of those finished during it.
    fn on_step_end(&mut self, _step: u64, _stepped: usize, _stopped: usize) {}

    /// Called after a recovery pass, before stopped streamlines are finished.
    fn on_rollout(&mut self, _step: u64, _report: &RolloutReport) {}

    /// Called after `harvest` installed the new active set.
    fn on_harvest(&mut self, _step: u64, _active: usize, _finished: usize) {}
}

/// An [`EnvObserver`] that does nothing.
pub struct NoopObserver;

impl EnvObserver for NoopObserver {}

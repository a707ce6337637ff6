//! Progress notification port
//!
//! Defines the interface for reporting progress while a consensus job runs.

use consensus_domain::{JobId, Phase, ProviderId};

/// Callback for progress updates during pipeline execution
///
/// Implementations live in outer layers and can surface progress in
/// various ways (logs, metrics, push channels).
pub trait ProgressNotifier: Send + Sync {
    /// Called when a phase starts
    fn on_phase_start(&self, job_id: JobId, phase: Phase, total_tasks: usize);

    /// Called when one provider call within a phase settles
    fn on_task_complete(&self, job_id: JobId, phase: Phase, provider: &ProviderId, success: bool);

    /// Called when a phase completes
    fn on_phase_complete(&self, job_id: JobId, phase: Phase);
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl ProgressNotifier for NoProgress {
    fn on_phase_start(&self, _job_id: JobId, _phase: Phase, _total_tasks: usize) {}
    fn on_task_complete(&self, _job_id: JobId, _phase: Phase, _provider: &ProviderId, _success: bool) {}
    fn on_phase_complete(&self, _job_id: JobId, _phase: Phase) {}
}

/// Position inside a phase's progress band after `done` of `total` tasks
pub fn progress_within(phase: Phase, done: usize, total: usize) -> u8 {
    let (start, end) = phase.progress_band();
    if total == 0 {
        return start;
    }
    let span = (end - start) as usize;
    let offset = span * done.min(total) / total;
    // the band's upper edge belongs to the next phase
    (start as usize + offset).min(end as usize - 1) as u8
}

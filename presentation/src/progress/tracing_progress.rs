//! Progress reporter that writes phase and call events to the log.

use consensus_application::ProgressNotifier;
use consensus_domain::{JobId, Phase, ProviderId};
use tracing::{debug, info, warn};

/// Server-side counterpart of a terminal progress bar
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressNotifier for TracingProgress {
    fn on_phase_start(&self, job_id: JobId, phase: Phase, total_tasks: usize) {
        info!(
            job_id = %job_id,
            phase = phase.as_str(),
            tasks = total_tasks,
            "Phase {}: {} started",
            phase.number(),
            phase.display_name()
        );
    }

    fn on_task_complete(&self, job_id: JobId, phase: Phase, provider: &ProviderId, success: bool) {
        if success {
            debug!(job_id = %job_id, phase = phase.as_str(), provider = %provider, "Call succeeded");
        } else {
            warn!(job_id = %job_id, phase = phase.as_str(), provider = %provider, "Call failed");
        }
    }

    fn on_phase_complete(&self, job_id: JobId, phase: Phase) {
        info!(job_id = %job_id, phase = phase.as_str(), "Phase {} complete", phase.number());
    }
}

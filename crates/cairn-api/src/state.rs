//! Shared handler state.

use std::sync::Arc;

use cairn_core::FileWorkflow;
use cairn_telemetry::Metrics;

pub(crate) struct ApiState {
    pub(crate) workflow: Arc<dyn FileWorkflow>,
    pub(crate) telemetry: Metrics,
}

impl ApiState {
    pub(crate) fn new(workflow: Arc<dyn FileWorkflow>, telemetry: Metrics) -> Self {
        Self {
            workflow,
            telemetry,
        }
    }
}

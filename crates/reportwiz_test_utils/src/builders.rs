//! Test report builders.

use async_trait::async_trait;
use reportwiz_protocol::{BuildReportRequest, BuildReportResponse, ReportBuildError, ReportBuilder};
use std::sync::{Mutex, PoisonError};

/// Records every request and answers with a fixed outcome.
pub struct RecordingReportBuilder {
    outcome: Result<BuildReportResponse, ReportBuildError>,
    requests: Mutex<Vec<BuildReportRequest>>,
}

impl RecordingReportBuilder {
    /// Builder that accepts every request.
    pub fn accepting(report_data_id: i64) -> Self {
        Self::with_outcome(Ok(BuildReportResponse {
            report_data_id,
            reporting_type: "reporting".to_string(),
            report_type: "custom".to_string(),
            data_type: "records".to_string(),
        }))
    }

    /// Builder that rejects every request with `message`.
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self::with_outcome(Err(ReportBuildError::Rejected(message.into())))
    }

    pub fn with_outcome(outcome: Result<BuildReportResponse, ReportBuildError>) -> Self {
        Self {
            outcome,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<BuildReportRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ReportBuilder for RecordingReportBuilder {
    async fn build_report_configuration(
        &self,
        request: BuildReportRequest,
    ) -> Result<BuildReportResponse, ReportBuildError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);
        self.outcome.clone()
    }
}

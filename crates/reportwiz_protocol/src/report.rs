//! Report-building API consumed at submission time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::defaults::DEFAULT_REPORT_INTENTION;
use crate::error::ReportBuildError;
use crate::types::{ReportConfiguration, SessionId};

/// Request handed to the report backend once the wizard is submitted.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReportRequest {
    pub session_id: SessionId,
    pub intention: String,
    /// Report category (e.g. `contacts`, `partners`, `communication-records`)
    pub category: String,
    pub data_set: String,
    pub report_name: Option<String>,
    pub filters: ReportConfiguration,
    pub requested_at: DateTime<Utc>,
}

impl BuildReportRequest {
    pub fn new(
        session_id: SessionId,
        target: &ReportTarget,
        filters: ReportConfiguration,
    ) -> Self {
        Self {
            session_id,
            intention: target.intention.clone(),
            category: target.category.clone(),
            data_set: target.data_set.clone(),
            report_name: target.report_name.clone(),
            filters,
            requested_at: Utc::now(),
        }
    }
}

/// What report the wizard is configuring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTarget {
    #[serde(default = "default_intention")]
    pub intention: String,
    pub category: String,
    pub data_set: String,
    #[serde(default)]
    pub report_name: Option<String>,
}

impl ReportTarget {
    pub fn new(category: impl Into<String>, data_set: impl Into<String>) -> Self {
        Self {
            intention: default_intention(),
            category: category.into(),
            data_set: data_set.into(),
            report_name: None,
        }
    }

    pub fn with_report_name(mut self, name: impl Into<String>) -> Self {
        self.report_name = Some(name.into());
        self
    }
}

fn default_intention() -> String {
    DEFAULT_REPORT_INTENTION.to_string()
}

/// Backend answer describing the report it prepared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReportResponse {
    pub report_data_id: i64,
    pub reporting_type: String,
    pub report_type: String,
    pub data_type: String,
}

/// Report-building backend.
#[async_trait]
pub trait ReportBuilder: Send + Sync {
    async fn build_report_configuration(
        &self,
        request: BuildReportRequest,
    ) -> Result<BuildReportResponse, ReportBuildError>;
}

#[async_trait]
impl<T: ReportBuilder + ?Sized> ReportBuilder for Arc<T> {
    async fn build_report_configuration(
        &self,
        request: BuildReportRequest,
    ) -> Result<BuildReportResponse, ReportBuildError> {
        (**self).build_report_configuration(request).await
    }
}

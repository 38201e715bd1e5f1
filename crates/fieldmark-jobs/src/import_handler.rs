//! Job handler binding the import coordinator to the queue.
//!
//! The upload layer enqueues a `project_import` job when an upload
//! completes, an explicit message-passing trigger. The payload names the
//! stored file and its owner; model instances never ride in job payloads.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use fieldmark_core::{Error, JobType};

use crate::handler::{JobContext, JobHandler, JobResult};
use crate::import::ProjectImporter;

/// Payload of a `project_import` job.
#[derive(Debug, Deserialize)]
struct ImportPayload {
    /// Storage reference of the uploaded project file.
    source_ref: String,
    /// Id of the uploading user.
    owner_id: i64,
}

/// Handler for [`JobType::ProjectImport`] jobs.
pub struct ProjectImportHandler {
    importer: ProjectImporter,
}

impl ProjectImportHandler {
    /// Create a new handler around the given importer.
    pub fn new(importer: ProjectImporter) -> Self {
        Self { importer }
    }
}

#[async_trait]
impl JobHandler for ProjectImportHandler {
    fn job_type(&self) -> JobType {
        JobType::ProjectImport
    }

    async fn execute(&self, ctx: JobContext) -> JobResult {
        let payload: ImportPayload = match ctx.payload() {
            Some(value) => match serde_json::from_value(value.clone()) {
                Ok(payload) => payload,
                Err(e) => return JobResult::Failed(format!("Invalid import payload: {}", e)),
            },
            None => return JobResult::Failed("Import job has no payload".to_string()),
        };

        ctx.report_progress(0, Some("Fetching source file"));
        match self
            .importer
            .import_project(&payload.source_ref, payload.owner_id)
            .await
        {
            Ok(summary) => {
                ctx.report_progress(100, Some("Import finished"));
                match serde_json::to_value(&summary) {
                    Ok(result) => JobResult::Success(Some(result)),
                    Err(e) => {
                        warn!(error = %e, "Run summary did not serialize");
                        JobResult::Success(None)
                    }
                }
            }
            // A storage outage is worth another attempt; a file that is not
            // a project database will never become one.
            Err(e @ Error::SourceUnavailable(_)) => JobResult::Retry(e.to_string()),
            Err(e) => JobResult::Failed(e.to_string()),
        }
    }
}

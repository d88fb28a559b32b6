//! Job definition and state management.

use chrono::{DateTime, Utc};
use landlord_tenancy::{TenantId, TenantRef};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Job unique identifier.
pub type JobId = Uuid;

/// Job data payload.
pub type JobData = serde_json::Value;

/// Job state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Job is waiting to be processed
    Pending,
    /// Job is currently being processed
    Processing,
    /// Job completed successfully
    Completed,
    /// Job failed and will be retried
    Failed,
    /// Job failed permanently (max retries exceeded)
    Dead,
}

/// A job to be processed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier
    pub id: JobId,

    /// Job type/name
    pub job_type: String,

    /// Job payload data
    pub data: JobData,

    /// Queue name
    pub queue: String,

    /// Tenant that was current when the job was dispatched
    pub tenant: Option<TenantRef>,

    /// Job state
    pub state: JobState,

    /// Last error message
    pub error: Option<String>,

    /// Number of attempts
    pub attempts: u32,

    /// Maximum number of attempts
    pub max_attempts: u32,

    /// When the job was created
    pub created_at: DateTime<Utc>,

    /// When the job last started
    pub started_at: Option<DateTime<Utc>>,

    /// When the job completed or died
    pub completed_at: Option<DateTime<Utc>>,

    /// Job metadata
    pub metadata: HashMap<String, String>,
}

impl Job {
    /// Create a new job.
    pub fn new(queue: impl Into<String>, job_type: impl Into<String>, data: JobData) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type: job_type.into(),
            data,
            queue: queue.into(),
            tenant: None,
            state: JobState::Pending,
            error: None,
            attempts: 0,
            max_attempts: 3,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            metadata: HashMap::new(),
        }
    }

    /// Stamp a tenant on the job.
    pub fn with_tenant(mut self, tenant: TenantRef) -> Self {
        self.tenant = Some(tenant);
        self
    }

    /// Set max attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Add metadata.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Id of the stamped tenant.
    pub fn tenant_id(&self) -> Option<&TenantId> {
        self.tenant.as_ref().map(|t| &t.id)
    }

    /// Check if the job can be retried.
    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Mark job as processing.
    pub fn start_processing(&mut self) {
        self.state = JobState::Processing;
        self.started_at = Some(Utc::now());
        self.attempts += 1;
    }

    /// Mark job as completed.
    pub fn complete(&mut self) {
        self.state = JobState::Completed;
        self.error = None;
        self.completed_at = Some(Utc::now());
    }

    /// Mark job as dead without further retries.
    pub fn kill(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.state = JobState::Dead;
        self.completed_at = Some(Utc::now());
    }

    /// Mark job as failed.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        if self.can_retry() {
            self.state = JobState::Failed;
        } else {
            self.state = JobState::Dead;
            self.completed_at = Some(Utc::now());
        }
    }
}

//! Error types for tenant-aware jobs.

use landlord_tenancy::{TenantError, TenantId};
use thiserror::Error;

/// Result type for job operations.
pub type JobResult<T> = Result<T, JobError>;

/// Job errors.
#[derive(Debug, Error)]
pub enum JobError {
    /// The stamped tenant is gone from the directory
    #[error("Tenant {0} stamped on the job no longer exists")]
    TenantNotFound(TenantId),

    /// Switching the job's tenant failed
    #[error(transparent)]
    Tenancy(#[from] TenantError),

    /// No handler registered for job type
    #[error("No handler registered for job type: {0}")]
    NoHandler(String),

    /// Job execution failed
    #[error("Job execution failed: {0}")]
    ExecutionFailed(String),

    /// Handler panicked
    #[error("Job handler panicked: {0}")]
    Panicked(String),
}

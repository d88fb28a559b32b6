//! Tenant-aware jobs for Landlord
//!
//! A job dispatched while a tenant is current carries a reference to that
//! tenant. When a worker picks the job up later (possibly in another process)
//! the tenant is made current again before the handler runs and forgotten once
//! it finishes, whatever the outcome.
//!
//! Transport is left to the host: jobs are plain serde values that can travel
//! over any queue backend.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use landlord_queue::*;
//!
//! // While handling a request for acme
//! let dispatcher = TenantAwareDispatcher::for_tenancy(&tenancy);
//! let job = dispatcher.prepare(&ctx, Job::new("default", "send_invoice", payload));
//! backend.push(serde_json::to_vec(&job)?).await?;
//!
//! // In the worker process
//! let mut worker = TenantAwareWorker::new(tenancy);
//! worker.register_handler("send_invoice", |job, tenant, settings| async move {
//!     send_invoice(tenant, &settings, job.data).await
//! });
//!
//! let mut job: Job = serde_json::from_slice(&bytes)?;
//! worker.process(&mut job).await?;
//! ```

pub mod awareness;
pub mod dispatcher;
pub mod error;
pub mod job;
pub mod worker;

pub use awareness::TenantAwareness;
pub use dispatcher::TenantAwareDispatcher;
pub use error::{JobError, JobResult};
pub use job::{Job, JobData, JobId, JobState};
pub use worker::{JobHandler, TenantAwareWorker};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::awareness::TenantAwareness;
    pub use crate::dispatcher::TenantAwareDispatcher;
    pub use crate::error::{JobError, JobResult};
    pub use crate::job::{Job, JobState};
    pub use crate::worker::TenantAwareWorker;
}

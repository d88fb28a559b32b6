//! Worker executing jobs inside their tenant.

use crate::awareness::TenantAwareness;
use crate::error::{JobError, JobResult};
use crate::job::Job;
use futures::FutureExt;
use landlord_tenancy::{Settings, Tenancy, Tenant, TenantError};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Job handler function type.
///
/// Receives the job, the tenant that is current while it runs, and the
/// settings as rewritten for that tenant.
pub type JobHandler = Arc<
    dyn Fn(Job, Option<Tenant>, Settings) -> Pin<Box<dyn Future<Output = JobResult<()>> + Send>>
        + Send
        + Sync,
>;

/// Runs jobs with their stamped tenant current.
///
/// Every job gets a fresh context, so nothing a previous job did to the
/// tenant binding survives into the next one.
pub struct TenantAwareWorker {
    tenancy: Tenancy,
    awareness: TenantAwareness,
    handlers: HashMap<String, JobHandler>,
}

impl TenantAwareWorker {
    /// Create a worker using the runtime's queue configuration
    pub fn new(tenancy: Tenancy) -> Self {
        let awareness = TenantAwareness::from_config(&tenancy.config().queue);
        Self::with_awareness(tenancy, awareness)
    }

    /// Create a worker with explicit awareness rules
    pub fn with_awareness(tenancy: Tenancy, awareness: TenantAwareness) -> Self {
        Self {
            tenancy,
            awareness,
            handlers: HashMap::new(),
        }
    }

    /// Register a job handler.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let mut worker = TenantAwareWorker::new(tenancy);
    ///
    /// worker.register_handler("send_invoice", |job, tenant, settings| async move {
    ///     let tenant = tenant.ok_or_else(|| JobError::ExecutionFailed("no tenant".into()))?;
    ///     invoices::send(&tenant, &settings, job.data).await
    /// });
    /// ```
    pub fn register_handler<F, Fut>(&mut self, job_type: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(Job, Option<Tenant>, Settings) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = JobResult<()>> + Send + 'static,
    {
        let wrapped: JobHandler = Arc::new(
            move |job: Job,
                  tenant: Option<Tenant>,
                  settings: Settings|
                  -> Pin<Box<dyn Future<Output = JobResult<()>> + Send>> {
                Box::pin(handler(job, tenant, settings))
            },
        );

        self.handlers.insert(job_type.into(), wrapped);
        self
    }

    /// Whether a handler exists for a job type
    pub fn has_handler(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Process one job.
    ///
    /// The stamped tenant of a tenant-aware job is made current before the
    /// handler runs and forgotten afterwards, whether the handler succeeds,
    /// fails or panics. The job's state is updated in place; every call
    /// counts as an attempt, and a job whose tenant no longer exists is dead.
    pub async fn process(&self, job: &mut Job) -> JobResult<()> {
        let handler = self
            .handlers
            .get(&job.job_type)
            .cloned()
            .ok_or_else(|| JobError::NoHandler(job.job_type.clone()))?;

        let mut ctx = self.tenancy.context();
        job.start_processing();

        if self.awareness.is_tenant_aware(&job.job_type) {
            if let Some(reference) = job.tenant.clone() {
                match ctx.restore_from_ref(&reference).await {
                    Ok(()) => {}
                    Err(TenantError::InvalidTenant(id)) => {
                        warn!(job_id = %job.id, tenant_id = %id, "job tenant no longer exists");
                        job.kill(format!("tenant {} not found", id));
                        return Err(JobError::TenantNotFound(id));
                    }
                    Err(e) => {
                        job.fail(e.to_string());
                        return Err(e.into());
                    }
                }
            }
        } else if job.tenant.is_some() {
            debug!(job_id = %job.id, job_type = %job.job_type, "ignoring tenant on job that is not tenant aware");
        }

        info!(
            job_id = %job.id,
            job_type = %job.job_type,
            tenant_id = ?ctx.current().map(|t| &t.id),
            attempt = job.attempts,
            "processing job"
        );

        let tenant = ctx.current().cloned();
        let settings = ctx.settings().clone();
        let outcome = AssertUnwindSafe(handler(job.clone(), tenant, settings))
            .catch_unwind()
            .await;
        let forgotten = ctx.forget_current().await;

        let result = match outcome {
            Ok(result) => result,
            Err(panic) => Err(JobError::Panicked(panic_message(&*panic))),
        };

        match (result, forgotten) {
            (Ok(()), Ok(_)) => {
                job.complete();
                debug!(job_id = %job.id, "job completed");
                Ok(())
            }
            (Err(e), forgotten) => {
                if let Err(forget_err) = forgotten {
                    error!(job_id = %job.id, error = %forget_err, "failed to forget job tenant");
                }
                error!(job_id = %job.id, error = %e, "job failed");
                job.fail(e.to_string());
                Err(e)
            }
            (Ok(()), Err(e)) => {
                error!(job_id = %job.id, error = %e, "failed to forget job tenant");
                job.fail(e.to_string());
                Err(e.into())
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

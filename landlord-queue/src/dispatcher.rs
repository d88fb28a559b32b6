//! Stamping outgoing jobs with the current tenant.

use crate::awareness::TenantAwareness;
use crate::job::Job;
use landlord_tenancy::{Tenancy, TenantContext};
use tracing::debug;

/// Prepares jobs for the transport
#[derive(Debug, Clone, Default)]
pub struct TenantAwareDispatcher {
    awareness: TenantAwareness,
}

impl TenantAwareDispatcher {
    /// Create a dispatcher with these rules
    pub fn new(awareness: TenantAwareness) -> Self {
        Self { awareness }
    }

    /// Create a dispatcher from the runtime's queue configuration
    pub fn for_tenancy(tenancy: &Tenancy) -> Self {
        Self::new(TenantAwareness::from_config(&tenancy.config().queue))
    }

    /// Awareness rules
    pub fn awareness(&self) -> &TenantAwareness {
        &self.awareness
    }

    /// Stamp the context's current tenant onto a tenant-aware job.
    ///
    /// Jobs that are not tenant aware, or dispatched from an idle context,
    /// leave without a tenant.
    pub fn prepare(&self, ctx: &TenantContext, mut job: Job) -> Job {
        job.tenant = if self.awareness.is_tenant_aware(&job.job_type) {
            ctx.capture()
        } else {
            None
        };

        debug!(
            job_id = %job.id,
            job_type = %job.job_type,
            tenant_id = ?job.tenant_id(),
            "job prepared"
        );

        job
    }
}

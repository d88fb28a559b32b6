//! Which job types carry the current tenant.

use landlord_tenancy::QueueConfig;
use std::collections::HashSet;

/// Tenant awareness rules for job types
#[derive(Debug, Clone)]
pub struct TenantAwareness {
    by_default: bool,
    aware: HashSet<String>,
    not_aware: HashSet<String>,
}

impl TenantAwareness {
    /// Build the rules from queue configuration
    pub fn from_config(config: &QueueConfig) -> Self {
        Self {
            by_default: config.tenant_aware_by_default,
            aware: config.tenant_aware_jobs.iter().cloned().collect(),
            not_aware: config.not_tenant_aware_jobs.iter().cloned().collect(),
        }
    }

    /// Whether jobs of this type carry the tenant.
    ///
    /// An explicit opt-in wins over an opt-out; unlisted types follow the
    /// default.
    pub fn is_tenant_aware(&self, job_type: &str) -> bool {
        if self.aware.contains(job_type) {
            return true;
        }
        if self.not_aware.contains(job_type) {
            return false;
        }
        self.by_default
    }
}

impl Default for TenantAwareness {
    fn default() -> Self {
        Self::from_config(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for TenantAwareness {
    fn from(config: &QueueConfig) -> Self {
        Self::from_config(config)
    }
}

//! Cache key prefix per tenant

use crate::error::TaskError;
use crate::settings::Settings;
use crate::task::SwitchTenantTask;
use crate::tenant::Tenant;
use async_trait::async_trait;

const CACHE_PREFIX: &str = "cache.prefix";

/// Prefixes cache keys with the tenant id
#[derive(Debug)]
pub struct PrefixCacheTask {
    landlord: Settings,
}

impl PrefixCacheTask {
    /// Registry name
    pub const NAME: &'static str = "prefix_cache";

    /// Create the task
    pub fn new(landlord: Settings) -> Self {
        Self { landlord }
    }

    /// Cache prefix for a tenant
    ///
    /// # Examples
    ///
    /// ```
    /// use landlord_tenancy::{PrefixCacheTask, Tenant};
    ///
    /// assert_eq!(PrefixCacheTask::prefix_for(&Tenant::new("7", "acme")), "tenant_id_7");
    /// ```
    pub fn prefix_for(tenant: &Tenant) -> String {
        format!("tenant_id_{}", tenant.id)
    }
}

#[async_trait]
impl SwitchTenantTask for PrefixCacheTask {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn make_current(&self, tenant: &Tenant, settings: &Settings) -> Result<(), TaskError> {
        settings.set(CACHE_PREFIX, Self::prefix_for(tenant));
        Ok(())
    }

    async fn forget(&self, _tenant: &Tenant, settings: &Settings) -> Result<(), TaskError> {
        settings.reset_from(&self.landlord, CACHE_PREFIX);
        Ok(())
    }
}

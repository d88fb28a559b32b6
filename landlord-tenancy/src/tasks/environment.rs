//! Application settings derived from the tenant.
//!
//! Only keys the landlord settings already configure are rewritten; an unset
//! key means the integration is not in use.

use super::reset_keys;
use crate::error::TaskError;
use crate::settings::Settings;
use crate::task::SwitchTenantTask;
use crate::tenant::Tenant;
use async_trait::async_trait;
use tracing::{debug, warn};

const HORIZON_PREFIX: &str = "horizon.prefix";
const INTERCOM_COMPANY: &str = "intercom.company";
const ANALYTICS_DASHBOARD: &str = "app.pm_analytics_dashboard";
const APP_URL: &str = "app.url";
const DOCKER_HOST_URL: &str = "app.docker_host_url";

const KEYS: [&str; 5] = [
    HORIZON_PREFIX,
    INTERCOM_COMPANY,
    ANALYTICS_DASHBOARD,
    APP_URL,
    DOCKER_HOST_URL,
];

const ANALYTICS_BASE_URL: &str = "https://us-east-1.quicksight.aws.amazon.com/";

/// Rewrites tenant-derived application settings
#[derive(Debug)]
pub struct EnvironmentTask {
    landlord: Settings,
}

impl EnvironmentTask {
    /// Registry name
    pub const NAME: &'static str = "environment";

    /// Create the task
    pub fn new(landlord: Settings) -> Self {
        Self { landlord }
    }

    fn value_for(key: &str, tenant: &Tenant) -> Option<String> {
        match key {
            HORIZON_PREFIX => Some(format!("hzn-{}:", tenant.name)),
            INTERCOM_COMPANY => Some(tenant.name.clone()),
            ANALYTICS_DASHBOARD => Some(format!("{}{}", ANALYTICS_BASE_URL, tenant.name)),
            APP_URL | DOCKER_HOST_URL => tenant.primary_domain().map(str::to_string),
            _ => None,
        }
    }
}

#[async_trait]
impl SwitchTenantTask for EnvironmentTask {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn make_current(&self, tenant: &Tenant, settings: &Settings) -> Result<(), TaskError> {
        for key in KEYS.into_iter().filter(|key| self.landlord.is_set(key)) {
            match Self::value_for(key, tenant) {
                Some(value) => {
                    debug!(tenant_id = %tenant.id, key, "setting rewritten");
                    settings.set(key, value);
                }
                None => warn!(tenant_id = %tenant.id, key, "tenant has no domain, keeping landlord value"),
            }
        }

        Ok(())
    }

    async fn forget(&self, _tenant: &Tenant, settings: &Settings) -> Result<(), TaskError> {
        reset_keys(settings, &self.landlord, KEYS);
        Ok(())
    }
}

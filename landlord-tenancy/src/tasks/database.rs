//! Database per tenant
//!
//! Repoints the tenant connection's target database at `prefix + tenant.name`.
//! The connection pool itself belongs to the host; it is expected to pick up
//! the rewritten setting the next time it connects.

use crate::error::TaskError;
use crate::settings::Settings;
use crate::task::SwitchTenantTask;
use crate::tenant::Tenant;
use async_trait::async_trait;
use tracing::debug;

/// Switches the tenant connection's database
#[derive(Debug)]
pub struct SwitchDatabaseTask {
    landlord: Settings,
    tenant_connection: String,
    landlord_connection: String,
    prefix: String,
}

impl SwitchDatabaseTask {
    /// Registry name
    pub const NAME: &'static str = "switch_database";

    /// Create the task
    pub fn new(
        landlord: Settings,
        tenant_connection: &str,
        landlord_connection: &str,
        prefix: &str,
    ) -> Self {
        Self {
            landlord,
            tenant_connection: tenant_connection.to_string(),
            landlord_connection: landlord_connection.to_string(),
            prefix: prefix.to_string(),
        }
    }

    /// Settings key holding the tenant connection's database name
    pub fn database_key(&self) -> String {
        format!("database.connections.{}.database", self.tenant_connection)
    }
}

#[async_trait]
impl SwitchTenantTask for SwitchDatabaseTask {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn make_current(&self, tenant: &Tenant, settings: &Settings) -> Result<(), TaskError> {
        if self.tenant_connection == self.landlord_connection {
            return Err(TaskError::InvalidSetting {
                key: "tenant_connection".to_string(),
                reason: format!(
                    "tenant connection '{}' is also the landlord connection",
                    self.tenant_connection
                ),
            });
        }
        if tenant.name.is_empty() {
            return Err(TaskError::InvalidSetting {
                key: "tenant.name".to_string(),
                reason: "tenant name is empty".to_string(),
            });
        }

        let database = tenant.database_name(&self.prefix);
        settings.set(self.database_key(), &database);

        debug!(tenant_id = %tenant.id, database = %database, "tenant database selected");
        Ok(())
    }

    async fn forget(&self, _tenant: &Tenant, settings: &Settings) -> Result<(), TaskError> {
        settings.reset_from(&self.landlord, &self.database_key());
        Ok(())
    }
}

//! Switch Tasks
//!
//! A switch task is one reconfiguration step run whenever the current tenant
//! changes. Tasks are shared by every context of a runtime; the settings a
//! hook receives belong to the context being switched. Both hooks must be
//! idempotent: running `make_current` twice for
//! the same tenant, or `forget` with nothing to undo, leaves the external
//! state as a single call would.

use crate::error::TaskError;
use crate::settings::Settings;
use crate::tenant::Tenant;
use async_trait::async_trait;

/// Switch task trait
#[async_trait]
pub trait SwitchTenantTask: Send + Sync {
    /// Registry name of the task
    fn name(&self) -> &str;

    /// Point the external subsystem at `tenant`
    async fn make_current(&self, tenant: &Tenant, settings: &Settings) -> Result<(), TaskError>;

    /// Reset the external subsystem after `tenant` stops being current
    async fn forget(&self, tenant: &Tenant, settings: &Settings) -> Result<(), TaskError>;
}

//! Multi-Tenancy for Landlord
//!
//! Tenant context switching for applications that serve many customers from
//! one deployment. A request (or job) is mapped to a tenant, the tenant is made
//! current, and an ordered pipeline of switch tasks reconfigures the runtime
//! for it: database connection, filesystem roots, cache prefix and so on.
//! When the unit of work ends the tenant is forgotten and every task puts the
//! landlord values back.
//!
//! # Features
//!
//! - 🏢 **Tenant Context** - Owned, per unit of work; no global state
//! - 🔍 **Tenant Resolution** - Domain, subdomain, header and path strategies
//! - 🔁 **Switch Tasks** - Database, filesystem, environment and cache prefix
//! - 🧩 **Task Registry** - Configured task names resolved once at startup
//! - 📣 **Events** - Lifecycle notifications and "tenant not found" signals
//! - ⚙️ **Configuration** - TOML/JSON files with environment overrides
//!
//! # Quick Start
//!
//! ## 1. Fill the Tenant Directory
//!
//! ```rust,ignore
//! use landlord_tenancy::prelude::*;
//! use std::sync::Arc;
//!
//! let store = InMemoryTenantStore::with_tenants([
//!     Tenant::new("1", "acme").with_domain("acme.example.com"),
//!     Tenant::new("2", "globex").with_domain("globex.example.com"),
//! ])?;
//! ```
//!
//! Backing the directory with a real database means implementing
//! [`TenantStore`]:
//!
//! ```rust,ignore
//! #[async_trait]
//! impl TenantStore for MyTenantStore {
//!     async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, TenantError> {
//!         self.db.query_tenant("SELECT * FROM tenants WHERE id = $1", id).await
//!     }
//!
//!     // ... implement other methods
//! }
//! ```
//!
//! ## 2. Build the Runtime
//!
//! ```rust,ignore
//! let config = TenancyConfig::from_file("config/tenancy.toml")?.with_env_overrides();
//!
//! let tenancy = Tenancy::builder()
//!     .config(config)
//!     .settings(settings)
//!     .directory(Arc::new(store))
//!     .build()?;
//! ```
//!
//! ## 3. Handle a Request
//!
//! ```rust,ignore
//! let request = TenantRequest::new("acme.example.com").with_path("/invoices");
//!
//! let invoices = tenancy
//!     .handle_request(&request, async |ctx| load_invoices(ctx).await)
//!     .await?;
//! ```
//!
//! ## 4. Custom Switch Tasks
//!
//! ```rust,ignore
//! struct SwitchSearchIndex {
//!     landlord: Settings,
//! }
//!
//! #[async_trait]
//! impl SwitchTenantTask for SwitchSearchIndex {
//!     fn name(&self) -> &str {
//!         "search_index"
//!     }
//!
//!     async fn make_current(&self, tenant: &Tenant, settings: &Settings) -> Result<(), TaskError> {
//!         settings.set("search.index", format!("tenant_{}", tenant.id));
//!         Ok(())
//!     }
//!
//!     async fn forget(&self, _tenant: &Tenant, settings: &Settings) -> Result<(), TaskError> {
//!         settings.reset_from(&self.landlord, "search.index");
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = TaskRegistry::new();
//! registry.register("search_index", |_, settings| {
//!     Arc::new(SwitchSearchIndex { landlord: settings.clone() })
//! });
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod pipeline;
pub mod resolver;
pub mod settings;
pub mod store;
pub mod task;
pub mod tasks;
pub mod tenant;

pub use config::{
    DiskOverwrite, FilesystemConfig, QueueConfig, ResolverKind, TaskEntry, TenancyConfig,
};
pub use context::{ContextState, TenantContext};
pub use error::{ConfigError, SwitchPhase, TaskError, TenantError, TenantResult};
pub use events::{
    EventDispatcher, EventKind, EventMetadata, ListenerError, RecordingListener, TenancyEvent,
    TenancyListener,
};
pub use lifecycle::{Tenancy, TenancyBuilder};
pub use pipeline::{TaskFactory, TaskPipeline, TaskRegistry};
pub use resolver::{
    DomainTenantResolver, HeaderTenantResolver, PathTenantResolver, SubdomainTenantResolver,
    TenantRequest, TenantResolver,
};
pub use settings::Settings;
pub use store::{InMemoryTenantStore, TenantStore};
pub use task::SwitchTenantTask;
pub use tasks::{EnvironmentTask, FilesystemTask, PrefixCacheTask, SwitchDatabaseTask};
pub use tenant::{Domain, Tenant, TenantId, TenantRef, TenantStatus};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::TenancyConfig;
    pub use crate::context::{ContextState, TenantContext};
    pub use crate::error::{TaskError, TenantError, TenantResult};
    pub use crate::events::{EventKind, TenancyEvent, TenancyListener};
    pub use crate::lifecycle::Tenancy;
    pub use crate::pipeline::{TaskPipeline, TaskRegistry};
    pub use crate::resolver::{
        DomainTenantResolver, HeaderTenantResolver, PathTenantResolver, SubdomainTenantResolver,
        TenantRequest, TenantResolver,
    };
    pub use crate::settings::Settings;
    pub use crate::store::{InMemoryTenantStore, TenantStore};
    pub use crate::task::SwitchTenantTask;
    pub use crate::tenant::{Tenant, TenantId, TenantRef};
}

//! Lifecycle controller
//!
//! Ties resolution to the tenant context for one unit of work: resolve the
//! tenant of an inbound request, make it current, run the work, and forget
//! the tenant again on every exit path.

use crate::config::{ResolverKind, TenancyConfig};
use crate::context::TenantContext;
use crate::error::{ConfigError, TenantError, TenantResult};
use crate::events::{EventDispatcher, EventKind, TenancyListener};
use crate::pipeline::{TaskPipeline, TaskRegistry};
use crate::resolver::{
    DomainTenantResolver, SubdomainTenantResolver, TenantRequest, TenantResolver,
};
use crate::settings::Settings;
use crate::store::{InMemoryTenantStore, TenantStore};
use crate::tenant::Tenant;
use futures::FutureExt;
use std::fmt;
use std::panic::{AssertUnwindSafe, resume_unwind};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tenancy runtime
///
/// Cheap to clone; every clone shares the directory, resolver, pipeline,
/// listeners and landlord settings. Contexts do not share settings: each
/// works on its own fork.
#[derive(Clone)]
pub struct Tenancy {
    config: Arc<TenancyConfig>,
    settings: Settings,
    directory: Arc<dyn TenantStore>,
    resolver: Arc<dyn TenantResolver>,
    pipeline: TaskPipeline,
    events: EventDispatcher,
}

impl Tenancy {
    /// Start building a runtime
    pub fn builder() -> TenancyBuilder {
        TenancyBuilder::new()
    }

    /// Fresh idle context for one unit of work, starting from the landlord
    /// settings
    pub fn context(&self) -> TenantContext {
        TenantContext::new(
            self.directory.clone(),
            self.pipeline.clone(),
            self.events.clone(),
        )
        .with_settings(self.settings.fork())
    }

    /// Resolve the request's tenant and make it current.
    ///
    /// When no tenant matches, `TenantNotFoundForRequest` is emitted and the
    /// returned context is idle.
    pub async fn begin(&self, request: &TenantRequest) -> TenantResult<TenantContext> {
        let mut ctx = self.context();

        match self.resolver.find_for_request(request).await? {
            Some(tenant) => {
                debug!(tenant_id = %tenant.id, host = %request.host, "tenant resolved");
                ctx.make_current(&tenant).await?;
            }
            None => {
                info!(host = %request.host, path = %request.path, "no tenant for request");
                self.events
                    .dispatch(EventKind::TenantNotFoundForRequest {
                        host: request.host.clone(),
                        path: request.path.clone(),
                    })
                    .await;
            }
        }

        Ok(ctx)
    }

    /// Close a unit of work, forgetting its tenant
    pub async fn end(&self, mut ctx: TenantContext) -> TenantResult<Option<Tenant>> {
        ctx.forget_current().await
    }

    /// Run `f` for a request with its tenant current.
    ///
    /// The context is forgotten afterwards whether `f` returns or panics.
    /// With `needs_tenant` set, a request without a tenant is rejected with
    /// [`TenantError::NotFound`] and `f` never runs.
    pub async fn handle_request<F, T>(&self, request: &TenantRequest, f: F) -> TenantResult<T>
    where
        F: AsyncFnOnce(&mut TenantContext) -> T,
    {
        let mut ctx = self.begin(request).await?;

        if self.config.needs_tenant && !ctx.check_current() {
            return Err(TenantError::NotFound(format!(
                "No tenant for host {}",
                request.host
            )));
        }

        let outcome = AssertUnwindSafe(f(&mut ctx)).catch_unwind().await;
        let ended = ctx.forget_current().await;

        match outcome {
            Ok(value) => {
                ended?;
                Ok(value)
            }
            Err(panic) => {
                if let Err(e) = ended {
                    warn!(error = %e, "failed to forget tenant after panic");
                }
                resume_unwind(panic)
            }
        }
    }

    /// Run `f` once for every active tenant in the directory, each made
    /// current in turn.
    ///
    /// `f` also receives the settings as rewritten for that tenant.
    pub async fn each_tenant<F, T>(&self, mut f: F) -> TenantResult<Vec<T>>
    where
        F: AsyncFnMut(&Tenant, &Settings) -> T,
    {
        let tenants: Vec<Tenant> = self
            .directory
            .all()
            .await?
            .into_iter()
            .filter(Tenant::is_active)
            .collect();

        let mut ctx = self.context();
        let settings = ctx.settings().clone();
        ctx.each_current(&tenants, async |tenant: &Tenant| f(tenant, &settings).await)
            .await
    }

    /// Configuration
    pub fn config(&self) -> &TenancyConfig {
        &self.config
    }

    /// Landlord settings every context starts from.
    ///
    /// Switch tasks never write these; a unit of work reads its tenant's
    /// values through [`TenantContext::settings`].
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Tenant directory
    pub fn directory(&self) -> &Arc<dyn TenantStore> {
        &self.directory
    }

    /// Task pipeline
    pub fn pipeline(&self) -> &TaskPipeline {
        &self.pipeline
    }

    /// Event dispatcher
    pub fn events(&self) -> &EventDispatcher {
        &self.events
    }
}

impl fmt::Debug for Tenancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tenancy")
            .field("pipeline", &self.pipeline)
            .field("events", &self.events)
            .field("needs_tenant", &self.config.needs_tenant)
            .finish()
    }
}

/// Builder for [`Tenancy`]
pub struct TenancyBuilder {
    config: TenancyConfig,
    settings: Settings,
    directory: Option<Arc<dyn TenantStore>>,
    resolver: Option<Arc<dyn TenantResolver>>,
    registry: TaskRegistry,
    pipeline: Option<TaskPipeline>,
    events: EventDispatcher,
}

impl TenancyBuilder {
    /// Builder with default configuration and the built-in tasks
    pub fn new() -> Self {
        Self {
            config: TenancyConfig::default(),
            settings: Settings::new(),
            directory: None,
            resolver: None,
            registry: TaskRegistry::new(),
            pipeline: None,
            events: EventDispatcher::new(),
        }
    }

    /// Use this configuration
    pub fn config(mut self, config: TenancyConfig) -> Self {
        self.config = config;
        self
    }

    /// Use these settings
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Tenant directory (defaults to an empty in-memory store)
    pub fn directory(mut self, directory: Arc<dyn TenantStore>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Tenant resolver (defaults to the configured [`ResolverKind`])
    pub fn resolver(mut self, resolver: Arc<dyn TenantResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Task registry used to build the pipeline from configuration
    pub fn registry(mut self, registry: TaskRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Use a prebuilt pipeline instead of the configured task list
    pub fn pipeline(mut self, pipeline: TaskPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Subscribe a listener
    pub fn listener(self, listener: Arc<dyn TenancyListener>) -> Self {
        self.events.subscribe(listener);
        self
    }

    /// Build the runtime, resolving the configured task list once
    pub fn build(self) -> TenantResult<Tenancy> {
        let directory = self
            .directory
            .unwrap_or_else(|| Arc::new(InMemoryTenantStore::new()));
        let resolver = match self.resolver {
            Some(resolver) => resolver,
            None => configured_resolver(&self.config, directory.clone())?,
        };
        let pipeline = match self.pipeline {
            Some(pipeline) => pipeline,
            None => self.registry.build(&self.config, &self.settings)?,
        };

        info!(tasks = ?pipeline.task_names(), "tenancy initialized");

        Ok(Tenancy {
            config: Arc::new(self.config),
            settings: self.settings,
            directory,
            resolver,
            pipeline,
            events: self.events,
        })
    }
}

fn configured_resolver(
    config: &TenancyConfig,
    directory: Arc<dyn TenantStore>,
) -> Result<Arc<dyn TenantResolver>, ConfigError> {
    match config.resolver {
        ResolverKind::Domain => Ok(Arc::new(DomainTenantResolver::new(directory))),
        ResolverKind::Subdomain => {
            if config.tenant_domain.trim_matches('.').is_empty() {
                return Err(ConfigError::MissingValue("tenant_domain".to_string()));
            }
            Ok(Arc::new(SubdomainTenantResolver::new(
                directory,
                config.tenant_domain.as_str(),
            )))
        }
    }
}

impl Default for TenancyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaskEntry;
    use crate::context::ContextState;
    use crate::events::RecordingListener;
    use crate::tasks::PrefixCacheTask;

    fn directory() -> Arc<dyn TenantStore> {
        Arc::new(
            InMemoryTenantStore::with_tenants([
                Tenant::new("1", "acme").with_domain("acme.example.com"),
                Tenant::new("2", "globex").with_domain("globex.example.com"),
            ])
            .unwrap(),
        )
    }

    fn config() -> TenancyConfig {
        TenancyConfig {
            switch_tenant_tasks: vec![TaskEntry::from(PrefixCacheTask::NAME)],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_begin_resolves_and_activates() {
        let tenancy = Tenancy::builder()
            .config(config())
            .directory(directory())
            .build()
            .unwrap();

        let ctx = tenancy
            .begin(&TenantRequest::new("acme.example.com"))
            .await
            .unwrap();

        assert_eq!(ctx.current().unwrap().name, "acme");
        let settings = ctx.settings().clone();
        assert_eq!(settings.get_string("cache.prefix").as_deref(), Some("tenant_id_1"));
        assert!(!tenancy.settings().has("cache.prefix"));

        let forgotten = tenancy.end(ctx).await.unwrap();
        assert_eq!(forgotten.unwrap().name, "acme");
        assert!(!settings.has("cache.prefix"));
    }

    #[tokio::test]
    async fn test_unknown_host_emits_event() {
        let recorder = Arc::new(RecordingListener::new());
        let tenancy = Tenancy::builder()
            .config(config())
            .directory(directory())
            .listener(recorder.clone())
            .build()
            .unwrap();

        let ctx = tenancy
            .begin(&TenantRequest::new("unknown.example.com").with_path("/login"))
            .await
            .unwrap();

        assert!(ctx.current().is_none());
        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].kind,
            EventKind::TenantNotFoundForRequest {
                host: "unknown.example.com".to_string(),
                path: "/login".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_handle_request_forgets_afterwards() {
        let tenancy = Tenancy::builder()
            .config(config())
            .directory(directory())
            .build()
            .unwrap();

        let seen = tenancy
            .handle_request(
                &TenantRequest::new("globex.example.com"),
                async |ctx: &mut TenantContext| {
                    (
                        ctx.current().map(|t| t.name.clone()),
                        ctx.settings().get_string("cache.prefix"),
                    )
                },
            )
            .await
            .unwrap();

        assert_eq!(
            seen,
            (Some("globex".to_string()), Some("tenant_id_2".to_string()))
        );
        assert!(!tenancy.settings().has("cache.prefix"));
    }

    #[tokio::test]
    async fn test_needs_tenant_rejects_unresolved_request() {
        let tenancy = Tenancy::builder()
            .config(TenancyConfig {
                needs_tenant: true,
                ..config()
            })
            .directory(directory())
            .build()
            .unwrap();

        let result = tenancy
            .handle_request(
                &TenantRequest::new("unknown.example.com"),
                async |_: &mut TenantContext| -> u32 { unreachable!("handler must not run") },
            )
            .await;

        assert!(matches!(result, Err(TenantError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unknown_task_fails_build() {
        let result = Tenancy::builder()
            .config(TenancyConfig {
                switch_tenant_tasks: vec![TaskEntry::from("switch_route_cache")],
                ..Default::default()
            })
            .build();

        assert!(matches!(
            result,
            Err(TenantError::Config(ConfigError::UnknownTask(name))) if name == "switch_route_cache"
        ));
    }

    #[tokio::test]
    async fn test_each_tenant_skips_inactive() {
        let store = InMemoryTenantStore::with_tenants([
            Tenant::new("1", "acme"),
            Tenant::new("2", "globex").with_status(crate::tenant::TenantStatus::Inactive),
            Tenant::new("3", "initech"),
        ])
        .unwrap();
        let tenancy = Tenancy::builder()
            .config(config())
            .directory(Arc::new(store))
            .build()
            .unwrap();
        let prefixes = tenancy
            .each_tenant(async |_: &Tenant, settings: &Settings| {
                settings.get_string("cache.prefix")
            })
            .await
            .unwrap();

        assert_eq!(
            prefixes,
            vec![Some("tenant_id_1".to_string()), Some("tenant_id_3".to_string())]
        );
        assert!(!tenancy.settings().has("cache.prefix"));
    }

    #[tokio::test]
    async fn test_live_contexts_keep_their_own_settings() {
        let tenancy = Tenancy::builder()
            .config(config())
            .settings(Settings::from_pairs([("cache.prefix", "landlord")]))
            .directory(directory())
            .build()
            .unwrap();

        let mut first = tenancy.context();
        let mut second = tenancy.context();
        first.make_current(&Tenant::new("1", "acme")).await.unwrap();
        second.make_current(&Tenant::new("2", "globex")).await.unwrap();

        first.forget_current().await.unwrap();

        assert_eq!(second.state(), ContextState::Active);
        assert_eq!(
            second.settings().get_string("cache.prefix").as_deref(),
            Some("tenant_id_2")
        );
        assert_eq!(
            first.settings().get_string("cache.prefix").as_deref(),
            Some("landlord")
        );

        second.forget_current().await.unwrap();
        assert_eq!(
            second.settings().get_string("cache.prefix").as_deref(),
            Some("landlord")
        );
        assert_eq!(
            tenancy.settings().get_string("cache.prefix").as_deref(),
            Some("landlord")
        );
    }

    #[tokio::test]
    async fn test_subdomain_resolver_from_config() {
        let store = InMemoryTenantStore::with_tenants([Tenant::new("1", "acme")]).unwrap();
        let tenancy = Tenancy::builder()
            .config(TenancyConfig {
                resolver: ResolverKind::Subdomain,
                tenant_domain: ".example.com".to_string(),
                ..config()
            })
            .directory(Arc::new(store))
            .build()
            .unwrap();

        let ctx = tenancy
            .begin(&TenantRequest::new("acme.example.com:8443"))
            .await
            .unwrap();
        assert_eq!(ctx.current().map(|t| t.name.as_str()), Some("acme"));

        let ctx = tenancy
            .begin(&TenantRequest::new("acme.other.com"))
            .await
            .unwrap();
        assert!(ctx.current().is_none());
    }

    #[test]
    fn test_subdomain_resolver_needs_tenant_domain() {
        let result = Tenancy::builder()
            .config(TenancyConfig {
                resolver: ResolverKind::Subdomain,
                ..config()
            })
            .build();

        assert!(matches!(
            result,
            Err(TenantError::Config(ConfigError::MissingValue(key))) if key == "tenant_domain"
        ));
    }

    #[test]
    fn test_default_pipeline_switches_database() {
        let tenancy = Tenancy::builder().build().unwrap();
        assert_eq!(tenancy.pipeline().task_names(), vec!["switch_database"]);
    }
}

//! Tenant Context
//!
//! The binding of "current tenant" for one unit of work (a request or a job
//! execution). A context is an owned value handed down the call chain, never a
//! process global; concurrent units of work each get their own.
//!
//! Every mutation takes `&mut self`, so a switch from tenant A to tenant B
//! (forget A, bind B, run the pipeline) is atomic for anyone else holding the
//! context: nobody can observe it half-way.
//!
//! The settings the switch tasks rewrite belong to the context as well. Two
//! live contexts never see each other's tenant values.
//!
//! # Example
//!
//! ```rust,ignore
//! let mut ctx = tenancy.context();
//!
//! ctx.make_current(&acme).await?;
//! assert!(ctx.is_current(&acme));
//!
//! let report = ctx
//!     .with_tenant(&globex, async |tenant| build_report(tenant).await)
//!     .await?;
//!
//! // acme is current again
//! ctx.forget_current().await?;
//! ```

use crate::error::{TenantError, TenantResult};
use crate::events::{EventDispatcher, EventKind};
use crate::pipeline::TaskPipeline;
use crate::settings::Settings;
use crate::store::TenantStore;
use crate::tenant::{Tenant, TenantId, TenantRef};
use futures::FutureExt;
use std::fmt;
use std::panic::{AssertUnwindSafe, resume_unwind};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

/// Lifecycle state of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// No tenant bound
    Idle,
    /// Pipeline running
    Switching,
    /// A tenant is bound and its pipeline ran
    Active,
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Switching => write!(f, "switching"),
            Self::Active => write!(f, "active"),
        }
    }
}

/// Current-tenant binding for one unit of work
pub struct TenantContext {
    directory: Arc<dyn TenantStore>,
    pipeline: TaskPipeline,
    events: EventDispatcher,
    settings: Settings,
    current: Option<Tenant>,
    state: ContextState,
}

impl TenantContext {
    /// Create an idle context with empty settings
    pub fn new(
        directory: Arc<dyn TenantStore>,
        pipeline: TaskPipeline,
        events: EventDispatcher,
    ) -> Self {
        Self {
            directory,
            pipeline,
            events,
            settings: Settings::new(),
            current: None,
            state: ContextState::Idle,
        }
    }

    /// Use `settings` as this context's working settings
    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Settings as rewritten for the current tenant.
    ///
    /// Clones of the returned handle follow later switches of this context.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Lifecycle state
    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Current tenant, if any
    pub fn current(&self) -> Option<&Tenant> {
        self.current.as_ref()
    }

    /// Whether any tenant is current
    pub fn check_current(&self) -> bool {
        self.current.is_some()
    }

    /// Whether `tenant` is the current tenant (by id)
    pub fn is_current(&self, tenant: &Tenant) -> bool {
        self.is_current_id(&tenant.id)
    }

    fn is_current_id(&self, id: &TenantId) -> bool {
        self.current.as_ref().is_some_and(|t| &t.id == id)
    }

    /// Make `tenant` current.
    ///
    /// No-op if it already is. Otherwise the tenant is checked against the
    /// directory, the previous tenant is forgotten, and the pipeline runs for
    /// the directory's record of `tenant`. Any switch task failure leaves the
    /// context idle.
    pub async fn make_current(&mut self, tenant: &Tenant) -> TenantResult<()> {
        if self.is_current(tenant) {
            trace!(tenant_id = %tenant.id, "tenant already current");
            return Ok(());
        }

        let record = self.lookup(&tenant.id).await?;
        self.activate(record).await
    }

    /// Forget the current tenant.
    ///
    /// Returns the forgotten tenant, or `None` when the context was idle (in
    /// which case no task runs). The binding is cleared even if a task fails.
    pub async fn forget_current(&mut self) -> TenantResult<Option<Tenant>> {
        let Some(tenant) = self.current.clone() else {
            return Ok(None);
        };

        self.state = ContextState::Switching;
        self.events
            .dispatch(EventKind::ForgettingCurrentTenant(tenant.clone()))
            .await;

        let result = self.pipeline.forget(&tenant, &self.settings).await;
        self.current = None;
        self.state = ContextState::Idle;

        match result {
            Ok(()) => {
                debug!(tenant_id = %tenant.id, "tenant forgotten");
                self.events
                    .dispatch(EventKind::ForgotCurrentTenant(tenant.clone()))
                    .await;
                Ok(Some(tenant))
            }
            Err(e) => {
                self.report_failure(&tenant.id, &e).await;
                Err(e)
            }
        }
    }

    /// Run `f` with `tenant` current, then restore the previous binding.
    ///
    /// The previous tenant (or idle) is restored whether `f` returns, fails or
    /// panics; a panic is resumed after the restore. If the previous tenant
    /// can no longer be made current the context is left idle, never bound
    /// to `tenant`.
    pub async fn with_tenant<F, T>(&mut self, tenant: &Tenant, f: F) -> TenantResult<T>
    where
        F: AsyncFnOnce(&Tenant) -> T,
    {
        let previous = self.current.clone();

        if let Err(e) = self.make_current(tenant).await {
            self.restore_quietly(previous).await;
            return Err(e);
        }

        let bound = self.current.clone().unwrap_or_else(|| tenant.clone());
        let outcome = AssertUnwindSafe(f(&bound)).catch_unwind().await;

        match outcome {
            Ok(value) => {
                self.restore(previous).await?;
                Ok(value)
            }
            Err(panic) => {
                self.restore_quietly(previous).await;
                resume_unwind(panic)
            }
        }
    }

    /// Run `f` once per tenant with that tenant current, then restore the
    /// previous binding.
    ///
    /// Stops at the first tenant that cannot be made current. Restoration
    /// follows the same rules as [`with_tenant`](Self::with_tenant).
    pub async fn each_current<F, T>(&mut self, tenants: &[Tenant], mut f: F) -> TenantResult<Vec<T>>
    where
        F: AsyncFnMut(&Tenant) -> T,
    {
        let previous = self.current.clone();
        let mut results = Vec::with_capacity(tenants.len());

        for tenant in tenants {
            if let Err(e) = self.make_current(tenant).await {
                self.restore_quietly(previous).await;
                return Err(e);
            }

            let bound = self.current.clone().unwrap_or_else(|| tenant.clone());
            match AssertUnwindSafe(f(&bound)).catch_unwind().await {
                Ok(value) => results.push(value),
                Err(panic) => {
                    self.restore_quietly(previous).await;
                    resume_unwind(panic)
                }
            }
        }

        self.restore(previous).await?;
        Ok(results)
    }

    /// Reference to the current tenant for stamping outgoing jobs
    pub fn capture(&self) -> Option<TenantRef> {
        self.current.as_ref().map(Tenant::to_ref)
    }

    /// Make the referenced tenant current again (e.g. when a job runs).
    ///
    /// The directory is authoritative: a reference to a tenant that no longer
    /// exists is rejected with [`TenantError::InvalidTenant`].
    pub async fn restore_from_ref(&mut self, reference: &TenantRef) -> TenantResult<()> {
        if self.is_current_id(&reference.id) {
            return Ok(());
        }

        let record = self.lookup(&reference.id).await?;
        self.activate(record).await
    }

    async fn lookup(&self, id: &TenantId) -> TenantResult<Tenant> {
        let record = self
            .directory
            .find_by_id(id)
            .await?
            .ok_or_else(|| TenantError::InvalidTenant(id.clone()))?;

        if !record.is_active() {
            return Err(TenantError::Inactive(record.id));
        }

        Ok(record)
    }

    async fn activate(&mut self, tenant: Tenant) -> TenantResult<()> {
        self.forget_current().await?;

        self.state = ContextState::Switching;
        self.events
            .dispatch(EventKind::MakingTenantCurrent(tenant.clone()))
            .await;
        self.current = Some(tenant.clone());

        match self.pipeline.make_current(&tenant, &self.settings).await {
            Ok(()) => {
                self.state = ContextState::Active;
                info!(tenant_id = %tenant.id, tenant = %tenant.name, "tenant made current");
                self.events
                    .dispatch(EventKind::MadeTenantCurrent(tenant))
                    .await;
                Ok(())
            }
            Err(e) => {
                self.current = None;
                self.state = ContextState::Idle;
                self.report_failure(&tenant.id, &e).await;
                Err(e)
            }
        }
    }

    /// Rebind `previous`, or fall back to idle when that fails
    async fn restore(&mut self, previous: Option<Tenant>) -> TenantResult<()> {
        let result = match previous {
            Some(tenant) => self.make_current(&tenant).await,
            None => self.forget_current().await.map(|_| ()),
        };

        if let Err(e) = &result {
            warn!(error = %e, "previous tenant not restored, forgetting current tenant");
            if let Err(forget_err) = self.forget_current().await {
                warn!(error = %forget_err, "failed to forget tenant after restore failure");
            }
        }

        result
    }

    async fn restore_quietly(&mut self, previous: Option<Tenant>) {
        if let Err(e) = self.restore(previous).await {
            warn!(error = %e, "failed to restore previous tenant");
        }
    }

    async fn report_failure(&self, tenant: &TenantId, err: &TenantError) {
        error!(tenant_id = %tenant, error = %err, "tenant switch failed, context is idle");
        if let TenantError::SwitchTaskFailure { task, source, .. } = err {
            self.events
                .dispatch(EventKind::SwitchTaskFailed {
                    tenant: tenant.clone(),
                    task: task.clone(),
                    message: source.to_string(),
                })
                .await;
        }
    }
}

impl fmt::Debug for TenantContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantContext")
            .field("current", &self.current.as_ref().map(|t| &t.id))
            .field("state", &self.state)
            .field("pipeline", &self.pipeline)
            .field("settings", &self.settings.keys())
            .finish()
    }
}

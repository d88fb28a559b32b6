//! Tenancy events
//!
//! Lifecycle notifications emitted around tenant switches, plus the
//! "no tenant for this request" signal that hosts use to reject the request
//! or fall back to a default tenant.

use crate::tenant::{Tenant, TenantId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Event metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event ID
    pub id: Uuid,

    /// Timestamp when event was created
    pub timestamp: DateTime<Utc>,
}

impl EventMetadata {
    /// Create new event metadata
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
        }
    }
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// What happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// A tenant is about to become current
    MakingTenantCurrent(Tenant),
    /// A tenant became current and its pipeline ran
    MadeTenantCurrent(Tenant),
    /// The current tenant is about to be forgotten
    ForgettingCurrentTenant(Tenant),
    /// The current tenant was forgotten
    ForgotCurrentTenant(Tenant),
    /// No tenant matched an inbound request
    TenantNotFoundForRequest {
        /// Request host
        host: String,
        /// Request path
        path: String,
    },
    /// A switch task failed; the context is idle afterwards
    SwitchTaskFailed {
        /// Tenant being switched
        tenant: TenantId,
        /// Failing task
        task: String,
        /// Error message
        message: String,
    },
}

impl EventKind {
    /// Event name
    pub fn name(&self) -> &'static str {
        match self {
            Self::MakingTenantCurrent(_) => "making_tenant_current",
            Self::MadeTenantCurrent(_) => "made_tenant_current",
            Self::ForgettingCurrentTenant(_) => "forgetting_current_tenant",
            Self::ForgotCurrentTenant(_) => "forgot_current_tenant",
            Self::TenantNotFoundForRequest { .. } => "tenant_not_found_for_request",
            Self::SwitchTaskFailed { .. } => "switch_task_failed",
        }
    }
}

/// A tenancy event
#[derive(Debug, Clone)]
pub struct TenancyEvent {
    /// Event metadata
    pub metadata: EventMetadata,

    /// Payload
    pub kind: EventKind,
}

impl TenancyEvent {
    /// Create an event
    pub fn new(kind: EventKind) -> Self {
        Self {
            metadata: EventMetadata::new(),
            kind,
        }
    }

    /// Event name
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Listener failure
#[derive(Debug, thiserror::Error)]
#[error("Listener failed: {0}")]
pub struct ListenerError(pub String);

/// Receives tenancy events
#[async_trait]
pub trait TenancyListener: Send + Sync {
    /// Handle an event
    async fn handle(&self, event: &TenancyEvent) -> Result<(), ListenerError>;
}

/// Delivers events to registered listeners in subscription order.
///
/// Listener failures are logged and never interrupt a tenant switch.
#[derive(Clone, Default)]
pub struct EventDispatcher {
    listeners: Arc<RwLock<Vec<Arc<dyn TenancyListener>>>>,
}

impl EventDispatcher {
    /// Create new dispatcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a listener
    pub fn subscribe(&self, listener: Arc<dyn TenancyListener>) {
        self.listeners.write().push(listener);
    }

    /// Number of listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Dispatch an event to every listener
    pub async fn dispatch(&self, kind: EventKind) {
        let event = TenancyEvent::new(kind);
        let listeners = self.listeners.read().clone();

        debug!(event = event.name(), id = %event.metadata.id, "dispatching tenancy event");

        for listener in listeners {
            if let Err(e) = listener.handle(&event).await {
                error!(event = event.name(), error = %e, "tenancy listener failed");
            }
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Listener that keeps every event it sees
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<TenancyEvent>>,
}

impl RecordingListener {
    /// Create new recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded events
    pub fn events(&self) -> Vec<TenancyEvent> {
        self.events.lock().clone()
    }

    /// Recorded event names
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(TenancyEvent::name).collect()
    }

    /// Drop recorded events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

#[async_trait]
impl TenancyListener for RecordingListener {
    async fn handle(&self, event: &TenancyEvent) -> Result<(), ListenerError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

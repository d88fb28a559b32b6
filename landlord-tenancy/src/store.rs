//! Tenant Directory
//!
//! Read access to tenant and domain records. The directory itself is owned by
//! the host application; implement [`TenantStore`] over your database.

use crate::error::TenantError;
use crate::tenant::{Tenant, TenantId, normalize_host};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Tenant store trait (implement with your database)
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Find tenant by ID
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, TenantError>;

    /// Find tenant owning a domain
    async fn find_by_domain(&self, host: &str) -> Result<Option<Tenant>, TenantError>;

    /// Find tenant by name
    async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, TenantError>;

    /// List every tenant in the directory
    async fn all(&self) -> Result<Vec<Tenant>, TenantError>;
}

/// In-memory tenant directory
///
/// Keeps the domain index in step with the tenant records so that each domain
/// maps to exactly one tenant.
#[derive(Debug, Default)]
pub struct InMemoryTenantStore {
    inner: RwLock<Directory>,
}

#[derive(Debug, Default)]
struct Directory {
    tenants: HashMap<TenantId, Tenant>,
    domains: HashMap<String, TenantId>,
}

impl InMemoryTenantStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a list of tenants
    pub fn with_tenants(tenants: impl IntoIterator<Item = Tenant>) -> Result<Self, TenantError> {
        let store = Self::new();
        for tenant in tenants {
            store.insert(tenant)?;
        }
        Ok(store)
    }

    /// Insert or replace a tenant record.
    ///
    /// Domain names are normalized before they are indexed. Fails with
    /// [`TenantError::DomainConflict`] if one of its domains is already bound
    /// to a different tenant.
    pub fn insert(&self, mut tenant: Tenant) -> Result<(), TenantError> {
        for domain in &mut tenant.domains {
            domain.name = normalize_host(&domain.name);
        }

        let mut dir = self.inner.write();

        for domain in &tenant.domains {
            if let Some(owner) = dir.domains.get(&domain.name) {
                if *owner != tenant.id {
                    return Err(TenantError::DomainConflict {
                        domain: domain.name.clone(),
                        owner: owner.clone(),
                    });
                }
            }
        }

        if let Some(previous) = dir.tenants.remove(&tenant.id) {
            for domain in previous.domains {
                dir.domains.remove(&domain.name);
            }
        }

        for domain in &tenant.domains {
            dir.domains.insert(domain.name.clone(), tenant.id.clone());
        }
        dir.tenants.insert(tenant.id.clone(), tenant);
        Ok(())
    }

    /// Remove a tenant and its domains
    pub fn remove(&self, id: &TenantId) -> Option<Tenant> {
        let mut dir = self.inner.write();
        let tenant = dir.tenants.remove(id)?;
        for domain in &tenant.domains {
            dir.domains.remove(&domain.name);
        }
        Some(tenant)
    }

    /// Number of tenants
    pub fn len(&self) -> usize {
        self.inner.read().tenants.len()
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TenantStore for InMemoryTenantStore {
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, TenantError> {
        Ok(self.inner.read().tenants.get(id).cloned())
    }

    async fn find_by_domain(&self, host: &str) -> Result<Option<Tenant>, TenantError> {
        let dir = self.inner.read();
        Ok(dir
            .domains
            .get(&normalize_host(host))
            .and_then(|id| dir.tenants.get(id))
            .cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, TenantError> {
        Ok(self
            .inner
            .read()
            .tenants
            .values()
            .find(|t| t.name == name)
            .cloned())
    }

    async fn all(&self) -> Result<Vec<Tenant>, TenantError> {
        let mut tenants: Vec<_> = self.inner.read().tenants.values().cloned().collect();
        tenants.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tenants)
    }
}

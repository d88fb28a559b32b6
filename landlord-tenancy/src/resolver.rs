//! Tenant Resolution
//!
//! Strategies for finding the tenant that owns an inbound request. Resolvers
//! only look tenants up; making one current is the lifecycle's job.

use crate::error::TenantError;
use crate::store::TenantStore;
use crate::tenant::{Tenant, TenantId, normalize_host};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;

/// Request descriptor supplied by the host's HTTP layer
#[derive(Debug, Clone, Default)]
pub struct TenantRequest {
    /// Host header value (may include a port)
    pub host: String,

    /// Request path
    pub path: String,

    /// Request headers, keys lower-cased
    pub headers: HashMap<String, String>,
}

impl TenantRequest {
    /// Create a request descriptor for a host
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: "/".to_string(),
            headers: HashMap::new(),
        }
    }

    /// Set the path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Add a header
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Header lookup, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Tenant resolver trait
#[async_trait]
pub trait TenantResolver: Send + Sync {
    /// Find the tenant for a request; `Ok(None)` when there is none
    async fn find_for_request(
        &self,
        request: &TenantRequest,
    ) -> Result<Option<Tenant>, TenantError>;
}

/// Domain-based tenant resolver
///
/// Looks the full host up in the directory's domain index. This is the
/// default strategy.
pub struct DomainTenantResolver {
    store: Arc<dyn TenantStore>,
}

impl DomainTenantResolver {
    /// Create new domain-based resolver
    pub fn new(store: Arc<dyn TenantStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TenantResolver for DomainTenantResolver {
    async fn find_for_request(
        &self,
        request: &TenantRequest,
    ) -> Result<Option<Tenant>, TenantError> {
        let host = normalize_host(&request.host);
        if host.is_empty() {
            return Ok(None);
        }
        self.store.find_by_domain(&host).await
    }
}

/// Subdomain-based tenant resolver
///
/// Resolves tenant from subdomain (e.g., `acme.example.com` -> tenant "acme").
pub struct SubdomainTenantResolver {
    store: Arc<dyn TenantStore>,
    base_domain: String,
}

impl SubdomainTenantResolver {
    /// Create new subdomain-based resolver
    ///
    /// `base_domain` may be given with or without a leading dot.
    pub fn new(store: Arc<dyn TenantStore>, base_domain: impl Into<String>) -> Self {
        let base_domain: String = base_domain.into();
        Self {
            store,
            base_domain: normalize_host(base_domain.trim_start_matches('.')),
        }
    }

    /// Extract subdomain from host
    fn extract_subdomain(&self, host: &str) -> Option<String> {
        let host = normalize_host(host);
        let subdomain = host.strip_suffix(&format!(".{}", self.base_domain))?;

        if !subdomain.is_empty() && !subdomain.contains('.') {
            return Some(subdomain.to_string());
        }

        None
    }
}

#[async_trait]
impl TenantResolver for SubdomainTenantResolver {
    async fn find_for_request(
        &self,
        request: &TenantRequest,
    ) -> Result<Option<Tenant>, TenantError> {
        match self.extract_subdomain(&request.host) {
            Some(subdomain) => self.store.find_by_name(&subdomain).await,
            None => Ok(None),
        }
    }
}

/// Header-based tenant resolver
///
/// Resolves tenant id from a request header (e.g., `X-Tenant-ID`).
pub struct HeaderTenantResolver {
    store: Arc<dyn TenantStore>,
    header_name: String,
}

impl HeaderTenantResolver {
    /// Create new header-based resolver
    pub fn new(store: Arc<dyn TenantStore>, header_name: impl Into<String>) -> Self {
        Self {
            store,
            header_name: header_name.into(),
        }
    }
}

#[async_trait]
impl TenantResolver for HeaderTenantResolver {
    async fn find_for_request(
        &self,
        request: &TenantRequest,
    ) -> Result<Option<Tenant>, TenantError> {
        match request.header(&self.header_name) {
            Some(id) if !id.trim().is_empty() => {
                self.store.find_by_id(&TenantId::new(id.trim())).await
            }
            _ => Ok(None),
        }
    }
}

/// Path-based tenant resolver
///
/// Resolves tenant name from URL path (e.g., `/tenants/acme/users`).
pub struct PathTenantResolver {
    store: Arc<dyn TenantStore>,
    pattern: Regex,
    group_index: usize,
}

impl PathTenantResolver {
    /// Create new path-based resolver
    pub fn new(
        store: Arc<dyn TenantStore>,
        pattern: &str,
        group_index: usize,
    ) -> Result<Self, TenantError> {
        let pattern = Regex::new(pattern)
            .map_err(|e| TenantError::ResolutionFailed(format!("invalid path pattern: {}", e)))?;
        Ok(Self {
            store,
            pattern,
            group_index,
        })
    }
}

#[async_trait]
impl TenantResolver for PathTenantResolver {
    async fn find_for_request(
        &self,
        request: &TenantRequest,
    ) -> Result<Option<Tenant>, TenantError> {
        let name = self
            .pattern
            .captures(&request.path)
            .and_then(|c| c.get(self.group_index))
            .map(|m| m.as_str().to_string());

        match name {
            Some(name) => self.store.find_by_name(&name).await,
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryTenantStore;

    fn store() -> Arc<dyn TenantStore> {
        Arc::new(
            InMemoryTenantStore::with_tenants([
                Tenant::new("1", "acme").with_domain("acme.example.com"),
                Tenant::new("2", "globex").with_domain("globex.example.com"),
            ])
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_domain_resolver() {
        let resolver = DomainTenantResolver::new(store());

        let tenant = resolver
            .find_for_request(&TenantRequest::new("acme.example.com"))
            .await
            .unwrap();
        assert_eq!(tenant.unwrap().id, TenantId::new("1"));

        let none = resolver
            .find_for_request(&TenantRequest::new("unknown.example.com"))
            .await
            .unwrap();
        assert!(none.is_none());

        let empty = resolver
            .find_for_request(&TenantRequest::default())
            .await
            .unwrap();
        assert!(empty.is_none());
    }

    #[tokio::test]
    async fn test_subdomain_resolver() {
        let resolver = SubdomainTenantResolver::new(store(), ".example.com");

        let tenant = resolver
            .find_for_request(&TenantRequest::new("globex.example.com:8080"))
            .await
            .unwrap();
        assert_eq!(tenant.unwrap().name, "globex");

        let nested = resolver
            .find_for_request(&TenantRequest::new("a.acme.example.com"))
            .await
            .unwrap();
        assert!(nested.is_none());

        let bare = resolver
            .find_for_request(&TenantRequest::new("example.com"))
            .await
            .unwrap();
        assert!(bare.is_none());
    }

    #[tokio::test]
    async fn test_header_resolver() {
        let resolver = HeaderTenantResolver::new(store(), "X-Tenant-ID");

        let request = TenantRequest::new("api.example.com").with_header("X-Tenant-ID", "2");
        let tenant = resolver.find_for_request(&request).await.unwrap();
        assert_eq!(tenant.unwrap().name, "globex");

        let missing = resolver
            .find_for_request(&TenantRequest::new("api.example.com"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_path_resolver() {
        let resolver = PathTenantResolver::new(store(), r"^/tenants/([^/]+)", 1).unwrap();

        let request = TenantRequest::new("example.com").with_path("/tenants/acme/users");
        let tenant = resolver.find_for_request(&request).await.unwrap();
        assert_eq!(tenant.unwrap().name, "acme");

        let request = TenantRequest::new("example.com").with_path("/health");
        assert!(resolver.find_for_request(&request).await.unwrap().is_none());
    }

    #[test]
    fn test_invalid_path_pattern() {
        let result = PathTenantResolver::new(store(), r"^/tenants/([^/]+", 1);
        assert!(matches!(result, Err(TenantError::ResolutionFailed(_))));
    }
}

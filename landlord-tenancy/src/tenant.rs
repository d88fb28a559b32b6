//! Tenant Model
//!
//! Tenants, their domains, and the serializable reference stamped on jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Unique tenant identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Create a tenant identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TenantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Tenant status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TenantStatus {
    /// Tenant may be made current
    #[default]
    Active,
    /// Tenant exists in the directory but must not be made current
    Inactive,
}

impl fmt::Display for TenantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Inactive => write!(f, "inactive"),
        }
    }
}

/// A hostname bound to exactly one tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    /// Normalized hostname
    pub name: String,

    /// Owning tenant
    pub tenant_id: TenantId,
}

impl Domain {
    /// Create a domain binding, normalizing the hostname
    pub fn new(name: &str, tenant_id: TenantId) -> Self {
        Self {
            name: normalize_host(name),
            tenant_id,
        }
    }
}

/// Normalize a host for lookup: lower-case, no port, no trailing dot.
///
/// Bracketed IPv6 literals keep their brackets; a bare IPv6 address has no
/// port to strip.
///
/// # Examples
///
/// ```
/// use landlord_tenancy::tenant::normalize_host;
///
/// assert_eq!(normalize_host("Acme.Example.com:8080"), "acme.example.com");
/// assert_eq!(normalize_host("acme.example.com."), "acme.example.com");
/// assert_eq!(normalize_host("[::1]:8080"), "[::1]");
/// ```
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let host = if host.starts_with('[') {
        host.find(']').map_or(host, |end| &host[..=end])
    } else if host.matches(':').count() == 1 {
        host.split_once(':').map_or(host, |(name, _)| name)
    } else {
        host
    };
    host.trim_end_matches('.').to_ascii_lowercase()
}

/// Tenant information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tenant {
    /// Unique tenant identifier
    pub id: TenantId,

    /// Tenant name, used as namespace key for paths and prefixes
    pub name: String,

    /// Whether the tenant may be made current
    #[serde(default)]
    pub status: TenantStatus,

    /// Domains bound to this tenant
    #[serde(default)]
    pub domains: Vec<Domain>,

    /// Additional metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Tenant {
    /// Create a new active tenant
    ///
    /// # Examples
    ///
    /// ```
    /// use landlord_tenancy::Tenant;
    ///
    /// let tenant = Tenant::new("1", "acme");
    /// assert!(tenant.is_active());
    /// ```
    pub fn new(id: impl Into<TenantId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: TenantStatus::Active,
            domains: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    /// Bind a domain to this tenant
    pub fn with_domain(mut self, domain: &str) -> Self {
        let domain = Domain::new(domain, self.id.clone());
        self.domains.push(domain);
        self
    }

    /// Set status
    pub fn with_status(mut self, status: TenantStatus) -> Self {
        self.status = status;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Whether the tenant is active
    pub fn is_active(&self) -> bool {
        self.status == TenantStatus::Active
    }

    /// Identity comparison; two records are the same tenant iff their ids match.
    pub fn same_as(&self, other: &Tenant) -> bool {
        self.id == other.id
    }

    /// First bound domain, if any
    pub fn primary_domain(&self) -> Option<&str> {
        self.domains.first().map(|d| d.name.as_str())
    }

    /// Database name for this tenant under the given prefix
    ///
    /// # Examples
    ///
    /// ```
    /// use landlord_tenancy::Tenant;
    ///
    /// let tenant = Tenant::new("1", "acme");
    /// assert_eq!(tenant.database_name("tenant_"), "tenant_acme");
    /// ```
    pub fn database_name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.name)
    }

    /// Capture a reference to this tenant
    pub fn to_ref(&self) -> TenantRef {
        TenantRef {
            id: self.id.clone(),
            name: self.name.clone(),
            captured_at: Utc::now(),
        }
    }
}

/// Serializable pointer to a tenant, stamped on outgoing jobs.
///
/// Only `id` is authoritative; `name` is informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRef {
    /// Tenant identifier
    pub id: TenantId,

    /// Tenant name at capture time
    pub name: String,

    /// When the reference was captured
    pub captured_at: DateTime<Utc>,
}

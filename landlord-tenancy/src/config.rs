//! Tenancy configuration
//!
//! Read once at startup. Files may be TOML or JSON; a handful of values can
//! be overridden from the environment (a `.env` file is honored).

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Environment variable overriding [`TenancyConfig::database_prefix`]
pub const ENV_DATABASE_PREFIX: &str = "LANDLORD_DATABASE_PREFIX";
/// Environment variable overriding [`TenancyConfig::tenant_domain`]
pub const ENV_TENANT_DOMAIN: &str = "LANDLORD_TENANT_DOMAIN";
/// Environment variable overriding [`TenancyConfig::landlord_connection`]
pub const ENV_LANDLORD_CONNECTION: &str = "LANDLORD_LANDLORD_CONNECTION";

/// Placeholder substituted with the tenant name in filesystem templates
pub const TENANT_PLACEHOLDER: &str = "%tenant%";

/// Tenancy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TenancyConfig {
    /// Switch tasks to run, in order
    pub switch_tenant_tasks: Vec<TaskEntry>,

    /// Prefix prepended to the tenant name to form its database name
    pub database_prefix: String,

    /// Connection repointed at the tenant database
    pub tenant_connection: String,

    /// Connection holding the tenant directory
    pub landlord_connection: String,

    /// How inbound requests are matched to tenants
    pub resolver: ResolverKind,

    /// Base domain for subdomain resolution (e.g. `.example.com`)
    pub tenant_domain: String,

    /// Reject requests for which no tenant was found
    pub needs_tenant: bool,

    /// Storage root that disk templates are joined onto
    pub storage_path: String,

    /// Public application url that disk url templates are appended to
    pub app_url: String,

    /// Queue tenant awareness
    pub queue: QueueConfig,

    /// Filesystem disk overwrites
    pub filesystem: FilesystemConfig,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            switch_tenant_tasks: vec![TaskEntry::from("switch_database")],
            database_prefix: String::new(),
            tenant_connection: "tenant".to_string(),
            landlord_connection: "landlord".to_string(),
            resolver: ResolverKind::default(),
            tenant_domain: String::new(),
            needs_tenant: false,
            storage_path: "storage".to_string(),
            app_url: String::new(),
            queue: QueueConfig::default(),
            filesystem: FilesystemConfig::default(),
        }
    }
}

impl TenancyConfig {
    /// Parse from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Parse from a JSON string
    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load from a `.toml` or `.json` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            Some(ext) => Err(ConfigError::LoadError(format!(
                "Unsupported format: {}",
                ext
            ))),
            None => Err(ConfigError::LoadError(
                "No file extension found".to_string(),
            )),
        }
    }

    /// Apply environment overrides, loading `.env` if present
    pub fn with_env_overrides(mut self) -> Self {
        dotenvy::dotenv().ok();
        self.apply_overrides(|key| std::env::var(key).ok());
        self
    }

    /// Apply overrides from an arbitrary lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(prefix) = lookup(ENV_DATABASE_PREFIX) {
            self.database_prefix = prefix;
        }
        if let Some(domain) = lookup(ENV_TENANT_DOMAIN) {
            self.tenant_domain = domain;
        }
        if let Some(connection) = lookup(ENV_LANDLORD_CONNECTION) {
            self.landlord_connection = connection;
        }
    }
}

/// Request resolution strategy built from configuration.
///
/// Header and path resolution need parameters of their own and are installed
/// through [`TenancyBuilder::resolver`](crate::TenancyBuilder::resolver).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverKind {
    /// Full host looked up among tenant domains
    #[default]
    Domain,
    /// Leftmost label under `tenant_domain` looked up as the tenant name
    Subdomain,
}

/// One entry of the switch task list.
///
/// Either a bare name (`"filesystem"`) or a table that can switch the task off
/// without removing it (`{ name = "filesystem", enabled = false }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaskEntry {
    /// Enabled task
    Name(String),
    /// Task with an explicit toggle
    Toggle {
        /// Registry name
        name: String,
        /// Whether the task runs
        #[serde(default = "enabled_by_default")]
        enabled: bool,
    },
}

fn enabled_by_default() -> bool {
    true
}

impl TaskEntry {
    /// Registry name
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Toggle { name, .. } => name,
        }
    }

    /// Whether the task runs
    pub fn enabled(&self) -> bool {
        match self {
            Self::Name(_) => true,
            Self::Toggle { enabled, .. } => *enabled,
        }
    }
}

impl From<&str> for TaskEntry {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// Queue tenant awareness settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Stamp the current tenant on every job unless opted out
    pub tenant_aware_by_default: bool,

    /// Job types always stamped
    pub tenant_aware_jobs: Vec<String>,

    /// Job types never stamped
    pub not_tenant_aware_jobs: Vec<String>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            tenant_aware_by_default: true,
            tenant_aware_jobs: Vec::new(),
            not_tenant_aware_jobs: Vec::new(),
        }
    }
}

/// Per-disk overwrite templates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskOverwrite {
    /// Root template relative to the storage path
    pub root: String,

    /// Url template appended to the app url
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl DiskOverwrite {
    /// Create an overwrite with a root template
    pub fn root(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            url: None,
        }
    }

    /// Add a url template
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Filesystem tenancy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesystemConfig {
    /// Disks to rewrite, in order
    pub disks: Vec<String>,

    /// Templates per disk
    pub overwrite: BTreeMap<String, DiskOverwrite>,
}

impl Default for FilesystemConfig {
    fn default() -> Self {
        let mut overwrite = BTreeMap::new();
        overwrite.insert(
            "public".to_string(),
            DiskOverwrite::root("app/public/%tenant%").with_url("/storage/%tenant%"),
        );
        overwrite.insert(
            "tmp".to_string(),
            DiskOverwrite::root("app/public/%tenant%/tmp").with_url("/storage/%tenant%/tmp"),
        );

        Self {
            disks: vec!["public".to_string(), "tmp".to_string()],
            overwrite,
        }
    }
}

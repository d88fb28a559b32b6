//! Error types for tenancy operations.

use crate::tenant::TenantId;
use thiserror::Error;

/// Result type for tenancy operations.
pub type TenantResult<T> = Result<T, TenantError>;

/// Which pipeline step a task was running when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPhase {
    /// `make_current`
    MakeCurrent,
    /// `forget`
    Forget,
}

impl std::fmt::Display for SwitchPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MakeCurrent => write!(f, "make_current"),
            Self::Forget => write!(f, "forget"),
        }
    }
}

/// Tenancy errors
#[derive(Debug, Error)]
pub enum TenantError {
    #[error("Tenant not found: {0}")]
    NotFound(String),

    #[error("Invalid tenant: {0} is not in the tenant directory")]
    InvalidTenant(TenantId),

    #[error("Tenant {0} is inactive")]
    Inactive(TenantId),

    #[error("Domain {domain} is already bound to tenant {owner}")]
    DomainConflict { domain: String, owner: TenantId },

    #[error("Switch task '{task}' failed during {phase} for tenant {tenant}: {source}")]
    SwitchTaskFailure {
        task: String,
        phase: SwitchPhase,
        tenant: TenantId,
        #[source]
        source: TaskError,
    },

    #[error("Tenant resolution failed: {0}")]
    ResolutionFailed(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TenantError {
    /// Whether this error came out of a switch task
    pub fn is_switch_failure(&self) -> bool {
        matches!(self, Self::SwitchTaskFailure { .. })
    }
}

/// Failure of a single switch task
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Missing setting: {0}")]
    MissingSetting(String),

    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("{0}")]
    Other(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown switch task: {0}")]
    UnknownTask(String),

    #[error("Switch task listed twice: {0}")]
    DuplicateTask(String),

    #[error("Missing configuration value: {0}")]
    MissingValue(String),

    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

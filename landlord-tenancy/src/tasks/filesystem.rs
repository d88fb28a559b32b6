//! Filesystem per tenant
//!
//! Rewrites the root (and public url) of each configured disk so that the
//! tenant name becomes a path segment.

use super::reset_keys;
use crate::config::{FilesystemConfig, TENANT_PLACEHOLDER};
use crate::error::TaskError;
use crate::settings::Settings;
use crate::task::SwitchTenantTask;
use crate::tenant::Tenant;
use async_trait::async_trait;
use tracing::debug;

/// Rewrites disk roots and urls
#[derive(Debug)]
pub struct FilesystemTask {
    landlord: Settings,
    config: FilesystemConfig,
    storage_path: String,
    app_url: String,
}

impl FilesystemTask {
    /// Registry name
    pub const NAME: &'static str = "filesystem";

    /// Create the task
    pub fn new(landlord: Settings, config: FilesystemConfig, storage_path: &str, app_url: &str) -> Self {
        Self {
            landlord,
            config,
            storage_path: storage_path.to_string(),
            app_url: app_url.to_string(),
        }
    }

    /// Settings key of a disk's root
    pub fn root_key(disk: &str) -> String {
        format!("filesystems.disks.{}.root", disk)
    }

    /// Settings key of a disk's url
    pub fn url_key(disk: &str) -> String {
        format!("filesystems.disks.{}.url", disk)
    }

    fn disk_keys(&self) -> impl Iterator<Item = String> + '_ {
        self.config
            .disks
            .iter()
            .flat_map(|disk| [Self::root_key(disk), Self::url_key(disk)])
    }

    fn storage_join(&self, relative: &str) -> String {
        let base = self.storage_path.trim_end_matches('/');
        let relative = relative.trim_start_matches('/');
        if relative.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, relative)
        }
    }
}

fn render(template: &str, tenant: &Tenant) -> String {
    template.replace(TENANT_PLACEHOLDER, &tenant.name)
}

#[async_trait]
impl SwitchTenantTask for FilesystemTask {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn make_current(&self, tenant: &Tenant, settings: &Settings) -> Result<(), TaskError> {
        // Validate every disk first so a bad entry leaves nothing rewritten.
        let mut rewrites = Vec::with_capacity(self.config.disks.len());
        for disk in &self.config.disks {
            let overwrite = self.config.overwrite.get(disk).ok_or_else(|| {
                TaskError::MissingSetting(format!("filesystem.overwrite.{}", disk))
            })?;
            if !overwrite.root.contains(TENANT_PLACEHOLDER) {
                return Err(TaskError::InvalidSetting {
                    key: format!("filesystem.overwrite.{}.root", disk),
                    reason: format!("root template lacks {}", TENANT_PLACEHOLDER),
                });
            }
            rewrites.push((disk, overwrite));
        }

        for (disk, overwrite) in rewrites {
            let root = self.storage_join(&render(&overwrite.root, tenant));
            debug!(tenant_id = %tenant.id, disk = %disk, root = %root, "disk root rewritten");
            settings.set(Self::root_key(disk), root);

            if let Some(url) = overwrite.url.as_deref().filter(|u| !u.is_empty()) {
                let url = format!("{}{}", self.app_url, render(url, tenant));
                settings.set(Self::url_key(disk), url);
            }
        }

        Ok(())
    }

    async fn forget(&self, _tenant: &Tenant, settings: &Settings) -> Result<(), TaskError> {
        reset_keys(settings, &self.landlord, self.disk_keys());
        Ok(())
    }
}

//! Built-in switch tasks
//!
//! Each task rewrites a slice of a context's [`Settings`] for the current
//! tenant and copies the landlord values back when the tenant is forgotten.
//! The landlord settings themselves are never written.

mod cache;
mod database;
mod environment;
mod filesystem;

pub use cache::PrefixCacheTask;
pub use database::SwitchDatabaseTask;
pub use environment::EnvironmentTask;
pub use filesystem::FilesystemTask;

use crate::settings::Settings;

/// Copy `keys` back from the landlord settings
pub(crate) fn reset_keys<I, K>(settings: &Settings, landlord: &Settings, keys: I)
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
{
    for key in keys {
        settings.reset_from(landlord, key.as_ref());
    }
}

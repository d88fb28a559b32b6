// Landlord - Multi-tenancy for Rust services
//
// This library resolves the tenant of each request or job, makes it current
// for that unit of work, and runs an ordered pipeline of switch tasks that
// point the runtime at the tenant's resources.

// Re-export core functionality
pub use landlord_tenancy::*;

// Re-export the trait macro used to implement stores, resolvers and tasks
pub use async_trait::async_trait;

// Re-export optional crates
#[cfg(feature = "queue")]
pub use landlord_queue;

// Prelude for common imports
pub mod prelude {
    pub use crate::async_trait;
    pub use landlord_tenancy::prelude::*;

    #[cfg(feature = "queue")]
    pub use landlord_queue::prelude::*;
}

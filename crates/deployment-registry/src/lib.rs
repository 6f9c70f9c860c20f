//! Deployment Registry
//!
//! Maps live deployment slugs to their records and routes decommission
//! calls back to the adapter that owns each deployment. Records live in a
//! pluggable [`RegistryStore`]: in memory by default, Redis optionally.

pub mod error;
pub mod memory;
pub mod redis_store;
pub mod registry;
pub mod store;

pub use error::{RegistryError, Result};
pub use memory::InMemoryStore;
pub use redis_store::RedisStore;
pub use registry::DeploymentRegistry;
pub use store::RegistryStore;

//! Fence store: the only coordination medium shared by schedulers and workers.
//!
//! Two backends are available:
//! - Memory (in-process, for tests and single-process deployments)
//! - Redis (shared between processes and machines)
//!
//! # Configuration
//!
//! ```toml
//! [store]
//! backend = "redis"  # or "memory"
//!
//! [store.redis]
//! url = "redis://127.0.0.1:6379"
//! pool_size = 8
//! connection_timeout = 5
//! key_prefix = "fence"
//! ```

mod error;
mod lock;
mod manager;
mod memory;
mod redis;
mod traits;

pub use error::{StoreError, StoreResult};
pub use lock::StoreLock;
pub use manager::connect_store;
pub use memory::MemoryStore;
pub use self::redis::RedisStore;
pub use traits::FenceStore;

pub use crate::config::settings::{RedisConfig, StoreBackend, StoreConfig};

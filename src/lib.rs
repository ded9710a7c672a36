//! In-memory cache over an LDAP directory's user population.
//!
//! The crate maintains a consistent, queryable view of a remote
//! directory's users: a paged search streams the whole population into a
//! snapshot cache, targeted reconciliations keep individual entries fresh
//! after writes, and a query layer serves filtered, paginated reads
//! without touching the directory. The directory stays the single source
//! of truth: the cache is refresh/resync based, never persisted, and is
//! rebuilt on each process start.
//!
//! # Core Components
//!
//! - [`LdapSession`] / [`DirectoryConnection`] - the single authenticated
//!   session and the trait everything above the wire is written against
//! - [`UserCache`] - the snapshot store keyed by distinguished name
//! - [`DirectoryService`] - the facade exposing cache rebuild, lookups,
//!   paginated listing and the write + reconcile operations
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ldap_user_cache::{DirectoryService, LdapConfig, LdapSession, SearchCriteria};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = LdapConfig::new(
//!     "ldap://dc1.example.com:389",
//!     "cn=admin,dc=example,dc=com",
//!     "secret",
//!     "dc=example,dc=com",
//! );
//! config.default_group = "students".to_string();
//!
//! let session = LdapSession::connect(&config).await?;
//! let service = DirectoryService::new(session, config)?;
//!
//! service.init_cache(None, None).await?;
//! let page = service.list_users(&SearchCriteria::page(1, 50)?).await?;
//! println!("{} users cached", page.total);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod connection;
pub mod error;
pub mod mapper;
pub mod model;
pub mod query;
pub mod search;
pub mod service;
pub mod sync;

// Re-export commonly used types for convenience
pub use cache::UserCache;
pub use config::LdapConfig;
pub use connection::{
    DirectoryConnection, DirectoryEntry, LdapSession, ModRequest, PageCursor, SearchPage,
};
pub use error::{LdapCacheError, LdapCacheResult};
pub use model::{
    AttributeUpdate, CacheMetadata, CacheSnapshot, DirectoryUserRecord, GroupOp, MutationOp,
    NewUser, PagedUsers, SearchCriteria, UpdateOp,
};
pub use service::DirectoryService;

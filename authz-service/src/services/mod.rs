//! Services layer for the authorization engine.
//!
//! Token verification, identity loading, permission resolution and
//! matching, data scoping, and the administrative mutation path.

pub mod admin;
pub mod audit;
pub mod cache;
mod database;
pub mod identity;
mod jwt;
pub mod matcher;
pub mod resolver;
mod revocation;
pub mod scope;

pub use admin::AdminService;
pub use audit::{AuditEvent, AuditSink, LogAuditSink, MockAuditSink, PgAuditSink};
pub use cache::{MemoryPermissionCache, PermissionCache, RedisPermissionCache};
pub use database::PgIdentityStore;
pub use identity::{IdentityStore, MockIdentityStore};
pub use jwt::{JwtService, TokenClaims, TOKEN_KIND_ACCESS, TOKEN_KIND_REFRESH};
pub use matcher::{RequireOp, UNIVERSAL_WILDCARD};
pub use resolver::PermissionResolver;
pub use revocation::{MockRevocationStore, RedisRevocationStore, TokenRevocation};
pub use scope::{DataScopeFilter, ResourceKind};

pub mod permission;
pub mod permission_override;
pub mod principal;
pub mod resolved;
pub mod role;

pub use permission::Permission;
pub use permission_override::{OverridePolarity, PermissionOverride};
pub use principal::{Principal, UserRecord};
pub use resolved::{PermissionProvenance, ResolvedPermissionSet};
pub use role::{Role, RoleGrant, RoleWithPermissions};

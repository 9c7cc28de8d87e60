pub mod auth;
pub mod guard;

pub use auth::{auth_middleware, optional_auth_middleware, AuthContext, CurrentUser, MaybeUser};
pub use guard::{permission_gate, PermissionGate, ScopeFilter};

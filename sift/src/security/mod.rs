//! Authentication and operation-level authorization

pub mod credentials;
pub mod middleware;
pub mod operations;
pub mod types;

pub use credentials::{extract_credential, hash_password, CredentialVerifier, RoleTable, StaticCredentials};
pub use middleware::{authorize, AuthorizationGate, SecurityContext};
pub use operations::{Operation, OperationRegistry};
pub use types::{Credential, Identity, Permission};

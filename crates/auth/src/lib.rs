//! `rentdesk-auth`: authentication and authorization boundary.
//!
//! Pure: no HTTP, no storage. Password hashing and JWT signing are the only
//! cryptographic concerns handled here.

pub mod audit;
pub mod authorize;
pub mod claims;
pub mod jwt;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod user;

pub use audit::{RbacAction, RbacAuditEntry};
pub use authorize::{
    AuthorizationExplanation, AuthzError, CommandAuthorization, Principal, RbacRegistry, authorize,
    authorize_all, explain_authorization,
};
pub use claims::{JwtClaims, TokenValidationError, validate_claims};
pub use jwt::{Hs256JwtIssuer, Hs256JwtValidator, JwtValidator};
pub use password::{HashedPassword, PasswordError};
pub use permissions::{Permission, PermissionCategory, RiskLevel};
pub use roles::{Role, RoleRecord, RoleTemplate};
pub use user::{NewUser, ProfileUpdate, User, UserStatus, UserType};

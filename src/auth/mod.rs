//! Identity verification, password hashing and user lookup

pub mod introspection;
pub mod jwt;
pub mod password;
pub mod provider;
pub mod static_token;
pub mod users;

pub use introspection::IntrospectionVerifier;
pub use jwt::JwtVerifier;
pub use password::{build_hasher, BcryptHasher, NoOpHasher, PasswordEncoder, PasswordHasher};
pub use provider::{Identity, IdentityVerifier};
pub use static_token::StaticTokenVerifier;
pub use users::{InMemoryUserStore, UserRecord, UserStore};

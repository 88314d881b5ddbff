//! Authentication: password hashing and bearer tokens
//!
//! This module provides:
//! - Argon2id password hashing in PHC string format
//! - HS256 JSON Web Tokens carrying the user id and role

pub mod errors;
pub mod password;
pub mod token;

pub use errors::{AuthError, AuthResult};
pub use password::{hash_password, validate_password, verify_password};
pub use token::{Claims, TokenSigner};

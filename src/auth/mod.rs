//! Authentication layer: JWT issuing, password hashing, token generation,
//! and request extractors.

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod token;

pub use jwt::{sign_jwt, verify_jwt, JwtClaims, JwtPayload};
pub use middleware::{AdminSession, AppState, AuthSession};
pub use password::{hash_password, verify_password};
pub use token::{generate_session_id, parse_reset_token};

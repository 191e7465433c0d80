//! Session-id and reset-token generation and parsing.

use crate::models::Role;
use base64::{engine::general_purpose, Engine as _};
use rand::Rng;

/// Length of a generated session id or reset suffix:
/// 32 random bytes, URL-safe base64 without padding.
pub const TOKEN_LEN: usize = 43;

fn random_token() -> String {
    let mut rng = rand::rng();
    let mut bytes = [0u8; 32];
    rng.fill(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a cryptographically random session id.
pub fn generate_session_id() -> String {
    random_token()
}

/// Generate the random suffix of a password-reset token.
pub fn generate_reset_suffix() -> String {
    random_token()
}

/// Compose the full reset token handed to the user: `{prefix}_{suffix}`.
pub fn compose_reset_token(role: Role, suffix: &str) -> String {
    format!("{}_{}", role.reset_token_prefix(), suffix)
}

/// Split a prefixed reset token into its role and raw suffix.
///
/// Splits on the first underscore only, so underscores inside the
/// URL-safe suffix are harmless. Returns None for a missing separator or
/// an unknown prefix; callers cannot distinguish the two.
pub fn parse_reset_token(token: &str) -> Option<(Role, &str)> {
    let (prefix, suffix) = token.split_once('_')?;
    if suffix.is_empty() {
        return None;
    }
    let role = Role::from_reset_prefix(prefix)?;
    Some((role, suffix))
}

//! Connection gate: admit or reject a real-time connection before it can
//! touch any room state.

use jsonwebtoken::errors::ErrorKind;

use crate::auth::jwt;
use crate::identity::{IdentityError, IdentityStore, UserRecord};

/// WebSocket close codes sent when the handshake is rejected.
pub const CLOSE_AUTH_REQUIRED: u16 = 4000;
pub const CLOSE_TOKEN_EXPIRED: u16 = 4001;
pub const CLOSE_TOKEN_INVALID: u16 = 4002;
pub const CLOSE_USER_NOT_FOUND: u16 = 4004;
pub const CLOSE_INTERNAL_ERROR: u16 = 1011;

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("Authentication required")]
    MissingCredential,
    #[error("Invalid or expired session")]
    Expired,
    #[error("Invalid or expired session")]
    Invalid(#[source] jsonwebtoken::errors::Error),
    #[error("User not found")]
    UnknownUser,
    #[error("Identity lookup failed")]
    Lookup(#[from] IdentityError),
}

impl GateError {
    pub fn close_code(&self) -> u16 {
        match self {
            GateError::MissingCredential => CLOSE_AUTH_REQUIRED,
            GateError::Expired => CLOSE_TOKEN_EXPIRED,
            GateError::Invalid(_) => CLOSE_TOKEN_INVALID,
            GateError::UnknownUser => CLOSE_USER_NOT_FOUND,
            GateError::Lookup(_) => CLOSE_INTERNAL_ERROR,
        }
    }
}

/// Verify the bearer credential and resolve the user it names.
///
/// The identity lookup is the only await point; nothing is registered
/// anywhere until this returns `Ok`.
pub async fn authenticate(
    secret: &[u8],
    identity: &dyn IdentityStore,
    credential: Option<&str>,
) -> Result<UserRecord, GateError> {
    let token = credential
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(GateError::MissingCredential)?;

    let claims = jwt::validate_access_token(secret, token).map_err(|err| match err.kind() {
        ErrorKind::ExpiredSignature => GateError::Expired,
        _ => GateError::Invalid(err),
    })?;

    identity
        .find_user(&claims.user_id)
        .await?
        .ok_or(GateError::UnknownUser)
}

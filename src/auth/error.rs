use axum::http::StatusCode;

/// Stage of a single authorization pass at which a request was rejected.
///
/// A pass moves strictly forward through these stages; a rejection at any of
/// them ends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Start,
    CredentialExtracted,
    KeyResolved,
    SignatureVerified,
    ClaimsValid,
}

/// Every way the authorization layer can refuse a request.
///
/// Variants carry no internal detail: the status, machine code and description
/// are all derived from the variant, so an error is always fully populated and
/// safe to show to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("authorization header is expected")]
    MissingHeader,
    #[error("authorization header must be of the form 'Bearer <token>'")]
    MalformedHeader,
    #[error("bearer token is not a well-formed JWT")]
    MalformedToken,
    #[error("token signing algorithm is not accepted")]
    UnsupportedAlgorithm,
    #[error("token was signed with an unknown key")]
    UnknownSigningKey,
    #[error("signing keys could not be retrieved from the issuer")]
    KeyProviderUnavailable,
    #[error("token signature is invalid")]
    InvalidSignature,
    #[error("token is expired")]
    TokenExpired,
    #[error("token was not issued by the trusted issuer")]
    InvalidIssuer,
    #[error("token is not intended for this audience")]
    InvalidAudience,
    #[error("token carries no permissions claim")]
    NoPermissionsClaim,
    #[error("permission '{0}' is required")]
    InsufficientPermission(String),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::NoPermissionsClaim | AuthError::InsufficientPermission(_) => {
                StatusCode::FORBIDDEN
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingHeader => "missing_header",
            AuthError::MalformedHeader => "malformed_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::UnsupportedAlgorithm => "unsupported_algorithm",
            AuthError::UnknownSigningKey => "unknown_signing_key",
            AuthError::KeyProviderUnavailable => "key_provider_unavailable",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::InvalidIssuer => "invalid_issuer",
            AuthError::InvalidAudience => "invalid_audience",
            AuthError::NoPermissionsClaim => "no_permissions_claim",
            AuthError::InsufficientPermission(_) => "insufficient_permission",
        }
    }

    /// The last stage the pass reached before this error stopped it.
    pub fn stage(&self) -> AuthStage {
        match self {
            AuthError::MissingHeader | AuthError::MalformedHeader => AuthStage::Start,
            AuthError::MalformedToken
            | AuthError::UnsupportedAlgorithm
            | AuthError::UnknownSigningKey
            | AuthError::KeyProviderUnavailable => AuthStage::CredentialExtracted,
            AuthError::InvalidSignature => AuthStage::KeyResolved,
            AuthError::TokenExpired | AuthError::InvalidIssuer | AuthError::InvalidAudience => {
                AuthStage::SignatureVerified
            }
            AuthError::NoPermissionsClaim | AuthError::InsufficientPermission(_) => {
                AuthStage::ClaimsValid
            }
        }
    }
}

use super::error::AuthError;
use super::verifier::VerifiedClaims;

/// Check that verified claims grant `required`.
///
/// A token with no `permissions` claim at all points at a misconfigured issuer
/// or API, so it is reported separately from one that simply lacks the grant.
pub fn check_permission(claims: &VerifiedClaims, required: &str) -> Result<(), AuthError> {
    let Some(permissions) = claims.permissions() else {
        tracing::debug!(subject = ?claims.subject(), "token has no permissions claim");
        return Err(AuthError::NoPermissionsClaim);
    };

    if !permissions.contains(required) {
        tracing::debug!(
            subject = ?claims.subject(),
            permission = %required,
            "permission denied"
        );
        return Err(AuthError::InsufficientPermission(required.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granted_permission_passes() {
        let claims = VerifiedClaims::with_permissions(&["get:drinks-detail", "post:drinks"]);
        assert_eq!(check_permission(&claims, "post:drinks"), Ok(()));
    }

    #[test]
    fn test_missing_permission_is_insufficient() {
        let claims = VerifiedClaims::with_permissions(&["get:drinks-detail"]);
        assert_eq!(
            check_permission(&claims, "delete:drinks"),
            Err(AuthError::InsufficientPermission("delete:drinks".to_string()))
        );
    }

    #[test]
    fn test_empty_permission_set_is_insufficient() {
        let claims = VerifiedClaims::with_permissions(&[]);
        assert_eq!(
            check_permission(&claims, "get:drinks-detail"),
            Err(AuthError::InsufficientPermission("get:drinks-detail".to_string()))
        );
    }

    #[test]
    fn test_absent_claim_is_distinct() {
        let claims = VerifiedClaims::without_permissions_claim();
        assert_eq!(
            check_permission(&claims, "get:drinks-detail"),
            Err(AuthError::NoPermissionsClaim)
        );
    }

    #[test]
    fn test_match_is_exact_and_case_sensitive() {
        let claims = VerifiedClaims::with_permissions(&["POST:drinks", "post:drinks "]);
        assert!(check_permission(&claims, "post:drinks").is_err());
    }
}

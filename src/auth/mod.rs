//! Authorization layer - bearer token verification and permission checks
//!
//! A request is authorized in one linear pass:
//! - extract the bearer token from the `Authorization` header
//! - verify it against the issuer's published signing keys (fetched lazily, cached)
//! - check the `permissions` claim holds the permission the operation requires
//!
//! Handlers declare what they need with the [`Authorized`] extractor, e.g.
//! `Authorized<permissions::PostDrinks>`; the handler body never runs unless the
//! pass succeeds.

mod config;
mod error;
mod evaluator;
mod extractor;
mod guard;
mod keys;
mod verifier;

#[cfg(test)]
mod testing;

pub use config::{parse_algorithm, AuthConfig};
pub use error::{AuthError, AuthStage};
pub use evaluator::check_permission;
pub use extractor::{bearer_token, BearerToken};
pub use guard::{AuthGuard, Authorized, AuthorizedContext, RequiredPermission};
pub use keys::{jwk_algorithm, HttpKeySource, KeyProvider, KeySource, SigningKey};
pub use verifier::{Audience, TokenVerifier, VerifiedClaims};

/// Well-known permission names, plus a marker type per name for use with
/// [`Authorized`].
pub mod permissions {
    use super::RequiredPermission;

    pub const GET_DRINKS_DETAIL: &str = "get:drinks-detail";
    pub const POST_DRINKS: &str = "post:drinks";
    pub const PATCH_DRINKS: &str = "patch:drinks";
    pub const DELETE_DRINKS: &str = "delete:drinks";

    macro_rules! required_permission {
        ($(#[$meta:meta])* $marker:ident => $name:expr) => {
            $(#[$meta])*
            #[derive(Debug, Clone, Copy)]
            pub struct $marker;

            impl RequiredPermission for $marker {
                const NAME: &'static str = $name;
            }
        };
    }

    required_permission!(
        /// Barista: read the full recipes.
        GetDrinksDetail => GET_DRINKS_DETAIL
    );
    required_permission!(
        /// Manager: add drinks to the menu.
        PostDrinks => POST_DRINKS
    );
    required_permission!(
        /// Manager: edit a drink.
        PatchDrinks => PATCH_DRINKS
    );
    required_permission!(
        /// Manager: remove a drink.
        DeleteDrinks => DELETE_DRINKS
    );
}

use crate::server::ServerError;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use megaphone_common::model::{
    Id,
    auth::{Claims, TokenSigner},
    user::UserMarker,
};
use std::sync::Arc;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// Configured login carve-out: a credential pair that authenticates as a
/// synthetic admin without a persisted user record. Kept for operational
/// parity; every use is logged at WARN.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AdminBypass {
    email: String,
    password: String,
}

impl AdminBypass {
    #[must_use]
    pub fn new(email: String, password: String) -> Self {
        Self { email, password }
    }

    #[must_use]
    pub fn matches(&self, email: &str, password: &str) -> bool {
        email == self.email && password == self.password
    }
}

/// Request guard: a verified session token. Decoded claims are attached for
/// downstream handlers.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AuthenticatedUser {
    claims: Claims,
}

impl AuthenticatedUser {
    #[must_use]
    pub fn user_id(&self) -> Id<UserMarker> {
        self.claims.sub
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.claims.name
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.claims.is_admin
    }
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    Arc<TokenSigner>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = AuthorizationHeader::from_request_parts(parts, state)
            .await
            .map_err(ServerError::InvalidAuthorizationHeader)?;

        let claims = Arc::<TokenSigner>::from_ref(state).verify(header.token())?;

        Ok(Self { claims })
    }
}

/// Request guard on top of [`AuthenticatedUser`] requiring the admin flag.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct AdminUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for AdminUser
where
    Arc<TokenSigner>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;

        if !user.is_admin() {
            return Err(ServerError::AdminRequired);
        }

        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use crate::server::auth::AdminBypass;

    #[test]
    fn bypass_requires_exact_pair() {
        let bypass = AdminBypass::new("admin@example.com".to_owned(), "sekrit".to_owned());

        assert!(bypass.matches("admin@example.com", "sekrit"));
        assert!(!bypass.matches("admin@example.com", "wrong"));
        assert!(!bypass.matches("other@example.com", "sekrit"));
    }
}

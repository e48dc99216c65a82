use crate::model::{Id, user::UserMarker};
use argon2::{
    Argon2,
    password_hash::{
        self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::Duration;

/// Fixed session lifetime. Tokens are not refreshable.
pub const TOKEN_TTL: Duration = Duration::hours(12);

/// Claims carried by a session token.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Id<UserMarker>,
    pub name: String,
    pub is_admin: bool,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
#[error("Signing auth token failed: {0}")]
pub struct TokenIssueError(#[from] jsonwebtoken::errors::Error);

#[derive(Debug, Error)]
pub enum TokenVerifyError {
    #[error("The auth token is expired")]
    Expired,
    #[error("The auth token is invalid: {0}")]
    Invalid(jsonwebtoken::errors::Error),
}

/// Issues and verifies HS256 session tokens from a shared secret.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenSigner {
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation: Validation::default(),
        }
    }

    pub fn issue(
        &self,
        user_id: Id<UserMarker>,
        name: String,
        is_admin: bool,
    ) -> Result<String, TokenIssueError> {
        let issued_at = time::UtcDateTime::now();
        let claims = Claims {
            sub: user_id,
            name,
            is_admin,
            iat: issued_at.unix_timestamp(),
            exp: (issued_at + TOKEN_TTL).unix_timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)?;
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenVerifyError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => TokenVerifyError::Expired,
                _ => TokenVerifyError::Invalid(err),
            })?;

        Ok(data.claims)
    }
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("secret", &"[redacted]")
            .finish()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing the password failed: {0}")]
pub struct PasswordHashError(password_hash::Error);

/// Hashes a plaintext password into a PHC-formatted argon2 string.
pub fn hash_password(password: &str) -> Result<String, PasswordHashError> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(PasswordHashError)?;

    Ok(hash.to_string())
}

/// Checks a plaintext password against a stored PHC string. A malformed
/// stored hash counts as a mismatch, not an error; login must not reveal
/// which part failed.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use crate::model::auth::{TokenSigner, TokenVerifyError, hash_password, verify_password};

    #[test]
    fn token_round_trip() {
        let signer = TokenSigner::new(b"test-secret");

        let token = signer.issue(7.into(), "Ada".to_owned(), true).unwrap();
        let claims = signer.verify(&token).unwrap();

        assert_eq!(claims.sub, 7.into());
        assert_eq!(claims.name, "Ada");
        assert!(claims.is_admin);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn token_rejected_with_wrong_secret() {
        let signer = TokenSigner::new(b"test-secret");
        let other = TokenSigner::new(b"other-secret");

        let token = signer.issue(7.into(), "Ada".to_owned(), false).unwrap();
        assert!(matches!(
            other.verify(&token),
            Err(TokenVerifyError::Invalid(_))
        ));
    }

    #[test]
    fn garbage_token_rejected() {
        let signer = TokenSigner::new(b"test-secret");
        assert!(signer.verify("not.a.token").is_err());
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("hunter2").unwrap();

        assert_ne!(hash, "hunter2");
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn malformed_stored_hash_is_a_mismatch() {
        assert!(!verify_password("hunter2", "not-a-phc-string"));
    }
}

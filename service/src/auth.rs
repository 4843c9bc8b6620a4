use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use libs::record::UserProfile;

use crate::{presenter::RuntimeError, AppState};

const HASH_SCHEME: &str = "pbkdf2-sha256";
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid or expired session token")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    #[error("Could not issue session token: {0}")]
    Issue(#[source] jsonwebtoken::errors::Error),

    #[error("Stored password hash is malformed")]
    MalformedHash,
}

/// A user document as kept in the `users` collection. Never serialized
/// into a response; [`StoredUser::profile`] is what leaves the service.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    #[serde(default)]
    pub id: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl StoredUser {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            username: self.username.clone(),
            email: self.email.clone(),
        }
    }
}

/// PBKDF2-HMAC-SHA256: `pbkdf2-sha256$<iterations>$<salt>$<hash>`.
pub fn hash_password(password: &str, iterations: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    let iterations = iterations.max(1);
    let digest = derive_key(password, &salt, iterations);
    format!(
        "{}${}${}${}",
        HASH_SCHEME,
        iterations,
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(digest)
    )
}

pub fn verify_password(password: &str, stored: &str) -> Result<bool, AuthError> {
    let parts: Vec<&str> = stored.split('$').collect();
    let (iterations, salt, expected) = match parts.as_slice() {
        [scheme, iterations, salt, hash] if *scheme == HASH_SCHEME => (
            iterations
                .parse::<u32>()
                .map_err(|_| AuthError::MalformedHash)?,
            STANDARD_NO_PAD
                .decode(salt)
                .map_err(|_| AuthError::MalformedHash)?,
            STANDARD_NO_PAD
                .decode(hash)
                .map_err(|_| AuthError::MalformedHash)?,
        ),
        _ => return Err(AuthError::MalformedHash),
    };
    if iterations == 0 || expected.len() != HASH_LEN {
        return Err(AuthError::MalformedHash);
    }
    let actual = derive_key(password, &salt, iterations);
    Ok(actual[..].ct_eq(&expected[..]).into())
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LEN] {
    let mut key = [0u8; HASH_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Claims {
    /// Email of the signed-in user.
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and checks the HS256 session tokens handed out at login.
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        TokenIssuer {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    pub fn issue(
        &self,
        user: &UserProfile,
        now: DateTime<Utc>,
    ) -> Result<(String, DateTime<Utc>), AuthError> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: user.email.clone(),
            username: user.username.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(AuthError::Issue)?;
        Ok((token, expires_at))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(AuthError::InvalidToken)
    }
}

/// Claims of the bearer token on the request. Rejects with 401 when the
/// header is missing or the token does not verify.
#[derive(Debug)]
pub struct AuthUser(pub Claims);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = RuntimeError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = state.tokens.verify(token)?;
        Ok(AuthUser(claims))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> UserProfile {
        UserProfile {
            username: "ann".to_string(),
            email: "ann@example.com".to_string(),
        }
    }

    #[test]
    fn password_round_trips_through_the_hash() {
        let stored = hash_password("hunter2", 10);
        assert!(stored.starts_with("pbkdf2-sha256$10$"));
        assert!(!stored.contains("hunter2"));
        assert!(verify_password("hunter2", &stored).unwrap());
        assert!(!verify_password("hunter3", &stored).unwrap());
    }

    #[test]
    fn same_password_gets_a_fresh_salt() {
        assert_ne!(hash_password("hunter2", 2), hash_password("hunter2", 2));
    }

    #[test]
    fn malformed_hash_is_reported() {
        assert!(matches!(
            verify_password("x", "plaintext"),
            Err(AuthError::MalformedHash)
        ));
        assert!(matches!(
            verify_password("x", "pbkdf2-sha256$many$AAAA$AAAA"),
            Err(AuthError::MalformedHash)
        ));
        assert!(matches!(
            verify_password("x", "pbkdf2-sha256$0$AAAA$AAAA"),
            Err(AuthError::MalformedHash)
        ));
    }

    #[test]
    fn hash_matches_the_pbkdf2_reference_vector() {
        // RFC 7914, section 11: PBKDF2-HMAC-SHA256("passwd", "salt", 1).
        let key = derive_key("passwd", b"salt", 1);
        assert_eq!(&key[..8], &[0x55, 0xac, 0x04, 0x6e, 0x56, 0xe3, 0x08, 0x9f]);
    }

    #[test]
    fn truncated_hash_never_verifies() {
        let stored = hash_password("hunter2", 3);
        let (head, hash) = stored.rsplit_once('$').unwrap();
        let truncated = format!("{}${}", head, &hash[..hash.len() - 4]);
        assert!(matches!(
            verify_password("hunter2", &truncated),
            Err(AuthError::MalformedHash)
        ));
    }

    #[test]
    fn issued_token_verifies() {
        let issuer = TokenIssuer::new(b"secret", 3600);
        let now = Utc::now();
        let (token, expires_at) = issuer.issue(&profile(), now).unwrap();

        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.sub, "ann@example.com");
        assert_eq!(claims.username, "ann");
        assert_eq!(claims.exp, expires_at.timestamp());
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = TokenIssuer::new(b"secret", 60);
        let (token, _) = issuer
            .issue(&profile(), Utc::now() - Duration::hours(2))
            .unwrap();
        assert!(matches!(
            issuer.verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn token_from_another_secret_is_rejected() {
        let (token, _) = TokenIssuer::new(b"one", 60)
            .issue(&profile(), Utc::now())
            .unwrap();
        assert!(TokenIssuer::new(b"two", 60).verify(&token).is_err());
    }
}

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::Role;

/// Claims embedded in every token. The role travels with the token so the
/// guards need no extra read; the middleware still reloads the user row to
/// catch accounts deleted after issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub username: String,
    pub role: Role,
    /// Expiry, seconds since epoch.
    pub exp: usize,
    /// Issued-at, seconds since epoch.
    pub iat: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    /// Signature checks out but the embedded expiry has passed.
    Expired,
    /// Malformed structure or signature mismatch.
    Invalid,
}

/// Issues and verifies signed bearer tokens. Pure over the process-wide
/// secret; holds no other state.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Lifetime of a token handed out at login.
pub fn login_ttl() -> Duration {
    Duration::hours(24)
}

impl TokenService {
    pub fn new(secret: &str) -> TokenService {
        TokenService {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue(
        &self,
        user_id: &str,
        username: &str,
        role: Role,
        ttl: Duration,
    ) -> anyhow::Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            role,
            exp: (now + ttl).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        Ok(token)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let validation = Validation::new(Algorithm::HS256);
        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(TokenError::Expired),
                _ => Err(TokenError::Invalid),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_verify_carries_claims() {
        let svc = TokenService::new("unit-test-secret");
        let token = svc
            .issue("user-1", "msmith", Role::Teacher, login_ttl())
            .expect("issue");
        let claims = svc.verify(&token).expect("verify");
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.username, "msmith");
        assert_eq!(claims.role, Role::Teacher);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_token_is_distinguished_from_invalid() {
        let svc = TokenService::new("unit-test-secret");
        // Well past the default leeway.
        let token = svc
            .issue("user-1", "msmith", Role::Admin, Duration::hours(-2))
            .expect("issue");
        assert_eq!(svc.verify(&token), Err(TokenError::Expired));

        let other = TokenService::new("a-different-secret");
        let forged = other
            .issue("user-1", "msmith", Role::Admin, login_ttl())
            .expect("issue");
        assert_eq!(svc.verify(&forged), Err(TokenError::Invalid));

        assert_eq!(svc.verify("not.a.token"), Err(TokenError::Invalid));
    }
}

use jsonwebtoken::{errors::ErrorKind, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Your token has expired! Please log in again.")]
    TokenExpired,
    #[error("Invalid token. Please log in again!")]
    InvalidToken(String),
}

/// Claims of tokens minted by the auth service. `sub` is the user id.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub exp: i64,
    pub iat: i64,
    pub token_type: TokenType,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    Access,
    Refresh,
}

/// Verifies HS256 bearer tokens. This service never issues tokens.
#[derive(Clone)]
pub struct JwtService {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtService {
    pub fn new(secret: String) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                _ => JwtError::InvalidToken(e.to_string()),
            })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{Duration, Utc};
    use jsonwebtoken::{encode, EncodingKey, Header};
    use uuid::Uuid;

    use super::*;

    pub(crate) const SECRET: &str = "test-secret";

    pub(crate) fn token_for(user_id: Uuid, token_type: TokenType, ttl: Duration) -> String {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            email: "jonas@example.com".to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            token_type,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_validate_access_token() {
        let user_id = Uuid::new_v4();
        let token = token_for(user_id, TokenType::Access, Duration::minutes(15));

        let claims = JwtService::new(SECRET.to_string()).validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.token_type, TokenType::Access);
    }

    #[test]
    fn test_expired_token() {
        let token = token_for(Uuid::new_v4(), TokenType::Access, Duration::hours(-2));

        let result = JwtService::new(SECRET.to_string()).validate_token(&token);

        assert!(matches!(result, Err(JwtError::TokenExpired)));
    }

    #[test]
    fn test_wrong_secret() {
        let token = token_for(Uuid::new_v4(), TokenType::Access, Duration::minutes(15));

        let result = JwtService::new("another-secret".to_string()).validate_token(&token);

        assert!(matches!(result, Err(JwtError::InvalidToken(_))));
    }

    #[test]
    fn test_validate_invalid_token() {
        let result = JwtService::new(SECRET.to_string()).validate_token("invalid.token.here");

        assert!(matches!(result, Err(JwtError::InvalidToken(_))));
    }
}

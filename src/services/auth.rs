//! Operator identity: JWT issuing and validation.
//!
//! Tokens are issued by the back-office login; this service only needs to
//! verify them and attribute writes to the operator.

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// JWT claims embedded in access tokens.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub user_id: String,
    pub token_type: String,
    pub exp: i64,
    pub iat: i64,
}

/// Generate an access token for an operator.
pub fn generate_access_token(
    user_id: Uuid,
    username: &str,
    jwt_secret: &str,
    expiry_secs: i64,
) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: username.to_string(),
        user_id: user_id.to_string(),
        token_type: "access".to_string(),
        exp: (now + Duration::seconds(expiry_secs)).timestamp(),
        iat: now.timestamp(),
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {e}")))
}

/// Validate a JWT and return the claims.
pub fn validate_token(token: &str, jwt_secret: &str) -> Result<Claims, AppError> {
    let decoding_key = DecodingKey::from_secret(jwt_secret.as_bytes());
    let validation = Validation::default();

    jsonwebtoken::decode::<Claims>(token, &decoding_key, &validation)
        .map(|data| data.claims)
        .map_err(|_| AppError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_generation_and_validation() {
        let id = Uuid::new_v4();
        let secret = "test-secret-key-for-jwt";
        let token = generate_access_token(id, "gate-operator", secret, 900).unwrap();

        let claims = validate_token(&token, secret).unwrap();
        assert_eq!(claims.sub, "gate-operator");
        assert_eq!(claims.user_id, id.to_string());
        assert_eq!(claims.token_type, "access");
    }

    #[test]
    fn invalid_token_rejected() {
        let result = validate_token("garbage.token.here", "secret");
        assert!(result.is_err());
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = generate_access_token(Uuid::new_v4(), "op", "secret-a", 900).unwrap();
        assert!(matches!(
            validate_token(&token, "secret-b"),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn expired_token_rejected() {
        // Well beyond the 60s leeway window
        let token = generate_access_token(Uuid::new_v4(), "op", "secret", -3600).unwrap();
        assert!(validate_token(&token, "secret").is_err());
    }
}

//! JWT validation for incoming requests
//!
//! Tokens are issued by the CRM's login service; this worker only checks them.

use anyhow::{anyhow, Result};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::Request;

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    #[serde(default)]
    pub email: String,
    /// CRM role, e.g. SALES_TEAM, SALES_TEAM_HEAD, MANAGER
    pub role: String,
    /// Issued at (unix timestamp)
    pub iat: usize,
    /// Expiration (unix timestamp)
    pub exp: usize,
}

/// Authentication result from extract_auth
#[derive(Debug, Clone)]
pub struct AuthInfo {
    pub user_id: Uuid,
    pub role: String,
}

/// Validate a JWT token and return claims
pub fn validate_token(token: &str, secret: &str) -> Result<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| anyhow!("Invalid token: {}", e))?;

    Ok(token_data.claims)
}

/// Extract the caller from a NATS request; a valid JWT is required.
pub fn extract_auth<T>(request: &Request<T>, jwt_secret: &str) -> Result<AuthInfo> {
    let token = request
        .token
        .as_deref()
        .ok_or_else(|| anyhow!("No authentication provided, a JWT token is required"))?;

    let claims = validate_token(token, jwt_secret)?;
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|e| anyhow!("Invalid user_id in token: {}", e))?;

    Ok(AuthInfo { user_id, role: claims.role })
}

/// Sign a token the way the login service does
#[cfg(test)]
pub fn generate_token(user_id: Uuid, email: &str, role: &str, secret: &str) -> Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.to_string(),
        iat: now,
        exp: now + 8 * 60 * 60,
    };

    Ok(encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    const TEST_SECRET: &str = "test-secret-key-for-jwt-at-least-32-bytes-long";

    fn request(token: Option<String>) -> Request<()> {
        Request { id: Uuid::new_v4(), timestamp: Utc::now(), token, payload: () }
    }

    #[test]
    fn test_generate_and_validate_token() {
        let user_id = Uuid::new_v4();
        let token = generate_token(user_id, "priya@consult.in", "SALES_TEAM", TEST_SECRET).unwrap();

        let claims = validate_token(&token, TEST_SECRET).unwrap();
        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, "SALES_TEAM");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_validate_token_wrong_secret() {
        let token = generate_token(Uuid::new_v4(), "a@b.c", "MANAGER", TEST_SECRET).unwrap();
        assert!(validate_token(&token, "another-secret-that-is-also-32-bytes-long").is_err());
    }

    #[test]
    fn test_validate_token_malformed() {
        assert!(validate_token("not.a.jwt", TEST_SECRET).is_err());
    }

    #[test]
    fn test_extract_auth_with_valid_token() {
        let user_id = Uuid::new_v4();
        let token = generate_token(user_id, "a@b.c", "SALES_TEAM_HEAD", TEST_SECRET).unwrap();

        let auth = extract_auth(&request(Some(token)), TEST_SECRET).unwrap();
        assert_eq!(auth.user_id, user_id);
        assert_eq!(auth.role, "SALES_TEAM_HEAD");
    }

    #[test]
    fn test_extract_auth_no_token_fails() {
        let err = extract_auth(&request(None), TEST_SECRET).unwrap_err();
        assert!(err.to_string().contains("JWT token is required"));
    }

    #[test]
    fn test_extract_auth_invalid_token_fails() {
        assert!(extract_auth(&request(Some("garbage".to_string())), TEST_SECRET).is_err());
    }

    #[test]
    fn test_extract_auth_rejects_non_uuid_subject() {
        let now = Utc::now().timestamp() as usize;
        let claims = Claims {
            sub: "admin".to_string(),
            email: String::new(),
            role: "MANAGER".to_string(),
            iat: now,
            exp: now + 60,
        };
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &claims,
            &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        let err = extract_auth(&request(Some(token)), TEST_SECRET).unwrap_err();
        assert!(err.to_string().contains("Invalid user_id"));
    }
}

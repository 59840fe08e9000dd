//! JWT utilities for staff sessions.
//!
//! Production deployments sign with RS256 (RSA key pair in PEM format).
//! A shared-secret HS256 mode exists for local development and tests.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Error type for JWT operations.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    EncodingError(String),

    #[error("Failed to decode token: {0}")]
    DecodingError(String),

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid key: {0}")]
    InvalidKey(String),
}

/// JWT token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (staff identity ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// JWT ID, fingerprinted into the session row
    pub jti: String,
    pub token_type: TokenType,
}

/// Type of JWT token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// A freshly issued token with its identifier.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: chrono::DateTime<Utc>,
}

/// Configuration for JWT token generation and validation.
#[derive(Clone)]
pub struct JwtConfig {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    pub access_token_expiry_secs: i64,
    pub refresh_token_expiry_secs: i64,
    /// Leeway in seconds for clock skew tolerance
    pub leeway_secs: u64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("algorithm", &self.algorithm)
            .field("access_token_expiry_secs", &self.access_token_expiry_secs)
            .field("refresh_token_expiry_secs", &self.refresh_token_expiry_secs)
            .field("leeway_secs", &self.leeway_secs)
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .finish()
    }
}

/// Default leeway in seconds for clock skew tolerance
pub const DEFAULT_LEEWAY_SECS: u64 = 30;

impl JwtConfig {
    /// Creates an RS256 config from an RSA key pair in PEM format.
    pub fn with_rsa_keys(
        private_key_pem: &str,
        public_key_pem: &str,
        access_token_expiry_secs: i64,
        refresh_token_expiry_secs: i64,
        leeway_secs: u64,
    ) -> Result<Self, JwtError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(format!("Invalid private key: {}", e)))?;

        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(format!("Invalid public key: {}", e)))?;

        Ok(Self {
            encoding_key,
            decoding_key,
            algorithm: Algorithm::RS256,
            access_token_expiry_secs,
            refresh_token_expiry_secs,
            leeway_secs,
        })
    }

    /// Creates an HS256 config from a shared secret.
    pub fn with_secret(
        secret: &str,
        access_token_expiry_secs: i64,
        refresh_token_expiry_secs: i64,
        leeway_secs: u64,
    ) -> Result<Self, JwtError> {
        if secret.len() < 16 {
            return Err(JwtError::InvalidKey(
                "Shared secret must be at least 16 bytes".to_string(),
            ));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm: Algorithm::HS256,
            access_token_expiry_secs,
            refresh_token_expiry_secs,
            leeway_secs,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Issues an access token for the given staff member.
    pub fn issue_access_token(&self, staff_id: Uuid) -> Result<IssuedToken, JwtError> {
        self.issue(staff_id, TokenType::Access, self.access_token_expiry_secs)
    }

    /// Issues a refresh token for the given staff member.
    pub fn issue_refresh_token(&self, staff_id: Uuid) -> Result<IssuedToken, JwtError> {
        self.issue(staff_id, TokenType::Refresh, self.refresh_token_expiry_secs)
    }

    fn issue(
        &self,
        staff_id: Uuid,
        token_type: TokenType,
        expiry_secs: i64,
    ) -> Result<IssuedToken, JwtError> {
        let now = Utc::now();
        let jti = Uuid::new_v4().to_string();
        let expires_at = now + Duration::seconds(expiry_secs);

        let claims = Claims {
            sub: staff_id.to_string(),
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
            jti: jti.clone(),
            token_type,
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;

        Ok(IssuedToken {
            token,
            jti,
            expires_at,
        })
    }

    /// Validates a token and returns its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        validation.leeway = self.leeway_secs;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                jsonwebtoken::errors::ErrorKind::InvalidToken
                | jsonwebtoken::errors::ErrorKind::InvalidSignature => JwtError::InvalidToken,
                _ => JwtError::DecodingError(e.to_string()),
            }
        })?;

        Ok(token_data.claims)
    }

    /// Validates an access token specifically.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate_token(token)?;
        if claims.token_type != TokenType::Access {
            return Err(JwtError::InvalidToken);
        }
        Ok(claims)
    }

    /// Validates a refresh token specifically.
    pub fn validate_refresh_token(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = self.validate_token(token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(JwtError::InvalidToken);
        }
        Ok(claims)
    }
}

/// Extracts the staff ID from validated claims.
pub fn extract_staff_id(claims: &Claims) -> Result<Uuid, JwtError> {
    Uuid::parse_str(&claims.sub).map_err(|_| JwtError::InvalidToken)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> JwtConfig {
        JwtConfig::with_secret("test_secret_key_for_jwt_testing_12345", 900, 604800, 0).unwrap()
    }

    #[test]
    fn test_issue_access_token() {
        let config = create_test_config();
        let issued = config.issue_access_token(Uuid::new_v4()).unwrap();

        assert!(!issued.jti.is_empty());
        assert_eq!(issued.token.matches('.').count(), 2);
    }

    #[test]
    fn test_validate_access_token_round_trip() {
        let config = create_test_config();
        let staff_id = Uuid::new_v4();

        let issued = config.issue_access_token(staff_id).unwrap();
        let claims = config.validate_access_token(&issued.token).unwrap();

        assert_eq!(claims.sub, staff_id.to_string());
        assert_eq!(claims.jti, issued.jti);
        assert_eq!(claims.token_type, TokenType::Access);
        assert_eq!(extract_staff_id(&claims).unwrap(), staff_id);
    }

    #[test]
    fn test_refresh_token_rejected_as_access() {
        let config = create_test_config();
        let issued = config.issue_refresh_token(Uuid::new_v4()).unwrap();

        let result = config.validate_access_token(&issued.token);
        assert!(matches!(result, Err(JwtError::InvalidToken)));
    }

    #[test]
    fn test_access_token_rejected_as_refresh() {
        let config = create_test_config();
        let issued = config.issue_access_token(Uuid::new_v4()).unwrap();

        let result = config.validate_refresh_token(&issued.token);
        assert!(matches!(result, Err(JwtError::InvalidToken)));
    }

    #[test]
    fn test_expired_token() {
        let mut config = create_test_config();
        config.access_token_expiry_secs = -120;

        let issued = config.issue_access_token(Uuid::new_v4()).unwrap();
        let result = config.validate_access_token(&issued.token);
        assert!(
            matches!(result, Err(JwtError::TokenExpired)),
            "Expected TokenExpired, got: {:?}",
            result
        );
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let config = create_test_config();
        let other =
            JwtConfig::with_secret("a_completely_different_secret_value", 900, 604800, 0).unwrap();

        let issued = other.issue_access_token(Uuid::new_v4()).unwrap();
        assert!(config.validate_access_token(&issued.token).is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        let result = JwtConfig::with_secret("short", 900, 604800, 0);
        assert!(matches!(result, Err(JwtError::InvalidKey(_))));
    }

    #[test]
    fn test_malformed_token() {
        let config = create_test_config();
        assert!(config.validate_token("not_a_jwt").is_err());
    }

    #[test]
    fn test_unique_jti_per_token() {
        let config = create_test_config();
        let staff_id = Uuid::new_v4();

        let first = config.issue_access_token(staff_id).unwrap();
        let second = config.issue_access_token(staff_id).unwrap();
        assert_ne!(first.jti, second.jti);
    }

    #[test]
    fn test_debug_redacts_keys() {
        let debug = format!("{:?}", create_test_config());
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("test_secret_key"));
    }

    #[test]
    fn test_token_type_serialization() {
        assert_eq!(serde_json::to_string(&TokenType::Access).unwrap(), "\"access\"");
        assert_eq!(serde_json::to_string(&TokenType::Refresh).unwrap(), "\"refresh\"");
    }
}

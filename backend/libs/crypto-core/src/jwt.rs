/// JWT issuance and validation for Spectra access and refresh tokens
///
/// Keys are held by a [`JwtCodec`] value that services construct at startup
/// and share behind an `Arc`; nothing here is process-global.
///
/// ## Algorithms
///
/// - `HS512` with a shared secret (the default deployment: identity signs,
///   community validates with the same secret)
/// - `RS256` with a PEM key pair; validation-only services may load just the
///   public key
///
/// Validation pins the algorithm of the loaded keys, requires `exp`, `iss`
/// and `sub`, checks the issuer and applies zero leeway.
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Minimum HMAC secret length in bytes (256 bits)
const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Access => f.write_str("access"),
            TokenType::Refresh => f.write_str("refresh"),
        }
    }
}

/// Claims carried by every Spectra token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's email
    pub sub: String,
    pub iss: String,
    /// User ID
    pub id: Uuid,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
    /// Unique token ID; two tokens issued in the same second never collide
    pub jti: Uuid,
}

/// Token pair response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JwtError {
    #[error("invalid token signature")]
    InvalidSignature,

    #[error("token expired")]
    Expired,

    #[error("token issued by an unexpected issuer")]
    InvalidIssuer,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("invalid token configuration: {0}")]
    InvalidConfig(String),

    #[error("this codec holds no signing key")]
    SigningUnavailable,

    #[error("failed to sign token: {0}")]
    Signing(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => JwtError::InvalidSignature,
            ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
            _ => JwtError::Malformed(err.to_string()),
        }
    }
}

/// Signing and verification keys for one algorithm
pub struct JwtKeys {
    algorithm: Algorithm,
    encoding: Option<EncodingKey>,
    decoding: DecodingKey,
}

impl JwtKeys {
    /// HS512 keys from a shared secret
    pub fn hmac(secret: &[u8]) -> Result<Self, JwtError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(JwtError::InvalidKey(format!(
                "HMAC secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        Ok(Self {
            algorithm: Algorithm::HS512,
            encoding: Some(EncodingKey::from_secret(secret)),
            decoding: DecodingKey::from_secret(secret),
        })
    }

    /// RS256 keys from PEM-encoded private and public keys
    pub fn rsa_pem(private_key_pem: &str, public_key_pem: &str) -> Result<Self, JwtError> {
        let encoding = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(format!("RSA private key: {e}")))?;
        let mut keys = Self::rsa_public_pem(public_key_pem)?;
        keys.encoding = Some(encoding);
        Ok(keys)
    }

    /// RS256 validation-only keys
    pub fn rsa_public_pem(public_key_pem: &str) -> Result<Self, JwtError> {
        let decoding = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| JwtError::InvalidKey(format!("RSA public key: {e}")))?;
        Ok(Self {
            algorithm: Algorithm::RS256,
            encoding: None,
            decoding,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

/// Issuer and lifetimes shared by issuing and validating services
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            issuer: "spectra".to_string(),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

pub struct JwtCodec {
    keys: JwtKeys,
    config: JwtConfig,
    validation: Validation,
}

impl JwtCodec {
    /// Build a codec. Fails unless `0 < access_ttl < refresh_ttl`.
    pub fn new(keys: JwtKeys, config: JwtConfig) -> Result<Self, JwtError> {
        if config.access_ttl.as_secs() == 0 {
            return Err(JwtError::InvalidConfig(
                "access token lifetime must be at least one second".into(),
            ));
        }
        if config.access_ttl >= config.refresh_ttl {
            return Err(JwtError::InvalidConfig(
                "access token lifetime must be shorter than refresh token lifetime".into(),
            ));
        }

        let mut validation = Validation::new(keys.algorithm);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_issuer(&[config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        Ok(Self {
            keys,
            config,
            validation,
        })
    }

    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    pub fn issue_pair(&self, email: &str, user_id: Uuid) -> Result<TokenPair, JwtError> {
        self.issue_pair_at(email, user_id, Utc::now())
    }

    /// Issue an access/refresh pair as of `now`
    pub fn issue_pair_at(
        &self,
        email: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, JwtError> {
        let access_token = self.encode(&self.claims_at(email, user_id, TokenType::Access, now))?;
        let refresh_token =
            self.encode(&self.claims_at(email, user_id, TokenType::Refresh, now))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_ttl.as_secs() as i64,
        })
    }

    pub fn claims_at(
        &self,
        email: &str,
        user_id: Uuid,
        token_type: TokenType,
        now: DateTime<Utc>,
    ) -> Claims {
        let ttl = match token_type {
            TokenType::Access => self.config.access_ttl,
            TokenType::Refresh => self.config.refresh_ttl,
        };
        let iat = now.timestamp();

        Claims {
            sub: email.to_string(),
            iss: self.config.issuer.clone(),
            id: user_id,
            token_type,
            iat,
            exp: iat + ttl.as_secs() as i64,
            jti: Uuid::new_v4(),
        }
    }

    pub fn encode(&self, claims: &Claims) -> Result<String, JwtError> {
        let key = self
            .keys
            .encoding
            .as_ref()
            .ok_or(JwtError::SigningUnavailable)?;
        encode(&Header::new(self.keys.algorithm), claims, key)
            .map_err(|e| JwtError::Signing(e.to_string()))
    }

    /// Verify signature, issuer and expiry and return the claims
    pub fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        let data = decode::<Claims>(token, &self.keys.decoding, &self.validation)?;
        Ok(data.claims)
    }
}

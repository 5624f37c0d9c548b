//! VAPID application-server identification (RFC 8292).

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use p256::{
  SecretKey,
  elliptic_curve::sec1::ToEncodedPoint as _,
  pkcs8::DecodePrivateKey as _,
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Lifetime of a signed token.
pub const TOKEN_TTL_SECS: i64 = 3600;

#[derive(Debug, Serialize, Deserialize)]
pub struct VapidClaims {
  pub aud: String,
  pub exp: i64,
  pub sub: String,
}

/// Signs ES256 tokens with the application server's P-256 key.
#[derive(Clone)]
pub struct VapidSigner {
  key:        EncodingKey,
  /// Uncompressed public point, base64url without padding.
  public_key: String,
  subject:    String,
}

impl VapidSigner {
  /// Build a signer from a PKCS#8 PEM private key.
  pub fn from_pem(pem: &str, subject: impl Into<String>) -> Result<Self> {
    let secret = SecretKey::from_pkcs8_pem(pem)
      .map_err(|e| Error::Config(format!("invalid VAPID private key: {e}")))?;
    let public_key =
      URL_SAFE_NO_PAD.encode(secret.public_key().to_encoded_point(false).as_bytes());
    let key = EncodingKey::from_ec_pem(pem.as_bytes())?;
    Ok(Self { key, public_key, subject: subject.into() })
  }

  pub fn public_key(&self) -> &str { &self.public_key }

  /// Sign a token for the push service at `audience` (an origin).
  pub fn sign(&self, audience: &str) -> Result<String> {
    let claims = VapidClaims {
      aud: audience.to_owned(),
      exp: Utc::now().timestamp() + TOKEN_TTL_SECS,
      sub: self.subject.clone(),
    };
    Ok(encode(&Header::new(Algorithm::ES256), &claims, &self.key)?)
  }
}

//! Message encryption for web push (RFC 8291, `aes128gcm` content coding).

use aes_gcm::{Aes128Gcm, KeyInit as _, Nonce, aead::Aead as _};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hkdf::Hkdf;
use p256::{PublicKey, ecdh::EphemeralSecret, elliptic_curve::sec1::ToEncodedPoint as _};
use rand_core::{OsRng, RngCore as _};
use sha2::Sha256;

use crate::{Error, Result};

/// Record size advertised in the header. The whole payload goes in one record.
pub const RECORD_SIZE: u32 = 4096;

const SALT_LEN: usize = 16;
const TAG_LEN: usize = 16;
const KEY_INFO: &[u8] = b"WebPush: info\0";
const CEK_INFO: &[u8] = b"Content-Encoding: aes128gcm\0";
const NONCE_INFO: &[u8] = b"Content-Encoding: nonce\0";

/// Decode a base64url browser key, with or without padding.
pub fn decode_key(value: &str) -> Result<Vec<u8>> {
  URL_SAFE_NO_PAD
    .decode(value.trim().trim_end_matches('='))
    .map_err(|e| Error::Encryption(format!("invalid base64 key: {e}")))
}

/// Encrypt `plaintext` for the user agent holding `ua_public` (uncompressed
/// P-256 point) and `auth_secret`. Returns the complete request body.
pub fn encrypt(ua_public: &[u8], auth_secret: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
  if plaintext.len() + 1 + TAG_LEN > RECORD_SIZE as usize {
    return Err(Error::Encryption(format!(
      "payload of {} bytes does not fit one record",
      plaintext.len()
    )));
  }

  let ua_key = PublicKey::from_sec1_bytes(ua_public)
    .map_err(|_| Error::Encryption("invalid user agent public key".into()))?;
  let ua_point = ua_key.to_encoded_point(false);

  let as_secret = EphemeralSecret::random(&mut OsRng);
  let as_point = as_secret.public_key().to_encoded_point(false);
  let shared = as_secret.diffie_hellman(&ua_key);

  let mut salt = [0u8; SALT_LEN];
  OsRng.fill_bytes(&mut salt);

  let (cek, nonce) = derive(
    shared.raw_secret_bytes(),
    auth_secret,
    ua_point.as_bytes(),
    as_point.as_bytes(),
    &salt,
  )?;

  let mut record = Vec::with_capacity(plaintext.len() + 1);
  record.extend_from_slice(plaintext);
  record.push(0x02);

  let cipher = Aes128Gcm::new_from_slice(&cek)
    .map_err(|_| Error::Encryption("invalid content encryption key".into()))?;
  let ciphertext = cipher
    .encrypt(Nonce::from_slice(&nonce), record.as_slice())
    .map_err(|_| Error::Encryption("aes-gcm encryption failed".into()))?;

  let key_id = as_point.as_bytes();
  let mut body = Vec::with_capacity(SALT_LEN + 5 + key_id.len() + ciphertext.len());
  body.extend_from_slice(&salt);
  body.extend_from_slice(&RECORD_SIZE.to_be_bytes());
  body.push(key_id.len() as u8);
  body.extend_from_slice(key_id);
  body.extend_from_slice(&ciphertext);
  Ok(body)
}

/// Content encryption key and nonce for one message.
fn derive(
  ecdh_secret: &[u8],
  auth_secret: &[u8],
  ua_public: &[u8],
  as_public: &[u8],
  salt: &[u8],
) -> Result<([u8; 16], [u8; 12])> {
  let expand_err = |_| Error::Encryption("hkdf expansion failed".into());

  let mut key_info = Vec::with_capacity(KEY_INFO.len() + ua_public.len() + as_public.len());
  key_info.extend_from_slice(KEY_INFO);
  key_info.extend_from_slice(ua_public);
  key_info.extend_from_slice(as_public);

  let mut ikm = [0u8; 32];
  Hkdf::<Sha256>::new(Some(auth_secret), ecdh_secret)
    .expand(&key_info, &mut ikm)
    .map_err(expand_err)?;

  let prk = Hkdf::<Sha256>::new(Some(salt), &ikm);
  let mut cek = [0u8; 16];
  prk.expand(CEK_INFO, &mut cek).map_err(expand_err)?;
  let mut nonce = [0u8; 12];
  prk.expand(NONCE_INFO, &mut nonce).map_err(expand_err)?;

  Ok((cek, nonce))
}

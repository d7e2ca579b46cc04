//! Request signing for the `/public/auth/` endpoint.
//!
//! The server authenticates a key by verifying an RSA PKCS#1 v1.5 signature
//! over `key_id + timestamp`, hashed with SHA-512. The signature travels as
//! standard base64 with padding.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, SecondsFormat, Utc};
use rsa::RsaPrivateKey;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer as _};
use rustore_common::Settings;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha512;

use crate::error::{ClientError, Result};

/// Formats an instant the way the auth endpoint expects.
///
/// ISO-8601 in UTC with millisecond precision and an explicit `+00:00`
/// offset, e.g. `2024-01-15T10:30:00.123+00:00`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, false)
}

/// Signs `key_id + timestamp` with a DER-encoded private key.
///
/// Accepts PKCS#8 and PKCS#1 DER. Prefer [`Signer`] when signing repeatedly,
/// since it parses the key once.
///
/// # Errors
///
/// Returns [`ClientError::InvalidKeyError`] if the key cannot be parsed and
/// [`ClientError::SigningError`] if the RSA operation fails.
pub fn sign(key_id: &str, private_key_der: &[u8], timestamp: &str) -> Result<String> {
    Signer::from_der(key_id, private_key_der)?.sign(timestamp)
}

/// A parsed signing key bound to its key id.
#[derive(Clone)]
pub struct Signer {
    key_id: String,
    signing_key: SigningKey<Sha512>,
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("key_id", &self.key_id)
            .field("signing_key", &"[REDACTED]")
            .finish()
    }
}

impl Signer {
    /// Creates a signer from an already parsed key.
    pub fn new(key_id: impl Into<String>, private_key: RsaPrivateKey) -> Self {
        Self {
            key_id: key_id.into(),
            signing_key: SigningKey::<Sha512>::new(private_key),
        }
    }

    /// Parses a DER-encoded key, trying PKCS#8 first and PKCS#1 second.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidKeyError`] if neither encoding parses.
    pub fn from_der(key_id: impl Into<String>, der: &[u8]) -> Result<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_der(der)
            .or_else(|pkcs8_err| {
                RsaPrivateKey::from_pkcs1_der(der).map_err(|pkcs1_err| {
                    ClientError::InvalidKeyError(format!(
                        "not PKCS#8 ({pkcs8_err}) or PKCS#1 ({pkcs1_err}) DER"
                    ))
                })
            })?;
        Ok(Self::new(key_id, private_key))
    }

    /// Decodes a base64 DER key and parses it.
    ///
    /// Whitespace inside the base64 text is ignored, so keys pasted with line
    /// breaks are accepted.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidKeyError`] if the text is not base64 or
    /// does not hold a valid key.
    pub fn from_base64(key_id: impl Into<String>, private_key_b64: &SecretString) -> Result<Self> {
        let compact: String = private_key_b64
            .expose_secret()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let der = STANDARD
            .decode(compact)
            .map_err(|e| ClientError::InvalidKeyError(format!("key is not valid base64: {e}")))?;
        Self::from_der(key_id, &der)
    }

    /// Builds a signer from client settings.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::ConfigurationError`] if no key is configured, or
    /// [`ClientError::InvalidKeyError`] if the key does not parse.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let key = settings.private_key_b64.as_ref().ok_or_else(|| {
            ClientError::ConfigurationError("no private key configured".to_string())
        })?;
        Self::from_base64(settings.key_id.clone(), key)
    }

    /// The key id this signer signs for.
    pub fn key_id(&self) -> &str {
        &self.key_id
    }

    /// Signs `key_id + timestamp` and returns the base64 signature.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::SigningError`] if the RSA operation fails.
    pub fn sign(&self, timestamp: &str) -> Result<String> {
        let message = format!("{}{timestamp}", self.key_id);
        let signature = self
            .signing_key
            .try_sign(message.as_bytes())
            .map_err(|e| ClientError::SigningError(e.to_string()))?;
        Ok(STANDARD.encode(signature.to_bytes()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]

    use chrono::TimeZone;
    use once_cell::sync::Lazy;
    use rsa::RsaPublicKey;
    use rsa::pkcs1::EncodeRsaPrivateKey;
    use rsa::pkcs1v15::{Signature, VerifyingKey};
    use rsa::pkcs8::EncodePrivateKey;
    use rsa::signature::Verifier;

    use super::*;

    static KEY: Lazy<RsaPrivateKey> = Lazy::new(|| {
        RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("generate test key")
    });

    fn verify(key_id: &str, timestamp: &str, signature_b64: &str) -> bool {
        let verifying_key = VerifyingKey::<Sha512>::new(RsaPublicKey::from(&*KEY));
        let bytes = STANDARD.decode(signature_b64).unwrap();
        let signature = Signature::try_from(bytes.as_slice()).unwrap();
        let message = format!("{key_id}{timestamp}");
        verifying_key.verify(message.as_bytes(), &signature).is_ok()
    }

    #[test]
    fn test_format_timestamp() {
        let at = Utc
            .with_ymd_and_hms(2024, 1, 15, 10, 30, 0)
            .unwrap()
            .checked_add_signed(chrono::TimeDelta::milliseconds(123))
            .unwrap();
        assert_eq!(format_timestamp(at), "2024-01-15T10:30:00.123+00:00");

        let whole = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(format_timestamp(whole), "2024-01-15T10:30:00.000+00:00");
    }

    #[test]
    fn test_sign_pkcs8_verifies() {
        let der = KEY.to_pkcs8_der().unwrap();
        let timestamp = "2024-01-15T10:30:00.123+00:00";
        let signature = sign("key-123", der.as_bytes(), timestamp).unwrap();

        assert!(verify("key-123", timestamp, &signature));
        assert!(!verify("key-124", timestamp, &signature));
        assert!(!verify("key-123", "2024-01-15T10:30:00.124+00:00", &signature));
    }

    #[test]
    fn test_sign_pkcs1_matches_pkcs8() {
        let pkcs8 = KEY.to_pkcs8_der().unwrap();
        let pkcs1 = KEY.to_pkcs1_der().unwrap();
        let timestamp = "2024-01-15T10:30:00.000+00:00";

        // PKCS#1 v1.5 signatures are deterministic.
        assert_eq!(
            sign("k", pkcs8.as_bytes(), timestamp).unwrap(),
            sign("k", pkcs1.as_bytes(), timestamp).unwrap()
        );
    }

    #[test]
    fn test_signature_is_padded_base64_of_modulus_size() {
        let signer = Signer::new("k", KEY.clone());
        let signature = signer.sign("t").unwrap();
        assert_eq!(STANDARD.decode(&signature).unwrap().len(), 128);
        assert_eq!(signature.len() % 4, 0);
    }

    #[test]
    fn test_from_base64_tolerates_line_breaks() {
        let der = KEY.to_pkcs8_der().unwrap();
        let encoded = STANDARD.encode(der.as_bytes());
        let wrapped: String = encoded
            .as_bytes()
            .chunks(64)
            .map(|line| std::str::from_utf8(line).unwrap())
            .collect::<Vec<_>>()
            .join("\n");

        let signer = Signer::from_base64("key-1", &SecretString::from(wrapped)).unwrap();
        assert_eq!(signer.key_id(), "key-1");
        assert!(verify("key-1", "ts", &signer.sign("ts").unwrap()));
    }

    #[test]
    fn test_invalid_keys() {
        assert!(matches!(
            sign("k", b"definitely not der", "t"),
            Err(ClientError::InvalidKeyError(_))
        ));
        assert!(matches!(
            Signer::from_base64("k", &SecretString::from("%%%".to_string())),
            Err(ClientError::InvalidKeyError(_))
        ));
    }

    #[test]
    fn test_from_settings_requires_key() {
        let settings = Settings::default();
        assert!(matches!(
            Signer::from_settings(&settings),
            Err(ClientError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_debug_hides_key() {
        let signer = Signer::new("key-1", KEY.clone());
        let debug = format!("{signer:?}");
        assert!(debug.contains("key-1"));
        assert!(debug.contains("[REDACTED]"));
    }
}

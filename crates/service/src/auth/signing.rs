//! ES256 key pair used to sign and verify session tokens.
//!
//! Keys are parsed once at process start from injected PEM material and the
//! resulting [`SigningMaterial`] is shared by reference; there is no global
//! key state.

use std::fmt;
use std::path::Path;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use super::domain::{Claims, Role};

const ALGORITHM: Algorithm = Algorithm::ES256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SigningError {
    #[error("key parse error: {0}")]
    KeyParse(String),
    #[error("sign error: {0}")]
    Sign(String),
    #[error("bad signature")]
    BadSignature,
    #[error("malformed token: {0}")]
    Malformed(String),
    #[error("token expired")]
    Expired,
}

#[derive(Clone)]
pub struct SigningMaterial {
    encoding: EncodingKey,
    decoding: DecodingKey,
    header: Header,
    validation: Validation,
}

impl fmt::Debug for SigningMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningMaterial").field("algorithm", &ALGORITHM).finish_non_exhaustive()
    }
}

impl SigningMaterial {
    /// Parse a PKCS#8 EC private key and its SPKI public key (both PEM).
    ///
    /// Fails with [`SigningError::KeyParse`] if either key is malformed or the
    /// two do not belong to the same pair.
    pub fn from_pem(private_pem: &[u8], public_pem: &[u8]) -> Result<Self, SigningError> {
        let encoding = EncodingKey::from_ec_pem(private_pem)
            .map_err(|e| SigningError::KeyParse(format!("private key: {e}")))?;
        let decoding = DecodingKey::from_ec_pem(public_pem)
            .map_err(|e| SigningError::KeyParse(format!("public key: {e}")))?;

        let mut validation = Validation::new(ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let material = Self { encoding, decoding, header: Header::new(ALGORITHM), validation };
        material.self_check()?;
        Ok(material)
    }

    pub fn from_pem_files(private_path: impl AsRef<Path>, public_path: impl AsRef<Path>) -> Result<Self, SigningError> {
        let private_path = private_path.as_ref();
        let public_path = public_path.as_ref();
        let private_pem = std::fs::read(private_path)
            .map_err(|e| SigningError::KeyParse(format!("cannot read {}: {e}", private_path.display())))?;
        let public_pem = std::fs::read(public_path)
            .map_err(|e| SigningError::KeyParse(format!("cannot read {}: {e}", public_path.display())))?;
        Self::from_pem(&private_pem, &public_pem)
    }

    // sign and verify a throwaway token so a mismatched pair fails at startup
    fn self_check(&self) -> Result<(), SigningError> {
        let now = chrono::Utc::now().timestamp();
        let probe = Claims { user_id: "__probe__".into(), role: Role::Viewer, issued_at: now, expires_at: now + 60 };
        let token = self.sign(&probe).map_err(|e| SigningError::KeyParse(e.to_string()))?;
        match self.verify(&token) {
            Ok(_) => Ok(()),
            Err(_) => Err(SigningError::KeyParse("private and public keys do not form a pair".into())),
        }
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, SigningError> {
        encode(&self.header, claims, &self.encoding).map_err(|e| SigningError::Sign(e.to_string()))
    }

    /// Decode, check the signature against the public key and check `exp`
    /// against the current time. All three must pass.
    pub fn verify(&self, token: &str) -> Result<Claims, SigningError> {
        match decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => Err(match e.kind() {
                ErrorKind::ExpiredSignature => SigningError::Expired,
                ErrorKind::InvalidSignature => SigningError::BadSignature,
                _ => SigningError::Malformed(e.to_string()),
            }),
        }
    }
}

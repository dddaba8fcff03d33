//! Gateway token derivation.
//!
//! The gateway credential is not an independently-stored random secret:
//! it is derived from a freshly generated RSA keypair by hashing the
//! public key's DER encoding and truncating. Whoever holds (or can
//! regenerate) the keypair material can reproduce the token, so the raw
//! credential never needs to be persisted anywhere on its own. The rest
//! of the pipeline treats the result as an ordinary secret slot.

use rsa::pkcs8::{DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use skiff_types::{Result, SkiffError};

/// RSA modulus size for gateway keypairs.
const KEY_BITS: usize = 2048;

/// Derived token length in hex characters.
pub const GATEWAY_TOKEN_LEN: usize = 48;

/// A gateway keypair and the token derived from its public half.
#[derive(Clone)]
pub struct GatewayKeypair {
    /// PKCS#8 private key PEM. The reproducing material; persist this,
    /// not the token.
    pub private_key_pem: String,
    /// SPKI public key PEM.
    pub public_key_pem: String,
    /// The derived gateway token.
    pub token: String,
}

// The private half is a credential; keep it out of {:?} output.
impl std::fmt::Debug for GatewayKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayKeypair")
            .field("token_len", &self.token.len())
            .finish_non_exhaustive()
    }
}

/// Generate a fresh keypair and derive the gateway token from it.
///
/// # Errors
///
/// `Token` when key generation or encoding fails.
pub fn derive_gateway_token() -> Result<GatewayKeypair> {
    let mut rng = rand::thread_rng();
    let private_key = RsaPrivateKey::new(&mut rng, KEY_BITS)
        .map_err(|e| SkiffError::Token(format!("Failed to generate RSA keypair: {}", e)))?;
    let public_key = RsaPublicKey::from(&private_key);

    let private_key_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| SkiffError::Token(format!("Failed to encode private key: {}", e)))?
        .to_string();
    let public_key_pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| SkiffError::Token(format!("Failed to encode public key: {}", e)))?;

    let token = token_from_public_key(&public_key)?;

    Ok(GatewayKeypair {
        private_key_pem,
        public_key_pem,
        token,
    })
}

/// Re-derive the token from previously persisted public key material.
pub fn token_from_public_key_pem(pem: &str) -> Result<String> {
    let public_key = RsaPublicKey::from_public_key_pem(pem)
        .map_err(|e| SkiffError::Token(format!("Failed to parse public key: {}", e)))?;
    token_from_public_key(&public_key)
}

fn token_from_public_key(public_key: &RsaPublicKey) -> Result<String> {
    let der = public_key
        .to_public_key_der()
        .map_err(|e| SkiffError::Token(format!("Failed to encode public key: {}", e)))?;
    let digest = Sha256::digest(der.as_bytes());
    Ok(hex::encode(digest)[..GATEWAY_TOKEN_LEN].to_string())
}

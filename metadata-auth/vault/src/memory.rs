//! An in-memory transit engine for tests.
//!
//! Ciphertexts use Vault's `vault:v1:` framing around a random nonce and an AES-256-GCM sealed
//! box. Derived keys are expanded with HKDF-SHA256 using the request context as info, so a
//! ciphertext only opens under the context it was sealed with.
//!
//! Key material is a function of the mount and key name. The engine keeps nothing secret.

use crate::{DecryptRequest, DecryptResponse, EncryptRequest, EncryptResponse, Error, Transit};
use base64::{engine::general_purpose::STANDARD, Engine};
use http::StatusCode;
use ring::{
    aead::{self, Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM, NONCE_LEN},
    hkdf,
    rand::{SecureRandom, SystemRandom},
};
use std::{collections::HashMap, fmt};

const PREFIX: &str = "vault:v1:";

/// A fixed set of transit keys, grouped by mount.
#[derive(Clone)]
pub struct MemoryTransit {
    keys: HashMap<(String, String), Key>,
    rng: SystemRandom,
}

#[derive(Clone)]
struct Key {
    prk: hkdf::Prk,
    derived: bool,
}

// === impl MemoryTransit ===

impl MemoryTransit {
    pub fn new() -> Self {
        Self {
            keys: HashMap::new(),
            rng: SystemRandom::new(),
        }
    }

    /// Adds a key that does not take a derivation context.
    pub fn with_key(self, mount: impl Into<String>, name: impl Into<String>) -> Self {
        self.insert(mount.into(), name.into(), false)
    }

    /// Adds a key that requires a derivation context on every operation.
    pub fn with_derived_key(self, mount: impl Into<String>, name: impl Into<String>) -> Self {
        self.insert(mount.into(), name.into(), true)
    }

    fn insert(mut self, mount: String, name: String, derived: bool) -> Self {
        let prk = hkdf::Salt::new(hkdf::HKDF_SHA256, PREFIX.as_bytes())
            .extract(format!("{mount}/{name}").as_bytes());
        self.keys.insert((mount, name), Key { prk, derived });
        self
    }

    fn cipher(&self, mount: &str, name: &str, context: Option<&str>) -> Result<LessSafeKey, Error> {
        let key = self
            .keys
            .get(&(mount.to_string(), name.to_string()))
            .ok_or_else(|| Error::api(StatusCode::BAD_REQUEST, "encryption key not found"))?;
        let context = context
            .map(|c| STANDARD.decode(c))
            .transpose()
            .map_err(|_| Error::api(StatusCode::BAD_REQUEST, "failed to base64-decode context"))?
            .filter(|c| !c.is_empty());

        let info = match (key.derived, context) {
            (false, _) => Vec::new(),
            (true, None) => {
                return Err(Error::api(
                    StatusCode::BAD_REQUEST,
                    "missing 'context' for key derivation; the key was created using a derived \
                     key, which means additional, per-request information must be included in \
                     order to perform operations with the key",
                ))
            }
            (true, Some(context)) => context,
        };
        let info = [info.as_slice()];
        let okm = key.prk.expand(&info, &AES_256_GCM).map_err(internal)?;
        Ok(LessSafeKey::new(UnboundKey::from(okm)))
    }
}

#[async_trait::async_trait]
impl Transit for MemoryTransit {
    async fn encrypt(
        &self,
        mount: &str,
        key: &str,
        req: EncryptRequest,
    ) -> Result<EncryptResponse, Error> {
        let cipher = self.cipher(mount, key, req.context.as_deref())?;
        let plaintext = STANDARD
            .decode(&req.plaintext)
            .map_err(|_| Error::api(StatusCode::BAD_REQUEST, "failed to base64-decode plaintext"))?;

        let mut nonce = [0u8; NONCE_LEN];
        self.rng.fill(&mut nonce).map_err(internal)?;
        let mut sealed = plaintext;
        cipher
            .seal_in_place_append_tag(Nonce::assume_unique_for_key(nonce), Aad::empty(), &mut sealed)
            .map_err(internal)?;

        let mut framed = nonce.to_vec();
        framed.extend_from_slice(&sealed);
        Ok(EncryptResponse {
            ciphertext: format!("{PREFIX}{}", STANDARD.encode(framed)),
        })
    }

    async fn decrypt(
        &self,
        mount: &str,
        key: &str,
        req: DecryptRequest,
    ) -> Result<DecryptResponse, Error> {
        let cipher = self.cipher(mount, key, req.context.as_deref())?;
        let invalid = || Error::api(StatusCode::BAD_REQUEST, "invalid ciphertext");

        let framed = req
            .ciphertext
            .strip_prefix(PREFIX)
            .ok_or_else(invalid)
            .and_then(|b64| STANDARD.decode(b64).map_err(|_| invalid()))?;
        if framed.len() < NONCE_LEN + aead::MAX_TAG_LEN {
            return Err(invalid());
        }
        let (nonce, sealed) = framed.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(nonce).map_err(|_| invalid())?;

        let mut sealed = sealed.to_vec();
        let plaintext = cipher
            .open_in_place(nonce, Aad::empty(), &mut sealed)
            .map_err(|_| {
                Error::api(StatusCode::BAD_REQUEST, "cipher: message authentication failed")
            })?;
        Ok(DecryptResponse::new(plaintext))
    }
}

impl Default for MemoryTransit {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryTransit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryTransit")
            .field("keys", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn internal(_: ring::error::Unspecified) -> Error {
    Error::api(StatusCode::INTERNAL_SERVER_ERROR, "internal cipher error")
}

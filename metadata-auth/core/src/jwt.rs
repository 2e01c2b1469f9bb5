//! Decodes claims from signed JWT metadata tokens.

use crate::{Claims, ClaimsDecoder, Raw};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use std::fmt;

/// Verifies a token's signature with a shared key and extracts its [`Claims`].
///
/// `exp` and `nbf` are enforced when present; they are not required. The audience and issuer are
/// only checked when configured.
#[derive(Clone)]
pub struct JwtDecoder {
    key: DecodingKey,
    validation: Validation,
}

// === impl JwtDecoder ===

impl JwtDecoder {
    pub fn hs256(secret: &[u8]) -> Self {
        Self::with_algorithm(Algorithm::HS256, DecodingKey::from_secret(secret))
    }

    pub fn with_algorithm(alg: Algorithm, key: DecodingKey) -> Self {
        let mut validation = Validation::new(alg);
        validation.required_spec_claims.clear();
        validation.validate_aud = false;
        validation.validate_nbf = true;
        Self { key, validation }
    }

    pub fn with_audience<T: ToString>(mut self, audience: &[T]) -> Self {
        self.validation.set_audience(audience);
        self.validation.validate_aud = true;
        self
    }

    pub fn with_issuer<T: ToString>(mut self, issuer: &[T]) -> Self {
        self.validation.set_issuer(issuer);
        self
    }
}

impl ClaimsDecoder for JwtDecoder {
    fn decode(&self, raw: &Raw) -> anyhow::Result<Claims> {
        let token = raw.to_str()?;
        let data = jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }
}

impl fmt::Debug for JwtDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtDecoder")
            .field("algorithms", &self.validation.algorithms)
            .finish()
    }
}

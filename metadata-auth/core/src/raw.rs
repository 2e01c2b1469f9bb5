use bytes::Bytes;
use std::{fmt, str::Utf8Error};

/// An opaque credential at some point in the resolution pipeline.
///
/// Depending on the stage that produced it, a `Raw` may hold ciphertext or plaintext. Its
/// contents are never printed by `Debug`.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct Raw(Bytes);

// === impl Raw ===

impl Raw {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Views the credential as UTF-8 text.
    #[inline]
    pub fn to_str(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(self.as_bytes())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl fmt::Debug for Raw {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Raw")
            .field(&format_args!("<{} bytes>", self.0.len()))
            .finish()
    }
}

impl AsRef<[u8]> for Raw {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl From<Bytes> for Raw {
    #[inline]
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for Raw {
    #[inline]
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }
}

impl From<String> for Raw {
    #[inline]
    fn from(s: String) -> Self {
        Self(s.into())
    }
}

impl From<&'static str> for Raw {
    #[inline]
    fn from(s: &'static str) -> Self {
        Self(Bytes::from_static(s.as_bytes()))
    }
}

impl From<&'static [u8]> for Raw {
    #[inline]
    fn from(s: &'static [u8]) -> Self {
        Self(Bytes::from_static(s))
    }
}

// Repeating-key XOR used to encrypt the base frame.

/// Errors constructing a key stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("key buffer is empty")]
    Empty,
}

/// Decryption key, applied cyclically over the base frame.
///
/// A `KeyStream` is never empty and never changes after construction, so a
/// single instance can be shared by reference across any number of decode
/// sessions.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyStream {
    key: Box<[u8]>,
}

impl KeyStream {
    /// Wrap raw key bytes. Fails if `key` is empty.
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self, KeyError> {
        let key = key.into();
        if key.is_empty() {
            return Err(KeyError::Empty);
        }
        Ok(Self {
            key: key.into_boxed_slice(),
        })
    }

    /// Key length in bytes (always > 0).
    #[inline]
    pub fn len(&self) -> usize {
        self.key.len()
    }

    /// Always `false`; present for API symmetry with slices.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    /// XOR `data` in place: `data[i] ^= key[i % len]`.
    ///
    /// The operation is its own inverse.
    pub fn decrypt(&self, data: &mut [u8]) {
        for chunk in data.chunks_mut(self.key.len()) {
            for (b, k) in chunk.iter_mut().zip(self.key.iter()) {
                *b ^= k;
            }
        }
    }
}

// Keys are secrets; only their length is shown.
impl std::fmt::Debug for KeyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStream")
            .field("len", &self.key.len())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

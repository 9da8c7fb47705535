//! Immutable view over cached bytes.

use std::fmt;

use bytes::Bytes;

/// An immutable, cheaply clonable view of a cached value.
///
/// Clones share the same underlying buffer; nothing handed out by the cache
/// can be mutated by a caller.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct ByteView {
    bytes: Bytes,
}

impl ByteView {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Borrow the contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Copy the contents into an owned buffer.
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    /// Shared handle to the contents, suitable as a response body.
    pub fn to_bytes(&self) -> Bytes {
        self.bytes.clone()
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl From<Bytes> for ByteView {
    fn from(bytes: Bytes) -> Self {
        Self::new(bytes)
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<&'static str> for ByteView {
    fn from(s: &'static str) -> Self {
        Self::new(Bytes::from_static(s.as_bytes()))
    }
}

impl fmt::Debug for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteView")
            .field("len", &self.bytes.len())
            .finish()
    }
}

impl fmt::Display for ByteView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_contents() {
        let view = ByteView::from(b"hello".to_vec());
        let other = view.clone();
        assert_eq!(view, other);
        assert_eq!(other.as_slice(), b"hello");
        assert_eq!(view.len(), 5);
        assert_eq!(view.to_string(), "hello");
    }

    #[test]
    fn test_to_vec_is_detached_copy() {
        let view = ByteView::from("abc");
        let mut copy = view.to_vec();
        copy[0] = b'z';
        assert_eq!(view.as_slice(), b"abc");
    }
}

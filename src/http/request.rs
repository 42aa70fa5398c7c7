use std::fmt;

use crate::http::parser::ParseError;

/// Bounded storage for the path component of a request line.
///
/// Each connection owns one of these; the request line parser copies the
/// path into it rather than into any shared location. Bytes are kept as
/// received, so non-UTF-8 paths reach the filesystem unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestPath {
    bytes: Vec<u8>,
    capacity: usize,
}

impl RequestPath {
    /// Creates empty path storage holding at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Replaces the stored path.
    ///
    /// Returns `ParseError::PathTooLong` and leaves the storage untouched
    /// when `path` does not fit.
    pub fn set(&mut self, path: &[u8]) -> Result<(), ParseError> {
        if path.len() > self.capacity {
            return Err(ParseError::PathTooLong);
        }
        self.bytes.clear();
        self.bytes.extend_from_slice(path);
        Ok(())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether any `/`-separated segment is exactly `..`.
    pub fn has_parent_segment(&self) -> bool {
        self.bytes.split(|&b| b == b'/').any(|segment| segment == b"..")
    }
}

impl fmt::Display for RequestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.bytes))
    }
}

use crate::http::request::RequestPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    /// No complete request line buffered yet
    Incomplete,
    InvalidRequest,
    InvalidMethod,
    InvalidVersion,
    /// Path does not fit the connection's path storage
    PathTooLong,
    /// Receive buffer filled up before a request line arrived
    RequestTooLarge,
}

/// Parses a `METHOD SP PATH SP VERSION CRLF` request line at the start of
/// `buf` and copies the path into `path`.
///
/// Returns the number of bytes consumed, including the CRLF. Anything the
/// client sent after the request line is left alone. The query string and
/// fragment are not part of the path; an empty path means `/`.
pub fn parse_request_line(buf: &[u8], path: &mut RequestPath) -> Result<usize, ParseError> {
    let line_end = buf
        .iter()
        .position(|&b| b == b'\n')
        .ok_or(ParseError::Incomplete)?;

    let line = buf[..line_end]
        .strip_suffix(b"\r")
        .ok_or(ParseError::InvalidRequest)?;

    let mut parts = line.splitn(3, |&b| b == b' ');

    let method = parts.next().ok_or(ParseError::InvalidRequest)?;
    let target = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    if method.is_empty() {
        return Err(ParseError::InvalidRequest);
    }
    if !method.iter().all(u8::is_ascii_uppercase) {
        return Err(ParseError::InvalidMethod);
    }
    if !version.starts_with(b"HTTP/") || version.contains(&b' ') {
        return Err(ParseError::InvalidVersion);
    }

    let target = match target.iter().position(|&b| b == b'?' || b == b'#') {
        Some(end) => &target[..end],
        None => target,
    };

    if target.is_empty() {
        path.set(b"/")?;
    } else {
        path.set(target)?;
    }

    Ok(line_end + 1)
}
